//! Artifact header and section layout.
//!
//! ```text
//! header (88 bytes)
//! rule table      RuleRecord × n
//! symbol blob     NUL-terminated strings, zero-padded to 4 bytes
//! word table      WordRecord × n
//! arc table       ArcRecord × n
//! tag table       SemanticTagRecord × n
//! script table    ScriptRecord × n
//! ```

use bitflags::bitflags;

use gram_ir::{CultureId, GrammarMode, TagFormat};

use crate::record::{put_u32, word};
use crate::DecodeError;

/// Magic bytes identifying a compiled grammar.
pub const MAGIC: &[u8; 4] = b"GCFG";

/// Format version for compatibility checks.
pub const FORMAT_VERSION: u32 = 1;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 88;

/// Root index meaning "no root rule".
pub const NO_ROOT: u32 = u32::MAX;

bitflags! {
    /// Grammar-wide option bits. Readers ignore bits they do not know.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct GrammarOptions: u32 {
        const HAS_EXTENDED_FEATURES = 1 << 0;
        const HAS_SCRIPT_HOOKS = 1 << 1;
        const HAS_DYNAMIC_RULES = 1 << 2;
        const HAS_ROOT = 1 << 3;
    }
}

/// Byte offset and record count of one table.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Section {
    pub offset: u32,
    /// Records, or bytes for the symbol blob.
    pub count: u32,
}

/// Decoded artifact header.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Header {
    pub version: u32,
    pub total_size: u32,
    /// Rule table index of the root rule.
    pub root: Option<u32>,
    pub culture: CultureId,
    pub mode: GrammarMode,
    pub tag_format: TagFormat,
    pub options: GrammarOptions,
    /// Added to grammar rule indices to form rule ids.
    pub rule_id_base: u32,
    pub rules: Section,
    pub symbols: Section,
    pub words: Section,
    pub arcs: Section,
    pub tags: Section,
    pub scripts: Section,
}

impl Header {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(MAGIC);
        put_u32(out, self.version);
        put_u32(out, self.total_size);
        put_u32(out, self.root.unwrap_or(NO_ROOT));
        put_u32(out, self.culture.0);
        put_u32(out, self.mode.raw());
        put_u32(out, self.tag_format.raw());
        put_u32(out, self.options.bits());
        put_u32(out, self.rule_id_base);
        // Reserved.
        put_u32(out, 0);
        for section in self.sections() {
            put_u32(out, section.offset);
            put_u32(out, section.count);
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < HEADER_SIZE {
            return Err(DecodeError::Truncated {
                needed: HEADER_SIZE,
                len: bytes.len(),
            });
        }
        if &bytes[..4] != MAGIC {
            return Err(DecodeError::BadMagic);
        }
        let version = word(bytes, 1);
        if version != FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion { version });
        }
        let raw_mode = word(bytes, 5);
        let mode = GrammarMode::from_raw(raw_mode).ok_or(DecodeError::InvalidHeaderField {
            field: "grammar mode",
            value: raw_mode,
        })?;
        let raw_format = word(bytes, 6);
        let tag_format =
            TagFormat::from_raw(raw_format).ok_or(DecodeError::InvalidHeaderField {
                field: "tag format",
                value: raw_format,
            })?;
        let root = match word(bytes, 3) {
            NO_ROOT => None,
            index => Some(index),
        };
        let section = |n: usize| Section {
            offset: word(bytes, 10 + 2 * n),
            count: word(bytes, 11 + 2 * n),
        };
        Ok(Header {
            version,
            total_size: word(bytes, 2),
            root,
            culture: CultureId(word(bytes, 4)),
            mode,
            tag_format,
            options: GrammarOptions::from_bits_truncate(word(bytes, 7)),
            rule_id_base: word(bytes, 8),
            rules: section(0),
            symbols: section(1),
            words: section(2),
            arcs: section(3),
            tags: section(4),
            scripts: section(5),
        })
    }

    /// Sections in file order.
    pub fn sections(&self) -> [Section; 6] {
        [
            self.rules,
            self.symbols,
            self.words,
            self.arcs,
            self.tags,
            self.scripts,
        ]
    }
}

/// Round `len` up to a multiple of 4.
#[inline]
pub(crate) fn align4(len: usize) -> usize {
    (len + 3) & !3
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample() -> Header {
        Header {
            version: FORMAT_VERSION,
            total_size: 200,
            root: Some(0),
            culture: CultureId(0x0409),
            mode: GrammarMode::Voice,
            tag_format: TagFormat::SemanticsMs,
            options: GrammarOptions::HAS_ROOT,
            rule_id_base: 10,
            rules: Section {
                offset: 88,
                count: 1,
            },
            ..Header::empty()
        }
    }

    impl Header {
        fn empty() -> Self {
            Header {
                version: FORMAT_VERSION,
                total_size: 0,
                root: None,
                culture: CultureId::INVARIANT,
                mode: GrammarMode::Voice,
                tag_format: TagFormat::Properties,
                options: GrammarOptions::empty(),
                rule_id_base: 0,
                rules: Section::default(),
                symbols: Section::default(),
                words: Section::default(),
                arcs: Section::default(),
                tags: Section::default(),
                scripts: Section::default(),
            }
        }
    }

    #[test]
    fn header_is_fixed_size() {
        let mut bytes = Vec::new();
        sample().encode(&mut bytes);
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(Header::decode(&bytes), Ok(sample()));
    }

    #[test]
    fn unknown_option_bits_are_ignored() {
        let mut bytes = Vec::new();
        sample().encode(&mut bytes);
        bytes[28..32].copy_from_slice(&(0x8000_0000u32 | 1 << 3).to_le_bytes());
        let header = Header::decode(&bytes).unwrap();
        assert_eq!(header.options, GrammarOptions::HAS_ROOT);
    }

    #[test]
    fn rejects_foreign_data() {
        assert!(matches!(
            Header::decode(b"GCFG"),
            Err(DecodeError::Truncated { .. })
        ));

        let mut bytes = Vec::new();
        sample().encode(&mut bytes);
        let mut wrong_magic = bytes.clone();
        wrong_magic[0] = b'X';
        assert_eq!(Header::decode(&wrong_magic), Err(DecodeError::BadMagic));

        let mut wrong_version = bytes;
        wrong_version[4] = 2;
        assert_eq!(
            Header::decode(&wrong_version),
            Err(DecodeError::UnsupportedVersion { version: 2 })
        );
    }

    #[test]
    fn no_root_sentinel() {
        let mut bytes = Vec::new();
        Header::empty().encode(&mut bytes);
        assert_eq!(word(&bytes, 3), NO_ROOT);
        assert_eq!(Header::decode(&bytes).unwrap().root, None);
    }

    #[test]
    fn alignment() {
        assert_eq!(align4(0), 0);
        assert_eq!(align4(1), 4);
        assert_eq!(align4(8), 8);
        assert_eq!(align4(9), 12);
    }
}
