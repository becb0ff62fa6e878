//! Compiled grammar reader.
//!
//! [`CfgGrammar::parse`] decodes an artifact produced by the binary backend
//! and checks it fully: every section in bounds, every record well-formed,
//! every cross-reference (symbol, word, rule, arc) pointing at something that
//! exists. Raw integers that stand for enumerations are converted through
//! the same checked conversions the compiler uses.

use std::ops::Range;

use gram_ir::{SpecialRule, SubsetMode};
use gram_lower::validator::subset_mode_from_raw;
use gram_lower::ValidationError;

use crate::layout::{Header, Section, HEADER_SIZE};
use crate::record::{
    ArcKind, ArcRecord, RecordError, RuleAttrs, RuleRecord, ScriptRecord, SemanticTagRecord,
    TagPayload, WordRecord,
};

/// Malformed or foreign artifact.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("artifact truncated: need {needed} bytes, have {len}")]
    Truncated { needed: usize, len: usize },

    #[error("not a compiled grammar (bad magic)")]
    BadMagic,

    #[error("unsupported format version {version}")]
    UnsupportedVersion { version: u32 },

    #[error("invalid {field} {value} in header")]
    InvalidHeaderField { field: &'static str, value: u32 },

    #[error("header says {header} bytes, artifact has {actual}")]
    SizeMismatch { header: u32, actual: usize },

    #[error("{section} section lies outside the artifact")]
    SectionOutOfBounds { section: &'static str },

    #[error("symbol offset {offset} does not start a string")]
    BadSymbol { offset: u32 },

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{what} {index} does not exist")]
    DanglingReference { what: &'static str, index: u32 },
}

/// A decoded, validated compiled grammar.
#[derive(Clone, Debug, PartialEq)]
pub struct CfgGrammar {
    header: Header,
    symbols: Vec<u8>,
    rules: Vec<RuleRecord>,
    words: Vec<WordRecord>,
    arcs: Vec<ArcRecord>,
    tags: Vec<SemanticTagRecord>,
    scripts: Vec<ScriptRecord>,
}

/// Bytes of one section, checked against the artifact bounds.
fn section<'a>(
    bytes: &'a [u8],
    section: Section,
    record_size: usize,
    name: &'static str,
) -> Result<&'a [u8], DecodeError> {
    let start = section.offset as usize;
    let len = (section.count as usize)
        .checked_mul(record_size)
        .ok_or(DecodeError::SectionOutOfBounds { section: name })?;
    let end = start
        .checked_add(len)
        .ok_or(DecodeError::SectionOutOfBounds { section: name })?;
    if start < HEADER_SIZE || start % 4 != 0 || end > bytes.len() {
        return Err(DecodeError::SectionOutOfBounds { section: name });
    }
    Ok(&bytes[start..end])
}

fn records<T>(
    bytes: &[u8],
    size: usize,
    decode: impl Fn(&[u8]) -> Result<T, RecordError>,
) -> Result<Vec<T>, DecodeError> {
    bytes
        .chunks_exact(size)
        .map(|chunk| decode(chunk).map_err(DecodeError::from))
        .collect()
}

impl CfgGrammar {
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        let header = Header::decode(bytes)?;
        if header.total_size as usize != bytes.len() {
            return Err(DecodeError::SizeMismatch {
                header: header.total_size,
                actual: bytes.len(),
            });
        }

        let symbols = section(bytes, header.symbols, 1, "symbols")?.to_vec();
        if symbols.first() != Some(&0) || symbols.last() != Some(&0) {
            return Err(DecodeError::BadSymbol { offset: 0 });
        }

        let grammar = CfgGrammar {
            header,
            rules: records(
                section(bytes, header.rules, RuleRecord::SIZE, "rules")?,
                RuleRecord::SIZE,
                RuleRecord::decode,
            )?,
            words: records(
                section(bytes, header.words, WordRecord::SIZE, "words")?,
                WordRecord::SIZE,
                |chunk| Ok(WordRecord::decode(chunk)),
            )?,
            arcs: records(
                section(bytes, header.arcs, ArcRecord::SIZE, "arcs")?,
                ArcRecord::SIZE,
                ArcRecord::decode,
            )?,
            tags: records(
                section(bytes, header.tags, SemanticTagRecord::SIZE, "tags")?,
                SemanticTagRecord::SIZE,
                SemanticTagRecord::decode,
            )?,
            scripts: records(
                section(bytes, header.scripts, ScriptRecord::SIZE, "scripts")?,
                ScriptRecord::SIZE,
                ScriptRecord::decode,
            )?,
            symbols,
        };
        grammar.check_references()?;
        Ok(grammar)
    }

    fn check_references(&self) -> Result<(), DecodeError> {
        let rule_count = self.rules.len();
        let arc_count = self.arcs.len();
        let in_range = |what: &'static str, index: u32, len: usize| {
            if (index as usize) < len {
                Ok(())
            } else {
                Err(DecodeError::DanglingReference { what, index })
            }
        };

        if let Some(root) = self.header.root {
            in_range("root rule", root, rule_count)?;
        }
        for rule in &self.rules {
            self.check_symbol(rule.name)?;
            if rule.attrs.contains(RuleAttrs::HAS_BODY) {
                in_range("arc", rule.first_arc.raw(), arc_count)?;
            }
        }
        for word in &self.words {
            self.check_symbol(word.text)?;
            self.check_symbol(word.pronunciation)?;
            self.check_symbol(word.display)?;
        }
        for arc in &self.arcs {
            if !arc.to_end {
                in_range("arc", arc.next.raw(), arc_count)?;
            }
            match arc.kind {
                ArcKind::Epsilon => {}
                ArcKind::Word => in_range("word", arc.payload, self.words.len())?,
                ArcKind::RuleRef => {
                    in_range("rule", arc.payload, rule_count)?;
                    self.check_symbol(arc.aux)?;
                }
                ArcKind::Special => {
                    if SpecialRule::from_raw(arc.payload).is_none() {
                        return Err(DecodeError::DanglingReference {
                            what: "special rule",
                            index: arc.payload,
                        });
                    }
                }
                ArcKind::Subset => {
                    self.check_symbol(arc.payload)?;
                    subset_mode_from_raw(arc.aux)?;
                }
                ArcKind::Dictation => self.check_symbol(arc.payload)?,
            }
        }
        for tag in &self.tags {
            in_range("arc", tag.start_arc().raw(), arc_count)?;
            in_range("arc", tag.end_arc().raw(), arc_count)?;
            in_range("arc", tag.anchor_arc().raw(), arc_count)?;
            self.check_symbol(tag.name)?;
            if let TagPayload::String(offset) = tag.value()? {
                self.check_symbol(offset)?;
            }
        }
        for script in &self.scripts {
            in_range("rule", script.rule, rule_count)?;
            self.check_symbol(script.method)?;
        }
        Ok(())
    }

    fn check_symbol(&self, offset: u32) -> Result<(), DecodeError> {
        self.symbol(offset)
            .map(|_| ())
            .ok_or(DecodeError::BadSymbol { offset })
    }

    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    #[inline]
    pub fn rules(&self) -> &[RuleRecord] {
        &self.rules
    }

    #[inline]
    pub fn words(&self) -> &[WordRecord] {
        &self.words
    }

    #[inline]
    pub fn arcs(&self) -> &[ArcRecord] {
        &self.arcs
    }

    #[inline]
    pub fn tags(&self) -> &[SemanticTagRecord] {
        &self.tags
    }

    #[inline]
    pub fn scripts(&self) -> &[ScriptRecord] {
        &self.scripts
    }

    /// String starting at `offset`. `None` unless `offset` is the start of
    /// a NUL-terminated UTF-8 string in the blob.
    pub fn symbol(&self, offset: u32) -> Option<&str> {
        let offset = offset as usize;
        if offset > 0 && self.symbols.get(offset - 1) != Some(&0) {
            return None;
        }
        let tail = self.symbols.get(offset..)?;
        let end = tail.iter().position(|&b| b == 0)?;
        std::str::from_utf8(&tail[..end]).ok()
    }

    /// Symbol blob size in bytes.
    pub fn symbol_bytes(&self) -> usize {
        self.symbols.len()
    }

    pub fn rule_name(&self, rule: &RuleRecord) -> &str {
        self.symbol(rule.name).unwrap_or_default()
    }

    /// Rule table index of the rule called `name`.
    pub fn find_rule(&self, name: &str) -> Option<u32> {
        self.rules
            .iter()
            .position(|rule| self.rule_name(rule) == name)
            .and_then(|index| u32::try_from(index).ok())
    }

    pub fn root(&self) -> Option<&RuleRecord> {
        self.header.root.and_then(|index| self.rules.get(index as usize))
    }

    /// Arcs belonging to the rule at `index`; empty without a body.
    ///
    /// Rule bodies occupy consecutive arc ranges in rule table order.
    pub fn rule_arc_range(&self, index: u32) -> Range<usize> {
        let Some(rule) = self.rules.get(index as usize) else {
            return 0..0;
        };
        if !rule.attrs.contains(RuleAttrs::HAS_BODY) {
            return 0..0;
        }
        let start = rule.first_arc.index();
        let end = self.rules[index as usize + 1..]
            .iter()
            .find(|next| next.attrs.contains(RuleAttrs::HAS_BODY))
            .map_or(self.arcs.len(), |next| next.first_arc.index());
        start..end
    }

    /// Arcs leaving the state whose first arc is `first`.
    pub fn state_arcs(&self, first: usize) -> &[ArcRecord] {
        let Some(group) = self.arcs.get(first..) else {
            return &[];
        };
        let len = group.iter().position(|arc| arc.last).map_or(group.len(), |i| i + 1);
        &group[..len]
    }

    /// Matching mode of a subset arc.
    pub fn subset_mode(arc: &ArcRecord) -> Option<SubsetMode> {
        match arc.kind {
            ArcKind::Subset => SubsetMode::from_raw(arc.aux),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests;
