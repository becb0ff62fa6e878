//! Fixed-width records of the compiled format.
//!
//! Every record is a run of little-endian 32-bit words. Bit-packed fields
//! are only reachable through setters that range-check and return
//! [`RecordError`] instead of masking, so an out-of-range value can never be
//! written silently.

use bitflags::bitflags;

use gram_ir::{Dynamic, HookKind};

/// Width of every arc index field.
pub const ARC_INDEX_BITS: u32 = 22;

/// Largest encodable arc index (4,194,303).
pub const MAX_ARC_INDEX: u32 = (1 << ARC_INDEX_BITS) - 1;

const ARC_INDEX_MASK: u32 = MAX_ARC_INDEX;

/// Out-of-range or malformed record field.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("arc index {index} does not fit in {ARC_INDEX_BITS} bits")]
    ArcIndexOutOfRange { index: u64 },

    #[error("variant discriminant {value} does not fit in 8 bits")]
    DiscriminantOutOfRange { value: u32 },

    #[error("variant discriminant {value} has no value representation")]
    UnknownVariant { value: u32 },

    #[error("{field}: reserved bits set in {word:#010x}")]
    ReservedBitsSet { field: &'static str, word: u32 },

    #[error("{field}: invalid value {value}")]
    InvalidField { field: &'static str, value: u32 },
}

/// A range-checked 22-bit arc index.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
#[repr(transparent)]
pub struct ArcIndex(u32);

impl ArcIndex {
    pub const ZERO: ArcIndex = ArcIndex(0);
    pub const MAX: ArcIndex = ArcIndex(MAX_ARC_INDEX);

    /// Fails for anything above [`MAX_ARC_INDEX`].
    pub fn new(index: u64) -> Result<Self, RecordError> {
        match u32::try_from(index) {
            Ok(raw) if raw <= MAX_ARC_INDEX => Ok(ArcIndex(raw)),
            _ => Err(RecordError::ArcIndexOutOfRange { index }),
        }
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Decode the low 22 bits of `word`; the rest must be zero.
    fn from_word(word: u32, field: &'static str) -> Result<Self, RecordError> {
        if word & !ARC_INDEX_MASK != 0 {
            return Err(RecordError::ReservedBitsSet { field, word });
        }
        Ok(ArcIndex(word))
    }
}

// Word access

#[inline]
pub(crate) fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Read the `index`th word of `bytes`. Callers size the slice.
#[inline]
pub(crate) fn word(bytes: &[u8], index: usize) -> u32 {
    let at = index * 4;
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Property variant type of a semantic tag value.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum VariantType {
    Empty = 0,
    Int32 = 3,
    Float64 = 5,
    String = 8,
    Bool = 11,
}

impl VariantType {
    #[inline]
    pub const fn raw(self) -> u32 {
        self as u32
    }

    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(VariantType::Empty),
            3 => Some(VariantType::Int32),
            5 => Some(VariantType::Float64),
            8 => Some(VariantType::String),
            11 => Some(VariantType::Bool),
            _ => None,
        }
    }
}

/// Decoded tag value. Strings are symbol offsets.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum TagPayload {
    /// No value. Stored as a zero-length string offset.
    Empty,
    String(u32),
    Int32(i32),
    Bool(bool),
    Float64(f64),
}

impl TagPayload {
    pub fn variant_type(self) -> VariantType {
        match self {
            TagPayload::Empty => VariantType::Empty,
            TagPayload::String(_) => VariantType::String,
            TagPayload::Int32(_) => VariantType::Int32,
            TagPayload::Bool(_) => VariantType::Bool,
            TagPayload::Float64(_) => VariantType::Float64,
        }
    }

    #[allow(clippy::cast_sign_loss, reason = "bit-preserving reinterpretation")]
    fn to_bits(self) -> u64 {
        match self {
            TagPayload::Empty => 0,
            TagPayload::String(offset) => u64::from(offset),
            TagPayload::Int32(value) => u64::from(value as u32),
            TagPayload::Bool(value) => u64::from(value),
            TagPayload::Float64(value) => value.to_bits(),
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        reason = "32-bit payloads live in the low word"
    )]
    fn from_bits(variant: VariantType, bits: u64) -> Self {
        let low = bits as u32;
        match variant {
            VariantType::Empty => TagPayload::Empty,
            VariantType::String => TagPayload::String(low),
            VariantType::Int32 => TagPayload::Int32(low as i32),
            VariantType::Bool => TagPayload::Bool(low != 0),
            VariantType::Float64 => TagPayload::Float64(f64::from_bits(bits)),
        }
    }
}

/// Semantic tag record (28 bytes).
///
/// | word | bits    | field                          |
/// |------|---------|--------------------------------|
/// | 0    | 0..22   | start arc                      |
/// | 1    | 0..22   | end arc                        |
/// | 2    | 0..22   | anchor arc                     |
/// | 2    | 22..30  | variant discriminant           |
/// | 3    |         | property name (symbol offset)  |
/// | 4    |         | property id                    |
/// | 5..7 |         | value                          |
///
/// Bits 22..32 of words 0 and 1 and bits 30..32 of word 2 are reserved and
/// always zero.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct SemanticTagRecord {
    start_arc: u32,
    end_arc: u32,
    anchor: u32,
    pub name: u32,
    pub property_id: u32,
    value_bits: u64,
}

const DISCRIMINANT_SHIFT: u32 = ARC_INDEX_BITS;
const DISCRIMINANT_MASK: u32 = 0xFF << DISCRIMINANT_SHIFT;
const ANCHOR_RESERVED_MASK: u32 = !(ARC_INDEX_MASK | DISCRIMINANT_MASK);

impl SemanticTagRecord {
    pub const SIZE: usize = 28;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_arc(&self) -> ArcIndex {
        ArcIndex(self.start_arc)
    }

    pub fn set_start_arc(&mut self, index: u64) -> Result<(), RecordError> {
        self.start_arc = ArcIndex::new(index)?.raw();
        Ok(())
    }

    pub fn end_arc(&self) -> ArcIndex {
        ArcIndex(self.end_arc)
    }

    pub fn set_end_arc(&mut self, index: u64) -> Result<(), RecordError> {
        self.end_arc = ArcIndex::new(index)?.raw();
        Ok(())
    }

    pub fn anchor_arc(&self) -> ArcIndex {
        ArcIndex(self.anchor & ARC_INDEX_MASK)
    }

    pub fn set_anchor_arc(&mut self, index: u64) -> Result<(), RecordError> {
        let index = ArcIndex::new(index)?;
        self.anchor = (self.anchor & !ARC_INDEX_MASK) | index.raw();
        Ok(())
    }

    /// Raw 8-bit discriminant.
    pub fn variant_type(&self) -> u32 {
        (self.anchor & DISCRIMINANT_MASK) >> DISCRIMINANT_SHIFT
    }

    /// Store a raw discriminant without touching the value.
    pub fn set_variant_type(&mut self, value: u32) -> Result<(), RecordError> {
        if value > 0xFF {
            return Err(RecordError::DiscriminantOutOfRange { value });
        }
        self.anchor = (self.anchor & !DISCRIMINANT_MASK) | (value << DISCRIMINANT_SHIFT);
        Ok(())
    }

    /// Store a value together with its discriminant.
    pub fn set_value(&mut self, payload: TagPayload) {
        self.anchor = (self.anchor & !DISCRIMINANT_MASK)
            | (payload.variant_type().raw() << DISCRIMINANT_SHIFT);
        self.value_bits = payload.to_bits();
    }

    /// Decode the value according to the discriminant.
    pub fn value(&self) -> Result<TagPayload, RecordError> {
        let raw = self.variant_type();
        let variant = VariantType::from_raw(raw).ok_or(RecordError::UnknownVariant { value: raw })?;
        Ok(TagPayload::from_bits(variant, self.value_bits))
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        put_u32(out, self.start_arc);
        put_u32(out, self.end_arc);
        put_u32(out, self.anchor);
        put_u32(out, self.name);
        put_u32(out, self.property_id);
        out.extend_from_slice(&self.value_bits.to_le_bytes());
    }

    /// Decode from exactly [`Self::SIZE`] bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        let anchor = word(bytes, 2);
        if anchor & ANCHOR_RESERVED_MASK != 0 {
            return Err(RecordError::ReservedBitsSet {
                field: "tag anchor",
                word: anchor,
            });
        }
        let record = SemanticTagRecord {
            start_arc: ArcIndex::from_word(word(bytes, 0), "tag start arc")?.raw(),
            end_arc: ArcIndex::from_word(word(bytes, 1), "tag end arc")?.raw(),
            anchor,
            name: word(bytes, 3),
            property_id: word(bytes, 4),
            value_bits: u64::from(word(bytes, 5)) | (u64::from(word(bytes, 6)) << 32),
        };
        record.value()?;
        Ok(record)
    }
}

/// What an arc consumes.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum ArcKind {
    /// Consumes nothing.
    Epsilon = 0,
    /// Payload: word table index.
    Word = 1,
    /// Payload: rule table index. Aux: semantic key offset or 0.
    RuleRef = 2,
    /// Payload: special rule code.
    Special = 3,
    /// Payload: text offset. Aux: subset matching mode.
    Subset = 4,
    /// Payload: category offset or 0.
    Dictation = 5,
}

impl ArcKind {
    pub const fn raw(self) -> u32 {
        self as u32
    }

    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(ArcKind::Epsilon),
            1 => Some(ArcKind::Word),
            2 => Some(ArcKind::RuleRef),
            3 => Some(ArcKind::Special),
            4 => Some(ArcKind::Subset),
            5 => Some(ArcKind::Dictation),
            _ => None,
        }
    }
}

const ARC_LAST: u32 = 1 << 22;
const ARC_TO_END: u32 = 1 << 23;
const ARC_KIND_SHIFT: u32 = 24;

/// Arc record (16 bytes).
///
/// Arcs leaving the same state are contiguous; the last one carries
/// `last`. `next` is the first arc of the target state, unused when
/// `to_end` is set.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct ArcRecord {
    pub next: ArcIndex,
    pub last: bool,
    pub to_end: bool,
    pub kind: ArcKind,
    pub payload: u32,
    pub aux: u32,
    pub weight: f32,
}

impl ArcRecord {
    pub const SIZE: usize = 16;

    pub fn encode(&self, out: &mut Vec<u8>) {
        let mut head = self.next.raw() | (self.kind.raw() << ARC_KIND_SHIFT);
        if self.last {
            head |= ARC_LAST;
        }
        if self.to_end {
            head |= ARC_TO_END;
        }
        put_u32(out, head);
        put_u32(out, self.payload);
        put_u32(out, self.aux);
        put_u32(out, self.weight.to_bits());
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        let head = word(bytes, 0);
        let raw_kind = head >> ARC_KIND_SHIFT;
        let kind = ArcKind::from_raw(raw_kind).ok_or(RecordError::InvalidField {
            field: "arc kind",
            value: raw_kind,
        })?;
        Ok(ArcRecord {
            next: ArcIndex(head & ARC_INDEX_MASK),
            last: head & ARC_LAST != 0,
            to_end: head & ARC_TO_END != 0,
            kind,
            payload: word(bytes, 1),
            aux: word(bytes, 2),
            weight: f32::from_bits(word(bytes, 3)),
        })
    }
}

bitflags! {
    /// Rule attribute bits (attribute word bits 0..8).
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct RuleAttrs: u8 {
        const PUBLIC = 1 << 0;
        const EXPORT = 1 << 1;
        const IMPORT = 1 << 2;
        /// Designated root of the grammar.
        const ROOT = 1 << 3;
        /// Uses extended constructs.
        const EXTENDED = 1 << 4;
        const HAS_HOOKS = 1 << 5;
        /// `first_arc` is meaningful.
        const HAS_BODY = 1 << 6;
    }
}

const DYNAMIC_SHIFT: u32 = 8;
const ATTR_RESERVED_MASK: u32 = !0x3FF;

/// Rule table record (16 bytes).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct RuleRecord {
    /// Symbol offset of the rule name.
    pub name: u32,
    pub attrs: RuleAttrs,
    pub dynamic: Dynamic,
    pub first_arc: ArcIndex,
    /// Globally unique rule id.
    pub id: u32,
}

impl RuleRecord {
    pub const SIZE: usize = 16;

    pub fn encode(&self, out: &mut Vec<u8>) {
        put_u32(out, self.name);
        put_u32(
            out,
            u32::from(self.attrs.bits()) | (u32::from(self.dynamic.raw()) << DYNAMIC_SHIFT),
        );
        put_u32(out, self.first_arc.raw());
        put_u32(out, self.id);
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        let attr_word = word(bytes, 1);
        if attr_word & ATTR_RESERVED_MASK != 0 {
            return Err(RecordError::ReservedBitsSet {
                field: "rule attributes",
                word: attr_word,
            });
        }
        let low = (attr_word & 0xFF) as u8;
        let attrs = RuleAttrs::from_bits(low).ok_or(RecordError::InvalidField {
            field: "rule attributes",
            value: u32::from(low),
        })?;
        let raw_dynamic = (attr_word >> DYNAMIC_SHIFT) & 0b11;
        let dynamic = Dynamic::from_raw(raw_dynamic as u8).ok_or(RecordError::InvalidField {
            field: "rule dynamic",
            value: raw_dynamic,
        })?;
        Ok(RuleRecord {
            name: word(bytes, 0),
            attrs,
            dynamic,
            first_arc: ArcIndex::from_word(word(bytes, 2), "rule first arc")?,
            id: word(bytes, 3),
        })
    }
}

/// Word table record (12 bytes): symbol offsets, 0 for absent forms.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct WordRecord {
    pub text: u32,
    pub pronunciation: u32,
    pub display: u32,
}

impl WordRecord {
    pub const SIZE: usize = 12;

    pub fn encode(&self, out: &mut Vec<u8>) {
        put_u32(out, self.text);
        put_u32(out, self.pronunciation);
        put_u32(out, self.display);
    }

    pub fn decode(bytes: &[u8]) -> Self {
        WordRecord {
            text: word(bytes, 0),
            pronunciation: word(bytes, 1),
            display: word(bytes, 2),
        }
    }
}

/// Script table record (12 bytes).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ScriptRecord {
    /// Rule table index.
    pub rule: u32,
    pub hook: HookKind,
    /// Symbol offset of the method name.
    pub method: u32,
}

impl ScriptRecord {
    pub const SIZE: usize = 12;

    pub fn encode(&self, out: &mut Vec<u8>) {
        put_u32(out, self.rule);
        put_u32(out, u32::from(self.hook.raw()));
        put_u32(out, self.method);
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        let raw = word(bytes, 1);
        let hook = HookKind::from_raw(raw).ok_or(RecordError::InvalidField {
            field: "script hook",
            value: raw,
        })?;
        Ok(ScriptRecord {
            rule: word(bytes, 0),
            hook,
            method: word(bytes, 2),
        })
    }
}
