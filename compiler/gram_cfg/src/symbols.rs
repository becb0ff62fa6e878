//! Symbol blob interning.
//!
//! All text in a compiled grammar lives in one blob of NUL-terminated UTF-8
//! strings. Identical strings share one offset; offset 0 is always the
//! empty string, so "absent" and "empty" text both encode as 0.

use rustc_hash::FxHashMap;

/// Deduplicating symbol blob builder.
#[derive(Clone, Debug)]
pub struct SymbolTable {
    offsets: FxHashMap<Box<str>, usize>,
    blob: Vec<u8>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut offsets = FxHashMap::default();
        offsets.insert(Box::from(""), 0);
        SymbolTable {
            offsets,
            blob: vec![0],
        }
    }

    /// Offset of `text`, appending it on first use. Comparison is
    /// byte-for-byte, so case matters.
    ///
    /// `text` must not contain NUL; callers reject such text up front.
    pub fn intern(&mut self, text: &str) -> usize {
        if let Some(&offset) = self.offsets.get(text) {
            return offset;
        }
        let offset = self.blob.len();
        self.blob.extend_from_slice(text.as_bytes());
        self.blob.push(0);
        self.offsets.insert(Box::from(text), offset);
        offset
    }

    pub fn get(&self, text: &str) -> Option<usize> {
        self.offsets.get(text).copied()
    }

    /// Text starting at `offset`, if it is the start of an interned string.
    pub fn text_at(&self, offset: usize) -> Option<&str> {
        let tail = self.blob.get(offset..)?;
        let end = tail.iter().position(|&b| b == 0)?;
        std::str::from_utf8(&tail[..end]).ok()
    }

    /// Blob size in bytes.
    pub fn size(&self) -> usize {
        self.blob.len()
    }

    /// Number of distinct strings, including the empty string.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.len() <= 1
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.blob
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
