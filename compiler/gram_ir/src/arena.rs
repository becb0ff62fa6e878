//! Element arena.
//!
//! Struct-of-pools layout: elements, flattened child lists, tag values and
//! alternative weights each live in their own vector and are addressed by
//! the index types in [`crate::ids`].

use crate::{Element, ElementId, ElementRange, TagValue, ValueId, WeightRange};

/// Convert a pool length to `u32`, panicking on overflow.
#[inline]
pub(crate) fn to_u32(len: usize, what: &str) -> u32 {
    u32::try_from(len).unwrap_or_else(|_| panic!("element arena overflow: too many {what}"))
}

/// Storage for all elements of one grammar.
#[derive(Clone, Debug, Default)]
pub struct ElementArena {
    elements: Vec<Element>,
    /// Flattened child ID lists (rule bodies, sequences, alternatives).
    lists: Vec<ElementId>,
    /// Semantic tag values.
    values: Vec<TagValue>,
    /// `OneOf` alternative weights.
    weights: Vec<f32>,
}

impl ElementArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an element, returning its ID.
    pub fn alloc(&mut self, element: Element) -> ElementId {
        let id = ElementId::new(to_u32(self.elements.len(), "elements"));
        self.elements.push(element);
        id
    }

    /// Allocate a child list, returning its range.
    pub fn alloc_list(&mut self, ids: &[ElementId]) -> ElementRange {
        let start = to_u32(self.lists.len(), "list entries");
        self.lists.extend_from_slice(ids);
        ElementRange::new(start, to_u32(ids.len(), "list entries"))
    }

    /// Allocate a list from an iterator; avoids an intermediate `Vec` for
    /// large generated bodies.
    pub fn alloc_list_iter(&mut self, ids: impl IntoIterator<Item = ElementId>) -> ElementRange {
        let start = self.lists.len();
        self.lists.extend(ids);
        ElementRange::new(
            to_u32(start, "list entries"),
            to_u32(self.lists.len() - start, "list entries"),
        )
    }

    pub fn alloc_value(&mut self, value: TagValue) -> ValueId {
        let id = ValueId::new(to_u32(self.values.len(), "tag values"));
        self.values.push(value);
        id
    }

    pub fn alloc_weights(&mut self, weights: &[f32]) -> WeightRange {
        if weights.is_empty() {
            return WeightRange::EMPTY;
        }
        let start = to_u32(self.weights.len(), "weights");
        self.weights.extend_from_slice(weights);
        WeightRange::new(start, to_u32(weights.len(), "weights"))
    }

    #[inline]
    pub fn get(&self, id: ElementId) -> &Element {
        &self.elements[id.index()]
    }

    /// Get the element, or `None` if the ID is invalid or out of range.
    #[inline]
    pub fn try_get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.index())
    }

    #[inline]
    pub fn list(&self, range: ElementRange) -> &[ElementId] {
        let start = range.start as usize;
        &self.lists[start..start + range.len()]
    }

    #[inline]
    pub fn value(&self, id: ValueId) -> TagValue {
        self.values[id.index()]
    }

    #[inline]
    pub fn weights(&self, range: WeightRange) -> &[f32] {
        let start = range.start as usize;
        &self.weights[start..start + range.len()]
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Reserve room for `additional` elements and list entries.
    pub fn reserve(&mut self, additional: usize) {
        self.elements.reserve(additional);
        self.lists.reserve(additional);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Name, Token};

    fn token(text: u32) -> Element {
        Element::Token(Token {
            text: Name::new(text),
            pronunciation: Name::EMPTY,
            display: Name::EMPTY,
        })
    }

    #[test]
    fn alloc_returns_sequential_ids() {
        let mut arena = ElementArena::new();
        let a = arena.alloc(token(1));
        let b = arena.alloc(token(2));
        assert_eq!(a, ElementId::new(0));
        assert_eq!(b, ElementId::new(1));
        assert_eq!(arena.get(b), &token(2));
    }

    #[test]
    fn lists_are_flattened() {
        let mut arena = ElementArena::new();
        let a = arena.alloc(token(1));
        let b = arena.alloc(token(2));
        let first = arena.alloc_list(&[a, b]);
        let second = arena.alloc_list_iter([b]);
        assert_eq!(arena.list(first), &[a, b]);
        assert_eq!(arena.list(second), &[b]);
        assert_eq!(second.start, 2);
    }

    #[test]
    fn empty_weights_use_empty_range() {
        let mut arena = ElementArena::new();
        assert_eq!(arena.alloc_weights(&[]), WeightRange::EMPTY);
        let range = arena.alloc_weights(&[0.25, 0.75]);
        assert_eq!(arena.weights(range), &[0.25, 0.75]);
    }

    #[test]
    fn try_get_rejects_invalid() {
        let arena = ElementArena::new();
        assert!(arena.try_get(ElementId::INVALID).is_none());
    }
}
