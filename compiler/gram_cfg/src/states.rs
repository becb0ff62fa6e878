//! Per-rule state construction and arc layout.
//!
//! While a rule is open the backend records its body as a fragment tree
//! (one fragment per lowered node, children in creation order). Closing the
//! rule turns the tree into a transition graph between numbered states:
//!
//! - state 0 is the rule's start, state 1 its end
//! - a sequence chains its children through fresh intermediate states
//! - alternatives share their parent's start and end states
//! - an item is expanded into its mandatory copies followed by optional
//!   copies (each with an epsilon skip) or a self-loop when unbounded
//! - a tag records the span of arcs its content produced
//!
//! The graph is then laid out with arcs grouped by source state, in
//! creation order within a group. Every index is range-checked against the
//! 22-bit arc index space as it is produced.

use gram_ir::Repeat;
use gram_lower::{ensure_sufficient_stack, CompileError};

use crate::record::{
    ArcIndex, ArcKind, ArcRecord, RecordError, SemanticTagRecord, TagPayload, MAX_ARC_INDEX,
};

/// Absent fragment link.
const NONE: u32 = u32::MAX;

/// Upper bound on fragments reserved up front for one rule.
const PRESIZE_LIMIT: u32 = 1 << 16;

const START: u32 = 0;
const END: u32 = 1;

/// Pseudo-sources for arcs not created from a leaf fragment.
const EPSILON: u32 = u32::MAX;
const VOID: u32 = u32::MAX - 1;

/// What a leaf arc carries, minus its position in the graph.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) struct ArcTemplate {
    pub kind: ArcKind,
    pub payload: u32,
    pub aux: u32,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub(crate) struct TagTemplate {
    pub name: u32,
    pub property_id: u32,
    pub value: TagPayload,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub(crate) enum FragmentKind {
    Body,
    Sequence,
    OneOf { weights_start: u32, weights_len: u32 },
    Item {
        repeat: Repeat,
        probability: f32,
        weight: f32,
    },
    Tag { template: u32 },
    Leaf(ArcTemplate),
}

#[derive(Copy, Clone, Debug)]
struct Fragment {
    kind: FragmentKind,
    first_child: u32,
    last_child: u32,
    next_sibling: u32,
}

/// Fragment tree of the rule currently being lowered.
#[derive(Debug)]
pub(crate) struct RuleBuild {
    /// Rule table index.
    pub rule: u32,
    fragments: Vec<Fragment>,
    weights: Vec<f32>,
    tags: Vec<TagTemplate>,
}

impl RuleBuild {
    /// Open a rule; fragment 0 is its body.
    pub fn new(rule: u32, reachable: u32) -> Self {
        // The count includes referenced rules, which never become fragments here.
        let mut fragments = Vec::with_capacity(reachable.min(PRESIZE_LIMIT) as usize + 1);
        fragments.push(Fragment {
            kind: FragmentKind::Body,
            first_child: NONE,
            last_child: NONE,
            next_sibling: NONE,
        });
        RuleBuild {
            rule,
            fragments,
            weights: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Append a fragment as the last child of `parent`. `None` once the
    /// fragment index space is exhausted.
    pub fn push(&mut self, parent: u32, kind: FragmentKind) -> Option<u32> {
        let id = u32::try_from(self.fragments.len()).ok().filter(|&id| id != NONE)?;
        self.fragments.push(Fragment {
            kind,
            first_child: NONE,
            last_child: NONE,
            next_sibling: NONE,
        });
        let previous = self.fragments[parent as usize].last_child;
        if previous == NONE {
            self.fragments[parent as usize].first_child = id;
        } else {
            self.fragments[previous as usize].next_sibling = id;
        }
        self.fragments[parent as usize].last_child = id;
        Some(id)
    }

    /// Store alternative weights, returning the `OneOf` fragment kind.
    pub fn one_of(&mut self, weights: &[f32]) -> Option<FragmentKind> {
        let weights_start = u32::try_from(self.weights.len()).ok()?;
        let weights_len = u32::try_from(weights.len()).ok()?;
        self.weights.extend_from_slice(weights);
        Some(FragmentKind::OneOf {
            weights_start,
            weights_len,
        })
    }

    pub fn tag(&mut self, template: TagTemplate) -> Option<FragmentKind> {
        let index = u32::try_from(self.tags.len()).ok()?;
        self.tags.push(template);
        Some(FragmentKind::Tag { template: index })
    }

    /// Build the rule's graph and append its encoded arcs and tags, with
    /// arc indices starting at `base`.
    pub fn lay_out(
        &self,
        rule_name: &str,
        base: u64,
        arcs_out: &mut Vec<u8>,
        tags_out: &mut Vec<u8>,
    ) -> Result<LaidOut, CompileError> {
        let mut graph = Graph {
            build: self,
            rule_name,
            base,
            arcs: Vec::with_capacity(self.fragments.len()),
            states: 2,
            spans: Vec::new(),
        };
        graph.build(0, START, END, 1.0)?;
        graph.encode(arcs_out, tags_out)
    }
}

/// Counts produced by [`RuleBuild::lay_out`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) struct LaidOut {
    pub arcs: u32,
    pub tags: u32,
    pub states: u32,
}

#[derive(Copy, Clone, Debug)]
struct PendingArc {
    from: u32,
    to: u32,
    /// Leaf fragment, [`EPSILON`] or [`VOID`].
    source: u32,
    weight: f32,
}

/// Arcs in creation order covered by one tag instance.
#[derive(Copy, Clone, Debug)]
struct TagSpan {
    template: u32,
    first: u32,
    last: u32,
}

struct Graph<'a> {
    build: &'a RuleBuild,
    rule_name: &'a str,
    base: u64,
    arcs: Vec<PendingArc>,
    states: u32,
    spans: Vec<TagSpan>,
}

impl Graph<'_> {
    fn too_many_arcs(&self, index: u64) -> CompileError {
        CompileError::TooManyArcs {
            rule: self.rule_name.to_owned(),
            index,
            max: MAX_ARC_INDEX,
        }
    }

    fn record_error(&self, err: RecordError) -> CompileError {
        crate::record_error(self.rule_name, err)
    }

    fn new_state(&mut self) -> Result<u32, CompileError> {
        // Every new state is followed by an arc out of it, so the arc check
        // in `emit` fires long before this can overflow.
        let state = self.states;
        self.states = state
            .checked_add(1)
            .ok_or_else(|| self.too_many_arcs(self.base + self.arcs.len() as u64))?;
        Ok(state)
    }

    fn emit(&mut self, from: u32, to: u32, source: u32, weight: f32) -> Result<(), CompileError> {
        let index = self.base + self.arcs.len() as u64;
        if index > u64::from(MAX_ARC_INDEX) {
            return Err(self.too_many_arcs(index));
        }
        self.arcs.push(PendingArc {
            from,
            to,
            source,
            weight,
        });
        Ok(())
    }

    fn children(&self, fragment: u32) -> Children<'_> {
        Children {
            fragments: &self.build.fragments,
            next: self.build.fragments[fragment as usize].first_child,
        }
    }

    fn build(&mut self, fragment: u32, from: u32, to: u32, weight: f32) -> Result<(), CompileError> {
        ensure_sufficient_stack(|| self.build_fragment(fragment, from, to, weight))
    }

    #[allow(
        clippy::cast_possible_truncation,
        reason = "arc positions are bounded by the 22-bit index space"
    )]
    fn build_fragment(
        &mut self,
        fragment: u32,
        from: u32,
        to: u32,
        weight: f32,
    ) -> Result<(), CompileError> {
        let node = self.build.fragments[fragment as usize];
        match node.kind {
            FragmentKind::Body | FragmentKind::Sequence => {
                self.build_sequence(fragment, from, to, weight)
            }
            FragmentKind::OneOf {
                weights_start,
                weights_len,
            } => {
                if node.first_child == NONE {
                    return self.emit(from, to, VOID, weight);
                }
                let build = self.build;
                let start = weights_start as usize;
                let weights = &build.weights[start..start + weights_len as usize];
                let alternatives: Vec<u32> = self.children(fragment).collect();
                for (index, alternative) in alternatives.into_iter().enumerate() {
                    let share = weights.get(index).copied().unwrap_or(1.0);
                    self.build(alternative, from, to, weight * share)?;
                }
                Ok(())
            }
            FragmentKind::Item {
                repeat,
                probability,
                weight: item_weight,
            } => {
                if node.first_child == NONE {
                    return self.emit(from, to, EPSILON, weight);
                }
                self.build_item(
                    node.first_child,
                    repeat,
                    probability,
                    from,
                    to,
                    weight * item_weight,
                )
            }
            FragmentKind::Tag { template } => {
                let first = self.arcs.len();
                if node.first_child == NONE {
                    self.emit(from, to, EPSILON, weight)?;
                } else {
                    self.build(node.first_child, from, to, weight)?;
                }
                // At most 2^22 arcs, so local positions fit in u32.
                self.spans.push(TagSpan {
                    template,
                    first: first as u32,
                    last: (self.arcs.len() - 1) as u32,
                });
                Ok(())
            }
            FragmentKind::Leaf(_) => self.emit(from, to, fragment, weight),
        }
    }

    fn build_sequence(
        &mut self,
        fragment: u32,
        from: u32,
        to: u32,
        weight: f32,
    ) -> Result<(), CompileError> {
        let children: Vec<u32> = self.children(fragment).collect();
        let Some((&last, leading)) = children.split_last() else {
            return self.emit(from, to, EPSILON, weight);
        };
        let mut current = from;
        let mut lead = weight;
        for &child in leading {
            let next = self.new_state()?;
            self.build(child, current, next, lead)?;
            lead = 1.0;
            current = next;
        }
        self.build(last, current, to, lead)
    }

    fn build_item(
        &mut self,
        child: u32,
        repeat: Repeat,
        probability: f32,
        from: u32,
        to: u32,
        weight: f32,
    ) -> Result<(), CompileError> {
        if repeat.max == 0 {
            return self.emit(from, to, EPSILON, weight);
        }
        let mut current = from;
        let mut lead = weight;

        for copy in 0..repeat.min {
            let next = if copy + 1 == repeat.min && repeat.max == repeat.min {
                to
            } else {
                self.new_state()?
            };
            self.build(child, current, next, lead)?;
            lead = 1.0;
            current = next;
        }

        if repeat.is_bounded() {
            let optional = repeat.max - repeat.min;
            for copy in 0..optional {
                let next = if copy + 1 == optional {
                    to
                } else {
                    self.new_state()?
                };
                self.build(child, current, next, lead * probability)?;
                self.emit(current, to, EPSILON, lead * (1.0 - probability))?;
                lead = 1.0;
                current = next;
            }
        } else {
            // The loop needs a state of its own; `from` may be shared.
            let looping = if repeat.min == 0 {
                let state = self.new_state()?;
                self.emit(from, state, EPSILON, lead)?;
                state
            } else {
                current
            };
            self.build(child, looping, looping, probability)?;
            self.emit(looping, to, EPSILON, 1.0 - probability)?;
        }
        Ok(())
    }

    fn template(&self, source: u32) -> ArcTemplate {
        match source {
            EPSILON => ArcTemplate {
                kind: ArcKind::Epsilon,
                payload: 0,
                aux: 0,
            },
            VOID => ArcTemplate {
                kind: ArcKind::Special,
                payload: gram_ir::SpecialRule::Void.raw(),
                aux: 0,
            },
            leaf => match self.build.fragments[leaf as usize].kind {
                FragmentKind::Leaf(template) => template,
                _ => ArcTemplate {
                    kind: ArcKind::Epsilon,
                    payload: 0,
                    aux: 0,
                },
            },
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        reason = "arc positions are bounded by the 22-bit index space"
    )]
    fn encode(self, arcs_out: &mut Vec<u8>, tags_out: &mut Vec<u8>) -> Result<LaidOut, CompileError> {
        let states = self.states as usize;

        // starts[s]..starts[s + 1] is the group of arcs leaving state s.
        let mut starts = vec![0u32; states + 1];
        for arc in &self.arcs {
            starts[arc.from as usize + 1] += 1;
        }
        for state in 1..=states {
            starts[state] += starts[state - 1];
        }

        let mut cursor = starts.clone();
        let mut position = vec![0u32; self.arcs.len()];
        let mut order = vec![0u32; self.arcs.len()];
        for (index, arc) in self.arcs.iter().enumerate() {
            let slot = cursor[arc.from as usize];
            cursor[arc.from as usize] += 1;
            position[index] = slot;
            order[slot as usize] = index as u32;
        }

        arcs_out.reserve(self.arcs.len() * ArcRecord::SIZE);
        for (slot, &index) in order.iter().enumerate() {
            let arc = self.arcs[index as usize];
            let to_end = arc.to == END;
            let next = if to_end {
                ArcIndex::ZERO
            } else {
                ArcIndex::new(self.base + u64::from(starts[arc.to as usize]))
                    .map_err(|err| self.record_error(err))?
            };
            let template = self.template(arc.source);
            ArcRecord {
                next,
                last: slot as u32 + 1 == starts[arc.from as usize + 1],
                to_end,
                kind: template.kind,
                payload: template.payload,
                aux: template.aux,
                weight: arc.weight,
            }
            .encode(arcs_out);
        }

        tags_out.reserve(self.spans.len() * SemanticTagRecord::SIZE);
        for span in &self.spans {
            let template = self.build.tags[span.template as usize];
            let start = self.base + u64::from(position[span.first as usize]);
            let end = self.base + u64::from(position[span.last as usize]);
            let mut record = SemanticTagRecord::new();
            record.name = template.name;
            record.property_id = template.property_id;
            record.set_value(template.value);
            record
                .set_start_arc(start)
                .and_then(|()| record.set_end_arc(end))
                .and_then(|()| record.set_anchor_arc(end))
                .map_err(|err| self.record_error(err))?;
            record.encode(tags_out);
        }

        Ok(LaidOut {
            arcs: self.arcs.len() as u32,
            tags: u32::try_from(self.spans.len()).map_err(|_| CompileError::CapacityExceeded {
                what: "semantic tags",
                limit: u64::from(u32::MAX),
                required: self.spans.len() as u64,
            })?,
            states: self.states,
        })
    }
}

struct Children<'a> {
    fragments: &'a [Fragment],
    next: u32,
}

impl Iterator for Children<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.next == NONE {
            return None;
        }
        let current = self.next;
        self.next = self.fragments[current as usize].next_sibling;
        Some(current)
    }
}
