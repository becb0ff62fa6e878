//! Binary CFG backend.
//!
//! Rules are appended to the rule table as they are declared, so a rule
//! reference can be encoded before its target's body exists. A rule's arcs
//! are produced when the rule is closed; see [`crate::states`].

use gram_ir::{GrammarFeatures, Scope, SpecialRule, SubsetMode};
use gram_lower::{
    Backend, CompileError, CompileOptions, ItemSpec, NodeRef, RuleDecl, TagSpec, TagValueRef,
    TokenSpec, UnitInfo,
};
use rustc_hash::FxHashMap;

use crate::layout::{align4, GrammarOptions, Header, Section, FORMAT_VERSION, HEADER_SIZE};
use crate::record::{
    ArcIndex, ArcKind, ArcRecord, RuleAttrs, RuleRecord, ScriptRecord, SemanticTagRecord,
    TagPayload, WordRecord,
};
use crate::states::{ArcTemplate, FragmentKind, RuleBuild, TagTemplate};
use crate::symbols::SymbolTable;
use crate::{CompileStats, CompiledGrammar};

/// Largest repeat bound expanded into explicit copies.
pub const MAX_REPEAT_BOUND: u32 = 256;

/// Rule handle: a rule table index or a special rule.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum CfgRule {
    Table(u32),
    Special(SpecialRule),
}

/// Fragment index within the rule currently being lowered.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct CfgNode(u32);

/// [`Backend`] producing a [`CompiledGrammar`].
#[derive(Debug)]
pub struct CfgBackend {
    options: CompileOptions,
    symbols: SymbolTable,
    rules: Vec<RuleRecord>,
    words: Vec<WordRecord>,
    word_index: FxHashMap<WordRecord, u32>,
    arcs: Vec<u8>,
    arc_count: usize,
    tags: Vec<u8>,
    tag_count: usize,
    scripts: Vec<ScriptRecord>,
    current: Option<RuleBuild>,
}

impl CfgBackend {
    pub fn new(options: CompileOptions) -> Self {
        CfgBackend {
            options,
            symbols: SymbolTable::new(),
            rules: Vec::new(),
            words: Vec::new(),
            word_index: FxHashMap::default(),
            arcs: Vec::new(),
            arc_count: 0,
            tags: Vec::new(),
            tag_count: 0,
            scripts: Vec::new(),
            current: None,
        }
    }

    fn rule_name(&self, index: u32) -> String {
        self.rules
            .get(index as usize)
            .and_then(|rule| self.symbols.text_at(rule.name as usize))
            .unwrap_or_default()
            .to_owned()
    }

    fn current_rule_name(&self) -> String {
        match &self.current {
            Some(build) => self.rule_name(build.rule),
            None => String::new(),
        }
    }

    fn reject(&self, node: NodeRef, field: &'static str, reason: impl Into<String>) -> CompileError {
        CompileError::BackendRejected {
            rule: self.current_rule_name(),
            node,
            field,
            reason: reason.into(),
        }
    }

    fn symbol(&mut self, text: &str) -> Result<u32, CompileError> {
        let offset = self.symbols.intern(text);
        u32::try_from(offset).map_err(|_| CompileError::CapacityExceeded {
            what: "symbol bytes",
            limit: u64::from(u32::MAX),
            required: offset as u64,
        })
    }

    /// Intern text that came from a grammar node.
    fn text(&mut self, node: NodeRef, field: &'static str, text: &str) -> Result<u32, CompileError> {
        if text.contains('\0') {
            return Err(self.reject(node, field, "text contains a NUL byte"));
        }
        self.symbol(text)
    }

    fn optional_text(
        &mut self,
        node: NodeRef,
        field: &'static str,
        text: Option<&str>,
    ) -> Result<u32, CompileError> {
        match text {
            Some(text) => self.text(node, field, text),
            None => Ok(0),
        }
    }

    fn weight(&self, node: NodeRef, field: &'static str, weight: f32) -> Result<(), CompileError> {
        if weight.is_finite() && weight >= 0.0 {
            Ok(())
        } else {
            Err(self.reject(node, field, format!("{weight} is not a finite non-negative weight")))
        }
    }

    fn push(
        &mut self,
        parent: CfgNode,
        node: NodeRef,
        kind: Option<FragmentKind>,
    ) -> Result<CfgNode, CompileError> {
        let Some(build) = self.current.as_mut() else {
            return Err(self.reject(node, "parent", "no rule body is open"));
        };
        kind.and_then(|kind| build.push(parent.0, kind))
            .map(CfgNode)
            .ok_or(CompileError::CapacityExceeded {
                what: "nodes per rule",
                limit: u64::from(u32::MAX - 1),
                required: u64::from(u32::MAX),
            })
    }

    fn leaf(
        &mut self,
        parent: CfgNode,
        node: NodeRef,
        kind: ArcKind,
        payload: u32,
        aux: u32,
    ) -> Result<CfgNode, CompileError> {
        self.push(
            parent,
            node,
            Some(FragmentKind::Leaf(ArcTemplate { kind, payload, aux })),
        )
    }

    fn word(&mut self, node: NodeRef, token: &TokenSpec<'_>) -> Result<u32, CompileError> {
        if token.text.is_empty() {
            return Err(self.reject(node, "text", "token text is empty"));
        }
        let record = WordRecord {
            text: self.text(node, "text", token.text)?,
            pronunciation: self.optional_text(node, "pronunciation", token.pronunciation)?,
            display: self.optional_text(node, "display", token.display)?,
        };
        if let Some(&index) = self.word_index.get(&record) {
            return Ok(index);
        }
        let index = u32::try_from(self.words.len()).map_err(|_| CompileError::CapacityExceeded {
            what: "words",
            limit: u64::from(u32::MAX),
            required: self.words.len() as u64 + 1,
        })?;
        self.words.push(record);
        self.word_index.insert(record, index);
        Ok(index)
    }

    fn stats(&self) -> CompileStats {
        CompileStats {
            rules: self.rules.len(),
            arcs: self.arc_count,
            tags: self.tag_count,
            words: self.words.len(),
            scripts: self.scripts.len(),
            symbol_bytes: self.symbols.size(),
        }
    }
}

fn count(what: &'static str, len: usize) -> Result<u32, CompileError> {
    u32::try_from(len).map_err(|_| CompileError::CapacityExceeded {
        what,
        limit: u64::from(u32::MAX),
        required: len as u64,
    })
}

impl Backend for CfgBackend {
    type Rule = CfgRule;
    type Node = CfgNode;
    type Output = CompiledGrammar;

    fn create_rule(&mut self, decl: &RuleDecl<'_>) -> Result<CfgRule, CompileError> {
        let index = count("rules", self.rules.len())?;
        let id = self
            .options
            .first_rule_id
            .checked_add(decl.id.raw())
            .ok_or(CompileError::CapacityExceeded {
                what: "rule ids",
                limit: u64::from(u32::MAX),
                required: u64::from(self.options.first_rule_id) + u64::from(decl.id.raw()),
            })?;
        if decl.name.contains('\0') {
            return Err(CompileError::BackendRejected {
                rule: decl.name.to_owned(),
                node: NodeRef::rule(),
                field: "name",
                reason: "text contains a NUL byte".to_owned(),
            });
        }
        let name = self.symbol(decl.name)?;

        let mut attrs = RuleAttrs::empty();
        attrs.set(RuleAttrs::PUBLIC, decl.scope == Scope::Public);
        attrs.set(RuleAttrs::EXPORT, decl.exported);
        attrs.set(RuleAttrs::IMPORT, decl.imported);
        attrs.set(RuleAttrs::ROOT, decl.is_root);
        attrs.set(RuleAttrs::HAS_HOOKS, !decl.hooks.is_empty());

        for &(hook, method) in &decl.hooks {
            if method.contains('\0') {
                return Err(CompileError::BackendRejected {
                    rule: decl.name.to_owned(),
                    node: NodeRef::rule(),
                    field: "hook",
                    reason: "text contains a NUL byte".to_owned(),
                });
            }
            let method = self.symbol(method)?;
            self.scripts.push(ScriptRecord {
                rule: index,
                hook,
                method,
            });
        }

        self.rules.push(RuleRecord {
            name,
            attrs,
            dynamic: decl.dynamic,
            first_arc: ArcIndex::ZERO,
            id,
        });
        Ok(CfgRule::Table(index))
    }

    fn special_rule(&mut self, special: SpecialRule) -> CfgRule {
        CfgRule::Special(special)
    }

    fn begin_rule(&mut self, rule: CfgRule, reachable: u32) -> Result<CfgNode, CompileError> {
        let CfgRule::Table(index) = rule else {
            return Err(CompileError::BackendRejected {
                rule: format!("{rule:?}"),
                node: NodeRef::rule(),
                field: "body",
                reason: "special rules have no body".to_owned(),
            });
        };
        self.current = Some(RuleBuild::new(index, reachable));
        Ok(CfgNode(0))
    }

    fn create_sequence(&mut self, parent: CfgNode, node: NodeRef) -> Result<CfgNode, CompileError> {
        self.push(parent, node, Some(FragmentKind::Sequence))
    }

    fn create_one_of(
        &mut self,
        parent: CfgNode,
        node: NodeRef,
        weights: &[f32],
    ) -> Result<CfgNode, CompileError> {
        for &weight in weights {
            self.weight(node, "weights", weight)?;
        }
        let kind = self.current.as_mut().and_then(|build| build.one_of(weights));
        self.push(parent, node, kind)
    }

    fn create_item(
        &mut self,
        parent: CfgNode,
        node: NodeRef,
        item: &ItemSpec,
    ) -> Result<CfgNode, CompileError> {
        let repeat = item.repeat;
        if repeat.min > MAX_REPEAT_BOUND || (repeat.is_bounded() && repeat.max > MAX_REPEAT_BOUND) {
            return Err(self.reject(
                node,
                "repeat",
                format!("{repeat} exceeds the expansion limit of {MAX_REPEAT_BOUND}"),
            ));
        }
        let probability = item.repeat_probability;
        if !(0.0..=1.0).contains(&probability) {
            return Err(self.reject(
                node,
                "repeat_probability",
                format!("{probability} is not a probability"),
            ));
        }
        self.weight(node, "weight", item.weight)?;
        self.push(
            parent,
            node,
            Some(FragmentKind::Item {
                repeat,
                probability,
                weight: item.weight,
            }),
        )
    }

    fn create_property_tag(
        &mut self,
        parent: CfgNode,
        node: NodeRef,
        tag: &TagSpec<'_>,
    ) -> Result<CfgNode, CompileError> {
        let value = match tag.value {
            TagValueRef::Empty => TagPayload::Empty,
            TagValueRef::String(text) => TagPayload::String(self.text(node, "value", text)?),
            TagValueRef::Int32(value) => TagPayload::Int32(value),
            TagValueRef::Bool(value) => TagPayload::Bool(value),
            TagValueRef::Float64(value) if value.is_finite() => TagPayload::Float64(value),
            TagValueRef::Float64(value) => {
                return Err(self.reject(node, "value", format!("{value} is not finite")));
            }
        };
        let template = TagTemplate {
            name: self.text(node, "name", tag.name)?,
            property_id: tag.id,
            value,
        };
        let kind = self.current.as_mut().and_then(|build| build.tag(template));
        self.push(parent, node, kind)
    }

    fn create_rule_ref(
        &mut self,
        parent: CfgNode,
        node: NodeRef,
        target: CfgRule,
        semantic_key: Option<&str>,
    ) -> Result<CfgNode, CompileError> {
        match target {
            CfgRule::Table(index) => {
                let key = self.optional_text(node, "semantic_key", semantic_key)?;
                self.leaf(parent, node, ArcKind::RuleRef, index, key)
            }
            CfgRule::Special(special) => {
                self.leaf(parent, node, ArcKind::Special, special.raw(), 0)
            }
        }
    }

    fn create_subset(
        &mut self,
        parent: CfgNode,
        node: NodeRef,
        text: &str,
        mode: SubsetMode,
    ) -> Result<CfgNode, CompileError> {
        let text = self.text(node, "text", text)?;
        self.leaf(parent, node, ArcKind::Subset, text, mode.raw())
    }

    fn create_token(
        &mut self,
        parent: CfgNode,
        node: NodeRef,
        token: &TokenSpec<'_>,
    ) -> Result<CfgNode, CompileError> {
        let word = self.word(node, token)?;
        self.leaf(parent, node, ArcKind::Word, word, 0)
    }

    fn create_dictation(
        &mut self,
        parent: CfgNode,
        node: NodeRef,
        category: Option<&str>,
    ) -> Result<CfgNode, CompileError> {
        let category = self.optional_text(node, "category", category)?;
        self.leaf(parent, node, ArcKind::Dictation, category, 0)
    }

    fn finish_rule(&mut self, rule: CfgRule, features: GrammarFeatures) -> Result<(), CompileError> {
        let CfgRule::Table(index) = rule else {
            return Ok(());
        };
        let build = self.current.take().filter(|build| build.rule == index);

        let mut attrs = self.rules[index as usize].attrs;
        attrs.set(RuleAttrs::EXTENDED, features.uses_extended());
        let mut first_arc = ArcIndex::ZERO;

        if let Some(build) = build {
            let name = self.rule_name(index);
            let base = self.arc_count as u64;
            let laid = build.lay_out(&name, base, &mut self.arcs, &mut self.tags)?;
            first_arc =
                ArcIndex::new(base).map_err(|err| crate::record_error(&name, err))?;
            self.arc_count += laid.arcs as usize;
            self.tag_count += laid.tags as usize;
            attrs |= RuleAttrs::HAS_BODY;
            tracing::debug!(
                rule = %name,
                arcs = laid.arcs,
                states = laid.states,
                tags = laid.tags,
                "rule laid out"
            );
        }

        let record = &mut self.rules[index as usize];
        record.attrs = attrs;
        record.first_arc = first_arc;
        Ok(())
    }

    fn finish(self, root: Option<CfgRule>, unit: &UnitInfo) -> Result<CompiledGrammar, CompileError> {
        let root = match root {
            Some(CfgRule::Table(index)) => Some(index),
            _ => None,
        };

        let mut options = GrammarOptions::empty();
        options.set(
            GrammarOptions::HAS_EXTENDED_FEATURES,
            unit.features.uses_extended(),
        );
        options.set(GrammarOptions::HAS_SCRIPT_HOOKS, !self.scripts.is_empty());
        options.set(
            GrammarOptions::HAS_DYNAMIC_RULES,
            unit.features.contains(GrammarFeatures::DYNAMIC_RULES),
        );
        options.set(GrammarOptions::HAS_ROOT, root.is_some());

        let symbol_len = self.symbols.size();
        let sizes = [
            self.rules.len() * RuleRecord::SIZE,
            align4(symbol_len),
            self.words.len() * WordRecord::SIZE,
            self.arcs.len(),
            self.tags.len(),
            self.scripts.len() * ScriptRecord::SIZE,
        ];
        let counts = [
            count("rules", self.rules.len())?,
            count("symbol bytes", symbol_len)?,
            count("words", self.words.len())?,
            count("arcs", self.arcs.len() / ArcRecord::SIZE)?,
            count("semantic tags", self.tags.len() / SemanticTagRecord::SIZE)?,
            count("scripts", self.scripts.len())?,
        ];

        let mut sections = [Section::default(); 6];
        let mut offset = HEADER_SIZE as u64;
        for (section, (&size, &records)) in sections.iter_mut().zip(sizes.iter().zip(&counts)) {
            *section = Section {
                offset: u32::try_from(offset).unwrap_or(u32::MAX),
                count: records,
            };
            offset += size as u64;
        }
        let total_size = u32::try_from(offset).map_err(|_| CompileError::CapacityExceeded {
            what: "artifact bytes",
            limit: u64::from(u32::MAX),
            required: offset,
        })?;

        let header = Header {
            version: FORMAT_VERSION,
            total_size,
            root,
            culture: unit.culture,
            mode: unit.mode,
            tag_format: unit.tag_format,
            options,
            rule_id_base: self.options.first_rule_id,
            rules: sections[0],
            symbols: sections[1],
            words: sections[2],
            arcs: sections[3],
            tags: sections[4],
            scripts: sections[5],
        };

        let mut bytes = Vec::with_capacity(total_size as usize);
        header.encode(&mut bytes);
        for rule in &self.rules {
            rule.encode(&mut bytes);
        }
        bytes.extend_from_slice(self.symbols.as_bytes());
        bytes.resize(bytes.len() + align4(symbol_len) - symbol_len, 0);
        for word in &self.words {
            word.encode(&mut bytes);
        }
        bytes.extend_from_slice(&self.arcs);
        bytes.extend_from_slice(&self.tags);
        for script in &self.scripts {
            script.encode(&mut bytes);
        }

        let stats = self.stats();
        tracing::debug!(
            bytes = bytes.len(),
            rules = stats.rules,
            arcs = stats.arcs,
            tags = stats.tags,
            words = stats.words,
            "grammar encoded"
        );
        Ok(CompiledGrammar { bytes, stats })
    }
}
