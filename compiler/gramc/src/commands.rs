//! Driver commands: compile, check, dump.

use std::fmt;
use std::fs;
use std::path::Path;

use gram_cfg::record::{SemanticTagRecord, TagPayload};
use gram_cfg::{ArcKind, ArcRecord, CfgGrammar, CompileStats, RuleAttrs};
use gram_ir::{Grammar, Scope, SpecialRule};
use gram_lower::{CompileOptions, GrammarDocument};

use crate::error::DriverError;
use crate::load::load_grammar;

/// Read and build the grammar described by a JSON file.
pub fn read_grammar(path: &Path) -> Result<Grammar, DriverError> {
    let json = fs::read_to_string(path).map_err(|err| DriverError::io(path, err))?;
    load_grammar(&json).map_err(|source| DriverError::Load {
        path: path.to_owned(),
        source,
    })
}

/// Compile `input` to a binary grammar at `output`.
pub fn compile_file(
    input: &Path,
    output: &Path,
    options: CompileOptions,
) -> Result<CompileStats, DriverError> {
    let grammar = read_grammar(input)?;
    let compiled = gram_cfg::compile(&grammar, options)?;
    fs::write(output, compiled.as_bytes()).map_err(|err| DriverError::io(output, err))?;
    tracing::debug!(
        input = %input.display(),
        output = %output.display(),
        bytes = compiled.bytes.len(),
        "wrote compiled grammar"
    );
    Ok(compiled.stats)
}

/// What `check` found: the lowered rules and the binary table sizes.
#[derive(Debug)]
pub struct CheckReport {
    pub document: GrammarDocument,
    pub stats: CompileStats,
}

/// Lower `input` without writing anything.
///
/// Runs both the object lowering (for the rule listing) and the binary
/// backend (for its representation limits).
pub fn check_file(input: &Path, options: CompileOptions) -> Result<CheckReport, DriverError> {
    let grammar = read_grammar(input)?;
    let document = gram_lower::lower_to_document(&grammar, options)?;
    let stats = gram_cfg::compile(&grammar, options)?.stats;
    Ok(CheckReport { document, stats })
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in &self.document.rules {
            let scope = match rule.scope {
                Scope::Public => "public",
                Scope::Private => "private",
            };
            write!(f, "{scope} {}", rule.name)?;
            if rule.is_root {
                f.write_str(" (root)")?;
            }
            if !rule.features.is_empty() {
                write!(f, " {:?}", rule.features)?;
            }
            writeln!(f)?;
        }
        let stats = &self.stats;
        write!(
            f,
            "{} rules, {} arcs, {} words, {} tags, {} scripts, {} symbol bytes",
            stats.rules, stats.arcs, stats.words, stats.tags, stats.scripts, stats.symbol_bytes
        )
    }
}

/// Decode a compiled grammar and render it as text.
pub fn dump_file(path: &Path) -> Result<String, DriverError> {
    let bytes = fs::read(path).map_err(|err| DriverError::io(path, err))?;
    let grammar = CfgGrammar::parse(&bytes).map_err(|source| DriverError::Decode {
        path: path.to_owned(),
        source,
    })?;
    Ok(Dump(&grammar).to_string())
}

/// Human-readable listing of a decoded grammar.
pub struct Dump<'a>(pub &'a CfgGrammar);

impl Dump<'_> {
    fn symbol(&self, offset: u32) -> &str {
        self.0.symbol(offset).unwrap_or("<invalid>")
    }

    fn arc(&self, f: &mut fmt::Formatter<'_>, index: usize, arc: &ArcRecord) -> fmt::Result {
        let grammar = self.0;
        write!(f, "    {index:>6}: ")?;
        match arc.kind {
            ArcKind::Epsilon => f.write_str("<eps>")?,
            ArcKind::Word => match grammar.words().get(arc.payload as usize) {
                Some(word) => write!(f, "{:?}", self.symbol(word.text))?,
                None => f.write_str("<word?>")?,
            },
            ArcKind::RuleRef => {
                match grammar.rules().get(arc.payload as usize) {
                    Some(rule) => write!(f, "<{}>", grammar.rule_name(rule))?,
                    None => f.write_str("<rule?>")?,
                }
                if arc.aux != 0 {
                    write!(f, " as {}", self.symbol(arc.aux))?;
                }
            }
            ArcKind::Special => match SpecialRule::from_raw(arc.payload) {
                Some(special) => write!(f, "<{special:?}>")?,
                None => f.write_str("<special?>")?,
            },
            ArcKind::Subset => match CfgGrammar::subset_mode(arc) {
                Some(mode) => write!(f, "subset {:?} {mode:?}", self.symbol(arc.payload))?,
                None => write!(f, "subset {:?}", self.symbol(arc.payload))?,
            },
            ArcKind::Dictation => {
                f.write_str("<dictation>")?;
                if arc.payload != 0 {
                    write!(f, " {}", self.symbol(arc.payload))?;
                }
            }
        }
        if arc.to_end {
            f.write_str(" -> end")?;
        } else {
            write!(f, " -> {}", arc.next.raw())?;
        }
        if (arc.weight - 1.0).abs() > f32::EPSILON {
            write!(f, " w={}", arc.weight)?;
        }
        if arc.last {
            f.write_str(" ;")?;
        }
        writeln!(f)
    }

    fn tag(&self, f: &mut fmt::Formatter<'_>, tag: &SemanticTagRecord) -> fmt::Result {
        write!(
            f,
            "  {}#{} [{}..{}] = ",
            self.symbol(tag.name),
            tag.property_id,
            tag.start_arc().raw(),
            tag.end_arc().raw()
        )?;
        match tag.value() {
            Ok(TagPayload::Empty) => f.write_str("()")?,
            Ok(TagPayload::String(offset)) => write!(f, "{:?}", self.symbol(offset))?,
            Ok(TagPayload::Int32(value)) => write!(f, "{value}")?,
            Ok(TagPayload::Bool(value)) => write!(f, "{value}")?,
            Ok(TagPayload::Float64(value)) => write!(f, "{value}")?,
            Err(err) => write!(f, "<{err}>")?,
        }
        writeln!(f)
    }
}

impl fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let grammar = self.0;
        let header = grammar.header();
        writeln!(
            f,
            "version {} culture {:#06x} {:?} {:?} {:?}",
            header.version, header.culture.0, header.mode, header.tag_format, header.options
        )?;
        if let Some(root) = grammar.root() {
            writeln!(f, "root {}", grammar.rule_name(root))?;
        }

        for (index, rule) in grammar.rules().iter().enumerate() {
            let mut flags = Vec::new();
            for (name, flag) in [
                ("public", RuleAttrs::PUBLIC),
                ("export", RuleAttrs::EXPORT),
                ("import", RuleAttrs::IMPORT),
                ("root", RuleAttrs::ROOT),
                ("extended", RuleAttrs::EXTENDED),
            ] {
                if rule.attrs.contains(flag) {
                    flags.push(name);
                }
            }
            writeln!(
                f,
                "rule {} {} [{}] {:?}",
                rule.id,
                grammar.rule_name(rule),
                flags.join(" "),
                rule.dynamic
            )?;
            let Ok(index) = u32::try_from(index) else {
                break;
            };
            let range = grammar.rule_arc_range(index);
            let start = range.start;
            let arcs = grammar.arcs().get(range).unwrap_or_default();
            for (offset, arc) in arcs.iter().enumerate() {
                self.arc(f, start + offset, arc)?;
            }
        }

        if !grammar.tags().is_empty() {
            writeln!(f, "tags")?;
            for tag in grammar.tags() {
                self.tag(f, tag)?;
            }
        }
        if !grammar.scripts().is_empty() {
            writeln!(f, "scripts")?;
            for script in grammar.scripts() {
                let rule = grammar
                    .rules()
                    .get(script.rule as usize)
                    .map_or("<rule?>", |rule| grammar.rule_name(rule));
                writeln!(f, "  {rule} {} -> {}", script.hook, self.symbol(script.method))?;
            }
        }
        Ok(())
    }
}
