//! Option parsing for `gramc compile` and `gramc check`.

use std::path::{Path, PathBuf};

use gram_lower::CompileOptions;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ArgsError {
    #[error("missing input file")]
    MissingInput,
    #[error("`{0}` needs a value")]
    MissingValue(String),
    #[error("invalid value `{value}` for `{flag}`")]
    InvalidValue { flag: String, value: String },
    #[error("unknown option `{0}`")]
    UnknownOption(String),
    #[error("unexpected argument `{0}`")]
    UnexpectedArgument(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompileArgs {
    pub input: PathBuf,
    /// Defaults to the input path with a `.cfg` extension.
    pub output: Option<PathBuf>,
    pub options: CompileOptions,
}

impl CompileArgs {
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_output(&self.input))
    }
}

pub fn default_output(input: &Path) -> PathBuf {
    input.with_extension("cfg")
}

/// Parse the arguments following the subcommand name.
///
/// Options take their value either inline (`--max-nodes=100`) or as the
/// next argument (`--max-nodes 100`, `-o out.cfg`).
pub fn parse_compile_args(args: &[String]) -> Result<CompileArgs, ArgsError> {
    let mut parsed = CompileArgs::default();
    let mut input = None;
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with('-') => (flag, Some(value.to_owned())),
            _ => (arg.as_str(), None),
        };
        let mut value = || -> Result<String, ArgsError> {
            if let Some(value) = inline.clone() {
                return Ok(value);
            }
            i += 1;
            args.get(i)
                .cloned()
                .ok_or_else(|| ArgsError::MissingValue(flag.to_owned()))
        };
        match flag {
            "-o" | "--output" => parsed.output = Some(PathBuf::from(value()?)),
            "--max-nodes" => {
                let max = number(flag, &value()?)?;
                parsed.options = parsed.options.with_max_nodes(max);
            }
            "--first-rule-id" => {
                let text = value()?;
                let first = u32::try_from(number(flag, &text)?).map_err(|_| {
                    ArgsError::InvalidValue {
                        flag: flag.to_owned(),
                        value: text.clone(),
                    }
                })?;
                parsed.options = parsed.options.with_first_rule_id(first);
            }
            _ if flag.starts_with('-') && flag.len() > 1 => {
                return Err(ArgsError::UnknownOption(flag.to_owned()));
            }
            _ if input.is_none() => input = Some(PathBuf::from(arg)),
            _ => return Err(ArgsError::UnexpectedArgument(arg.clone())),
        }
        i += 1;
    }
    parsed.input = input.ok_or(ArgsError::MissingInput)?;
    Ok(parsed)
}

fn number(flag: &str, text: &str) -> Result<u64, ArgsError> {
    text.parse().map_err(|_| ArgsError::InvalidValue {
        flag: flag.to_owned(),
        value: text.to_owned(),
    })
}
