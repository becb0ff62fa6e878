use std::io;
use std::path::PathBuf;

use gram_cfg::DecodeError;
use gram_lower::CompileError;

use crate::load::LoadError;

/// Anything that stops a driver command.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: LoadError,
    },

    #[error("compilation failed: {0}")]
    Compile(#[from] CompileError),

    #[error("{}: not a compiled grammar: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
}

impl DriverError {
    pub(crate) fn io(path: &std::path::Path, source: io::Error) -> Self {
        DriverError::Io {
            path: path.to_owned(),
            source,
        }
    }
}
