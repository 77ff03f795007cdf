//! Error taxonomy shared by every fallible operation in the crate.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The file could not be opened, or ended before the header said it would.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Bad magic number or an out-of-domain record.
    #[error("invalid sample file {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    #[error("{what} index {index} out of range (valid: 0..{len})")]
    Range {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error("invalid config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
