// Assembler error kinds
// Format and I/O failures abort the file operation they occur in; the
// driver decides what a failure means for the rest of the batch. Short
// reads and short writes surface through the Io variant as
// UnexpectedEof/WriteZero.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("cannot open {path}: {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Format(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AssembleError {
    pub fn file_open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileOpen {
            path: path.into(),
            source,
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }
}

pub type Result<T> = std::result::Result<T, AssembleError>;
