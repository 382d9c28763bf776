//! Run-level errors

use thiserror::Error;

use crate::document::DocumentError;

/// Why a load run produced no pages
#[derive(Debug, Error)]
pub enum LoadError {
    /// Superseded by a newer run or the session closed
    #[error("Load cancelled")]
    Cancelled,

    /// Document failed to open or a page failed to render
    #[error("Failed to load file: {0}")]
    Document(#[from] DocumentError),

    /// The document has no pages
    #[error("Document produced no pages")]
    Empty,
}

impl LoadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadError::Cancelled)
    }
}
