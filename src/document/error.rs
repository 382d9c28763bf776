//! Document error types
//!
//! Adapter-level errors shared by the PDF and EPUB implementations.

use thiserror::Error;

/// Unified document error type
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Page index outside the document
    #[error("Page not found: index {0}")]
    PageNotFound(usize),

    /// Failed to open or parse the document container
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Outline/table of contents could not be read
    #[error("Outline error: {0}")]
    OutlineError(String),

    /// Failed to render a page
    #[error("Render error: {0}")]
    RenderError(String),

    /// Error raised inside MuPDF
    #[error("MuPDF error: {0}")]
    MupdfError(String),

    /// Resource missing from an EPUB archive
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Image encoding error
    #[error("Image error: {0}")]
    ImageError(String),

    /// Blocking render task failed to join
    #[error("Render worker error: {0}")]
    WorkerError(String),
}

pub type DocumentResult<T> = std::result::Result<T, DocumentError>;

impl From<mupdf::Error> for DocumentError {
    fn from(err: mupdf::Error) -> Self {
        DocumentError::MupdfError(err.to_string())
    }
}

impl From<lopdf::Error> for DocumentError {
    fn from(err: lopdf::Error) -> Self {
        DocumentError::ParseError(err.to_string())
    }
}

impl From<zip::result::ZipError> for DocumentError {
    fn from(err: zip::result::ZipError) -> Self {
        DocumentError::ParseError(format!("EPUB archive: {}", err))
    }
}

impl From<image::ImageError> for DocumentError {
    fn from(err: image::ImageError) -> Self {
        DocumentError::ImageError(err.to_string())
    }
}

impl From<std::io::Error> for DocumentError {
    fn from(err: std::io::Error) -> Self {
        DocumentError::ParseError(err.to_string())
    }
}
