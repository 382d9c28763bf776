//! FlipBook viewer core
//!
//! Turns PDF and EPUB documents into rasterized flip-book pages.
//!
//! # Modules
//!
//! - `document`: Format-agnostic types and adapter traits
//! - `formats`: PDF and EPUB adapters
//! - `pipeline`: Batched, cancellable rasterization runs
//! - `session`: Active run, committed pages, progress and events
//! - `store`: Committed page sequence and chapter index
//! - `view`: Presentation-side view state
//! - `config`: Startup configuration

pub mod config;
pub mod document;
pub mod formats;
pub mod pipeline;
pub mod session;
pub mod store;
pub mod view;

// Low-level MuPDF wrapper used by the format adapters
pub mod mupdf;

#[cfg(test)]
mod testing;

pub use config::ViewerConfig;
pub use document::{
    Chapter, DocumentError, DocumentFormat, DocumentSource, ImageFormat, LoadRequest, PageImage,
    Rotation,
};
pub use pipeline::LoadError;
pub use session::{FailureKind, LoadFailure, RunHandle, SessionSnapshot, ViewerEvent, ViewerSession};
pub use store::PageStore;
pub use view::ViewState;
