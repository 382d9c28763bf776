//! Unified document abstraction
//!
//! Format-agnostic types and traits shared by the PDF and EPUB adapters.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    RasterPipeline                        │
//! │   (batched, cancellable page rasterization per run)      │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                   Arc<dyn DocumentAdapter>
//!           ┌────────────────┴────────────────┐
//!           ▼                                 ▼
//!   ┌──────────────┐                  ┌──────────────┐
//!   │  PdfAdapter  │                  │ EpubAdapter  │
//!   └──────────────┘                  └──────────────┘
//!           │                                 │
//!           └────────────────┬────────────────┘
//!                            ▼
//!   ┌─────────────────────────────────────────────────────┐
//!   │                  RenderWorkers                       │
//!   │  (bounded blocking pool for MuPDF calls)             │
//!   └─────────────────────────────────────────────────────┘
//! ```

mod error;
mod traits;
mod types;

pub use error::{DocumentError, DocumentResult};
pub use traits::{AdapterFactory, DocumentAdapter};
pub use types::{
    Chapter, DocumentFormat, DocumentSource, ImageFormat, LoadRequest, PageImage, RasterOptions,
    Rotation,
};
