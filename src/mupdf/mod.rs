//! Low-level MuPDF wrapper
//!
//! # Thread Safety
//!
//! MuPDF's `fz_context` is **NOT thread-safe**. This module addresses this via:
//!
//! 1. **SafeDocument**: opens a fresh document per operation on the worker thread
//! 2. **RenderWorkers**: bounds the blocking MuPDF calls in flight
//! 3. **RasterSurface**: owns render buffers so they are freed on encode
//!
//! # Usage
//!
//! ```rust,ignore
//! let workers = Arc::new(RenderWorkers::new(3));
//! let doc = Arc::new(SafeDocument::open(bytes, "application/pdf")?);
//!
//! let page = workers
//!     .run(move || {
//!         let surface = doc.with_doc(|d| raster::render_surface(d, 0, &options))?;
//!         surface.into_page(&options)
//!     })
//!     .await?;
//! ```

pub mod raster;
mod safe;
mod workers;

pub use raster::{page_matrix, render_surface, RasterSurface};
pub use safe::SafeDocument;
pub use workers::{RenderWorkers, SharedRenderWorkers, WorkerStats};
