//! Rasterization pipeline
//!
//! Turns an opened [`DocumentAdapter`](crate::document::DocumentAdapter)
//! into an ordered page sequence plus chapters, in small concurrent batches,
//! checking a [`RunToken`] before and after every batch.

mod cancel;
mod error;
mod progress;
mod run;

pub use cancel::RunToken;
pub use error::LoadError;
pub use progress::{percent, RunObserver};
pub use run::{RasterPipeline, RunOutput};
