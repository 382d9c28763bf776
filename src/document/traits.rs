//! Document traits
//!
//! Format-agnostic interfaces between the rasterization pipeline and the
//! format adapters.

use std::sync::Arc;

use async_trait::async_trait;

use super::error::DocumentResult;
use super::types::{Chapter, DocumentFormat, LoadRequest, PageImage, RasterOptions};

/// An opened document that can be turned into flip-book pages
///
/// One adapter instance is owned by exactly one load run and dropped when
/// the run ends.
#[async_trait]
pub trait DocumentAdapter: Send + Sync {
    /// Document format
    fn format(&self) -> DocumentFormat;

    /// Number of flip-book pages (PDF pages, EPUB spine items)
    fn page_count(&self) -> usize;

    /// Extract chapter markers from the outline/table of contents
    async fn chapters(&self) -> DocumentResult<Vec<Chapter>>;

    /// Render one page (0-based index) to an encoded image
    async fn rasterize(&self, index: usize, options: &RasterOptions) -> DocumentResult<PageImage>;

    /// Release any rendering context held by the adapter
    async fn close(&self) {}
}

/// Opens adapters for load requests
#[async_trait]
pub trait AdapterFactory: Send + Sync {
    async fn open(&self, request: &LoadRequest) -> DocumentResult<Arc<dyn DocumentAdapter>>;
}
