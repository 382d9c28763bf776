//! Format-specific document adapters
//!
//! Each format module implements [`DocumentAdapter`] on top of the
//! lower-level MuPDF bindings:
//!
//! - [`pdf`]: MuPDF rendering, lopdf outline resolution
//! - [`epub`]: zip/roxmltree container parsing, spine items laid out and
//!   captured one page each
//!
//! [`MupdfAdapterFactory`] picks the adapter from the declared file name.

pub mod epub;
pub mod pdf;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::EpubConfig;
use crate::document::{
    AdapterFactory, DocumentAdapter, DocumentFormat, DocumentResult, LoadRequest,
};
use crate::mupdf::SharedRenderWorkers;

pub use epub::EpubAdapter;
pub use pdf::PdfAdapter;

/// Opens PDF and EPUB adapters backed by MuPDF
pub struct MupdfAdapterFactory {
    epub: EpubConfig,
    workers: SharedRenderWorkers,
}

impl MupdfAdapterFactory {
    pub fn new(epub: EpubConfig, workers: SharedRenderWorkers) -> Self {
        Self { epub, workers }
    }
}

#[async_trait]
impl AdapterFactory for MupdfAdapterFactory {
    async fn open(&self, request: &LoadRequest) -> DocumentResult<Arc<dyn DocumentAdapter>> {
        let format = request.format();
        let source = request.source.clone();
        let data = self.workers.run(move || source.read_bytes()).await?;

        info!(
            name = %request.name,
            format = format.label(),
            bytes = data.len(),
            "Opening document"
        );

        let adapter: Arc<dyn DocumentAdapter> = match format {
            DocumentFormat::Pdf => Arc::new(PdfAdapter::open(data, Arc::clone(&self.workers)).await?),
            DocumentFormat::Epub => Arc::new(
                EpubAdapter::open(data, &self.epub, Arc::clone(&self.workers)).await?,
            ),
        };

        Ok(adapter)
    }
}
