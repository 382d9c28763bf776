//! PDF DocumentAdapter implementation
//!
//! Pages are rendered by MuPDF through [`SafeDocument`]. The outline is read
//! from the object graph by [`PdfObjects`]; files lopdf cannot parse (MuPDF
//! repairs many that lopdf rejects) fall back to MuPDF's own outline.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::objects::PdfObjects;
use super::outline::{resolve_chapters, OutlineEntry, OutlineTarget, PageRef, ResolvedPages};
use crate::document::{
    Chapter, DocumentAdapter, DocumentError, DocumentFormat, DocumentResult, PageImage,
    RasterOptions,
};
use crate::mupdf::{raster, SafeDocument, SharedRenderWorkers};

/// PDF implementation of DocumentAdapter
pub struct PdfAdapter {
    /// Document bytes, shared with the outline reader
    data: Arc<Vec<u8>>,
    /// Thread-safe MuPDF document wrapper
    doc: Arc<SafeDocument>,
    workers: SharedRenderWorkers,
}

impl PdfAdapter {
    /// Parse the document and cache its page count
    pub async fn open(data: Arc<Vec<u8>>, workers: SharedRenderWorkers) -> DocumentResult<Self> {
        let bytes = Arc::clone(&data);
        let doc = workers
            .run(move || SafeDocument::open(bytes, DocumentFormat::Pdf.mime_type()))
            .await?;

        debug!(pages = doc.page_count(), bytes = data.len(), "PDF opened");

        Ok(Self {
            data,
            doc: Arc::new(doc),
            workers,
        })
    }
}

#[async_trait]
impl DocumentAdapter for PdfAdapter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn page_count(&self) -> usize {
        self.doc.page_count()
    }

    async fn chapters(&self) -> DocumentResult<Vec<Chapter>> {
        let data = Arc::clone(&self.data);
        let doc = Arc::clone(&self.doc);

        self.workers
            .run(move || match object_graph_chapters(&data) {
                Ok(chapters) => Ok(chapters),
                Err(e) => {
                    warn!(error = %e, "PDF object graph unreadable, using MuPDF outline");
                    mupdf_chapters(&doc)
                }
            })
            .await
    }

    async fn rasterize(&self, index: usize, options: &RasterOptions) -> DocumentResult<PageImage> {
        if index >= self.doc.page_count() {
            return Err(DocumentError::PageNotFound(index));
        }

        let doc = Arc::clone(&self.doc);
        let options = *options;

        self.workers
            .run(move || {
                let surface =
                    doc.with_doc(|mupdf_doc| raster::render_surface(mupdf_doc, index, &options))?;
                surface.into_page(&options)
            })
            .await
            .map_err(|e| match e {
                missing @ DocumentError::PageNotFound(_) => missing,
                other => DocumentError::RenderError(format!("Page {}: {}", index + 1, other)),
            })
    }
}

fn object_graph_chapters(data: &[u8]) -> DocumentResult<Vec<Chapter>> {
    let objects = PdfObjects::load(data).map_err(|e| DocumentError::OutlineError(e.to_string()))?;
    let entries = objects.outline_entries()?;
    Ok(resolve_chapters(&entries, &objects))
}

/// Top-level outline as resolved by MuPDF
fn mupdf_chapters(doc: &SafeDocument) -> DocumentResult<Vec<Chapter>> {
    let entries = doc.with_doc(|mupdf_doc| {
        Ok(mupdf_doc
            .outlines()?
            .into_iter()
            .map(|outline| {
                let target = match outline.page {
                    Some(page) => OutlineTarget::Explicit(PageRef::Index(page as usize)),
                    None => OutlineTarget::Missing,
                };
                OutlineEntry::new(outline.title, target)
            })
            .collect::<Vec<_>>())
    })?;

    let lookup = ResolvedPages {
        page_count: doc.page_count(),
    };
    Ok(resolve_chapters(&entries, &lookup))
}
