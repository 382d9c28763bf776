//! Fake adapters for driving the pipeline and session in tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lopdf::{dictionary, Object};
use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};

use crate::document::{
    AdapterFactory, Chapter, DocumentAdapter, DocumentError, DocumentFormat, DocumentResult,
    ImageFormat, LoadRequest, PageImage, RasterOptions,
};

/// In-memory adapter whose pages encode `tag:index:rotation`
pub struct FakeAdapter {
    tag: &'static str,
    pages: usize,
    format: DocumentFormat,
    chapters: Option<Vec<Chapter>>,
    failing_page: Option<usize>,
    gate: Option<Arc<Semaphore>>,
    /// Notified when the first page starts rendering
    pub started: Arc<Notify>,
    pub closed: Arc<AtomicBool>,
    /// Pages whose rendering began
    pub rendered: Arc<AtomicUsize>,
}

impl FakeAdapter {
    pub fn new(tag: &'static str, pages: usize) -> Self {
        Self {
            tag,
            pages,
            format: DocumentFormat::Pdf,
            chapters: Some(Vec::new()),
            failing_page: None,
            gate: None,
            started: Arc::new(Notify::new()),
            closed: Arc::new(AtomicBool::new(false)),
            rendered: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_chapters(mut self, chapters: Vec<Chapter>) -> Self {
        self.chapters = Some(chapters);
        self
    }

    pub fn with_broken_outline(mut self) -> Self {
        self.chapters = None;
        self
    }

    pub fn with_failing_page(mut self, index: usize) -> Self {
        self.failing_page = Some(index);
        self
    }

    /// Block every page until [`FakeAdapter::release`] hands out permits
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub fn release(&self, pages: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(pages);
        }
    }

    /// Decode the label a fake page was rendered with
    pub fn label(page: &PageImage) -> String {
        String::from_utf8_lossy(&page.data).into_owned()
    }
}

#[async_trait]
impl DocumentAdapter for FakeAdapter {
    fn format(&self) -> DocumentFormat {
        self.format
    }

    fn page_count(&self) -> usize {
        self.pages
    }

    async fn chapters(&self) -> DocumentResult<Vec<Chapter>> {
        self.chapters
            .clone()
            .ok_or_else(|| DocumentError::OutlineError("broken outline".to_string()))
    }

    async fn rasterize(&self, index: usize, options: &RasterOptions) -> DocumentResult<PageImage> {
        if self.rendered.fetch_add(1, Ordering::SeqCst) == 0 {
            self.started.notify_one();
        }

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| DocumentError::WorkerError(e.to_string()))?
                .forget();
        }

        if self.failing_page == Some(index) {
            return Err(DocumentError::RenderError(format!("page {} is broken", index + 1)));
        }

        let label = format!("{}:{}:{}", self.tag, index, options.rotation.degrees());
        Ok(PageImage::new(
            label.into_bytes(),
            ImageFormat::Jpeg,
            10,
            10,
            options.rotation,
        ))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out registered fake adapters by request name
#[derive(Default)]
pub struct FakeFactory {
    adapters: Mutex<HashMap<String, Vec<Arc<FakeAdapter>>>>,
    pub opened: AtomicUsize,
}

impl FakeFactory {
    /// Queue an adapter for the next open of `name`
    pub fn register(&self, name: &str, adapter: FakeAdapter) -> Arc<FakeAdapter> {
        let adapter = Arc::new(adapter);
        self.adapters
            .lock()
            .entry(name.to_string())
            .or_default()
            .push(Arc::clone(&adapter));
        adapter
    }
}

#[async_trait]
impl AdapterFactory for FakeFactory {
    async fn open(&self, request: &LoadRequest) -> DocumentResult<Arc<dyn DocumentAdapter>> {
        self.opened.fetch_add(1, Ordering::SeqCst);

        let mut adapters = self.adapters.lock();
        let queue = adapters
            .get_mut(&request.name)
            .filter(|queue| !queue.is_empty())
            .ok_or_else(|| DocumentError::ParseError(format!("cannot open {}", request.name)))?;
        let adapter: Arc<dyn DocumentAdapter> = queue.remove(0);
        Ok(adapter)
    }
}

pub fn request(name: &str) -> LoadRequest {
    LoadRequest::new(crate::document::DocumentSource::from_bytes(Vec::new()), name)
}

/// Blank 200x300pt pages with one outline entry, "Last", on the last page
pub fn sample_pdf(page_count: usize) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (0..page_count)
        .map(|_| {
            Object::Reference(doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(200),
                    Object::Integer(300),
                ],
            }))
        })
        .collect();
    let last = kids[page_count - 1].clone();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_count as i64),
        }),
    );

    let outlines_id = doc.new_object_id();
    let item_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal("Last"),
        "Parent" => outlines_id,
        "Dest" => vec![last, "Fit".into()],
    });
    doc.objects.insert(
        outlines_id,
        Object::Dictionary(dictionary! { "Type" => "Outlines", "First" => item_id, "Last" => item_id }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "Outlines" => outlines_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut output = Vec::new();
    doc.save_to(&mut output).unwrap();
    output
}

/// [`sample_pdf`] with everything from `startxref` on cut off
///
/// lopdf refuses it; MuPDF rebuilds the cross-reference table by scanning.
pub fn damaged_pdf(page_count: usize) -> Vec<u8> {
    let mut data = sample_pdf(page_count);
    let marker = b"startxref";
    let cut = data
        .windows(marker.len())
        .rposition(|window| window == marker)
        .unwrap();
    data.truncate(cut);
    data
}
