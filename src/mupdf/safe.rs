//! Per-operation document wrapper for MuPDF
//!
//! MuPDF documents are not thread-safe. This wrapper:
//!
//! 1. Stores the document bytes
//! 2. Opens a fresh document for each operation, on the calling thread
//!
//! The `mupdf` crate clones one `fz_context` per thread, so documents opened
//! on different render workers share no state and pages of one file can be
//! rendered in parallel. No `mupdf::Document` escapes a closure; the native
//! handle is freed when the closure returns.

use std::sync::Arc;

use mupdf::Document;

use crate::document::DocumentResult;

/// Document bytes plus the MIME type MuPDF opens them as
pub struct SafeDocument {
    data: Arc<Vec<u8>>,
    mime: &'static str,
    /// Page count observed when the document was validated
    page_count: usize,
}

impl SafeDocument {
    /// Validate that the bytes open as `mime` and cache the page count
    pub fn open(data: Arc<Vec<u8>>, mime: &'static str) -> DocumentResult<Self> {
        let doc = Document::from_bytes(&data, mime)?;
        let page_count = doc.page_count()? as usize;

        Ok(Self {
            data,
            mime,
            page_count,
        })
    }

    /// Wrap bytes without opening them yet
    ///
    /// Used for content that is only opened at render time (EPUB spine items).
    pub fn deferred(data: Arc<Vec<u8>>, mime: &'static str) -> Self {
        Self {
            data,
            mime,
            page_count: 0,
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }

    fn open_document(&self) -> DocumentResult<Document> {
        Document::from_bytes(&self.data, self.mime).map_err(Into::into)
    }

    /// Execute a closure with access to a freshly opened document
    pub fn with_doc<F, R>(&self, f: F) -> DocumentResult<R>
    where
        F: FnOnce(&Document) -> DocumentResult<R>,
    {
        let doc = self.open_document()?;
        f(&doc)
    }

    /// Execute a closure with mutable access to the document
    ///
    /// Needed for `layout()` on reflowable content.
    pub fn with_doc_mut<F, R>(&self, f: F) -> DocumentResult<R>
    where
        F: FnOnce(&mut Document) -> DocumentResult<R>,
    {
        let mut doc = self.open_document()?;
        f(&mut doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::testing::sample_pdf;

    #[test]
    fn test_deferred_keeps_mime() {
        let doc = SafeDocument::deferred(Arc::new(b"<html/>".to_vec()), "application/xhtml+xml");
        assert_eq!(doc.mime(), "application/xhtml+xml");
        assert_eq!(doc.page_count(), 0);
    }

    #[test]
    fn test_open_rejects_garbage() {
        let result = SafeDocument::open(Arc::new(b"not a pdf".to_vec()), "application/pdf");
        assert!(result.is_err());
    }

    #[test]
    fn test_operations_on_one_document_overlap() {
        let doc = Arc::new(SafeDocument::open(Arc::new(sample_pdf(2)), "application/pdf").unwrap());
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let doc = Arc::clone(&doc);
                let inside = Arc::clone(&inside);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    doc.with_doc(|mupdf_doc| {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        // Stay inside until the other thread has entered too
                        let deadline = Instant::now() + Duration::from_secs(5);
                        while peak.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
                            thread::sleep(Duration::from_millis(1));
                        }
                        let pages = mupdf_doc.page_count()? as usize;
                        inside.fetch_sub(1, Ordering::SeqCst);
                        Ok(pages)
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), 2);
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }
}
