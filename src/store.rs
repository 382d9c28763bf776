//! Page store
//!
//! The finished output of one successful run: pages in order plus the
//! chapter index. A store is immutable; the session swaps it wholesale when
//! a run commits, so readers never see a partially filled sequence.

use std::sync::Arc;

use crate::document::{Chapter, PageImage, Rotation};

#[derive(Debug, Clone, Default)]
pub struct PageStore {
    pages: Arc<Vec<PageImage>>,
    chapters: Arc<Vec<Chapter>>,
    rotation: Rotation,
    run: Option<u64>,
}

impl PageStore {
    pub fn new(pages: Vec<PageImage>, chapters: Vec<Chapter>, rotation: Rotation, run: u64) -> Self {
        Self {
            pages: Arc::new(pages),
            chapters: Arc::new(chapters),
            rotation,
            run: Some(run),
        }
    }

    pub fn pages(&self) -> &Arc<Vec<PageImage>> {
        &self.pages
    }

    pub fn chapters(&self) -> &Arc<Vec<Chapter>> {
        &self.chapters
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Page by 1-based number
    pub fn page(&self, number: usize) -> Option<&PageImage> {
        number.checked_sub(1).and_then(|index| self.pages.get(index))
    }

    /// Rotation every page was rendered at
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Run that produced this store; `None` for the empty initial store
    pub fn run(&self) -> Option<u64> {
        self.run
    }

    /// Chapter containing a 1-based page: the last one starting at or before it
    pub fn chapter_for_page(&self, number: usize) -> Option<&Chapter> {
        self.chapters
            .iter()
            .filter(|chapter| chapter.page <= number)
            .max_by_key(|chapter| chapter.page)
    }
}
