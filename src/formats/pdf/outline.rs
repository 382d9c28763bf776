//! PDF outline to chapter conversion
//!
//! Outline entries carry either a named destination (looked up in the
//! document's destination tables) or an explicit destination array whose
//! first element is the target page. Anything that cannot be resolved lands
//! on page 1; a bad entry never stops the entries after it.

use tracing::warn;

use crate::document::{Chapter, DocumentError, DocumentResult};

/// Reference to a page inside a destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRef {
    /// Indirect reference to a page object
    Object(u32, u16),
    /// Bare 0-based page number
    Index(usize),
}

/// Where an outline entry points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutlineTarget {
    /// Named destination, resolved through the document's name tables
    Named(String),
    /// Inline destination array
    Explicit(PageRef),
    /// Destination present but not understood
    Malformed(String),
    /// No destination at all
    Missing,
}

/// Top-level outline entry as read from the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub title: String,
    pub target: OutlineTarget,
}

impl OutlineEntry {
    pub fn new(title: impl Into<String>, target: OutlineTarget) -> Self {
        Self {
            title: title.into(),
            target,
        }
    }
}

/// Destination lookups a PDF backend must provide
pub trait DestinationLookup {
    /// Look up a named destination; `Ok(None)` when the name is unknown
    fn named_destination(&self, name: &str) -> DocumentResult<Option<PageRef>>;

    /// Convert a page reference into a 0-based page index
    fn page_index(&self, page: &PageRef) -> DocumentResult<usize>;
}

/// Lookup for outlines whose targets were already resolved to page indices
///
/// MuPDF hands back outline pages directly, so only bounds are checked.
pub struct ResolvedPages {
    pub page_count: usize,
}

impl DestinationLookup for ResolvedPages {
    fn named_destination(&self, _name: &str) -> DocumentResult<Option<PageRef>> {
        Ok(None)
    }

    fn page_index(&self, page: &PageRef) -> DocumentResult<usize> {
        match page {
            PageRef::Index(index) if *index < self.page_count => Ok(*index),
            PageRef::Index(index) => Err(DocumentError::PageNotFound(*index)),
            PageRef::Object(number, generation) => Err(DocumentError::OutlineError(format!(
                "Unresolved page object {} {} R",
                number, generation
            ))),
        }
    }
}

/// Resolve outline entries into chapters with 1-based page numbers
pub fn resolve_chapters(entries: &[OutlineEntry], lookup: &dyn DestinationLookup) -> Vec<Chapter> {
    entries
        .iter()
        .map(|entry| {
            let page = match resolve_target(&entry.target, lookup) {
                Ok(Some(index)) => index + 1,
                Ok(None) => 1,
                Err(e) => {
                    warn!(title = %entry.title, error = %e, "Outline destination unresolved, using page 1");
                    1
                }
            };

            let title = if entry.title.trim().is_empty() {
                "Untitled".to_string()
            } else {
                entry.title.clone()
            };

            Chapter::new(title, page)
        })
        .collect()
}

fn resolve_target(
    target: &OutlineTarget,
    lookup: &dyn DestinationLookup,
) -> DocumentResult<Option<usize>> {
    match target {
        OutlineTarget::Named(name) => match lookup.named_destination(name)? {
            Some(page) => lookup.page_index(&page).map(Some),
            None => {
                warn!(name = %name, "Named destination not found");
                Ok(None)
            }
        },
        OutlineTarget::Explicit(page) => lookup.page_index(page).map(Some),
        OutlineTarget::Malformed(reason) => {
            warn!(reason = %reason, "Malformed outline destination");
            Ok(None)
        }
        OutlineTarget::Missing => Ok(None),
    }
}
