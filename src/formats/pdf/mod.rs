//! PDF format implementation
//!
//! - [`PdfAdapter`]: page count and rendering through MuPDF
//! - [`PdfObjects`]: outline and destination tables through lopdf
//! - [`resolve_chapters`]: outline entries to 1-based chapter markers

mod adapter;
mod objects;
mod outline;

pub use adapter::PdfAdapter;
pub use objects::{decode_text_string, PdfObjects};
pub use outline::{
    resolve_chapters, DestinationLookup, OutlineEntry, OutlineTarget, PageRef, ResolvedPages,
};
