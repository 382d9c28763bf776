//! EPUB format implementation
//!
//! # Architecture
//!
//! - [`EpubPackage`]: container, manifest, spine and TOC parsing (zip + roxmltree)
//! - [`LayoutSurface`]: off-screen slots that spine items are laid out on
//! - [`EpubAdapter`]: one page per spine item, placeholders for failed captures
//! - [`SpineRenderer`]: the capture step, MuPDF by default

mod adapter;
mod container;
mod surface;

pub use adapter::{EpubAdapter, MupdfSpineRenderer, SpineRenderer};
pub use container::{
    parse_nav_document, parse_ncx_document, resolve_href, EpubPackage, ManifestItem, SpineItem,
    TocEntry,
};
pub use surface::{LayoutBox, LayoutSurface, Mounted};

#[cfg(test)]
pub(crate) use container::fixture;
