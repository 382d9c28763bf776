//! PDF object graph access for outlines and destinations
//!
//! MuPDF's outline API only reports resolved page numbers and hides the raw
//! destinations, so the outline is read directly from the object graph:
//!
//! ```text
//! Catalog ─┬─ /Outlines ─ /First ─► item ─ /Next ─► item ─ /Next ─► ...
//!          │                         │
//!          │                         └─ /Dest  or  /A << /S /GoTo /D ... >>
//!          │
//!          ├─ /Names ─ /Dests ─ name tree (/Names pairs, /Kids)
//!          └─ /Dests ─ legacy name → destination dictionary
//! ```

use std::collections::{HashMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, warn};

use super::outline::{DestinationLookup, OutlineEntry, OutlineTarget, PageRef};
use crate::document::{DocumentError, DocumentResult};

/// Maximum indirect references followed for one value
const MAX_REFERENCE_DEPTH: usize = 32;

/// Maximum depth of a destination name tree
const MAX_NAME_TREE_DEPTH: usize = 32;

/// Upper bound on top-level outline items
const MAX_OUTLINE_ITEMS: usize = 10_000;

/// Read-only view of a PDF's outline and destination tables
pub struct PdfObjects {
    doc: Document,
    /// Page object id → 0-based page index
    pages: HashMap<ObjectId, usize>,
}

impl PdfObjects {
    pub fn load(data: &[u8]) -> DocumentResult<Self> {
        let doc = Document::load_mem(data)?;
        let pages = doc
            .get_pages()
            .into_iter()
            .map(|(number, id)| (id, number.saturating_sub(1) as usize))
            .collect::<HashMap<_, _>>();

        debug!(pages = pages.len(), "PDF object graph loaded");

        Ok(Self { doc, pages })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Top-level outline entries in document order
    ///
    /// A document without `/Outlines` yields an empty list. Items that are
    /// not dictionaries end the walk; an item visited twice (a cycle) too.
    pub fn outline_entries(&self) -> DocumentResult<Vec<OutlineEntry>> {
        let catalog = self
            .doc
            .catalog()
            .map_err(|e| DocumentError::OutlineError(format!("Missing catalog: {}", e)))?;

        let outlines = match catalog.get(b"Outlines") {
            Ok(obj) => self.resolve(obj)?,
            Err(_) => return Ok(Vec::new()),
        };
        let outlines = match outlines {
            Object::Dictionary(dict) => dict,
            Object::Null => return Ok(Vec::new()),
            _ => {
                return Err(DocumentError::OutlineError(
                    "/Outlines is not a dictionary".to_string(),
                ))
            }
        };

        let mut entries = Vec::new();
        let mut visited = HashSet::new();
        let mut next = outlines.get(b"First").ok();

        while let Some(obj) = next {
            if let Object::Reference(id) = obj {
                if !visited.insert(*id) {
                    warn!(object = ?id, "Outline cycle detected, stopping");
                    break;
                }
            }
            if entries.len() >= MAX_OUTLINE_ITEMS {
                warn!(items = entries.len(), "Outline too long, truncating");
                break;
            }

            let item = match self.resolve(obj) {
                Ok(Object::Dictionary(dict)) => dict,
                Ok(_) | Err(_) => {
                    warn!("Outline item is not a dictionary, stopping");
                    break;
                }
            };

            entries.push(self.read_entry(item));
            next = item.get(b"Next").ok();
        }

        Ok(entries)
    }

    fn read_entry(&self, item: &Dictionary) -> OutlineEntry {
        let title = item
            .get(b"Title")
            .ok()
            .and_then(|obj| self.resolve(obj).ok())
            .and_then(|obj| match obj {
                Object::String(bytes, _) => Some(decode_text_string(bytes)),
                _ => None,
            })
            .unwrap_or_default();

        OutlineEntry::new(title, self.read_target(item))
    }

    fn read_target(&self, item: &Dictionary) -> OutlineTarget {
        if let Ok(dest) = item.get(b"Dest") {
            return self.target_from_destination(dest);
        }

        let action = match item.get(b"A").map(|obj| self.resolve(obj)) {
            Ok(Ok(Object::Dictionary(action))) => action,
            Ok(Ok(_)) => return OutlineTarget::Malformed("/A is not a dictionary".to_string()),
            Ok(Err(e)) => return OutlineTarget::Malformed(e.to_string()),
            Err(_) => return OutlineTarget::Missing,
        };

        match action.get(b"S") {
            Ok(Object::Name(kind)) if kind.as_slice() == b"GoTo" => match action.get(b"D") {
                Ok(dest) => self.target_from_destination(dest),
                Err(_) => OutlineTarget::Malformed("GoTo action without /D".to_string()),
            },
            // URI, Launch and friends point outside the page sequence
            _ => OutlineTarget::Missing,
        }
    }

    fn target_from_destination(&self, dest: &Object) -> OutlineTarget {
        match self.resolve(dest) {
            Ok(Object::Name(name)) => OutlineTarget::Named(String::from_utf8_lossy(name).into_owned()),
            Ok(Object::String(bytes, _)) => OutlineTarget::Named(decode_name_key(bytes)),
            Ok(Object::Array(array)) => match page_ref_from_array(array) {
                Some(page) => OutlineTarget::Explicit(page),
                None => OutlineTarget::Malformed("destination array without a page".to_string()),
            },
            Ok(other) => OutlineTarget::Malformed(format!("unexpected destination {}", type_label(other))),
            Err(e) => OutlineTarget::Malformed(e.to_string()),
        }
    }

    /// Follow indirect references to the underlying object
    fn resolve<'a>(&'a self, obj: &'a Object) -> DocumentResult<&'a Object> {
        let mut current = obj;
        for _ in 0..MAX_REFERENCE_DEPTH {
            match current {
                Object::Reference(id) => current = self.doc.get_object(*id)?,
                other => return Ok(other),
            }
        }
        Err(DocumentError::OutlineError("Reference chain too deep".to_string()))
    }

    /// Page reference from a destination value: an array, or a dictionary with /D
    fn page_ref_from_value(&self, value: &Object) -> DocumentResult<Option<PageRef>> {
        match self.resolve(value)? {
            Object::Array(array) => Ok(page_ref_from_array(array)),
            Object::Dictionary(dict) => match dict.get(b"D") {
                Ok(d) => match self.resolve(d)? {
                    Object::Array(array) => Ok(page_ref_from_array(array)),
                    _ => Ok(None),
                },
                Err(_) => Ok(None),
            },
            _ => Ok(None),
        }
    }

    fn search_name_tree(
        &self,
        node: &Dictionary,
        name: &str,
        depth: usize,
    ) -> DocumentResult<Option<PageRef>> {
        if depth > MAX_NAME_TREE_DEPTH {
            return Err(DocumentError::OutlineError("Name tree too deep".to_string()));
        }

        if let Ok(names) = node.get(b"Names") {
            if let Object::Array(pairs) = self.resolve(names)? {
                for pair in pairs.chunks(2) {
                    if let [key, value] = pair {
                        let matches = matches!(
                            self.resolve(key)?,
                            Object::String(bytes, _) if decode_name_key(bytes) == name
                        );
                        if matches {
                            return self.page_ref_from_value(value);
                        }
                    }
                }
            }
        }

        if let Ok(kids) = node.get(b"Kids") {
            if let Object::Array(kids) = self.resolve(kids)? {
                for kid in kids {
                    if let Object::Dictionary(kid) = self.resolve(kid)? {
                        if let Some(found) = self.search_name_tree(kid, name, depth + 1)? {
                            return Ok(Some(found));
                        }
                    }
                }
            }
        }

        Ok(None)
    }
}

impl DestinationLookup for PdfObjects {
    fn named_destination(&self, name: &str) -> DocumentResult<Option<PageRef>> {
        let catalog = self.doc.catalog()?;

        if let Ok(names) = catalog.get(b"Names") {
            if let Object::Dictionary(names) = self.resolve(names)? {
                if let Ok(dests) = names.get(b"Dests") {
                    if let Object::Dictionary(tree) = self.resolve(dests)? {
                        if let Some(found) = self.search_name_tree(tree, name, 0)? {
                            return Ok(Some(found));
                        }
                    }
                }
            }
        }

        if let Ok(dests) = catalog.get(b"Dests") {
            if let Object::Dictionary(dests) = self.resolve(dests)? {
                if let Ok(value) = dests.get(name.as_bytes()) {
                    return self.page_ref_from_value(value);
                }
            }
        }

        Ok(None)
    }

    fn page_index(&self, page: &PageRef) -> DocumentResult<usize> {
        match page {
            PageRef::Object(number, generation) => {
                self.pages.get(&(*number, *generation)).copied().ok_or_else(|| {
                    DocumentError::OutlineError(format!(
                        "Object {} {} R is not a page",
                        number, generation
                    ))
                })
            }
            PageRef::Index(index) if *index < self.pages.len() => Ok(*index),
            PageRef::Index(index) => Err(DocumentError::PageNotFound(*index)),
        }
    }
}

fn page_ref_from_array(array: &[Object]) -> Option<PageRef> {
    match array.first() {
        Some(Object::Reference((number, generation))) => Some(PageRef::Object(*number, *generation)),
        // Remote-style destinations use a bare page number
        Some(Object::Integer(index)) if *index >= 0 => Some(PageRef::Index(*index as usize)),
        _ => None,
    }
}

fn type_label(obj: &Object) -> &'static str {
    match obj {
        Object::Null => "null",
        Object::Boolean(_) => "boolean",
        Object::Integer(_) => "integer",
        Object::Real(_) => "real",
        Object::Name(_) => "name",
        Object::String(..) => "string",
        Object::Array(_) => "array",
        Object::Dictionary(_) => "dictionary",
        Object::Stream(_) => "stream",
        _ => "reference",
    }
}

/// Name-tree keys are byte strings compared as written
fn decode_name_key(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Decode a PDF text string (UTF-16BE or UTF-8 with BOM, else PDFDocEncoding)
pub fn decode_text_string(bytes: &[u8]) -> String {
    let text = if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        String::from_utf8_lossy(rest).into_owned()
    } else {
        // PDFDocEncoding matches Latin-1 outside a few punctuation slots
        bytes.iter().map(|&b| b as char).collect()
    };

    text.trim().to_string()
}
