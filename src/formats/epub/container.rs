//! EPUB container parsing
//!
//! `META-INF/container.xml` → OPF → manifest + spine, plus the table of
//! contents from the EPUB 3 navigation document or the EPUB 2 NCX.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

use roxmltree::{Document, Node, ParsingOptions};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::document::{DocumentError, DocumentResult};

/// Manifest item from OPF
#[derive(Debug, Clone)]
pub struct ManifestItem {
    pub id: String,
    /// Archive path, resolved against the OPF directory
    pub path: String,
    pub media_type: String,
    pub properties: Option<String>,
}

/// One spine item, which becomes one flip-book page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    pub id: String,
    pub path: String,
    pub media_type: String,
}

/// Top-level table of contents entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub label: String,
    pub href: String,
}

/// Parsed EPUB package backed by the archive bytes
pub struct EpubPackage {
    data: Arc<Vec<u8>>,
    pub spine: Vec<SpineItem>,
    pub toc: Vec<TocEntry>,
}

impl EpubPackage {
    /// Parse an EPUB from raw bytes
    pub fn parse(data: Arc<Vec<u8>>) -> DocumentResult<Self> {
        let mut archive = ZipArchive::new(Cursor::new(data.as_slice()))?;

        let opf_path = find_opf_path(&mut archive)?;
        let opf_dir = opf_path
            .rsplit_once('/')
            .map(|(dir, _)| dir.to_string())
            .unwrap_or_default();

        let opf_content = read_text(&mut archive, &opf_path)?;
        let opf = Document::parse_with_options(&opf_content, xml_options())
            .map_err(|e| DocumentError::ParseError(format!("OPF {}: {}", opf_path, e)))?;

        let manifest = parse_manifest(&opf, &opf_dir);
        let spine = parse_spine(&opf, &manifest);
        let toc = read_toc(&mut archive, &opf, &manifest);

        debug!(
            opf = %opf_path,
            spine = spine.len(),
            toc = toc.len(),
            "EPUB package parsed"
        );

        Ok(Self { data, spine, toc })
    }

    pub fn spine_len(&self) -> usize {
        self.spine.len()
    }

    /// Raw bytes of the spine item at `index`
    pub fn read_item(&self, index: usize) -> DocumentResult<Vec<u8>> {
        let item = self
            .spine
            .get(index)
            .ok_or(DocumentError::PageNotFound(index))?;

        let mut archive = ZipArchive::new(Cursor::new(self.data.as_slice()))?;
        read_bytes(&mut archive, &item.path)
    }
}

/// Nav and NCX files commonly carry a DOCTYPE
fn xml_options() -> ParsingOptions {
    ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    }
}

/// Find the path to the OPF file from container.xml
fn find_opf_path<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>) -> DocumentResult<String> {
    let container = read_text(archive, "META-INF/container.xml")?;
    let doc = Document::parse_with_options(&container, xml_options())
        .map_err(|e| DocumentError::ParseError(format!("container.xml: {}", e)))?;

    doc.descendants()
        .filter(|node| node.tag_name().name() == "rootfile")
        .find_map(|node| node.attribute("full-path"))
        .map(str::to_string)
        .ok_or_else(|| {
            DocumentError::ParseError("Could not find OPF path in container.xml".to_string())
        })
}

fn read_bytes<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> DocumentResult<Vec<u8>> {
    let mut file = archive
        .by_name(path)
        .map_err(|_| DocumentError::ResourceNotFound(path.to_string()))?;
    let mut content = Vec::new();
    file.read_to_end(&mut content)?;
    Ok(content)
}

fn read_text<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, path: &str) -> DocumentResult<String> {
    let bytes = read_bytes(archive, path)?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    };
    // roxmltree rejects a leading byte-order mark
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

fn parse_manifest(doc: &Document, opf_dir: &str) -> HashMap<String, ManifestItem> {
    let mut manifest = HashMap::new();

    for node in doc.descendants() {
        if node.tag_name().name() != "item" {
            continue;
        }
        if let (Some(id), Some(href), Some(media_type)) = (
            node.attribute("id"),
            node.attribute("href"),
            node.attribute("media-type"),
        ) {
            manifest.insert(
                id.to_string(),
                ManifestItem {
                    id: id.to_string(),
                    path: resolve_href(opf_dir, href),
                    media_type: media_type.to_string(),
                    properties: node.attribute("properties").map(str::to_string),
                },
            );
        }
    }

    manifest
}

fn parse_spine(doc: &Document, manifest: &HashMap<String, ManifestItem>) -> Vec<SpineItem> {
    let mut spine = Vec::new();

    for node in doc.descendants() {
        if node.tag_name().name() != "itemref" {
            continue;
        }
        let Some(idref) = node.attribute("idref") else {
            continue;
        };
        match manifest.get(idref) {
            Some(item) => spine.push(SpineItem {
                id: item.id.clone(),
                path: item.path.clone(),
                media_type: item.media_type.clone(),
            }),
            None => warn!(idref = %idref, "Spine item missing from manifest, skipping"),
        }
    }

    spine
}

/// Navigation document first, then NCX; no TOC means no chapters
fn read_toc<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    opf: &Document,
    manifest: &HashMap<String, ManifestItem>,
) -> Vec<TocEntry> {
    let nav = manifest.values().find(|item| {
        item.properties
            .as_deref()
            .is_some_and(|props| props.split_whitespace().any(|p| p == "nav"))
    });

    if let Some(nav) = nav {
        match read_text(archive, &nav.path) {
            Ok(content) => {
                let entries = parse_nav_document(&content);
                if !entries.is_empty() {
                    return entries;
                }
            }
            Err(e) => warn!(path = %nav.path, error = %e, "Navigation document unreadable"),
        }
    }

    let ncx = opf
        .descendants()
        .find(|node| node.tag_name().name() == "spine")
        .and_then(|spine| spine.attribute("toc"))
        .and_then(|id| manifest.get(id));

    if let Some(ncx) = ncx {
        match read_text(archive, &ncx.path) {
            Ok(content) => return parse_ncx_document(&content),
            Err(e) => warn!(path = %ncx.path, error = %e, "NCX document unreadable"),
        }
    }

    Vec::new()
}

/// Parse the top level of an EPUB 3 navigation document
pub fn parse_nav_document(content: &str) -> Vec<TocEntry> {
    let doc = match Document::parse_with_options(content, xml_options()) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(error = %e, "Navigation document is not well-formed");
            return Vec::new();
        }
    };

    let navs: Vec<Node> = doc
        .descendants()
        .filter(|node| node.tag_name().name() == "nav")
        .collect();

    // epub:type="toc" first, then navs without an epub:type
    let toc_nav = navs.iter().find(|nav| {
        nav.attributes()
            .any(|a| a.name() == "type" && a.value().split_whitespace().any(|t| t == "toc"))
    });

    // Typed navs other than toc (landmarks, page-list) are never chapters
    let untyped = navs
        .iter()
        .filter(|nav| !nav.attributes().any(|a| a.name() == "type"));

    for nav in toc_nav.into_iter().chain(untyped) {
        if let Some(ol) = nav.descendants().find(|n| n.tag_name().name() == "ol") {
            let entries = parse_nav_ol(ol);
            if !entries.is_empty() {
                return entries;
            }
        }
    }

    Vec::new()
}

fn parse_nav_ol(ol: Node) -> Vec<TocEntry> {
    ol.children()
        .filter(|child| child.tag_name().name() == "li")
        .filter_map(|li| {
            let link = li
                .children()
                .find(|c| matches!(c.tag_name().name(), "a" | "span"))?;
            Some(TocEntry {
                label: normalize_label(&text_content(link)),
                href: link.attribute("href").unwrap_or_default().to_string(),
            })
        })
        .collect()
}

/// Parse the top level of an EPUB 2 NCX document
pub fn parse_ncx_document(content: &str) -> Vec<TocEntry> {
    let doc = match Document::parse_with_options(content, xml_options()) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(error = %e, "NCX document is not well-formed");
            return Vec::new();
        }
    };

    let Some(nav_map) = doc.descendants().find(|n| n.tag_name().name() == "navMap") else {
        return Vec::new();
    };

    nav_map
        .children()
        .filter(|child| child.tag_name().name() == "navPoint")
        .map(|point| {
            let label = point
                .children()
                .find(|c| c.tag_name().name() == "navLabel")
                .and_then(|l| l.descendants().find(|d| d.tag_name().name() == "text"))
                .map(text_content)
                .unwrap_or_default();
            let href = point
                .children()
                .find(|c| c.tag_name().name() == "content")
                .and_then(|c| c.attribute("src"))
                .unwrap_or_default();

            TocEntry {
                label: normalize_label(&label),
                href: href.to_string(),
            }
        })
        .collect()
}

fn text_content(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

fn normalize_label(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a manifest href against the OPF directory
///
/// Fragments are dropped, percent-escapes decoded and `.`/`..` segments
/// collapsed so the result is a plain archive path.
pub fn resolve_href(base_dir: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or_default();
    let href = urlencoding::decode(href)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| href.to_string());

    let mut segments: Vec<&str> = if href.starts_with('/') {
        Vec::new()
    } else {
        base_dir.split('/').filter(|s| !s.is_empty()).collect()
    };

    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}


#[cfg(test)]
mod tests {
    use super::fixture::{bodies, build_epub, Toc};
    use super::*;

    #[test]
    fn test_spine_without_toc() {
        let data = build_epub(&bodies(7), Toc::None);
        let package = EpubPackage::parse(Arc::new(data)).unwrap();

        assert_eq!(package.spine_len(), 7);
        assert!(package.toc.is_empty());
        assert_eq!(package.spine[2].path, "OEBPS/text/part 2.xhtml");
    }

    #[test]
    fn test_read_item() {
        let data = build_epub(&bodies(3), Toc::None);
        let package = EpubPackage::parse(Arc::new(data)).unwrap();

        let content = String::from_utf8(package.read_item(1).unwrap()).unwrap();
        assert!(content.contains("Body 2"));
        assert!(matches!(package.read_item(3), Err(DocumentError::PageNotFound(3))));
    }

    #[test]
    fn test_nav_toc_top_level_only() {
        let data = build_epub(&bodies(2), Toc::Nav(vec!["Opening", "  Second\n  Part "]));
        let package = EpubPackage::parse(Arc::new(data)).unwrap();

        let labels: Vec<&str> = package.toc.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Opening", "Second Part"]);
    }

    #[test]
    fn test_ncx_toc() {
        let data = build_epub(&bodies(3), Toc::Ncx(vec!["One", "Two", "Three"]));
        let package = EpubPackage::parse(Arc::new(data)).unwrap();

        assert_eq!(package.toc.len(), 3);
        assert_eq!(package.toc[1].label, "Two");
        assert_eq!(package.toc[1].href, "text/part%201.xhtml");
    }

    #[test]
    fn test_missing_container_is_parse_error() {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("mimetype", zip::write::SimpleFileOptions::default())
            .unwrap();
        let data = zip.finish().unwrap().into_inner();

        assert!(EpubPackage::parse(Arc::new(data)).is_err());
        assert!(EpubPackage::parse(Arc::new(b"not a zip".to_vec())).is_err());
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(resolve_href("OEBPS", "text/ch1.xhtml#top"), "OEBPS/text/ch1.xhtml");
        assert_eq!(resolve_href("OEBPS/text", "../img/a%20b.png"), "OEBPS/img/a b.png");
        assert_eq!(resolve_href("", "./ch1.xhtml"), "ch1.xhtml");
        assert_eq!(resolve_href("OEBPS", "/root.xhtml"), "root.xhtml");
    }

    #[test]
    fn test_nav_falls_back_to_any_list() {
        let nav = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body>
            <nav><ol><li><span>Plain</span></li></ol></nav></body></html>"#;
        assert_eq!(
            parse_nav_document(nav),
            vec![TocEntry {
                label: "Plain".into(),
                href: String::new()
            }]
        );
        assert!(parse_nav_document("<broken").is_empty());
    }

    #[test]
    fn test_empty_toc_nav_ignores_landmarks() {
        let nav = r#"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops"><body>
            <nav epub:type="toc"><ol></ol></nav>
            <nav epub:type="landmarks"><ol><li><a href="cover.xhtml">Cover</a></li></ol></nav>
            <nav epub:type="page-list"><ol><li><a href="p1.xhtml">1</a></li></ol></nav>
            </body></html>"#;
        assert!(parse_nav_document(nav).is_empty());
    }

    #[test]
    fn test_svg_spine_item_keeps_media_type() {
        let items = vec![
            "Text".to_string(),
            r#"<svg xmlns="http://www.w3.org/2000/svg"/>"#.to_string(),
        ];
        let package = EpubPackage::parse(Arc::new(build_epub(&items, Toc::None))).unwrap();

        assert_eq!(package.spine[0].media_type, "application/xhtml+xml");
        assert_eq!(package.spine[1].media_type, "image/svg+xml");
        assert_eq!(package.spine[1].path, "OEBPS/image/part 1.svg");
    }
}
