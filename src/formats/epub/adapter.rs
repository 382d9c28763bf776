//! EPUB DocumentAdapter implementation
//!
//! Each spine item becomes exactly one flip-book page. An item is mounted on
//! the off-screen [`LayoutSurface`], given a settle delay, then captured by a
//! [`SpineRenderer`]. Items that fail to capture are replaced by a
//! placeholder page so one broken chapter never aborts the book.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::container::EpubPackage;
use super::surface::{LayoutBox, LayoutSurface};
use crate::config::EpubConfig;
use crate::document::{
    Chapter, DocumentAdapter, DocumentError, DocumentFormat, DocumentResult, PageImage,
    RasterOptions, Rotation,
};
use crate::mupdf::{raster, RasterSurface, SafeDocument, SharedRenderWorkers};

const XHTML_MIME: &str = "application/xhtml+xml";

/// Captures laid-out spine content into an encoded image
///
/// `media_type` is the manifest media type of the item. Called on the render
/// worker pool, so implementations may block.
pub trait SpineRenderer: Send + Sync + 'static {
    fn capture(
        &self,
        content: Arc<Vec<u8>>,
        media_type: &str,
        layout: LayoutBox,
        options: &RasterOptions,
    ) -> DocumentResult<PageImage>;
}

/// MIME type MuPDF opens a spine item as
///
/// Fixed-layout and comic books put SVG or bare images in the spine;
/// anything unrecognized is treated as XHTML.
pub fn spine_mime(media_type: &str) -> &'static str {
    match media_type.trim().to_ascii_lowercase().as_str() {
        "image/svg+xml" => "image/svg+xml",
        "text/html" => "text/html",
        "image/jpeg" | "image/jpg" => "image/jpeg",
        "image/png" => "image/png",
        "image/gif" => "image/gif",
        _ => XHTML_MIME,
    }
}

/// Lays out XHTML with MuPDF's reflowable engine and renders the first page
#[derive(Debug, Default, Clone, Copy)]
pub struct MupdfSpineRenderer;

impl SpineRenderer for MupdfSpineRenderer {
    fn capture(
        &self,
        content: Arc<Vec<u8>>,
        media_type: &str,
        layout: LayoutBox,
        options: &RasterOptions,
    ) -> DocumentResult<PageImage> {
        let doc = SafeDocument::deferred(content, spine_mime(media_type));

        let surface = doc.with_doc_mut(|mupdf_doc| {
            if mupdf_doc.is_reflowable().unwrap_or(false) {
                mupdf_doc.layout(layout.width, layout.height, layout.em)?;
            }
            if mupdf_doc.page_count()? < 1 {
                return Err(DocumentError::RenderError("Spine item laid out to no pages".to_string()));
            }
            raster::render_surface(mupdf_doc, 0, options)
        })?;

        surface.into_page(options)
    }
}

/// EPUB implementation of DocumentAdapter
pub struct EpubAdapter {
    package: Arc<EpubPackage>,
    surface: Arc<LayoutSurface>,
    renderer: Arc<dyn SpineRenderer>,
    workers: SharedRenderWorkers,
    settle_delay: Duration,
}

impl EpubAdapter {
    /// Parse the container with the MuPDF spine renderer
    pub async fn open(
        data: Arc<Vec<u8>>,
        config: &EpubConfig,
        workers: SharedRenderWorkers,
    ) -> DocumentResult<Self> {
        Self::with_renderer(data, config, workers, Arc::new(MupdfSpineRenderer)).await
    }

    pub async fn with_renderer(
        data: Arc<Vec<u8>>,
        config: &EpubConfig,
        workers: SharedRenderWorkers,
        renderer: Arc<dyn SpineRenderer>,
    ) -> DocumentResult<Self> {
        let package = workers.run(move || EpubPackage::parse(data)).await?;

        debug!(spine = package.spine_len(), toc = package.toc.len(), "EPUB opened");

        Ok(Self {
            package: Arc::new(package),
            surface: LayoutSurface::new(LayoutBox::from_config(config)),
            renderer,
            workers,
            settle_delay: config.settle_delay(),
        })
    }

    /// Layout surface shared by all captures of this adapter
    pub fn surface(&self) -> &Arc<LayoutSurface> {
        &self.surface
    }

    async fn capture(&self, index: usize, options: &RasterOptions) -> DocumentResult<PageImage> {
        let package = Arc::clone(&self.package);
        let media_type = package
            .spine
            .get(index)
            .map(|item| item.media_type.clone())
            .ok_or(DocumentError::PageNotFound(index))?;
        let content = self.workers.run(move || package.read_item(index)).await?;

        let mounted = self.surface.mount(index, Arc::new(content))?;
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        let content = mounted.content()?;

        let renderer = Arc::clone(&self.renderer);
        let layout = self.surface.layout();
        let options = *options;
        let page = self
            .workers
            .run(move || renderer.capture(content, &media_type, layout, &options))
            .await?;

        drop(mounted);
        Ok(page)
    }

    /// Page labelled "Page N", or a blank page when even that cannot render
    async fn placeholder(&self, index: usize, options: &RasterOptions) -> DocumentResult<PageImage> {
        let renderer = Arc::clone(&self.renderer);
        let layout = self.surface.layout();
        let options = *options;
        let content = Arc::new(placeholder_xhtml(index + 1).into_bytes());

        let page = self
            .workers
            .run(move || match renderer.capture(content, XHTML_MIME, layout, &options) {
                Ok(page) => Ok(page),
                Err(e) => {
                    debug!(error = %e, "Placeholder render failed, using blank page");
                    let (width, height) = placeholder_size(layout, &options);
                    RasterSurface::blank(width, height).into_page(&options)
                }
            })
            .await?;

        Ok(page.into_placeholder())
    }
}

#[async_trait]
impl DocumentAdapter for EpubAdapter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Epub
    }

    fn page_count(&self) -> usize {
        self.package.spine_len()
    }

    /// Top-level TOC entries get their 1-based position as page number
    async fn chapters(&self) -> DocumentResult<Vec<Chapter>> {
        Ok(self
            .package
            .toc
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let title = if entry.label.is_empty() {
                    format!("Chapter {}", i + 1)
                } else {
                    entry.label.clone()
                };
                Chapter::new(title, i + 1)
            })
            .collect())
    }

    async fn rasterize(&self, index: usize, options: &RasterOptions) -> DocumentResult<PageImage> {
        if index >= self.page_count() {
            return Err(DocumentError::PageNotFound(index));
        }

        match self.capture(index, options).await {
            Ok(page) => Ok(page),
            Err(e) => {
                warn!(page = index + 1, error = %e, "Spine item failed to render, using placeholder");
                self.placeholder(index, options).await
            }
        }
    }

    async fn close(&self) {
        self.surface.dispose();
        debug!("EPUB layout surface disposed");
    }
}

fn placeholder_xhtml(number: usize) -> String {
    format!(
        r#"<html xmlns="http://www.w3.org/1999/xhtml"><body style="text-align:center"><h1>Page {}</h1></body></html>"#,
        number
    )
}

/// Pixel size of the layout box at the given scale and rotation
fn placeholder_size(layout: LayoutBox, options: &RasterOptions) -> (u32, u32) {
    let width = (layout.width * options.scale).round().max(1.0) as u32;
    let height = (layout.height * options.scale).round().max(1.0) as u32;
    match options.rotation {
        Rotation::Deg90 | Rotation::Deg270 => (height, width),
        Rotation::Deg0 | Rotation::Deg180 => (width, height),
    }
}

#[cfg(test)]
mod tests {
    use super::super::container::fixture::{bodies, build_epub, Toc};
    use super::*;
    use crate::document::ImageFormat;
    use crate::mupdf::RenderWorkers;

    /// Echoes media type and content back as the image bytes; fails on "corrupt" items
    struct EchoRenderer {
        fail_placeholders: bool,
    }

    impl SpineRenderer for EchoRenderer {
        fn capture(
            &self,
            content: Arc<Vec<u8>>,
            media_type: &str,
            layout: LayoutBox,
            options: &RasterOptions,
        ) -> DocumentResult<PageImage> {
            let text = String::from_utf8_lossy(&content).into_owned();
            if text.contains("corrupt") || (self.fail_placeholders && text.contains("<h1>")) {
                return Err(DocumentError::RenderError("capture failed".into()));
            }
            Ok(PageImage::new(
                format!("{}\n{}", media_type, text).into_bytes(),
                options.format,
                layout.width as u32,
                layout.height as u32,
                options.rotation,
            ))
        }
    }

    fn config() -> EpubConfig {
        EpubConfig {
            settle_delay_ms: 0,
            ..EpubConfig::default()
        }
    }

    fn options() -> RasterOptions {
        RasterOptions {
            rotation: Rotation::Deg0,
            scale: 1.0,
            format: ImageFormat::Jpeg,
            quality: 85,
        }
    }

    async fn adapter(bodies: &[String], toc: Toc, fail_placeholders: bool) -> EpubAdapter {
        EpubAdapter::with_renderer(
            Arc::new(build_epub(bodies, toc)),
            &config(),
            Arc::new(RenderWorkers::new(2)),
            Arc::new(EchoRenderer { fail_placeholders }),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_seven_items_without_toc() {
        let adapter = adapter(&bodies(7), Toc::None, false).await;

        assert_eq!(adapter.page_count(), 7);
        assert!(adapter.chapters().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_item_becomes_placeholder() {
        let mut items = bodies(10);
        items[4] = "corrupt".to_string();
        let adapter = adapter(&items, Toc::None, false).await;

        let mut pages = Vec::new();
        for i in 0..adapter.page_count() {
            pages.push(adapter.rasterize(i, &options()).await.unwrap());
        }

        assert_eq!(pages.len(), 10);
        let placeholders: Vec<usize> = pages
            .iter()
            .enumerate()
            .filter(|(_, p)| p.placeholder)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(placeholders, vec![4]);
        assert!(String::from_utf8_lossy(&pages[4].data).contains("Page 5"));
        assert!(String::from_utf8_lossy(&pages[3].data).contains("Body 4"));
        assert_eq!(adapter.surface().mounted(), 0);
    }

    #[tokio::test]
    async fn test_blank_placeholder_when_label_fails() {
        let adapter = adapter(&["corrupt".to_string()], Toc::None, true).await;
        let options = RasterOptions {
            rotation: Rotation::Deg90,
            scale: 0.01,
            ..options()
        };

        let page = adapter.rasterize(0, &options).await.unwrap();

        assert!(page.placeholder);
        assert_eq!((page.width, page.height), (12, 8));
        assert_eq!(page.rotation, Rotation::Deg90);
    }

    #[tokio::test]
    async fn test_toc_positions_become_pages() {
        let adapter = adapter(&bodies(3), Toc::Ncx(vec!["One", "", "Three"]), false).await;

        let chapters = adapter.chapters().await.unwrap();
        assert_eq!(
            chapters,
            vec![
                Chapter::new("One", 1),
                Chapter::new("Chapter 2", 2),
                Chapter::new("Three", 3),
            ]
        );
    }

    #[tokio::test]
    async fn test_close_disposes_surface() {
        let adapter = adapter(&bodies(2), Toc::None, false).await;
        adapter.close().await;

        assert!(adapter.surface().is_disposed());
        // Items captured after disposal still yield a page
        let page = adapter.rasterize(0, &options()).await.unwrap();
        assert!(page.placeholder);
    }

    #[tokio::test]
    async fn test_out_of_range() {
        let adapter = adapter(&bodies(1), Toc::None, false).await;
        assert!(matches!(
            adapter.rasterize(1, &options()).await,
            Err(DocumentError::PageNotFound(1))
        ));
    }

    #[test]
    fn test_placeholder_size_swaps_on_quarter_turns() {
        let layout = LayoutBox {
            width: 800.0,
            height: 1200.0,
            em: 12.0,
        };
        let mut options = options();
        assert_eq!(placeholder_size(layout, &options), (800, 1200));
        options.rotation = Rotation::Deg270;
        assert_eq!(placeholder_size(layout, &options), (1200, 800));
    }

    #[tokio::test]
    async fn test_spine_media_type_reaches_renderer() {
        let items = vec![
            "Prose".to_string(),
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="80" height="120"/>"#.to_string(),
        ];
        let adapter = adapter(&items, Toc::None, false).await;

        let prose = adapter.rasterize(0, &options()).await.unwrap();
        let art = adapter.rasterize(1, &options()).await.unwrap();

        assert!(String::from_utf8_lossy(&prose.data).starts_with("application/xhtml+xml\n"));
        assert!(String::from_utf8_lossy(&art.data).starts_with("image/svg+xml\n"));
    }

    #[test]
    fn test_spine_mime() {
        assert_eq!(spine_mime("image/svg+xml"), "image/svg+xml");
        assert_eq!(spine_mime("IMAGE/PNG"), "image/png");
        assert_eq!(spine_mime("application/xhtml+xml"), XHTML_MIME);
        assert_eq!(spine_mime("application/x-unknown"), XHTML_MIME);
    }

    #[tokio::test]
    async fn test_mupdf_renders_spine_items() {
        let mut items = bodies(3);
        items[2] = r#"<svg xmlns="http://www.w3.org/2000/svg" width="80" height="120"><rect width="80" height="120" fill="red"/></svg>"#.to_string();
        let adapter = EpubAdapter::open(
            Arc::new(build_epub(&items, Toc::None)),
            &config(),
            Arc::new(RenderWorkers::new(2)),
        )
        .await
        .unwrap();

        assert_eq!(adapter.page_count(), 3);
        for i in 0..2 {
            let page = adapter.rasterize(i, &options()).await.unwrap();
            assert!(!page.placeholder, "page {} fell back to a placeholder", i + 1);
            assert!(page.data.starts_with(&[0xFF, 0xD8]));
            assert_eq!((page.width, page.height), (800, 1200));
        }

        let art = adapter.rasterize(2, &options()).await.unwrap();
        assert!(!art.placeholder);
        assert_eq!((art.width, art.height), (80, 120));
    }
}
