//! Configuration management for the FlipBook viewer core
//!
//! All tunables are explicit values injected once when a session is created.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::document::{DocumentFormat, ImageFormat, RasterOptions, Rotation};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub pipeline: PipelineConfig,
    pub pdf: PdfConfig,
    pub epub: EpubConfig,
    pub workers: WorkerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pages rasterized concurrently before the next cancellation check
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Scale from PDF points to pixels
    pub scale: f32,
    pub format: ImageFormat,
    pub quality: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EpubConfig {
    /// Off-screen layout surface width in points
    pub layout_width: f32,
    /// Off-screen layout surface height in points
    pub layout_height: f32,
    /// Em size for text layout
    pub em: f32,
    /// Wait between layout and capture
    pub settle_delay_ms: u64,
    pub format: ImageFormat,
    pub quality: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum MuPDF calls in flight at once
    pub max_concurrent_renders: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { batch_size: 3 }
    }
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            scale: 1.5,
            format: ImageFormat::Jpeg,
            quality: 75,
        }
    }
}

impl Default for EpubConfig {
    fn default() -> Self {
        Self {
            layout_width: 800.0,
            layout_height: 1200.0,
            em: 12.0,
            settle_delay_ms: 200,
            format: ImageFormat::Jpeg,
            quality: 85,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_renders: 3,
        }
    }
}

impl EpubConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl ViewerConfig {
    /// Build configuration from `FLIPBOOK_*` environment variables.
    ///
    /// Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        let defaults = ViewerConfig::default();

        ViewerConfig {
            pipeline: PipelineConfig {
                batch_size: env_or("FLIPBOOK_BATCH_SIZE", defaults.pipeline.batch_size),
            },
            pdf: PdfConfig {
                scale: env_or("FLIPBOOK_PDF_SCALE", defaults.pdf.scale),
                format: env_format("FLIPBOOK_PDF_FORMAT").unwrap_or(defaults.pdf.format),
                quality: env_or("FLIPBOOK_PDF_QUALITY", defaults.pdf.quality),
            },
            epub: EpubConfig {
                layout_width: env_or("FLIPBOOK_EPUB_WIDTH", defaults.epub.layout_width),
                layout_height: env_or("FLIPBOOK_EPUB_HEIGHT", defaults.epub.layout_height),
                em: env_or("FLIPBOOK_EPUB_EM", defaults.epub.em),
                settle_delay_ms: env_or(
                    "FLIPBOOK_EPUB_SETTLE_MS",
                    defaults.epub.settle_delay_ms,
                ),
                format: env_format("FLIPBOOK_EPUB_FORMAT").unwrap_or(defaults.epub.format),
                quality: env_or("FLIPBOOK_EPUB_QUALITY", defaults.epub.quality),
            },
            workers: WorkerConfig {
                max_concurrent_renders: env_or(
                    "FLIPBOOK_RENDER_WORKERS",
                    defaults.workers.max_concurrent_renders,
                ),
            },
        }
        .validated()
    }

    /// Clamp values into their usable ranges
    pub fn validated(mut self) -> Self {
        self.pipeline.batch_size = self.pipeline.batch_size.max(1);
        self.workers.max_concurrent_renders = self.workers.max_concurrent_renders.max(1);
        self.pdf.quality = self.pdf.quality.clamp(1, 100);
        self.epub.quality = self.epub.quality.clamp(1, 100);
        self.pdf.scale = self.pdf.scale.clamp(0.1, 4.0);
        if self.epub.layout_width.is_nan() || self.epub.layout_width <= 0.0 {
            self.epub.layout_width = EpubConfig::default().layout_width;
        }
        if self.epub.layout_height.is_nan() || self.epub.layout_height <= 0.0 {
            self.epub.layout_height = EpubConfig::default().layout_height;
        }
        self
    }

    /// Raster options for a run of the given format
    pub fn raster_options(&self, format: DocumentFormat, rotation: Rotation) -> RasterOptions {
        match format {
            DocumentFormat::Pdf => RasterOptions {
                rotation,
                scale: self.pdf.scale,
                format: self.pdf.format,
                quality: self.pdf.quality,
            },
            DocumentFormat::Epub => RasterOptions {
                rotation,
                scale: 1.0,
                format: self.epub.format,
                quality: self.epub.quality,
            },
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_format(key: &str) -> Option<ImageFormat> {
    match env::var(key).ok()?.to_lowercase().as_str() {
        "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
        "png" => Some(ImageFormat::Png),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_viewer_behaviour() {
        let config = ViewerConfig::default();
        assert_eq!(config.pipeline.batch_size, 3);
        assert_eq!(config.pdf.quality, 75);
        assert_eq!(config.epub.quality, 85);
        assert_eq!(config.epub.settle_delay(), Duration::from_millis(200));
        assert_eq!(config.epub.layout_width, 800.0);
        assert_eq!(config.epub.layout_height, 1200.0);
    }

    #[test]
    fn test_validated_clamps() {
        let mut config = ViewerConfig::default();
        config.pipeline.batch_size = 0;
        config.workers.max_concurrent_renders = 0;
        config.pdf.quality = 0;
        config.epub.quality = 200;
        config.pdf.scale = 10.0;
        config.epub.layout_width = -1.0;

        let config = config.validated();
        assert_eq!(config.pipeline.batch_size, 1);
        assert_eq!(config.workers.max_concurrent_renders, 1);
        assert_eq!(config.pdf.quality, 1);
        assert_eq!(config.epub.quality, 100);
        assert_eq!(config.pdf.scale, 4.0);
        assert_eq!(config.epub.layout_width, 800.0);
    }

    #[test]
    fn test_raster_options_per_format() {
        let config = ViewerConfig::default();

        let pdf = config.raster_options(DocumentFormat::Pdf, Rotation::Deg90);
        assert_eq!(pdf.scale, 1.5);
        assert_eq!(pdf.quality, 75);
        assert_eq!(pdf.rotation, Rotation::Deg90);

        let epub = config.raster_options(DocumentFormat::Epub, Rotation::Deg0);
        assert_eq!(epub.scale, 1.0);
        assert_eq!(epub.quality, 85);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ViewerConfig =
            serde_json::from_str(r#"{"pipeline": {"batch_size": 5}, "pdf": {"format": "png"}}"#)
                .unwrap();
        assert_eq!(config.pipeline.batch_size, 5);
        assert_eq!(config.pdf.format, ImageFormat::Png);
        assert_eq!(config.pdf.quality, 75);
    }
}
