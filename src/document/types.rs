//! Core document types
//!
//! Format-agnostic types shared by the adapters, the pipeline and the page store.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use serde::{Deserialize, Serialize};

use super::error::{DocumentError, DocumentResult};

/// Document format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Epub,
}

impl DocumentFormat {
    /// Pick the format from a declared file name.
    ///
    /// Only a `.epub` suffix selects EPUB; every other name is treated as PDF.
    pub fn from_name(name: &str) -> Self {
        if name.to_lowercase().ends_with(".epub") {
            Self::Epub
        } else {
            Self::Pdf
        }
    }

    /// MIME type handed to MuPDF when opening the document
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Epub => "application/epub+zip",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Epub => "EPUB",
        }
    }
}

/// Source data for a document
#[derive(Clone)]
pub enum DocumentSource {
    /// Document loaded from owned bytes
    Bytes(Arc<Vec<u8>>),
    /// Document loaded from a local file path
    Path(PathBuf),
}

impl DocumentSource {
    /// Create source from bytes
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self::Bytes(Arc::new(data))
    }

    /// Create source from path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self::Path(path.as_ref().to_path_buf())
    }

    /// Get the document data as bytes
    ///
    /// Returns the shared buffer for in-memory sources, or reads the file.
    pub fn read_bytes(&self) -> DocumentResult<Arc<Vec<u8>>> {
        match self {
            Self::Bytes(data) => Ok(Arc::clone(data)),
            Self::Path(path) => {
                let data = std::fs::read(path).map_err(|e| {
                    DocumentError::ParseError(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Ok(Arc::new(data))
            }
        }
    }
}

impl fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(data) => write!(f, "Bytes({} bytes)", data.len()),
            Self::Path(path) => write!(f, "Path({})", path.display()),
        }
    }
}

/// A request to load one document into the viewer
#[derive(Debug, Clone)]
pub struct LoadRequest {
    /// Where the document bytes live
    pub source: DocumentSource,
    /// Declared file name, used to choose the adapter
    pub name: String,
}

impl LoadRequest {
    pub fn new(source: DocumentSource, name: impl Into<String>) -> Self {
        Self {
            source,
            name: name.into(),
        }
    }

    pub fn format(&self) -> DocumentFormat {
        DocumentFormat::from_name(&self.name)
    }
}

/// Page rotation in quarter turns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    #[serde(rename = "0")]
    Deg0,
    #[serde(rename = "90")]
    Deg90,
    #[serde(rename = "180")]
    Deg180,
    #[serde(rename = "270")]
    Deg270,
}

impl Rotation {
    /// Convert from degrees; only multiples of 90 are accepted
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Self::Deg0),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Next clockwise quarter turn
    pub fn rotate_cw(self) -> Self {
        match self {
            Self::Deg0 => Self::Deg90,
            Self::Deg90 => Self::Deg180,
            Self::Deg180 => Self::Deg270,
            Self::Deg270 => Self::Deg0,
        }
    }
}

/// Encoded image format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// Rasterization parameters for one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterOptions {
    /// Rotation applied to every page
    pub rotation: Rotation,
    /// Scale from document units to pixels
    pub scale: f32,
    /// Output encoding
    pub format: ImageFormat,
    /// Lossy encoder quality (1-100), ignored for PNG
    pub quality: u8,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            rotation: Rotation::Deg0,
            scale: 1.5,
            format: ImageFormat::Jpeg,
            quality: 75,
        }
    }
}

/// One rendered page, immutable once produced
#[derive(Clone, PartialEq, Eq)]
pub struct PageImage {
    /// Encoded image bytes
    pub data: Arc<Vec<u8>>,
    /// Encoding of `data`
    pub format: ImageFormat,
    /// Pixel width
    pub width: u32,
    /// Pixel height
    pub height: u32,
    /// Rotation the page was rendered at
    pub rotation: Rotation,
    /// True when the page stands in for content that failed to render
    pub placeholder: bool,
}

impl PageImage {
    pub fn new(data: Vec<u8>, format: ImageFormat, width: u32, height: u32, rotation: Rotation) -> Self {
        Self {
            data: Arc::new(data),
            format,
            width,
            height,
            rotation,
            placeholder: false,
        }
    }

    pub fn into_placeholder(mut self) -> Self {
        self.placeholder = true;
        self
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Encode as a `data:` URL for web presentation layers
    pub fn to_data_url(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(self.data.as_slice());
        format!("data:{};base64,{}", self.mime_type(), encoded)
    }
}

impl fmt::Debug for PageImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageImage")
            .field("bytes", &self.data.len())
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("rotation", &self.rotation)
            .field("placeholder", &self.placeholder)
            .finish()
    }
}

/// Navigable chapter marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    /// Chapter title
    pub title: String,
    /// 1-based page number in the page sequence
    pub page: usize,
}

impl Chapter {
    pub fn new(title: impl Into<String>, page: usize) -> Self {
        Self {
            title: title.into(),
            page: page.max(1),
        }
    }
}
