//! Raster surfaces and page encoding
//!
//! A [`RasterSurface`] owns the RGB pixel buffer a page is rendered into.
//! Encoding consumes the surface, so the buffer is released as soon as the
//! encoded bytes exist instead of accumulating across hundreds of pages.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};
use mupdf::{Colorspace, Matrix};

use crate::document::{DocumentError, DocumentResult, ImageFormat, PageImage, RasterOptions, Rotation};

/// In-memory RGB render target
pub struct RasterSurface {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

impl RasterSurface {
    /// White surface of the given size
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rgb: vec![255; (width as usize) * (height as usize) * 3],
        }
    }

    /// Copy a MuPDF pixmap into an RGB surface
    ///
    /// Pixmaps with alpha are composited over white.
    pub fn from_pixmap(pixmap: &mupdf::Pixmap) -> Self {
        let width = pixmap.width() as u32;
        let height = pixmap.height() as u32;
        let n = pixmap.n() as usize;
        Self::from_samples(width, height, n, pixmap.samples())
    }

    fn from_samples(width: u32, height: u32, n: usize, samples: &[u8]) -> Self {
        let pixels = (width as usize) * (height as usize);
        let mut rgb = Vec::with_capacity(pixels * 3);

        for i in 0..pixels {
            let offset = i * n;
            let r = samples.get(offset).copied().unwrap_or(255);
            let g = samples.get(offset + 1).copied().unwrap_or(r);
            let b = samples.get(offset + 2).copied().unwrap_or(r);
            if n >= 4 {
                let a = samples.get(offset + 3).copied().unwrap_or(255) as u16;
                // MuPDF samples are premultiplied
                let over_white = |c: u8| (c as u16 + (255 - a)).min(255) as u8;
                rgb.extend_from_slice(&[over_white(r), over_white(g), over_white(b)]);
            } else {
                rgb.extend_from_slice(&[r, g, b]);
            }
        }

        Self { width, height, rgb }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Encode and release the pixel buffer
    pub fn encode(self, format: ImageFormat, quality: u8) -> DocumentResult<Vec<u8>> {
        let img = RgbImage::from_raw(self.width, self.height, self.rgb)
            .ok_or_else(|| DocumentError::ImageError("Failed to create image buffer".to_string()))?;

        let mut output = Vec::new();
        match format {
            ImageFormat::Jpeg => {
                let mut encoder = JpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100));
                encoder.encode_image(&img)?;
            }
            ImageFormat::Png => {
                DynamicImage::ImageRgb8(img)
                    .write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)?;
            }
        }

        Ok(output)
    }

    /// Encode into a finished page image
    pub fn into_page(self, options: &RasterOptions) -> DocumentResult<PageImage> {
        let (width, height) = (self.width, self.height);
        let data = self.encode(options.format, options.quality)?;
        Ok(PageImage::new(data, options.format, width, height, options.rotation))
    }
}

/// Transformation matrix for a scale and a clockwise rotation
pub fn page_matrix(scale: f32, rotation: Rotation) -> Matrix {
    let mut matrix = Matrix::new_scale(scale, scale);
    if rotation != Rotation::Deg0 {
        let rotation_matrix = Matrix::new_rotate(rotation.degrees() as f32);
        matrix.concat(rotation_matrix);
    }
    matrix
}

/// Render one page of an open document into an RGB surface
///
/// The pixmap is dropped right after it is copied. Encoding is left to the
/// caller so it can happen after the document is closed.
pub fn render_surface(
    doc: &mupdf::Document,
    index: usize,
    options: &RasterOptions,
) -> DocumentResult<RasterSurface> {
    let page = doc.load_page(index as i32)?;
    let matrix = page_matrix(options.scale.clamp(0.1, 4.0), options.rotation);

    let colorspace = Colorspace::device_rgb();
    let pixmap = page.to_pixmap(&matrix, &colorspace, false, true)?;
    let surface = RasterSurface::from_pixmap(&pixmap);
    drop(pixmap);

    if surface.width() == 0 || surface.height() == 0 {
        return Err(DocumentError::RenderError(format!(
            "Page {} rendered to an empty surface",
            index + 1
        )));
    }

    Ok(surface)
}
