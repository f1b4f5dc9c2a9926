//! Freehand drawing bitmaps
//!
//! The client rasterizes its drawing canvas to RGBA. Here that bitmap is
//! validated, optionally decoded from PNG, and turned into an image XObject
//! whose alpha channel becomes a /SMask.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Document, ObjectId, Stream};

use crate::error::PdfInkError;

/// Largest accepted width or height, in pixels
pub const MAX_SIDE_PX: u32 = 16_384;

/// Decoded RGBA bitmap
#[derive(Debug, Clone, PartialEq)]
pub struct RgbaBitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbaBitmap {
    /// Wrap a raw RGBA buffer, checking it holds exactly `width * height` pixels
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, String> {
        if width == 0 || height == 0 {
            return Err(format!("bitmap has zero size ({}x{})", width, height));
        }
        if width > MAX_SIDE_PX || height > MAX_SIDE_PX {
            return Err(format!(
                "bitmap is {}x{}, larger than {} px per side",
                width,
                height,
                MAX_SIDE_PX
            ));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| format!("bitmap size {}x{} overflows", width, height))?;
        if pixels.len() != expected {
            return Err(format!(
                "pixel buffer holds {} bytes, expected {} for {}x{} RGBA",
                pixels.len(),
                expected,
                width,
                height
            ));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Decode a PNG (any color type or bit depth) into RGBA8
    pub fn from_png(bytes: &[u8]) -> Result<Self, String> {
        let mut decoder = png::Decoder::new(bytes);
        decoder.set_transformations(png::Transformations::normalize_to_color8());
        let mut reader = decoder.read_info().map_err(|e| format!("PNG: {}", e))?;

        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut buf)
            .map_err(|e| format!("PNG: {}", e))?;
        let data = &buf[..info.buffer_size()];

        let pixels: Vec<u8> = match info.color_type {
            png::ColorType::Rgba => data.to_vec(),
            png::ColorType::Rgb => data
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            png::ColorType::GrayscaleAlpha => data
                .chunks_exact(2)
                .flat_map(|p| [p[0], p[0], p[0], p[1]])
                .collect(),
            png::ColorType::Grayscale => data.iter().flat_map(|&g| [g, g, g, 255]).collect(),
            png::ColorType::Indexed => return Err("PNG: palette was not expanded".to_string()),
        };

        RgbaBitmap::new(info.width, info.height, pixels)
    }

    pub fn is_opaque(&self) -> bool {
        self.pixels.chunks_exact(4).all(|p| p[3] == 255)
    }

    /// Split into packed RGB samples and an 8-bit alpha plane
    pub fn split_alpha(&self) -> (Vec<u8>, Vec<u8>) {
        let count = self.pixels.len() / 4;
        let mut rgb = Vec::with_capacity(count * 3);
        let mut alpha = Vec::with_capacity(count);
        for pixel in self.pixels.chunks_exact(4) {
            rgb.extend_from_slice(&pixel[..3]);
            alpha.push(pixel[3]);
        }
        (rgb, alpha)
    }

    /// Add the bitmap to `doc` as an image XObject, with a soft mask unless
    /// every pixel is opaque
    pub fn add_to_document(
        &self,
        doc: &mut Document,
        compress: bool,
    ) -> Result<ObjectId, PdfInkError> {
        let (rgb, alpha) = self.split_alpha();

        let smask_id = if self.is_opaque() {
            None
        } else {
            let smask = image_stream(
                self.width,
                self.height,
                "DeviceGray",
                alpha,
                compress,
                None,
            )?;
            Some(doc.add_object(smask))
        };

        let image = image_stream(
            self.width,
            self.height,
            "DeviceRGB",
            rgb,
            compress,
            smask_id,
        )?;
        Ok(doc.add_object(image))
    }
}

fn image_stream(
    width: u32,
    height: u32,
    color_space: &str,
    samples: Vec<u8>,
    compress: bool,
    smask: Option<ObjectId>,
) -> Result<Stream, PdfInkError> {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
    };
    if let Some(smask_id) = smask {
        dict.set("SMask", smask_id);
    }

    let content = if compress {
        dict.set("Filter", "FlateDecode");
        deflate(&samples)?
    } else {
        samples
    };

    // Already compressed by hand; keep lopdf from compressing it again
    Ok(Stream::new(dict, content).with_compression(false))
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, PdfInkError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| PdfInkError::OperationError(format!("Image compression failed: {}", e)))
}
