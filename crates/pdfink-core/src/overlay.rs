//! Per-page overlay canvas
//!
//! An [`OverlayCanvas`] collects the content-stream operations for one page's
//! annotations, in draw order, together with the resources they need (fonts,
//! transparency states, images). Every record is drawn inside its own `q`/`Q`
//! pair so state never leaks from one record to the next.
//!
//! Input coordinates are top-left origin; the canvas flips them with the
//! page height. Drawing is page-relative: when the MediaBox does not start at
//! (0, 0) the whole overlay is translated by its lower-left corner.

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{Object, StringFormat};

use crate::annotation::{Annotation, PixelFormat};
use crate::color::Rgb;
use crate::encoding::encode_win_ansi;
use crate::font::StandardFont;
use crate::geometry::PageBox;
use crate::image::RgbaBitmap;

/// Bezier control distance for a quarter circle of radius 1
const KAPPA: f64 = 0.552_284_8;

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

fn name(n: &str) -> Object {
    Object::Name(n.as_bytes().to_vec())
}

fn op(operator: &str, operands: Vec<Object>) -> Operation {
    Operation::new(operator, operands)
}

fn components(c: Rgb) -> Vec<Object> {
    vec![real(c.r as f64), real(c.g as f64), real(c.b as f64)]
}

fn fill_color(c: Rgb) -> Operation {
    op("rg", components(c))
}

fn stroke_color(c: Rgb) -> Operation {
    op("RG", components(c))
}

fn finite(field: &str, v: f64) -> Result<f64, String> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("{} must be a finite number", field))
    }
}

fn non_negative(field: &str, v: f64) -> Result<f64, String> {
    if finite(field, v)? < 0.0 {
        Err(format!("{} must not be negative (got {})", field, v))
    } else {
        Ok(v)
    }
}

fn opacity(v: f64) -> Result<f64, String> {
    if v.is_finite() && (0.0..=1.0).contains(&v) {
        Ok(v)
    } else {
        Err(format!("opacity must be between 0 and 1 (got {})", v))
    }
}

fn color(field: &str, value: &str) -> Result<Rgb, String> {
    value
        .parse::<Rgb>()
        .map_err(|e| format!("{}: {}", field, e))
}

/// Finished overlay for one page, ready to be merged
#[derive(Debug, Clone)]
pub struct Overlay {
    pub content: Content,
    /// Font resource name per font
    pub fonts: BTreeMap<String, StandardFont>,
    /// ExtGState resource name per opacity
    pub alpha_states: BTreeMap<String, f64>,
    /// XObject resource name per bitmap
    pub images: Vec<(String, RgbaBitmap)>,
}

#[derive(Debug)]
pub struct OverlayCanvas {
    page: PageBox,
    prefix: String,
    operations: Vec<Operation>,
    fonts: BTreeMap<StandardFont, String>,
    alpha_states: Vec<(u64, String, f64)>,
    images: Vec<(String, RgbaBitmap)>,
    records: usize,
}

impl OverlayCanvas {
    /// `prefix` is prepended to every resource name the overlay creates; the
    /// caller picks one that is unused on the target page.
    pub fn new(page: PageBox, prefix: &str) -> Self {
        Self {
            page,
            prefix: prefix.to_string(),
            operations: Vec::new(),
            fonts: BTreeMap::new(),
            alpha_states: Vec::new(),
            images: Vec::new(),
            records: 0,
        }
    }

    pub fn page(&self) -> &PageBox {
        &self.page
    }

    /// Number of records drawn so far
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Draw one record on top of everything drawn before it.
    ///
    /// On error the canvas is left exactly as it was.
    pub fn draw(&mut self, annotation: &Annotation) -> Result<(), String> {
        let ops = match annotation {
            Annotation::Text {
                content,
                font,
                size_pt,
                color: text_color,
                x,
                y,
                ..
            } => self.text(content, font, *size_pt, text_color, *x, *y)?,
            Annotation::Line {
                x1,
                y1,
                x2,
                y2,
                color: line_color,
                width_pt,
                ..
            } => self.line((*x1, *y1), (*x2, *y2), line_color, *width_pt)?,
            Annotation::Rectangle {
                x,
                y,
                width,
                height,
                fill,
                stroke,
                opacity,
                stroke_width_pt,
                ..
            } => self.rectangle(
                (*x, *y, *width, *height),
                fill,
                stroke,
                *opacity,
                *stroke_width_pt,
            )?,
            Annotation::Circle {
                center_x,
                center_y,
                radius,
                fill,
                stroke,
                opacity,
                stroke_width_pt,
                ..
            } => self.circle(
                (*center_x, *center_y),
                *radius,
                fill,
                stroke,
                *opacity,
                *stroke_width_pt,
            )?,
            Annotation::FreeformImage {
                pixel_buffer,
                source_width_px,
                source_height_px,
                format,
                ..
            } => self.freeform(pixel_buffer, *format, *source_width_px, *source_height_px)?,
        };

        self.operations.push(op("q", vec![]));
        self.operations.extend(ops);
        self.operations.push(op("Q", vec![]));
        self.records += 1;
        Ok(())
    }

    fn text(
        &mut self,
        content: &str,
        font: &str,
        size_pt: f64,
        text_color: &str,
        x: f64,
        y: f64,
    ) -> Result<Vec<Operation>, String> {
        let font: StandardFont = font.parse().map_err(|e| format!("{}", e))?;
        let size = finite("size_pt", size_pt)?;
        if size <= 0.0 {
            return Err(format!("size_pt must be positive (got {})", size));
        }
        let rgb = color("color", text_color)?;
        let (x, y) = self.page.to_pdf(finite("x", x)?, finite("y", y)?);

        let font_name = self.font_resource(font);
        Ok(vec![
            op("BT", vec![]),
            op("Tf", vec![name(&font_name), real(size)]),
            fill_color(rgb),
            op("Td", vec![real(x), real(y)]),
            op(
                "Tj",
                vec![Object::String(
                    encode_win_ansi(content),
                    StringFormat::Literal,
                )],
            ),
            op("ET", vec![]),
        ])
    }

    fn line(
        &mut self,
        start: (f64, f64),
        end: (f64, f64),
        line_color: &str,
        width_pt: f64,
    ) -> Result<Vec<Operation>, String> {
        let rgb = color("color", line_color)?;
        let width = non_negative("width_pt", width_pt)?;
        let (x1, y1) = self
            .page
            .to_pdf(finite("x1", start.0)?, finite("y1", start.1)?);
        let (x2, y2) = self.page.to_pdf(finite("x2", end.0)?, finite("y2", end.1)?);

        Ok(vec![
            stroke_color(rgb),
            op("w", vec![real(width)]),
            op("m", vec![real(x1), real(y1)]),
            op("l", vec![real(x2), real(y2)]),
            op("S", vec![]),
        ])
    }

    fn rectangle(
        &mut self,
        (x, y, width, height): (f64, f64, f64, f64),
        fill: &str,
        stroke: &str,
        alpha: f64,
        stroke_width: f64,
    ) -> Result<Vec<Operation>, String> {
        let fill = color("fill", fill)?;
        let stroke = color("stroke", stroke)?;
        let alpha = opacity(alpha)?;
        let stroke_width = non_negative("stroke_width_pt", stroke_width)?;
        let (px, py, pw, ph) = self.page.rect_to_pdf(
            finite("x", x)?,
            finite("y", y)?,
            non_negative("width", width)?,
            non_negative("height", height)?,
        );

        let mut ops = self.paint_setup(fill, stroke, alpha, stroke_width);
        ops.push(op("re", vec![real(px), real(py), real(pw), real(ph)]));
        ops.push(paint_operator(stroke_width));
        Ok(ops)
    }

    fn circle(
        &mut self,
        center: (f64, f64),
        radius: f64,
        fill: &str,
        stroke: &str,
        alpha: f64,
        stroke_width: f64,
    ) -> Result<Vec<Operation>, String> {
        let fill = color("fill", fill)?;
        let stroke = color("stroke", stroke)?;
        let alpha = opacity(alpha)?;
        let stroke_width = non_negative("stroke_width_pt", stroke_width)?;
        let r = non_negative("radius", radius)?;
        let (cx, cy) = self
            .page
            .to_pdf(finite("center_x", center.0)?, finite("center_y", center.1)?);
        let k = r * KAPPA;

        let mut ops = self.paint_setup(fill, stroke, alpha, stroke_width);
        ops.push(op("m", vec![real(cx + r), real(cy)]));
        let curves = [
            [cx + r, cy + k, cx + k, cy + r, cx, cy + r],
            [cx - k, cy + r, cx - r, cy + k, cx - r, cy],
            [cx - r, cy - k, cx - k, cy - r, cx, cy - r],
            [cx + k, cy - r, cx + r, cy - k, cx + r, cy],
        ];
        for curve in curves {
            ops.push(op("c", curve.into_iter().map(real).collect()));
        }
        ops.push(op("h", vec![]));
        ops.push(paint_operator(stroke_width));
        Ok(ops)
    }

    fn freeform(
        &mut self,
        pixel_buffer: &[u8],
        format: PixelFormat,
        width_px: u32,
        height_px: u32,
    ) -> Result<Vec<Operation>, String> {
        let bitmap = match format {
            PixelFormat::Rgba => RgbaBitmap::new(width_px, height_px, pixel_buffer.to_vec())?,
            PixelFormat::Png => {
                let bitmap = RgbaBitmap::from_png(pixel_buffer)?;
                if (bitmap.width, bitmap.height) != (width_px, height_px) {
                    return Err(format!(
                        "PNG is {}x{}, record says {}x{}",
                        bitmap.width,
                        bitmap.height,
                        width_px,
                        height_px
                    ));
                }
                bitmap
            }
        };
        let resource = format!("{}Im{}", self.prefix, self.images.len() + 1);
        self.images.push((resource.clone(), bitmap));

        // Image space is the unit square, so scaling it to W x H is the same
        // as stretching each pixel by W / width_px and H / height_px
        Ok(vec![
            op(
                "cm",
                vec![
                    real(self.page.width),
                    real(0.0),
                    real(0.0),
                    real(self.page.height),
                    real(0.0),
                    real(0.0),
                ],
            ),
            op("Do", vec![name(&resource)]),
        ])
    }

    fn paint_setup(
        &mut self,
        fill: Rgb,
        stroke: Rgb,
        alpha: f64,
        stroke_width: f64,
    ) -> Vec<Operation> {
        let mut ops = Vec::new();
        if alpha < 1.0 {
            let gs = self.alpha_resource(alpha);
            ops.push(op("gs", vec![name(&gs)]));
        }
        ops.push(fill_color(fill));
        ops.push(stroke_color(stroke));
        if stroke_width > 0.0 {
            ops.push(op("w", vec![real(stroke_width)]));
        }
        ops
    }

    fn font_resource(&mut self, font: StandardFont) -> String {
        let next = self.fonts.len() + 1;
        let prefix = &self.prefix;
        self.fonts
            .entry(font)
            .or_insert_with(|| format!("{}F{}", prefix, next))
            .clone()
    }

    fn alpha_resource(&mut self, alpha: f64) -> String {
        let key = alpha.to_bits();
        if let Some((_, name, _)) = self.alpha_states.iter().find(|(k, _, _)| *k == key) {
            return name.clone();
        }
        let name = format!("{}GS{}", self.prefix, self.alpha_states.len() + 1);
        self.alpha_states.push((key, name.clone(), alpha));
        name
    }

    /// Wrap everything drawn so far into one content stream
    pub fn finish(self) -> Overlay {
        let mut operations = Vec::with_capacity(self.operations.len() + 3);
        operations.push(op("q", vec![]));
        if self.page.has_offset() {
            operations.push(op(
                "cm",
                vec![
                    real(1.0),
                    real(0.0),
                    real(0.0),
                    real(1.0),
                    real(self.page.origin_x),
                    real(self.page.origin_y),
                ],
            ));
        }
        operations.extend(self.operations);
        operations.push(op("Q", vec![]));

        Overlay {
            content: Content { operations },
            fonts: self
                .fonts
                .into_iter()
                .map(|(font, name)| (name, font))
                .collect(),
            alpha_states: self
                .alpha_states
                .into_iter()
                .map(|(_, name, alpha)| (name, alpha))
                .collect(),
            images: self.images,
        }
    }
}

/// Fill and stroke, or fill only when there is no outline
fn paint_operator(stroke_width: f64) -> Operation {
    if stroke_width > 0.0 {
        op("B", vec![])
    } else {
        op("f", vec![])
    }
}
