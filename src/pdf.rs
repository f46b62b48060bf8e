use crate::certificate::{CertificateLayout, DrawOp};
use crate::error::{AppError, Result};
use crate::metrics::FontStyle;
use crate::templates::Rgb;
use log::warn;
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Polygon, Pt,
};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

/// Knobs for the PDF encoding stage
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// TrueType font used for every face when the layout's language is not Latin
    pub unicode_font: Option<PathBuf>,
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
}

impl Fonts {
    fn load(doc: &PdfDocumentReference, layout: &CertificateLayout, options: &RenderOptions) -> Result<Self> {
        if !layout.language.is_latin() {
            match &options.unicode_font {
                Some(path) => {
                    let file = File::open(path).map_err(|e| {
                        AppError::Render(format!("Cannot open font {}: {e}", path.display()))
                    })?;
                    let font = doc.add_external_font(BufReader::new(file))?;
                    return Ok(Self {
                        regular: font.clone(),
                        bold: font.clone(),
                        italic: font,
                    });
                }
                None => warn!(
                    "No Unicode font configured; {} text will not display correctly",
                    layout.language.native_name()
                ),
            }
        }

        Ok(Self {
            regular: doc.add_builtin_font(BuiltinFont::Helvetica)?,
            bold: doc.add_builtin_font(BuiltinFont::HelveticaBold)?,
            italic: doc.add_builtin_font(BuiltinFont::HelveticaOblique)?,
        })
    }

    fn get(&self, style: FontStyle) -> &IndirectFontRef {
        match style {
            FontStyle::Regular => &self.regular,
            FontStyle::Bold => &self.bold,
            FontStyle::Italic => &self.italic,
        }
    }
}

fn color(c: Rgb) -> Color {
    let (r, g, b) = c.unit();
    Color::Rgb(printpdf::Rgb::new(r, g, b, None))
}

/// Converts top-left point coordinates into PDF user space
struct Page {
    height: f32,
}

impl Page {
    fn point(&self, x: f32, y: f32) -> Point {
        Point::new(Mm::from(Pt(x)), Mm::from(Pt(self.height - y)))
    }

    fn rect(&self, x: f32, y: f32, w: f32, h: f32) -> Vec<(Point, bool)> {
        vec![
            (self.point(x, y), false),
            (self.point(x + w, y), false),
            (self.point(x + w, y + h), false),
            (self.point(x, y + h), false),
        ]
    }

    fn circle(&self, cx: f32, cy: f32, r: f32) -> Vec<(Point, bool)> {
        const SEGMENTS: usize = 32;
        (0..SEGMENTS)
            .map(|i| {
                let a = i as f32 / SEGMENTS as f32 * std::f32::consts::TAU;
                (self.point(cx + r * a.cos(), cy + r * a.sin()), false)
            })
            .collect()
    }
}

fn fill(layer: &PdfLayerReference, rings: Vec<Vec<(Point, bool)>>, c: Rgb) {
    layer.set_fill_color(color(c));
    layer.add_polygon(Polygon {
        rings,
        mode: PaintMode::Fill,
        winding_order: WindingOrder::NonZero,
    });
}

fn stroke(layer: &PdfLayerReference, points: Vec<(Point, bool)>, closed: bool, c: Rgb, thickness: f32) {
    layer.set_outline_color(color(c));
    layer.set_outline_thickness(thickness);
    layer.add_line(Line {
        points,
        is_closed: closed,
    });
}

/// Encode a certificate layout as a single-page PDF
///
/// # Arguments
/// * `layout` - Output of [`crate::certificate::layout_certificate`]
/// * `options` - Font choices
///
/// # Returns
/// * `Result<Vec<u8>>` - The PDF file contents
pub fn render_pdf(layout: &CertificateLayout, options: &RenderOptions) -> Result<Vec<u8>> {
    let (doc, page_idx, layer_idx) = PdfDocument::new(
        format!("Certificate {}", layout.certificate_id),
        Mm::from(Pt(layout.width)),
        Mm::from(Pt(layout.height)),
        "Certificate",
    );
    let fonts = Fonts::load(&doc, layout, options)?;
    let layer = doc.get_page(page_idx).get_layer(layer_idx);
    let page = Page {
        height: layout.height,
    };

    for op in &layout.ops {
        match op {
            DrawOp::FillRect { x, y, w, h, color } => {
                fill(&layer, vec![page.rect(*x, *y, *w, *h)], *color);
            }
            DrawOp::StrokeRect {
                x,
                y,
                w,
                h,
                color,
                thickness,
            } => stroke(&layer, page.rect(*x, *y, *w, *h), true, *color, *thickness),
            DrawOp::Line {
                x1,
                y1,
                x2,
                y2,
                color,
                thickness,
            } => stroke(
                &layer,
                vec![(page.point(*x1, *y1), false), (page.point(*x2, *y2), false)],
                false,
                *color,
                *thickness,
            ),
            DrawOp::Circle { cx, cy, r, color } => {
                fill(&layer, vec![page.circle(*cx, *cy, *r)], *color);
            }
            DrawOp::Text {
                text,
                x,
                y,
                size,
                font,
                color: c,
                ..
            } => {
                layer.set_fill_color(color(*c));
                layer.use_text(
                    text.as_str(),
                    *size,
                    Mm::from(Pt(*x)),
                    Mm::from(Pt(page.height - *y)),
                    fonts.get(*font),
                );
            }
            DrawOp::Qr {
                x,
                y,
                size,
                matrix,
                dark,
                light,
            } => {
                fill(&layer, vec![page.rect(*x, *y, *size, *size)], *light);
                let module = *size / matrix.width() as f32;
                let rings = matrix
                    .dark_runs()
                    .into_iter()
                    .map(|(row, col, len)| {
                        page.rect(
                            *x + col as f32 * module,
                            *y + row as f32 * module,
                            len as f32 * module,
                            module,
                        )
                    })
                    .collect();
                fill(&layer, rings, *dark);
            }
        }
    }

    Ok(doc.save_to_bytes()?)
}
