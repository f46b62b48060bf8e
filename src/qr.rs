use crate::error::{AppError, Result};
use crate::templates::Rgb;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageBuffer, ImageOutputFormat};
use qrcode::{Color, EcLevel, QrCode};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// JSON document encoded into a certificate's QR code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub certificate_id: String,
    pub event_id: String,
    pub event_title: String,
    pub participant_name: String,
    pub participant_email: String,
    pub event_date: String,
    pub organizer: String,
    pub issued_date: String,
    pub issued_by: String,
    pub verify_url: String,
    pub status: String,
    pub certificate_type: String,
}

/// Module grid of an encoded QR symbol, without quiet zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrMatrix {
    width: usize,
    dark: Vec<bool>,
}

impl QrMatrix {
    /// Encode raw bytes with error correction level M
    pub fn encode(data: &[u8]) -> Result<Self> {
        let code = QrCode::with_error_correction_level(data, EcLevel::M)
            .map_err(|e| AppError::Render(format!("QR encoding failed: {e}")))?;
        let width = code.width();
        let dark = code
            .to_colors()
            .into_iter()
            .map(|c| c == Color::Dark)
            .collect();
        Ok(Self { width, dark })
    }

    pub fn encode_payload(payload: &QrPayload) -> Result<Self> {
        let json = serde_json::to_vec(payload)?;
        Self::encode(&json)
    }

    /// Modules per side
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.dark[y * self.width + x]
    }

    /// Horizontal runs of dark modules as `(row, first column, length)`
    ///
    /// Drawing runs instead of single modules keeps the PDF content stream small.
    pub fn dark_runs(&self) -> Vec<(usize, usize, usize)> {
        let mut runs = Vec::new();
        for y in 0..self.width {
            let mut x = 0;
            while x < self.width {
                if self.is_dark(x, y) {
                    let start = x;
                    while x < self.width && self.is_dark(x, y) {
                        x += 1;
                    }
                    runs.push((y, start, x - start));
                } else {
                    x += 1;
                }
            }
        }
        runs
    }

    /// Rasterize to PNG with `scale` pixels per module and a `margin`-module quiet zone
    pub fn render_png(&self, scale: u32, margin: u32, dark: Rgb, light: Rgb) -> Result<Vec<u8>> {
        let scale = scale.max(1);
        let side = (self.width as u32 + 2 * margin) * scale;
        let img = ImageBuffer::from_fn(side, side, |px, py| {
            let mx = (px / scale) as i64 - margin as i64;
            let my = (py / scale) as i64 - margin as i64;
            let on = mx >= 0 && my >= 0 && self.is_dark(mx as usize, my as usize);
            let c = if on { dark } else { light };
            image::Rgb([c.0, c.1, c.2])
        });

        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .map_err(|e| AppError::Render(format!("PNG encoding failed: {e}")))?;
        Ok(bytes)
    }

    /// `data:image/png;base64,...` URL for previews
    pub fn to_data_url(&self, dark: Rgb, light: Rgb) -> Result<String> {
        let png = self.render_png(8, 2, dark, light)?;
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_is_square_and_has_finder_pattern() {
        let m = QrMatrix::encode(b"CERT-123456").unwrap();
        assert!(m.width() >= 21);
        // Top-left finder corner is always dark
        assert!(m.is_dark(0, 0));
        assert!(!m.is_dark(m.width(), 0));
    }

    #[test]
    fn runs_cover_every_dark_module() {
        let m = QrMatrix::encode(b"hello").unwrap();
        let from_runs: usize = m.dark_runs().iter().map(|(_, _, len)| len).sum();
        let counted = (0..m.width())
            .flat_map(|y| (0..m.width()).map(move |x| (x, y)))
            .filter(|&(x, y)| m.is_dark(x, y))
            .count();
        assert_eq!(from_runs, counted);
    }

    #[test]
    fn png_has_signature() {
        let m = QrMatrix::encode(b"x").unwrap();
        let png = m.render_png(2, 1, Rgb(0, 0, 0), Rgb(255, 255, 255)).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
