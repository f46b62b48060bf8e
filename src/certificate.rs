//! Certificate layout and generation.
//!
//! Generation runs in two stages. [`layout_certificate`] is pure: it resolves
//! defaults, template and string table and produces a list of [`DrawOp`]s in
//! points on a landscape A4 page with a top-left origin. [`crate::pdf`] then
//! encodes that list into PDF bytes.

use crate::error::Result;
use crate::i18n::Language;
use crate::metrics::{FontStyle, text_width};
use crate::pdf::{RenderOptions, render_pdf};
use crate::qr::{QrMatrix, QrPayload};
use crate::templates::{CertificateTemplate, Rgb, template};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDate;
use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const PAGE_WIDTH: f32 = 841.89;
pub const PAGE_HEIGHT: f32 = 595.28;

pub const PLACEHOLDER_NAME: &str = "Participant Name";
pub const DEFAULT_EVENT_ID: &str = "DEMO-EVENT";
pub const DEFAULT_EVENT_TITLE: &str = "EventEye Event";
pub const DEFAULT_ORGANIZER: &str = "EventEye Team";
pub const DEFAULT_EMAIL: &str = "N/A";
pub const DEFAULT_VERIFY_URL: &str = "https://verify.eventeye.com";

const QR_SIZE: f32 = 100.0;
const QR_OFFSET: f32 = 80.0;
const NAME_SIZE: f32 = 42.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Display date, e.g. "March 3, 2025"
    #[serde(default)]
    pub date: Option<String>,
}

/// Everything needed to render one certificate; every field is optional
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequest {
    #[serde(default)]
    pub participant: ParticipantRef,
    #[serde(default)]
    pub event: EventInfo,
    #[serde(default)]
    pub organizer: Option<String>,
    #[serde(default)]
    pub verify_url: Option<String>,
    #[serde(default = "default_template_id")]
    pub template_id: u32,
    /// Language code, `en` or `hi`
    #[serde(default)]
    pub language: String,
}

fn default_template_id() -> u32 {
    crate::templates::DEFAULT_TEMPLATE_ID
}

impl Default for CertificateRequest {
    fn default() -> Self {
        Self {
            participant: ParticipantRef::default(),
            event: EventInfo::default(),
            organizer: None,
            verify_url: None,
            template_id: default_template_id(),
            language: "en".to_string(),
        }
    }
}

impl CertificateRequest {
    /// Request for a single name with all other fields defaulted
    pub fn for_name(name: &str) -> Self {
        Self {
            participant: ParticipantRef {
                name: Some(name.to_string()),
                ..ParticipantRef::default()
            },
            ..Self::default()
        }
    }

    pub fn language(&self) -> Language {
        Language::from_code(&self.language)
    }

    pub fn template(&self) -> &'static CertificateTemplate {
        template(self.template_id)
    }

    /// Name printed on the certificate, or the placeholder when blank
    pub fn display_name(&self) -> String {
        or_default(&self.participant.name, PLACEHOLDER_NAME)
    }
}

fn or_default(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// "Month D, YYYY"
pub fn format_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

pub fn new_certificate_id() -> String {
    format!("CERT-{}", rand::thread_rng().gen_range(100_000..1_000_000))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
}

/// One drawing primitive, coordinates in points from the top-left corner
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum DrawOp {
    FillRect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: Rgb,
    },
    StrokeRect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: Rgb,
        thickness: f32,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        color: Rgb,
        thickness: f32,
    },
    Circle {
        cx: f32,
        cy: f32,
        r: f32,
        color: Rgb,
    },
    /// `x` is the left edge of the text after alignment, `y` its baseline
    Text {
        text: String,
        x: f32,
        y: f32,
        size: f32,
        font: FontStyle,
        color: Rgb,
        align: Align,
        width: f32,
    },
    /// Dark modules of a QR symbol filling a `size` square at (`x`, `y`)
    Qr {
        x: f32,
        y: f32,
        size: f32,
        #[serde(skip)]
        matrix: QrMatrix,
        dark: Rgb,
        light: Rgb,
    },
}

/// A fully resolved certificate, ready to be encoded
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateLayout {
    pub width: f32,
    pub height: f32,
    pub certificate_id: String,
    pub template_id: u32,
    pub template_name: &'static str,
    pub language: Language,
    pub participant_name: String,
    pub qr_payload: QrPayload,
    pub ops: Vec<DrawOp>,
}

impl CertificateLayout {
    /// Every text string drawn, in drawing order
    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn has_text(&self, needle: &str) -> bool {
        self.texts().contains(&needle)
    }

    pub fn has_qr(&self) -> bool {
        self.ops.iter().any(|op| matches!(op, DrawOp::Qr { .. }))
    }

    /// Colors used by any primitive, deduplicated in first-use order
    pub fn colors(&self) -> Vec<Rgb> {
        let mut colors = Vec::new();
        for op in &self.ops {
            let color = match op {
                DrawOp::FillRect { color, .. }
                | DrawOp::StrokeRect { color, .. }
                | DrawOp::Line { color, .. }
                | DrawOp::Circle { color, .. }
                | DrawOp::Text { color, .. } => *color,
                DrawOp::Qr { dark, .. } => *dark,
            };
            if !colors.contains(&color) {
                colors.push(color);
            }
        }
        colors
    }
}

struct Canvas {
    ops: Vec<DrawOp>,
}

impl Canvas {
    fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb) {
        self.ops.push(DrawOp::FillRect { x, y, w, h, color });
    }

    fn frame(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb, thickness: f32) {
        self.ops.push(DrawOp::StrokeRect {
            x,
            y,
            w,
            h,
            color,
            thickness,
        });
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: Rgb, thickness: f32) {
        self.ops.push(DrawOp::Line {
            x1,
            y1,
            x2,
            y2,
            color,
            thickness,
        });
    }

    fn text(&mut self, text: &str, x: f32, y: f32, size: f32, font: FontStyle, color: Rgb) {
        let width = text_width(text, font, size);
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            x,
            y,
            size,
            font,
            color,
            align: Align::Left,
            width,
        });
    }

    /// Center `text` on `cx`, returning its measured width
    fn centered(&mut self, text: &str, cx: f32, y: f32, size: f32, font: FontStyle, color: Rgb) -> f32 {
        let width = text_width(text, font, size);
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            x: cx - width / 2.0,
            y,
            size,
            font,
            color,
            align: Align::Center,
            width,
        });
        width
    }
}

/// Lay out a certificate
///
/// # Arguments
/// * `request` - Participant, event and styling choices; blanks fall back to defaults
/// * `certificate_id` - Id printed in the header and embedded in the QR payload
/// * `today` - Issue date, also used as the event date when none is given
///
/// # Returns
/// * `CertificateLayout` - Drawing operations plus the resolved QR payload
pub fn layout_certificate(
    request: &CertificateRequest,
    certificate_id: &str,
    today: NaiveDate,
) -> CertificateLayout {
    let tpl = request.template();
    let language = request.language();
    let s = language.strings();

    let name = request.display_name();
    let event_id = or_default(&request.event.id, DEFAULT_EVENT_ID);
    let event_title = or_default(&request.event.title, DEFAULT_EVENT_TITLE);
    let issued_date = format_date(today);
    let event_date = or_default(&request.event.date, &issued_date);
    let organizer = or_default(&request.organizer, DEFAULT_ORGANIZER);
    let email = or_default(&request.participant.email, DEFAULT_EMAIL);
    let verify_url = or_default(&request.verify_url, DEFAULT_VERIFY_URL);

    let (w, h) = (PAGE_WIDTH, PAGE_HEIGHT);
    let mut c = Canvas { ops: Vec::new() };

    // Background and bands
    let [base, top, middle, bottom] = tpl.background;
    c.rect(0.0, 0.0, w, h, base);
    c.rect(0.0, 0.0, w, h * 0.3, top);
    c.rect(0.0, h * 0.3, w, h * 0.4, middle);
    c.rect(0.0, h * 0.7, w, h * 0.3, bottom);

    c.frame(40.0, 40.0, w - 80.0, h - 80.0, tpl.primary, 8.0);
    c.frame(60.0, 60.0, w - 120.0, h - 120.0, tpl.secondary, 4.0);

    // Header
    c.text(s.event_id_label, 80.0, 90.0, 12.0, FontStyle::Bold, tpl.secondary);
    let label_end = 80.0 + text_width(s.event_id_label, FontStyle::Bold, 12.0) + 8.0;
    c.text(&event_id, label_end.max(150.0), 90.0, 14.0, FontStyle::Bold, tpl.text);
    c.text(s.certificate_id_label, w - 280.0, 90.0, 12.0, FontStyle::Bold, tpl.primary);
    c.text(certificate_id, w - 170.0, 90.0, 14.0, FontStyle::Bold, tpl.text);

    let cx = w / 2.0;
    c.centered(s.title, cx, 140.0, 36.0, FontStyle::Bold, tpl.text);
    c.centered(s.subtitle, cx, 170.0, 18.0, FontStyle::Regular, tpl.primary);

    let name_width = c.centered(&name, cx, 230.0, NAME_SIZE, FontStyle::Bold, tpl.secondary);
    let start = (w - name_width) / 2.0;
    c.line(start, 250.0, start + name_width, 250.0, tpl.accent, 4.0);
    c.line(w * 0.2, 270.0, w * 0.8, 270.0, tpl.accent, 3.0);

    c.centered(s.participated, cx, 300.0, 16.0, FontStyle::Regular, tpl.text);
    c.centered(
        &format!("\"{event_title}\""),
        cx,
        330.0,
        22.0,
        FontStyle::Bold,
        tpl.highlight,
    );
    c.centered(&format!("{} {event_date}", s.held_on), cx, 360.0, 16.0, FontStyle::Regular, tpl.text);
    c.centered(
        &format!("{} {organizer}", s.organized_by),
        cx,
        385.0,
        16.0,
        FontStyle::Regular,
        tpl.text,
    );
    c.centered(s.achievement, cx, 410.0, 14.0, FontStyle::Italic, tpl.primary);

    for (x, y) in [
        (150.0, 180.0),
        (w - 150.0, 180.0),
        (150.0, h - 180.0),
        (w - 150.0, h - 180.0),
        (200.0, 300.0),
        (w - 200.0, 300.0),
        (200.0, h - 300.0),
        (w - 200.0, h - 300.0),
    ] {
        c.ops.push(DrawOp::Circle {
            cx: x,
            cy: y,
            r: 8.0,
            color: tpl.highlight,
        });
    }

    // Signature blocks
    let sig_y = h - 140.0;
    for (from, to, color, lines) in [
        (0.2, 0.4, tpl.primary, s.left_signature),
        (0.6, 0.8, tpl.secondary, s.right_signature),
    ] {
        c.line(w * from, sig_y, w * to, sig_y, color, 2.0);
        let mid = w * (from + to) / 2.0;
        c.centered(lines[0], mid, sig_y + 20.0, 12.0, FontStyle::Bold, color);
        c.centered(lines[1], mid, sig_y + 35.0, 10.0, FontStyle::Regular, color);
        c.centered(lines[2], mid, sig_y + 50.0, 10.0, FontStyle::Regular, color);
    }

    c.centered(s.authority, cx, h - 80.0, 12.0, FontStyle::Bold, tpl.primary);
    c.centered(s.digitally_signed, cx, h - 65.0, 10.0, FontStyle::Regular, tpl.muted);

    let qr_payload = QrPayload {
        kind: "certificate".to_string(),
        certificate_id: certificate_id.to_string(),
        event_id,
        event_title,
        participant_name: name.clone(),
        participant_email: email,
        event_date,
        organizer,
        issued_date,
        issued_by: s.authority.to_string(),
        verify_url,
        status: "Valid".to_string(),
        certificate_type: s.certificate_type.to_string(),
    };

    match QrMatrix::encode_payload(&qr_payload) {
        Ok(matrix) => {
            let qx = w - QR_SIZE - QR_OFFSET;
            let qy = h - QR_SIZE - QR_OFFSET;
            c.frame(qx - 10.0, qy - 10.0, QR_SIZE + 20.0, QR_SIZE + 20.0, tpl.accent, 2.0);
            c.ops.push(DrawOp::Qr {
                x: qx,
                y: qy,
                size: QR_SIZE,
                matrix,
                dark: Rgb::hex(0x0f172a),
                light: Rgb::hex(0xffffff),
            });
            c.centered(
                s.scan_to_verify,
                qx + QR_SIZE / 2.0,
                qy + QR_SIZE + 25.0,
                10.0,
                FontStyle::Bold,
                tpl.accent,
            );
        }
        Err(e) => warn!("Omitting QR code from {certificate_id}: {e}"),
    }

    CertificateLayout {
        width: w,
        height: h,
        certificate_id: certificate_id.to_string(),
        template_id: tpl.id,
        template_name: tpl.name,
        language,
        participant_name: name,
        qr_payload,
        ops: c.ops,
    }
}

/// A rendered certificate
#[derive(Debug, Clone)]
pub struct GeneratedCertificate {
    pub certificate_id: String,
    pub file_name: String,
    pub pdf: Vec<u8>,
    pub layout: CertificateLayout,
}

impl GeneratedCertificate {
    /// `data:application/pdf;base64,...`
    pub fn data_url(&self) -> String {
        format!("data:application/pdf;base64,{}", STANDARD.encode(&self.pdf))
    }

    pub fn qr_payload(&self) -> &QrPayload {
        &self.layout.qr_payload
    }
}

/// Suggested download name, e.g. `certificate_Asha_Rao_CERT-123456.pdf`
pub fn file_name_for(name: &str, certificate_id: &str) -> String {
    let slug: String = name
        .split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric() || *c == '-')
                .collect::<String>()
        })
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if slug.is_empty() {
        format!("certificate_{certificate_id}.pdf")
    } else {
        format!("certificate_{slug}_{certificate_id}.pdf")
    }
}

/// Render a certificate with a caller-chosen id and issue date
pub fn generate_with_id(
    request: &CertificateRequest,
    certificate_id: &str,
    today: NaiveDate,
    options: &RenderOptions,
) -> Result<GeneratedCertificate> {
    let layout = layout_certificate(request, certificate_id, today);
    let pdf = render_pdf(&layout, options)?;
    debug!(
        "Rendered {} for {} ({} bytes, template {})",
        certificate_id,
        layout.participant_name,
        pdf.len(),
        layout.template_id
    );
    Ok(GeneratedCertificate {
        certificate_id: certificate_id.to_string(),
        file_name: file_name_for(&layout.participant_name, certificate_id),
        pdf,
        layout,
    })
}

/// Render a certificate with a fresh random id, issued today
///
/// # Examples
/// ```
/// use eventeye::certificate::{CertificateRequest, generate_certificate};
/// use eventeye::pdf::RenderOptions;
///
/// let cert = generate_certificate(&CertificateRequest::for_name("Asha Rao"), &RenderOptions::default()).unwrap();
/// assert!(cert.certificate_id.starts_with("CERT-"));
/// assert!(cert.pdf.starts_with(b"%PDF"));
/// ```
pub fn generate_certificate(
    request: &CertificateRequest,
    options: &RenderOptions,
) -> Result<GeneratedCertificate> {
    let today = chrono::Local::now().date_naive();
    generate_with_id(request, &new_certificate_id(), today, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
    }

    #[test]
    fn date_has_no_leading_zero() {
        assert_eq!(format_date(day()), "March 7, 2025");
    }

    #[test]
    fn certificate_ids_have_six_digits() {
        for _ in 0..50 {
            let id = new_certificate_id();
            let digits = id.strip_prefix("CERT-").unwrap();
            assert_eq!(digits.len(), 6);
            assert!(digits.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn underline_matches_name_width() {
        let layout = layout_certificate(&CertificateRequest::for_name("Asha Rao"), "CERT-100000", day());
        let expected = text_width("Asha Rao", FontStyle::Bold, NAME_SIZE);
        let underline = layout.ops.iter().find_map(|op| match op {
            DrawOp::Line { x1, x2, y1, .. } if *y1 == 250.0 => Some(x2 - x1),
            _ => None,
        });
        assert!((underline.unwrap() - expected).abs() < 1e-3);
    }

    #[test]
    fn file_name_strips_punctuation() {
        assert_eq!(
            file_name_for("Asha  O'Rao", "CERT-1"),
            "certificate_Asha_ORao_CERT-1.pdf"
        );
        assert_eq!(file_name_for("", "CERT-1"), "certificate_CERT-1.pdf");
    }
}
