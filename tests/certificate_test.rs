use chrono::NaiveDate;
use eventeye::certificate::{
    CertificateRequest, DrawOp, PLACEHOLDER_NAME, generate_with_id, layout_certificate,
};
use eventeye::i18n::Language;
use eventeye::pdf::RenderOptions;
use eventeye::templates::{Rgb, template};
use pretty_assertions::assert_eq;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
}

#[test]
fn template_ids_select_presets_and_fall_back_to_first() {
    for id in 1..=7 {
        let mut request = CertificateRequest::for_name("Asha Rao");
        request.template_id = id;
        assert_eq!(layout_certificate(&request, "CERT-100001", day()).template_id, id);
    }
    for id in [0, 8, 99] {
        let mut request = CertificateRequest::for_name("Asha Rao");
        request.template_id = id;
        let layout = layout_certificate(&request, "CERT-100001", day());
        assert_eq!(layout.template_id, 1);
        assert_eq!(layout.template_name, template(1).name);
    }
}

#[test]
fn unknown_language_uses_english() {
    let mut request = CertificateRequest::for_name("Asha Rao");
    request.language = "fr".to_string();
    let layout = layout_certificate(&request, "CERT-100001", day());
    assert_eq!(layout.language, Language::English);
    assert!(layout.has_text(Language::English.strings().title));
}

#[test]
fn hindi_with_emerald_template() {
    let request = CertificateRequest {
        template_id: 3,
        language: "hi".to_string(),
        ..CertificateRequest::for_name("Asha Rao")
    };
    let layout = layout_certificate(&request, "CERT-123456", day());

    assert_eq!(layout.language, Language::Hindi);
    assert!(layout.has_text("भागीदारी का प्रमाणपत्र"));
    assert!(layout.has_text("Asha Rao"));

    let colors = layout.colors();
    assert!(colors.contains(&Rgb::hex(0x6ee7b7)));
    assert!(colors.contains(&Rgb::hex(0xa7f3d0)));
    assert!(!colors.contains(&template(1).primary));
}

#[test]
fn qr_payload_repeats_visible_certificate_id() {
    let layout = layout_certificate(&CertificateRequest::for_name("Asha Rao"), "CERT-654321", day());
    assert!(layout.has_text("CERT-654321"));
    assert!(layout.has_qr());
    assert_eq!(layout.qr_payload.certificate_id, "CERT-654321");
    assert_eq!(layout.qr_payload.kind, "certificate");

    let json = serde_json::to_value(&layout.qr_payload).unwrap();
    assert_eq!(json["certificateId"], "CERT-654321");
    assert_eq!(json["type"], "certificate");
}

#[test]
fn blank_name_prints_placeholder() {
    for name in ["", "   "] {
        let layout = layout_certificate(&CertificateRequest::for_name(name), "CERT-100001", day());
        assert!(layout.has_text(PLACEHOLDER_NAME));
        assert_eq!(layout.qr_payload.participant_name, PLACEHOLDER_NAME);
    }
    let layout = layout_certificate(&CertificateRequest::default(), "CERT-100001", day());
    assert_eq!(layout.participant_name, PLACEHOLDER_NAME);
}

#[test]
fn missing_event_date_uses_issue_date() {
    let layout = layout_certificate(&CertificateRequest::for_name("Asha Rao"), "CERT-100001", day());
    assert_eq!(layout.qr_payload.event_date, "March 7, 2025");
    assert_eq!(layout.qr_payload.issued_date, "March 7, 2025");
}

#[test]
fn name_is_centered_on_page() {
    let layout = layout_certificate(&CertificateRequest::for_name("Asha Rao"), "CERT-100001", day());
    let (x, width) = layout
        .ops
        .iter()
        .find_map(|op| match op {
            DrawOp::Text { text, x, width, .. } if text == "Asha Rao" => Some((*x, *width)),
            _ => None,
        })
        .unwrap();
    assert!((x + width / 2.0 - layout.width / 2.0).abs() < 1e-3);
}

#[test]
fn renders_pdf_with_matching_file_name() {
    let cert = generate_with_id(
        &CertificateRequest::for_name("Asha Rao"),
        "CERT-777777",
        day(),
        &RenderOptions::default(),
    )
    .unwrap();
    assert!(cert.pdf.starts_with(b"%PDF"));
    assert_eq!(cert.file_name, "certificate_Asha_Rao_CERT-777777.pdf");
    assert!(cert.data_url().starts_with("data:application/pdf;base64,"));
    assert_eq!(cert.qr_payload().certificate_id, "CERT-777777");
}
