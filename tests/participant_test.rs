use eventeye::participant::{
    NameIssue, ParticipantInput, participant_id, sanitize_key, sanitize_name, validate_name,
};
use pretty_assertions::assert_eq;

#[test]
fn id_prefers_explicit_id_then_email_then_phone() {
    let mut input = ParticipantInput::named("Asha Rao", "Asha@Example.com", "+91 98765");
    input.id = Some("p-42".to_string());
    assert_eq!(participant_id(&input), "p-42");

    input.id = Some("   ".to_string());
    assert_eq!(participant_id(&input), "email:asha@example_com");

    input.email = None;
    assert_eq!(participant_id(&input), "phone:+91 98765");
}

#[test]
fn id_without_contact_details_is_random() {
    let input = ParticipantInput::named("Asha Rao", "", "");
    let a = participant_id(&input);
    let b = participant_id(&input);
    assert_ne!(a, b);
    assert_eq!(a.len(), 36);
}

#[test]
fn same_email_yields_same_id_across_saves() {
    let first = ParticipantInput::named("Asha Rao", "asha@example.com", "").normalize(1);
    let second = ParticipantInput::named("ASHA RAO", " ASHA@example.com ", "").normalize(2);
    assert_eq!(first.id, second.id);
}

#[test]
fn normalize_trims_and_keeps_created_at() {
    let mut input = ParticipantInput::named("  Asha Rao ", " asha@example.com ", " 123 ");
    input.created_at = Some(100);
    let p = input.normalize(500);
    assert_eq!(p.name, "Asha Rao");
    assert_eq!(p.email, "asha@example.com");
    assert_eq!(p.phone, "123");
    assert_eq!((p.created_at, p.updated_at), (100, 500));
    assert!(p.meta.is_object());
}

#[test]
fn keys_lose_reserved_characters() {
    assert_eq!(sanitize_key("a.b#c$d[e]f/g"), "a_b_c_d_e_f_g");
}

#[test]
fn names_are_title_cased_with_single_spaces() {
    assert_eq!(sanitize_name("  asha    RAO "), "Asha Rao");
    assert_eq!(sanitize_name(""), "");
}

#[test]
fn validation_reports_each_problem() {
    let clean = validate_name("Asha Rao");
    assert!(clean.issues.is_empty());
    assert_eq!(clean.confidence, 1.0);

    let messy = validate_name("a5  @");
    assert_eq!(
        messy.issues,
        vec![
            NameIssue::ContainsNumbers,
            NameIssue::UnusualCharacters,
            NameIssue::ConsecutiveSpaces
        ]
    );
    assert!((messy.confidence - 0.55).abs() < 1e-6);
    assert_eq!(validate_name("A").issues, vec![NameIssue::TooShort]);
}
