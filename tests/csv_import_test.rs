use eventeye::csv_import::{load_participants_csv, parse_participants_csv};
use std::io::Write;

#[test]
fn reads_both_header_spellings_and_keeps_extra_columns() {
    let csv = "name,Email,phone,Team\nasha rao,asha@example.com,123,Red\nRavi Kumar,ravi@example.com,,Blue\n";
    let import = parse_participants_csv(csv).unwrap();

    assert_eq!(import.rows.len(), 2);
    assert_eq!(import.rows[0].name, "Asha Rao");
    assert_eq!(import.rows[0].email, "asha@example.com");
    assert_eq!(import.rows[0].phone, "123");
    assert_eq!(import.rows[1].meta["raw"]["Team"], "Blue");
}

#[test]
fn empty_file_is_rejected() {
    assert!(parse_participants_csv("").is_err());
}

#[test]
fn flagged_names_are_counted() {
    let csv = "Name,Email\nAsha Rao,a@x.com\nA,r@x.com\n";
    let import = parse_participants_csv(csv).unwrap();
    assert_eq!(import.issues_count(), 1);
    assert!(!import.rows[1].validation.issues.is_empty());
}

#[test]
fn participants_and_snapshot_follow_rows() {
    let csv = "\u{feff}Name,Email,Phone\n\nasha rao,asha@example.com,555\n";
    let import = parse_participants_csv(csv).unwrap();

    let participants = import.participants();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0].name.as_deref(), Some("Asha Rao"));

    let snapshot = import.snapshot_rows();
    assert_eq!(snapshot[0].phone, "555");
}

#[test]
fn loads_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "Name,Email").unwrap();
    writeln!(file, "\"Rao, Asha\",asha@example.com").unwrap();

    let import = load_participants_csv(file.path()).unwrap();
    assert_eq!(import.rows[0].name, "Rao, Asha");
}
