#![cfg(feature = "web")]

use eventeye::login::{UserStore, create_session, end_session, is_admin, validate_session};
use tempfile::tempdir;

fn store() -> (tempfile::TempDir, UserStore) {
    let dir = tempdir().unwrap();
    let store = UserStore::new(dir.path().join("data"));
    store.init().unwrap();
    (dir, store)
}

#[test]
fn register_then_verify() {
    let (_dir, users) = store();
    users.register_user("Asha@Example.com", "Asha", "hunter2").unwrap();

    assert!(users.verify_user("asha@example.com", "hunter2").unwrap());
    assert!(!users.verify_user("asha@example.com", "wrong").unwrap());
    assert!(!users.verify_user("nobody@example.com", "hunter2").unwrap());

    let stored = users.get_users().unwrap();
    let user = &stored["asha@example.com"];
    assert_eq!(user.display_name, "Asha");
    assert_ne!(user.password_hash, "hunter2");
}

#[test]
fn duplicate_and_invalid_signups_are_rejected() {
    let (_dir, users) = store();
    users.register_user("a@x.com", "", "pw").unwrap();
    assert_eq!(
        users.register_user("A@X.com", "", "pw").unwrap_err(),
        "Email address is already registered"
    );
    assert!(users.register_user("", "", "pw").is_err());
    assert!(users.register_user("not-an-email", "", "pw").is_err());
    assert_eq!(users.get_users().unwrap()["a@x.com"].display_name, "a@x.com");
}

#[test]
fn admin_is_created_once() {
    let (_dir, users) = store();
    assert!(users.ensure_admin("admin@eventeye.local", "pw").unwrap());
    assert!(!users.ensure_admin("ADMIN@eventeye.local", "other").unwrap());
    assert!(users.verify_user("admin@eventeye.local", "pw").unwrap());
}

#[test]
fn password_reset_flow() {
    let (_dir, users) = store();
    users.register_user("a@x.com", "", "old").unwrap();
    assert!(users.start_password_reset("missing@x.com").is_err());

    let code = users.start_password_reset("a@x.com").unwrap();
    assert_eq!(code.len(), 8);
    assert_eq!(
        users.complete_password_reset("a@x.com", "WRONG123", "new").unwrap_err(),
        "Invalid reset code"
    );

    users.complete_password_reset("a@x.com", &code, "new").unwrap();
    assert!(users.verify_user("a@x.com", "new").unwrap());
    assert!(!users.verify_user("a@x.com", "old").unwrap());
    assert_eq!(
        users.complete_password_reset("a@x.com", &code, "again").unwrap_err(),
        "No reset code found"
    );
}

#[test]
fn sessions_and_admin_check() {
    let id = create_session("Admin@EventEye.local");
    let user = validate_session(&id).unwrap();
    assert!(is_admin(&user, "admin@eventeye.local"));
    end_session(&id);
    assert!(validate_session(&id).is_none());
    assert!(validate_session("unknown").is_none());
}
