use crate::app::AppState;
use crate::mailer::{Mailer, generate_reset_code};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Form, Json,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use lazy_static::lazy_static;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, create_dir_all};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// A dashboard account
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    /// Lower-cased e-mail, also the key in the users file
    pub email: String,

    pub display_name: String,

    /// Argon2 hash of the user's password
    pub password_hash: String,

    /// Password reset code (if a reset has been requested)
    pub reset_code: Option<String>,

    /// Expiration time for the reset code
    pub reset_code_expires: Option<SystemTime>,
}

/// Login and signup form data
#[derive(Debug, Serialize, Deserialize)]
pub struct UserCredentials {
    pub email: String,

    /// Only used at signup
    #[serde(default)]
    pub display_name: String,

    /// Password in plaintext (only transmitted, never stored)
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordResetConfirm {
    pub email: String,
    pub reset_code: String,
    pub new_password: String,
}

/// An authenticated browser session
#[derive(Debug, Clone)]
pub struct Session {
    /// E-mail of the signed-in user
    pub user_id: String,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

lazy_static! {
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
}

const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds
const RESET_CODE_DURATION: u64 = 60 * 60;
pub const SESSION_COOKIE: &str = "session";

fn user_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Whether `email` belongs to the configured administrator (case-insensitive)
pub fn is_admin(email: &str, admin_email: &str) -> bool {
    !email.trim().is_empty() && user_key(email) == user_key(admin_email)
}

/// Accounts kept in `users.json` under the data directory
#[derive(Debug, Clone)]
pub struct UserStore {
    path: PathBuf,
}

impl UserStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join("users.json"),
        }
    }

    /// Create the data directory and an empty users file if they don't exist
    pub fn init(&self) -> std::io::Result<()> {
        if let Some(dir) = self.path.parent() {
            create_dir_all(dir)?;
        }
        if !self.path.exists() {
            let mut file = File::create(&self.path)?;
            file.write_all(b"{}")?;
        }
        Ok(())
    }

    /// All registered users keyed by lower-cased e-mail
    ///
    /// # Returns
    /// * `Result<HashMap<String, User>, String>` - The users or an error message
    pub fn get_users(&self) -> Result<HashMap<String, User>, String> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(_) => return Err("Failed to open users file".to_string()),
        };

        let mut contents = String::new();
        if file.read_to_string(&mut contents).is_err() {
            return Err("Failed to read users file".to_string());
        }

        match serde_json::from_str(&contents) {
            Ok(users) => Ok(users),
            Err(_) => Err("Failed to parse users data".to_string()),
        }
    }

    pub fn save_users(&self, users: &HashMap<String, User>) -> Result<(), String> {
        let json = match serde_json::to_string_pretty(users) {
            Ok(json) => json,
            Err(_) => return Err("Failed to serialize users data".to_string()),
        };

        if fs::write(&self.path, json).is_err() {
            return Err("Failed to write users data".to_string());
        }

        Ok(())
    }

    /// Register a new account
    ///
    /// # Arguments
    /// * `email` - Unique address, compared case-insensitively
    /// * `display_name` - Name shown in the dashboard; defaults to the e-mail
    /// * `password` - Plain text password (will be hashed)
    ///
    /// # Errors
    /// * The e-mail is already registered
    /// * The e-mail or password is empty
    pub fn register_user(&self, email: &str, display_name: &str, password: &str) -> Result<(), String> {
        let key = user_key(email);
        if key.is_empty() || password.is_empty() {
            return Err("Email and password cannot be empty".to_string());
        }
        if !key.contains('@') {
            return Err("Invalid email address".to_string());
        }

        let mut users = self.get_users()?;
        if users.contains_key(&key) {
            return Err("Email address is already registered".to_string());
        }

        let display_name = match display_name.trim() {
            "" => key.clone(),
            name => name.to_string(),
        };
        let user = User {
            email: key.clone(),
            display_name,
            password_hash: hash_password(password)?,
            reset_code: None,
            reset_code_expires: None,
        };

        users.insert(key, user);
        self.save_users(&users)
    }

    pub fn verify_user(&self, email: &str, password: &str) -> Result<bool, String> {
        let users = self.get_users()?;

        if let Some(user) = users.get(&user_key(email)) {
            verify_password(password, &user.password_hash)
        } else {
            Ok(false)
        }
    }

    /// Make sure the administrator can sign in, creating the account if needed
    pub fn ensure_admin(&self, email: &str, password: &str) -> Result<bool, String> {
        if self.get_users()?.contains_key(&user_key(email)) {
            return Ok(false);
        }
        self.register_user(email, "Administrator", password)?;
        info!("Created administrator account {email}");
        Ok(true)
    }

    /// Store a fresh reset code for `email`, valid for one hour
    pub fn start_password_reset(&self, email: &str) -> Result<String, String> {
        let mut users = self.get_users()?;
        let user = users
            .get_mut(&user_key(email))
            .ok_or_else(|| "Email not found".to_string())?;

        let reset_code = generate_reset_code();
        user.reset_code = Some(reset_code.clone());
        user.reset_code_expires = Some(SystemTime::now() + Duration::from_secs(RESET_CODE_DURATION));
        self.save_users(&users)?;
        Ok(reset_code)
    }

    /// Replace the password if `reset_code` matches and has not expired
    pub fn complete_password_reset(
        &self,
        email: &str,
        reset_code: &str,
        new_password: &str,
    ) -> Result<(), String> {
        if new_password.is_empty() {
            return Err("Password cannot be empty".to_string());
        }
        let mut users = self.get_users()?;
        let user = users
            .get_mut(&user_key(email))
            .ok_or_else(|| "Email not found".to_string())?;

        match (&user.reset_code, user.reset_code_expires) {
            (Some(_), Some(expires)) if SystemTime::now() > expires => {
                return Err("Reset code expired".to_string());
            }
            (Some(stored), Some(_)) if stored.as_str() != reset_code.trim() => {
                return Err("Invalid reset code".to_string());
            }
            (Some(_), Some(_)) => {}
            _ => return Err("No reset code found".to_string()),
        }

        user.password_hash = hash_password(new_password)?;
        user.reset_code = None;
        user.reset_code_expires = None;
        self.save_users(&users)
    }
}

fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err("Password hashing failed".to_string()),
    }
}

fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(hash) => hash,
        Err(_) => return Err("Invalid password hash format".to_string()),
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false), // Password didn't match
    }
}

/// Create a 24 hour session and return its id
pub fn create_session(email: &str) -> String {
    let session_id = Uuid::new_v4().to_string();
    let expires_at = SystemTime::now() + Duration::from_secs(SESSION_DURATION);

    let session = Session {
        user_id: user_key(email),
        expires_at,
    };

    let mut sessions = SESSIONS.write().unwrap();
    let now = SystemTime::now();
    sessions.retain(|_, s| s.expires_at > now);
    sessions.insert(session_id.clone(), session);

    session_id
}

/// E-mail of the session's user, if the session exists and has not expired
pub fn validate_session(session_id: &str) -> Option<String> {
    let sessions = SESSIONS.read().unwrap();

    if let Some(session) = sessions.get(session_id) {
        if session.expires_at > SystemTime::now() {
            return Some(session.user_id.clone());
        }
    }

    None
}

pub fn end_session(session_id: &str) {
    SESSIONS.write().unwrap().remove(session_id);
}

/// Signed-in user carried by the request's session cookie
pub fn current_user(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| validate_session(cookie.value()))
}

pub async fn serve_login_page() -> Html<&'static str> {
    Html(include_str!("./static/login.html"))
}

pub async fn serve_signup_page() -> Html<&'static str> {
    Html(include_str!("./static/signup.html"))
}

pub async fn serve_forgot_password_page() -> Html<&'static str> {
    Html(include_str!("./static/forgot_password.html"))
}

pub async fn serve_reset_password_page() -> Html<&'static str> {
    Html(include_str!("./static/reset_password.html"))
}

#[axum::debug_handler]
pub async fn handle_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(credentials): Form<UserCredentials>,
) -> Response {
    match state.users.verify_user(&credentials.email, &credentials.password) {
        Ok(true) => {
            let session_id = create_session(&credentials.email);
            let mut cookie = Cookie::new(SESSION_COOKIE, session_id);
            cookie.set_path("/");
            cookie.set_http_only(true);
            let target = if is_admin(&credentials.email, &state.config.admin_email) {
                "/dashboard"
            } else {
                "/"
            };
            info!("{} signed in", user_key(&credentials.email));
            (jar.add(cookie), Redirect::to(target)).into_response()
        }
        Ok(false) => Redirect::to("/login?error=Invalid+email+or+password").into_response(),
        Err(e) => {
            warn!("Login failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error").into_response()
        }
    }
}

pub async fn handle_signup(
    State(state): State<AppState>,
    Form(credentials): Form<UserCredentials>,
) -> Result<Redirect, (StatusCode, String)> {
    match state.users.register_user(
        &credentials.email,
        &credentials.display_name,
        &credentials.password,
    ) {
        Ok(_) => Ok(Redirect::to("/login?registered=true")),
        Err(e) => Err((StatusCode::BAD_REQUEST, e)),
    }
}

pub async fn handle_logout(jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        end_session(cookie.value());
    }
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");

    (jar.remove(cookie), Redirect::to("/login"))
}

/// Who is signed in, for page scripts
pub async fn session_info(State(state): State<AppState>, jar: CookieJar) -> Json<serde_json::Value> {
    let user = current_user(&jar);
    let admin = user
        .as_deref()
        .is_some_and(|u| is_admin(u, &state.config.admin_email));
    Json(serde_json::json!({ "user": user, "isAdmin": admin }))
}

/// Middleware for the dashboard and every mutating API route
///
/// Admins pass through. API calls without an admin session get 401; pages
/// redirect signed-in non-admins home and everyone else to the login page.
pub async fn require_admin(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let user = current_user(&jar);
    if let Some(email) = &user {
        if is_admin(email, &state.config.admin_email) {
            request.extensions_mut().insert(email.clone());
            return next.run(request).await;
        }
    }

    if request.uri().path().starts_with("/api/") {
        return crate::error::AppError::Unauthorized.into_response();
    }
    match user {
        Some(_) => Redirect::to("/").into_response(),
        None => Redirect::to("/login").into_response(),
    }
}

pub async fn handle_forgot_password(
    State(state): State<AppState>,
    Form(reset_req): Form<PasswordResetRequest>,
) -> impl IntoResponse {
    let Some(smtp) = state.config.smtp.clone() else {
        return Redirect::to("/forgot-password?error=Email+is+not+configured").into_response();
    };

    let reset_code = match state.users.start_password_reset(&reset_req.email) {
        Ok(code) => code,
        Err(e) => {
            return Redirect::to(&format!(
                "/forgot-password?error={}",
                urlencoding::encode(&e)
            ))
            .into_response();
        }
    };

    let to = reset_req.email.clone();
    let sent = tokio::task::spawn_blocking(move || {
        Mailer::new(&smtp)
            .and_then(|mailer| mailer.send_password_reset(&to, &reset_code))
            .map_err(|e| e.to_string())
    })
    .await;

    match sent {
        Ok(Ok(())) => Redirect::to(&format!(
            "/reset-password?email_sent=true&email={}",
            urlencoding::encode(&reset_req.email)
        ))
        .into_response(),
        Ok(Err(e)) => {
            warn!("Password reset mail failed: {e}");
            Redirect::to("/forgot-password?error=Failed+to+send+email").into_response()
        }
        Err(e) => {
            warn!("Password reset task failed: {e}");
            Redirect::to("/forgot-password?error=Server+error").into_response()
        }
    }
}

pub async fn handle_reset_password(
    State(state): State<AppState>,
    Form(reset_confirm): Form<PasswordResetConfirm>,
) -> impl IntoResponse {
    match state.users.complete_password_reset(
        &reset_confirm.email,
        &reset_confirm.reset_code,
        &reset_confirm.new_password,
    ) {
        Ok(()) => Redirect::to("/login?success=Password+reset+successful").into_response(),
        Err(e) => Redirect::to(&format!(
            "/reset-password?error={}",
            urlencoding::encode(&e)
        ))
        .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_check_ignores_case_and_whitespace() {
        assert!(is_admin(" Admin@EventEye.local ", "admin@eventeye.local"));
        assert!(!is_admin("", ""));
        assert!(!is_admin("user@x.com", "admin@eventeye.local"));
    }

    #[test]
    fn sessions_validate_until_ended() {
        let id = create_session("Someone@Example.com");
        assert_eq!(validate_session(&id).as_deref(), Some("someone@example.com"));
        end_session(&id);
        assert_eq!(validate_session(&id), None);
    }
}
