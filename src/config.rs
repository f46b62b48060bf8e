use log::{info, warn};
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Firebase Realtime Database REST endpoint
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    /// Database root, e.g. `https://project-default-rtdb.firebaseio.com`
    pub database_url: String,
    /// Database secret or ID token appended as `?auth=`
    pub auth_token: Option<String>,
}

/// EmailJS credentials used for certificate emails
#[derive(Debug, Clone, Default)]
pub struct EmailJsConfig {
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
    pub private_key: Option<String>,
    pub api_base: String,
}

impl EmailJsConfig {
    pub fn is_configured(&self) -> bool {
        !self.service_id.is_empty() && !self.template_id.is_empty() && !self.public_key.is_empty()
    }
}

/// Cloudinary account used for the second certificate backend
#[derive(Debug, Clone, Default)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub upload_preset: String,
    /// Only needed for deletes, which Cloudinary requires to be signed.
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub api_base: String,
}

impl CloudinaryConfig {
    pub fn is_configured(&self) -> bool {
        !self.cloud_name.is_empty() && !self.upload_preset.is_empty()
    }
}

/// SMTP relay for admin password reset mails
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Application configuration, built once at startup and passed down explicitly
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub firebase: Option<FirebaseConfig>,
    pub emailjs: EmailJsConfig,
    pub cloudinary: CloudinaryConfig,
    pub smtp: Option<SmtpConfig>,
    pub admin_email: String,
    pub admin_password: Option<String>,
    pub default_event_id: String,
    pub event_title: String,
    pub organizer: String,
    pub verify_base_url: String,
    /// TTF font embedded when a certificate uses a non-Latin string table
    pub unicode_font: Option<PathBuf>,
    /// Pause between consecutive outbound calls in bulk operations
    pub send_delay: Duration,
    pub sync_interval: Duration,
    /// `None` keeps retrying failed offline actions forever
    pub offline_max_retries: Option<u32>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            data_dir: PathBuf::from("database"),
            firebase: None,
            emailjs: EmailJsConfig {
                api_base: "https://api.emailjs.com".to_string(),
                ..EmailJsConfig::default()
            },
            cloudinary: CloudinaryConfig {
                api_base: "https://api.cloudinary.com".to_string(),
                ..CloudinaryConfig::default()
            },
            smtp: None,
            admin_email: "admin@eventeye.local".to_string(),
            admin_password: None,
            default_event_id: "demo-event".to_string(),
            event_title: "EventEye Hackathon 2024".to_string(),
            organizer: "EventEye".to_string(),
            verify_base_url: "https://eventeye.example.com/verify".to_string(),
            unicode_font: None,
            send_delay: Duration::from_millis(1000),
            sync_interval: Duration::from_secs(30),
            offline_max_retries: None,
        }
    }
}

impl AppConfig {
    /// Build the configuration from the environment (and `.env` if present)
    pub fn from_env() -> Self {
        if dotenvy::dotenv().is_ok() {
            info!("Loaded environment overrides from .env");
        }

        let defaults = AppConfig::default();

        let firebase = var("FIREBASE_DATABASE_URL").map(|url| FirebaseConfig {
            database_url: url.trim_end_matches('/').to_string(),
            auth_token: var("FIREBASE_AUTH_TOKEN"),
        });
        if firebase.is_none() {
            info!("FIREBASE_DATABASE_URL not set, using the local document store");
        }

        let smtp = match (var("SMTP_HOST"), var("SMTP_USERNAME"), var("SMTP_PASSWORD")) {
            (Some(host), Some(username), Some(password)) => Some(SmtpConfig {
                port: try_load("SMTP_PORT", 465),
                from: var("SMTP_FROM").unwrap_or_else(|| format!("EventEye <{username}>")),
                host,
                username,
                password,
            }),
            _ => None,
        };

        let config = Self {
            bind_addr: try_load("EVENTEYE_BIND", defaults.bind_addr),
            data_dir: PathBuf::from(try_load::<String>(
                "EVENTEYE_DATA_DIR",
                defaults.data_dir.to_string_lossy().into_owned(),
            )),
            firebase,
            emailjs: EmailJsConfig {
                service_id: var("EMAILJS_SERVICE_ID").unwrap_or_default(),
                template_id: var("EMAILJS_TEMPLATE_ID").unwrap_or_default(),
                public_key: var("EMAILJS_PUBLIC_KEY").unwrap_or_default(),
                private_key: var("EMAILJS_PRIVATE_KEY"),
                api_base: try_load("EMAILJS_API_BASE", defaults.emailjs.api_base),
            },
            cloudinary: CloudinaryConfig {
                cloud_name: var("CLOUDINARY_CLOUD_NAME").unwrap_or_default(),
                upload_preset: var("CLOUDINARY_UPLOAD_PRESET").unwrap_or_default(),
                api_key: var("CLOUDINARY_API_KEY"),
                api_secret: var("CLOUDINARY_API_SECRET"),
                api_base: try_load("CLOUDINARY_API_BASE", defaults.cloudinary.api_base),
            },
            smtp,
            admin_email: try_load("ADMIN_EMAIL", defaults.admin_email),
            admin_password: var("ADMIN_PASSWORD"),
            default_event_id: try_load("EVENTEYE_EVENT_ID", defaults.default_event_id),
            event_title: try_load("EVENTEYE_EVENT_TITLE", defaults.event_title),
            organizer: try_load("EVENTEYE_ORGANIZER", defaults.organizer),
            verify_base_url: try_load("EVENTEYE_VERIFY_URL", defaults.verify_base_url),
            unicode_font: var("EVENTEYE_UNICODE_FONT").map(PathBuf::from),
            send_delay: Duration::from_millis(try_load("EVENTEYE_SEND_DELAY_MS", 1000)),
            sync_interval: Duration::from_secs(try_load("EVENTEYE_SYNC_INTERVAL_SECS", 30)),
            offline_max_retries: var("EVENTEYE_OFFLINE_MAX_RETRIES").and_then(|v| {
                v.parse()
                    .map_err(|e| warn!("Invalid EVENTEYE_OFFLINE_MAX_RETRIES value: {e}"))
                    .ok()
            }),
        };

        if !config.emailjs.is_configured() {
            warn!("EmailJS is not fully configured; certificate emails will be rejected");
        }
        if !config.cloudinary.is_configured() {
            info!("Cloudinary is not configured; certificates are stored in the database only");
        }

        config
    }

    /// Verification link printed into a certificate's QR payload
    pub fn verify_url(&self, event_id: &str, participant_id: &str) -> String {
        format!(
            "{}?event={}&p={}",
            self.verify_base_url,
            urlencoding::encode(event_id),
            urlencoding::encode(participant_id)
        )
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match var(key) {
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value ({e}), using default: {default}");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_url_encodes_ids() {
        let config = AppConfig::default();
        assert_eq!(
            config.verify_url("demo event", "email:a@b_com"),
            "https://eventeye.example.com/verify?event=demo%20event&p=email%3Aa%40b_com"
        );
    }

    #[test]
    fn services_unconfigured_by_default() {
        let config = AppConfig::default();
        assert!(!config.emailjs.is_configured());
        assert!(!config.cloudinary.is_configured());
        assert!(config.firebase.is_none());
    }
}
