use crate::certificate::CertificateRequest;
use crate::config::{AppConfig, EmailJsConfig, SmtpConfig};
use crate::delivery::DeliveryState;
use crate::participant::Participant;
use crate::pdf::RenderOptions;
use crate::storage::{CertificateStorage, StoredCertificate};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};
use log::{info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::error::Error;

/// Values substituted into the EmailJS certificate template
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateEmail {
    pub to_name: String,
    pub to_email: String,
    pub event_name: String,
    pub event_date: String,
    pub organizer_name: String,
    pub event_id: String,
    pub certificate_id: String,
    #[serde(default)]
    pub firebase_url: Option<String>,
    #[serde(default)]
    pub cloudinary_url: Option<String>,
    #[serde(default)]
    pub data_url: Option<String>,
}

impl CertificateEmail {
    /// Link sent to the participant: database URL, else Cloudinary URL, else the inline data URL
    pub fn certificate_url(&self) -> String {
        [&self.firebase_url, &self.cloudinary_url, &self.data_url]
            .into_iter()
            .flatten()
            .find(|u| !u.is_empty())
            .cloned()
            .unwrap_or_default()
    }

    pub fn from_stored(stored: &StoredCertificate, to_email: &str) -> Self {
        let qr = stored.certificate.qr_payload();
        Self {
            to_name: qr.participant_name.clone(),
            to_email: to_email.to_string(),
            event_name: qr.event_title.clone(),
            event_date: qr.event_date.clone(),
            organizer_name: qr.organizer.clone(),
            event_id: qr.event_id.clone(),
            certificate_id: stored.certificate.certificate_id.clone(),
            firebase_url: stored.storage.firebase.url.clone(),
            cloudinary_url: stored.storage.cloudinary.as_ref().and_then(|c| c.url.clone()),
            data_url: Some(stored.certificate.data_url()),
        }
    }

    fn template_params(&self) -> serde_json::Value {
        json!({
            "to_name": self.to_name,
            "to_email": self.to_email,
            "event_name": self.event_name,
            "event_date": self.event_date,
            "organizer_name": self.organizer_name,
            "certificate_url": self.certificate_url(),
            "participant_name": self.to_name,
            "event_id": self.event_id,
            "from_name": self.organizer_name,
            "reply_to": self.to_email,
            "subject": format!("Your certificate for {}", self.event_name),
            "firebase_url": self.firebase_url.clone().unwrap_or_default(),
            "cloudinary_url": self.cloudinary_url.clone().unwrap_or_default(),
            "certificate_id": self.certificate_id,
        })
    }
}

/// Outcome of one email send
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
    /// Set when the mailer lacks credentials
    #[serde(default)]
    pub needs_setup: bool,
}

impl SendResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Self::default()
        }
    }

    fn failed(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(error.into()),
            needs_setup: false,
        }
    }
}

/// One participant's row in a bulk send report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSendResult {
    pub participant_id: String,
    pub name: String,
    pub email: String,
    pub certificate_id: Option<String>,
    pub result: SendResult,
}

/// Sends certificate emails through the EmailJS REST API
#[derive(Clone)]
pub struct EmailJsMailer {
    client: reqwest::Client,
    config: EmailJsConfig,
}

impl EmailJsMailer {
    pub fn new(client: reqwest::Client, config: EmailJsConfig) -> Self {
        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Send one certificate email
    ///
    /// # Arguments
    /// * `email` - Recipient and certificate details
    ///
    /// # Returns
    /// * `SendResult` - Never an error; failures are described in the result
    pub async fn send_certificate(&self, email: &CertificateEmail) -> SendResult {
        if !self.is_configured() {
            return SendResult {
                needs_setup: true,
                ..SendResult::failed(
                    "EmailJS is not configured",
                    "Set EMAILJS_SERVICE_ID, EMAILJS_TEMPLATE_ID and EMAILJS_PUBLIC_KEY",
                )
            };
        }
        if email.to_email.trim().is_empty() {
            return SendResult::failed("Email not sent", "Recipient has no email address");
        }

        let mut body = json!({
            "service_id": self.config.service_id,
            "template_id": self.config.template_id,
            "user_id": self.config.public_key,
            "template_params": email.template_params(),
        });
        if let Some(token) = &self.config.private_key {
            body["accessToken"] = json!(token);
        }

        let url = format!(
            "{}/api/v1.0/email/send",
            self.config.api_base.trim_end_matches('/')
        );
        match self.client.post(url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                info!("Certificate email sent to {}", email.to_email);
                SendResult::ok(format!("Certificate sent to {}", email.to_email))
            }
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                warn!("EmailJS rejected mail to {}: {status} {text}", email.to_email);
                SendResult::failed("Email failed", format!("{status}: {text}"))
            }
            Err(e) => {
                warn!("EmailJS request failed: {e}");
                SendResult::failed("Email failed", e.to_string())
            }
        }
    }

    /// Generate, store and email a certificate for each participant in turn
    ///
    /// Waits `config.send_delay` between participants and records a `sent` or
    /// `failed` delivery status for each one.
    pub async fn send_bulk(
        &self,
        storage: &CertificateStorage,
        participants: &[Participant],
        base: &CertificateRequest,
        options: &RenderOptions,
        config: &AppConfig,
    ) -> Vec<BulkSendResult> {
        let event_id = base
            .event
            .id
            .clone()
            .unwrap_or_else(|| config.default_event_id.clone());
        let mut results = Vec::with_capacity(participants.len());

        for (i, participant) in participants.iter().enumerate() {
            if i > 0 && !config.send_delay.is_zero() {
                tokio::time::sleep(config.send_delay).await;
            }

            let mut request = base.clone();
            request.participant.id = Some(participant.id.clone());
            request.participant.name = Some(participant.name.clone());
            request.participant.email = Some(participant.email.clone());
            request.event.id = Some(event_id.clone());
            if request.verify_url.is_none() {
                request.verify_url = Some(config.verify_url(&event_id, &participant.id));
            }

            let (certificate_id, result) = match storage.generate_and_store(&request, options).await {
                Ok(stored) => {
                    let email = CertificateEmail::from_stored(&stored, &participant.email);
                    (
                        Some(stored.certificate.certificate_id.clone()),
                        self.send_certificate(&email).await,
                    )
                }
                Err(e) => (None, SendResult::failed("Certificate generation failed", e.to_string())),
            };

            let state = if result.success {
                DeliveryState::Sent
            } else {
                DeliveryState::Failed
            };
            let meta = json!({
                "certificateId": certificate_id,
                "channel": "email",
                "error": result.error,
            });
            if let Err(e) = storage
                .db()
                .set_delivery_status(&event_id, &participant.id, state, meta)
                .await
            {
                warn!("Could not record delivery status for {}: {e}", participant.id);
            }

            results.push(BulkSendResult {
                participant_id: participant.id.clone(),
                name: participant.name.clone(),
                email: participant.email.clone(),
                certificate_id,
                result,
            });
        }

        let sent = results.iter().filter(|r| r.result.success).count();
        info!("Bulk send for {event_id}: {sent}/{} delivered", results.len());
        results
    }
}

/// SMTP mailer for account emails
pub struct Mailer {
    smtp: SmtpTransport,
    from: String,
}

impl Mailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, Box<dyn Error>> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let tls_parameters = TlsParameters::new(config.host.clone())?;

        let smtp = SmtpTransport::relay(&config.host)?
            .credentials(creds)
            .port(config.port)
            .tls(Tls::Wrapper(tls_parameters))
            .build();

        Ok(Mailer {
            smtp,
            from: config.from.clone(),
        })
    }

    pub fn send_password_reset(&self, to_email: &str, reset_code: &str) -> Result<(), Box<dyn Error>> {
        let email = Message::builder()
            .from(self.from.parse()?)
            .to(to_email.parse()?)
            .subject("EventEye password reset")
            .body(format!(
                "Your EventEye reset code is: {}\nThis code will expire in 1 hour.",
                reset_code
            ))?;

        self.smtp.send(&email)?;
        Ok(())
    }
}

pub fn generate_reset_code() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();

    (0..8)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certificate_url_prefers_database_link() {
        let mut email = CertificateEmail {
            cloudinary_url: Some("https://res.cloudinary.com/x.pdf".to_string()),
            data_url: Some("data:application/pdf;base64,AA==".to_string()),
            ..CertificateEmail::default()
        };
        assert_eq!(email.certificate_url(), "https://res.cloudinary.com/x.pdf");

        email.firebase_url = Some("https://db.example/cert.json".to_string());
        assert_eq!(email.certificate_url(), "https://db.example/cert.json");
    }

    #[test]
    fn reset_codes_are_eight_uppercase_alphanumerics() {
        let code = generate_reset_code();
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
