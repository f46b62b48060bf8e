//! Certificate storage across the document database and Cloudinary.
//!
//! Every backend call is best effort: failures become [`BackendOutcome`]s with
//! `success: false` and never discard the rendered certificate.

use crate::certificate::{
    CertificateRequest, GeneratedCertificate, generate_with_id, new_certificate_id,
};
use crate::config::CloudinaryConfig;
use crate::db::{Database, ROOT};
use crate::error::{AppError, Result};
use crate::offline::now_ms;
use crate::participant::{ParticipantInput, participant_id, sanitize_key};
use crate::pdf::RenderOptions;
use crate::qr::QrPayload;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha1::{Digest, Sha1};

const CLOUDINARY_FOLDER: &str = "eventeye-certificates";
const ID_ATTEMPTS: usize = 20;

/// Result of one backend operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendOutcome {
    pub success: bool,
    /// Record id (database) or public id (Cloudinary)
    pub id: Option<String>,
    pub url: Option<String>,
    pub path: Option<String>,
    pub error: Option<String>,
}

impl BackendOutcome {
    fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// Per-backend results of storing one certificate
///
/// `success` is true when at least one backend accepted the certificate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageFanOut {
    pub firebase: BackendOutcome,
    /// `None` when Cloudinary is not configured
    pub cloudinary: Option<BackendOutcome>,
    pub success: bool,
}

/// File record written by the database backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    pub id: String,
    pub participant_id: String,
    pub event_id: String,
    pub certificate_id: String,
    pub data_url: String,
    pub file_name: String,
    pub generated_at: i64,
    pub created_at: i64,
    pub status: String,
}

/// Descriptive record of an issued certificate, denormalized to three paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateMetadata {
    pub id: String,
    pub participant_id: String,
    pub event_id: String,
    pub participant_name: String,
    pub participant_email: String,
    pub event_title: String,
    pub event_date: String,
    pub template_id: u32,
    pub template_name: String,
    pub organizer: String,
    pub firebase_url: Option<String>,
    pub cloudinary_url: Option<String>,
    pub firebase_path: Option<String>,
    pub cloudinary_id: Option<String>,
    pub status: String,
    pub generated_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub verify_url: String,
    pub qr_code_data: Option<QrPayload>,
    pub file_size: usize,
    pub mime_type: String,
}

impl CertificateMetadata {
    /// Describe a freshly rendered certificate and where it was stored
    pub fn describe(
        certificate: &GeneratedCertificate,
        participant_id: &str,
        event_id: &str,
        fan_out: &StorageFanOut,
    ) -> Self {
        let qr = certificate.qr_payload();
        let now = now_ms();
        let cloudinary = fan_out.cloudinary.as_ref().filter(|c| c.success);
        let firebase = Some(&fan_out.firebase).filter(|f| f.success);
        Self {
            id: certificate.certificate_id.clone(),
            participant_id: participant_id.to_string(),
            event_id: event_id.to_string(),
            participant_name: qr.participant_name.clone(),
            participant_email: qr.participant_email.clone(),
            event_title: qr.event_title.clone(),
            event_date: qr.event_date.clone(),
            template_id: certificate.layout.template_id,
            template_name: certificate.layout.template_name.to_string(),
            organizer: qr.organizer.clone(),
            firebase_url: firebase.and_then(|f| f.url.clone()),
            cloudinary_url: cloudinary.and_then(|c| c.url.clone()),
            firebase_path: firebase.and_then(|f| f.path.clone()),
            cloudinary_id: cloudinary.and_then(|c| c.id.clone()),
            status: "active".to_string(),
            generated_at: now,
            created_at: now,
            updated_at: now,
            verify_url: qr.verify_url.clone(),
            qr_code_data: Some(qr.clone()),
            file_size: certificate.pdf.len(),
            mime_type: "application/pdf".to_string(),
        }
    }
}

/// Outcome of deleting from one service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceResult {
    pub service: &'static str,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CloudinaryUpload {
    pub secure_url: String,
    pub public_id: String,
}

/// Cloudinary raw-file API
pub struct CloudinaryClient {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryClient {
    pub fn new(client: reqwest::Client, config: CloudinaryConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/v1_1/{}/raw/{action}",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name
        )
    }

    /// Unsigned upload of a PDF through the configured upload preset
    pub async fn upload_pdf(&self, data_url: &str, public_id: &str) -> Result<CloudinaryUpload> {
        let form = reqwest::multipart::Form::new()
            .text("file", data_url.to_string())
            .text("upload_preset", self.config.upload_preset.clone())
            .text("public_id", public_id.to_string())
            .text("folder", CLOUDINARY_FOLDER);

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Remote {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }

    /// Signed destroy; needs an API key and secret
    pub async fn destroy(&self, public_id: &str) -> Result<()> {
        let (Some(api_key), Some(secret)) = (&self.config.api_key, &self.config.api_secret) else {
            return Err(AppError::NotConfigured("Cloudinary API key"));
        };
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(&[("public_id", public_id), ("timestamp", &timestamp)], secret);

        let form = reqwest::multipart::Form::new()
            .text("public_id", public_id.to_string())
            .text("timestamp", timestamp)
            .text("api_key", api_key.clone())
            .text("signature", signature);

        self.client
            .post(self.endpoint("destroy"))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Cloudinary request signature: SHA-1 of the sorted `key=value` pairs followed by the secret
pub fn sign(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A certificate together with where it ended up
#[derive(Debug, Clone)]
pub struct StoredCertificate {
    pub certificate: GeneratedCertificate,
    pub storage: StorageFanOut,
    pub metadata: Option<CertificateMetadata>,
    pub metadata_error: Option<String>,
}

pub fn certificate_path(id: &str) -> String {
    format!("{ROOT}/certificates/{}", sanitize_key(id))
}

pub fn event_certificates_path(event_id: &str) -> String {
    format!("{ROOT}/events/{}/certificates", sanitize_key(event_id))
}

pub fn participant_certificates_path(participant_id: &str) -> String {
    format!("{ROOT}/participants/{}/certificates", sanitize_key(participant_id))
}

#[derive(Clone)]
pub struct CertificateStorage {
    db: Database,
    cloudinary: Option<std::sync::Arc<CloudinaryClient>>,
}

impl CertificateStorage {
    /// Cloudinary is only used when `cloudinary` is configured
    pub fn new(db: Database, client: reqwest::Client, cloudinary: &CloudinaryConfig) -> Self {
        let cloudinary = cloudinary
            .is_configured()
            .then(|| std::sync::Arc::new(CloudinaryClient::new(client, cloudinary.clone())));
        Self { db, cloudinary }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn cloudinary_enabled(&self) -> bool {
        self.cloudinary.is_some()
    }

    /// Write the PDF as a data URL record under `EventEye/certificates`
    pub async fn store_in_firebase(
        &self,
        certificate: &GeneratedCertificate,
        participant_id: &str,
        event_id: &str,
    ) -> BackendOutcome {
        let now = now_ms();
        let id = sanitize_key(&format!("cert_{participant_id}_{event_id}_{now}"));
        let record = CertificateRecord {
            id: id.clone(),
            participant_id: participant_id.to_string(),
            event_id: event_id.to_string(),
            certificate_id: certificate.certificate_id.clone(),
            data_url: certificate.data_url(),
            file_name: format!("{participant_id}_{event_id}_{now}.pdf"),
            generated_at: now,
            created_at: now,
            status: "active".to_string(),
        };
        let path = certificate_path(&id);

        let value = match serde_json::to_value(&record) {
            Ok(v) => v,
            Err(e) => return BackendOutcome::failed(e),
        };
        match self.db.set(&path, value).await {
            Ok(outcome) => {
                if outcome.is_queued() {
                    info!("Certificate record {id} queued for later upload");
                }
                BackendOutcome {
                    success: true,
                    url: self.db.url_for(&path),
                    id: Some(id),
                    path: Some(path),
                    error: None,
                }
            }
            Err(e) => {
                warn!("Database certificate store failed: {e}");
                BackendOutcome::failed(e)
            }
        }
    }

    pub async fn upload_to_cloudinary(
        &self,
        certificate: &GeneratedCertificate,
        participant_id: &str,
        event_id: &str,
    ) -> BackendOutcome {
        let Some(cloudinary) = &self.cloudinary else {
            return BackendOutcome::failed("Cloudinary configuration incomplete");
        };
        let public_id = format!(
            "{}/{}_{}",
            sanitize_key(event_id),
            sanitize_key(participant_id),
            now_ms()
        );
        match cloudinary.upload_pdf(&certificate.data_url(), &public_id).await {
            Ok(upload) => BackendOutcome {
                success: true,
                id: Some(upload.public_id),
                url: Some(upload.secure_url),
                path: None,
                error: None,
            },
            Err(e) => {
                warn!("Cloudinary upload failed: {e}");
                BackendOutcome::failed(e)
            }
        }
    }

    /// Store in the database and, when configured, in Cloudinary
    pub async fn store_in_both(
        &self,
        certificate: &GeneratedCertificate,
        participant_id: &str,
        event_id: &str,
    ) -> StorageFanOut {
        let firebase = self
            .store_in_firebase(certificate, participant_id, event_id)
            .await;
        let cloudinary = match self.cloudinary {
            Some(_) => Some(
                self.upload_to_cloudinary(certificate, participant_id, event_id)
                    .await,
            ),
            None => None,
        };
        let success = firebase.success || cloudinary.as_ref().is_some_and(|c| c.success);
        StorageFanOut {
            firebase,
            cloudinary,
            success,
        }
    }

    /// Draw certificate ids until one is not yet in use
    ///
    /// When the database cannot be read the first id drawn is used;
    /// [`save_metadata`](Self::save_metadata) still refuses to overwrite another certificate.
    pub async fn reserve_certificate_id(&self) -> Result<String> {
        for _ in 0..ID_ATTEMPTS {
            let id = new_certificate_id();
            match self.db.get(&certificate_path(&id)).await {
                Ok(None) => return Ok(id),
                Ok(Some(_)) => debug!("Certificate id {id} taken, drawing another"),
                Err(e) => {
                    warn!("Could not check certificate id {id}: {e}");
                    return Ok(id);
                }
            }
        }
        Err(AppError::Storage("No free certificate id found".to_string()))
    }

    /// Write metadata to the certificate, event and participant collections
    ///
    /// Fails with [`AppError::Conflict`] when the id already belongs to a
    /// certificate of another participant or event.
    pub async fn save_metadata(&self, metadata: &CertificateMetadata) -> Result<()> {
        let value = serde_json::to_value(metadata)?;
        let id = sanitize_key(&metadata.id);

        if let Ok(Some(existing)) = self.db.get(&certificate_path(&id)).await {
            let same = |k: &str, v: &str| existing.get(k).and_then(Value::as_str) == Some(v);
            if !same("participantId", &metadata.participant_id) || !same("eventId", &metadata.event_id) {
                return Err(AppError::Conflict(format!(
                    "Certificate id {} is already issued",
                    metadata.id
                )));
            }
        }
        for path in [
            certificate_path(&id),
            format!("{}/{id}", event_certificates_path(&metadata.event_id)),
            format!(
                "{}/{id}",
                participant_certificates_path(&metadata.participant_id)
            ),
        ] {
            self.db.set(&path, value.clone()).await?;
        }
        Ok(())
    }

    pub async fn get_certificate(&self, id: &str) -> Result<Value> {
        self.db
            .get(&certificate_path(id))
            .await?
            .ok_or_else(|| AppError::NotFound("Certificate not found".to_string()))
    }

    pub async fn certificates_by_event(&self, event_id: &str) -> Result<Vec<CertificateMetadata>> {
        let Some(Value::Object(map)) = self.db.get(&event_certificates_path(event_id)).await? else {
            return Ok(Vec::new());
        };
        Ok(map
            .into_iter()
            .filter_map(|(id, v)| {
                serde_json::from_value(v)
                    .map_err(|e| warn!("Skipping malformed certificate {id}: {e}"))
                    .ok()
            })
            .collect())
    }

    /// Remove a certificate from every location it was written to
    ///
    /// The main record is read first so the event and participant copies and
    /// the PDF record can be located before it disappears.
    pub async fn delete_certificate(
        &self,
        id: &str,
        cloudinary_id: Option<&str>,
    ) -> Vec<ServiceResult> {
        let mut results = Vec::new();

        let db_result: Result<()> = async {
            let path = certificate_path(id);
            let existing = self.db.get(&path).await?;
            self.db.remove(&path).await?;
            if let Some(record) = existing {
                let field = |k: &str| record.get(k).and_then(Value::as_str).map(str::to_string);
                if let Some(event_id) = field("eventId") {
                    self.db
                        .remove(&format!("{}/{}", event_certificates_path(&event_id), sanitize_key(id)))
                        .await?;
                }
                if let Some(participant_id) = field("participantId") {
                    self.db
                        .remove(&format!(
                            "{}/{}",
                            participant_certificates_path(&participant_id),
                            sanitize_key(id)
                        ))
                        .await?;
                }
                if let Some(pdf_path) = field("firebasePath").filter(|p| *p != path) {
                    self.db.remove(&pdf_path).await?;
                }
            }
            Ok(())
        }
        .await;
        results.push(ServiceResult {
            service: "firebase_realtime",
            success: db_result.is_ok(),
            error: db_result.err().map(|e| e.to_string()),
        });

        if let (Some(public_id), Some(cloudinary)) = (cloudinary_id, &self.cloudinary) {
            let r = cloudinary.destroy(public_id).await;
            results.push(ServiceResult {
                service: "cloudinary",
                success: r.is_ok(),
                error: r.err().map(|e| e.to_string()),
            });
        }
        results
    }

    /// Render a certificate, then store it and its metadata
    ///
    /// A request without a participant id gets the derived one (email, then
    /// phone, then a random UUID). Storage problems are reported inside the
    /// result; only rendering and id allocation failures are returned as errors.
    pub async fn generate_and_store(
        &self,
        request: &CertificateRequest,
        options: &RenderOptions,
    ) -> Result<StoredCertificate> {
        let participant_id = participant_id(&ParticipantInput {
            id: request.participant.id.clone(),
            name: request.participant.name.clone(),
            email: request.participant.email.clone(),
            ..ParticipantInput::default()
        });
        let mut request = request.clone();
        request.participant.id = Some(participant_id.clone());

        let certificate_id = self.reserve_certificate_id().await?;
        let today = chrono::Local::now().date_naive();
        let certificate = generate_with_id(&request, &certificate_id, today, options)?;
        let event_id = certificate.qr_payload().event_id.clone();

        let storage = self
            .store_in_both(&certificate, &participant_id, &event_id)
            .await;
        let metadata = CertificateMetadata::describe(&certificate, &participant_id, &event_id, &storage);
        let (metadata, metadata_error) = match self.save_metadata(&metadata).await {
            Ok(()) => (Some(metadata), None),
            Err(e) => {
                warn!("Saving metadata for {} failed: {e}", certificate.certificate_id);
                (None, Some(e.to_string()))
            }
        };

        info!(
            "Certificate {} generated (database: {}, cloudinary: {})",
            certificate.certificate_id,
            storage.firebase.success,
            storage
                .cloudinary
                .as_ref()
                .map_or("off", |c| if c.success { "ok" } else { "failed" })
        );

        Ok(StoredCertificate {
            certificate,
            storage,
            metadata,
            metadata_error,
        })
    }
}

/// Event-level summary used by the dashboard
pub fn summarize(certificates: &[CertificateMetadata]) -> Value {
    let in_cloudinary = certificates
        .iter()
        .filter(|c| c.cloudinary_url.is_some())
        .count();
    json!({
        "total": certificates.len(),
        "inCloudinary": in_cloudinary,
        "databaseOnly": certificates.len() - in_cloudinary,
    })
}
