use axum::{
    Extension, Json, Router,
    extract::{Multipart, Path, Query, State},
    http::{Method, StatusCode, Uri, header},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use handlebars::Handlebars;
use log::{info, warn};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::certificate::{CertificateRequest, DrawOp, generate_certificate};
use crate::config::AppConfig;
use crate::csv_import::parse_participants_csv;
use crate::db::{Database, Registration};
use crate::delivery::{Channel, DeliveryState, DeliveryStats};
use crate::error::{AppError, Result};
use crate::i18n::Language;
use crate::login::{self, UserStore};
use crate::mailer::{CertificateEmail, EmailJsMailer};
use crate::offline::{ActionExecutor, HttpExecutor, OfflineManager, spawn_background_sync};
use crate::participant::{ParticipantInput, validate_name};
use crate::pdf::RenderOptions;
use crate::storage::{CertificateStorage, summarize};
use crate::store::{DocumentStore, FileStore, FirebaseStore};
use crate::templates::templates;

const PARTICIPANT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Database,
    pub storage: CertificateStorage,
    pub mailer: EmailJsMailer,
    pub offline: Arc<OfflineManager>,
    pub executor: Arc<dyn ActionExecutor>,
    pub users: UserStore,
    pub render: RenderOptions,
    pages: Arc<Handlebars<'static>>,
}

impl AppState {
    /// Wire the services around an existing document store
    pub fn new(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        offline: Arc<OfflineManager>,
        client: reqwest::Client,
    ) -> Result<Self> {
        let db = Database::new(store, Some(offline.clone()));
        let storage = CertificateStorage::new(db.clone(), client.clone(), &config.cloudinary);
        let mailer = EmailJsMailer::new(client.clone(), config.emailjs.clone());

        let mut pages = Handlebars::new();
        pages
            .register_template_string("info", include_str!("./static/info.hbs"))
            .map_err(|e| AppError::Render(e.to_string()))?;

        Ok(Self {
            users: UserStore::new(&config.data_dir),
            render: RenderOptions {
                unicode_font: config.unicode_font.clone(),
            },
            executor: Arc::new(HttpExecutor::new(client)),
            config: Arc::new(config),
            db,
            storage,
            mailer,
            offline,
            pages: Arc::new(pages),
        })
    }

    /// Build the production state: Firebase when configured, the local file store otherwise
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let store: Arc<dyn DocumentStore> = match &config.firebase {
            Some(firebase) => {
                info!("Using Firebase at {}", firebase.database_url);
                Arc::new(FirebaseStore::new(client.clone(), firebase))
            }
            None => Arc::new(FileStore::open(config.data_dir.join("eventeye.json"))?),
        };
        let offline = Arc::new(OfflineManager::open(
            config.data_dir.join("offline.bin.gz"),
            config.offline_max_retries,
        )?);
        Self::new(config, store, offline, client)
    }

    /// Fill event, organizer and verification defaults from the configuration
    pub fn complete_request(&self, request: &mut CertificateRequest) {
        let config = &self.config;
        let event_id = request
            .event
            .id
            .get_or_insert_with(|| config.default_event_id.clone())
            .clone();
        request
            .event
            .title
            .get_or_insert_with(|| config.event_title.clone());
        request
            .organizer
            .get_or_insert_with(|| config.organizer.clone());
        if request.verify_url.is_none() {
            if let Some(pid) = request.participant.id.as_deref() {
                request.verify_url = Some(config.verify_url(&event_id, pid));
            }
        }
    }
}

/// Build the router
///
/// Pages and a few read-only endpoints are public; the dashboard and every
/// endpoint that writes or sends go through [`login::require_admin`].
pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/dashboard", get(serve_dashboard))
        .route("/api/db/test", post(test_connection))
        .route(
            "/api/events/:event/participants",
            get(list_participants)
                .post(save_participants)
                .put(update_participant),
        )
        .route("/api/csv/upload", post(upload_csv))
        .route("/api/events/:event/deliveries", get(deliveries))
        .route(
            "/api/events/:event/deliveries/:participant",
            post(set_delivery_status),
        )
        .route("/api/events/:event/queue", post(queue_send))
        .route("/api/events/:event/certificates", get(event_certificates))
        .route("/api/certificates/generate", post(generate_and_store))
        .route(
            "/api/certificates/:id",
            get(get_certificate).delete(delete_certificate),
        )
        .route("/api/email/send", post(send_email))
        .route("/api/email/bulk", post(send_bulk))
        .route("/api/offline/status", get(offline_status))
        .route("/api/offline/queue", get(offline_queue))
        .route("/api/offline/sync", post(offline_sync))
        .route("/api/offline/requeue", post(offline_requeue))
        .route("/api/offline/actions", get(user_actions))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            login::require_admin,
        ));

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/", get(serve_home))
        .route("/fill-form", get(serve_fill_form))
        .route("/about", get(serve_info_page))
        .route("/help", get(serve_info_page))
        .route("/contact", get(serve_info_page))
        .route("/support", get(serve_info_page))
        .route("/testimonials", get(serve_info_page))
        .route(
            "/login",
            get(login::serve_login_page).post(login::handle_login),
        )
        .route(
            "/signup",
            get(login::serve_signup_page).post(login::handle_signup),
        )
        .route("/logout", get(login::handle_logout))
        .route(
            "/forgot-password",
            get(login::serve_forgot_password_page).post(login::handle_forgot_password),
        )
        .route(
            "/reset-password",
            get(login::serve_reset_password_page).post(login::handle_reset_password),
        )
        .route("/api/session", get(login::session_info))
        .route("/api/templates", get(list_templates))
        .route("/api/languages", get(list_languages))
        .route("/api/validate-name", post(check_name))
        .route("/api/registrations", post(register))
        .route("/api/certificates/preview", post(preview_certificate))
        .route("/api/certificates/download", post(download_certificate))
        .route("/api/verify/:id", get(verify_certificate))
        .merge(admin)
        .nest_service("/static", ServeDir::new("static"))
        .layer(cors)
        .with_state(state)
}

/// Start the web server and block until shutdown
pub async fn run(config: AppConfig) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let bind_addr = config.bind_addr.clone();
    let sync_interval = config.sync_interval;
    let state = AppState::from_config(config)?;

    state.users.init()?;
    match &state.config.admin_password {
        Some(password) => {
            if let Err(e) = state.users.ensure_admin(&state.config.admin_email, password) {
                warn!("Could not create administrator account: {e}");
            }
        }
        None => warn!(
            "ADMIN_PASSWORD not set; {} must sign up before using the dashboard",
            state.config.admin_email
        ),
    }

    state.offline.cleanup_expired()?;
    let sync = spawn_background_sync(state.offline.clone(), state.executor.clone(), sync_interval);

    let app = router(state);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("EventEye listening on http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sync.abort();
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

// Pages

async fn serve_home() -> Html<&'static str> {
    Html(include_str!("./static/home.html"))
}

async fn serve_fill_form() -> Html<&'static str> {
    Html(include_str!("./static/fill_form.html"))
}

async fn serve_dashboard() -> Html<&'static str> {
    Html(include_str!("./static/dashboard.html"))
}

struct InfoPage {
    slug: &'static str,
    title: &'static str,
    lead: &'static str,
    sections: &'static [(&'static str, &'static str)],
}

const INFO_PAGES: &[InfoPage] = &[
    InfoPage {
        slug: "about",
        title: "About EventEye",
        lead: "EventEye helps organizers run events and hackathons from registration to certificates.",
        sections: &[
            ("Participants", "Import attendees from a CSV file, fix their names and keep one record per person."),
            ("Certificates", "Generate verifiable PDF certificates in seven designs, in English or Hindi."),
            ("Delivery", "Email certificates in bulk and follow every delivery from the dashboard."),
        ],
    },
    InfoPage {
        slug: "help",
        title: "Help",
        lead: "Answers to the questions organizers ask most.",
        sections: &[
            ("Which CSV columns are read?", "name, email and phone (any capitalization of the first letter). Other columns are kept with the participant."),
            ("How do participants verify a certificate?", "Every certificate carries a QR code with its id; scanning it opens the verification page."),
            ("What happens when I am offline?", "Writes are queued on the server and replayed automatically once the database is reachable."),
        ],
    },
    InfoPage {
        slug: "contact",
        title: "Contact",
        lead: "Reach the EventEye team.",
        sections: &[
            ("Email", "hello@eventeye.example.com"),
            ("Office hours", "Monday to Friday, 10:00 to 18:00 IST"),
        ],
    },
    InfoPage {
        slug: "support",
        title: "Support",
        lead: "Something not working? We can help.",
        sections: &[
            ("Certificates not arriving", "Check the delivery status on the dashboard and confirm EmailJS is configured."),
            ("Report a problem", "Email support@eventeye.example.com with your event id."),
        ],
    },
    InfoPage {
        slug: "testimonials",
        title: "Testimonials",
        lead: "What organizers say about EventEye.",
        sections: &[
            ("Priya, hackathon lead", "We issued four hundred certificates in one afternoon."),
            ("Rahul, college fest coordinator", "The CSV checks caught dozens of misspelled names before printing."),
        ],
    },
];

async fn serve_info_page(State(state): State<AppState>, uri: Uri) -> Result<Html<String>> {
    let page = uri.path().trim_start_matches('/');
    let info = INFO_PAGES
        .iter()
        .find(|p| p.slug == page)
        .ok_or_else(|| AppError::NotFound(format!("Page {page}")))?;
    let sections: Vec<Value> = info
        .sections
        .iter()
        .map(|(heading, body)| json!({ "heading": heading, "body": body }))
        .collect();
    let html = state
        .pages
        .render(
            "info",
            &json!({ "title": info.title, "lead": info.lead, "sections": sections }),
        )
        .map_err(|e| AppError::Render(e.to_string()))?;
    Ok(Html(html))
}

// Public API

async fn list_templates() -> Json<Value> {
    let list: Vec<Value> = templates()
        .iter()
        .map(|t| {
            json!({
                "id": t.id,
                "name": t.name,
                "description": t.description,
                "primary": t.primary.to_hex(),
                "secondary": t.secondary.to_hex(),
                "background": t.background[0].to_hex(),
            })
        })
        .collect();
    Json(json!({ "templates": list }))
}

async fn list_languages() -> Json<Value> {
    let list: Vec<Value> = Language::all()
        .iter()
        .map(|l| json!({ "code": l.code(), "name": l.native_name() }))
        .collect();
    Json(json!({ "languages": list }))
}

#[derive(Deserialize)]
struct NameCheck {
    name: String,
}

async fn check_name(Json(body): Json<NameCheck>) -> Json<Value> {
    Json(json!(validate_name(&body.name)))
}

async fn register(
    State(state): State<AppState>,
    Json(form): Json<Registration>,
) -> Result<Json<Value>> {
    if form.name.trim().is_empty() || form.email.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "Name and email are required".to_string(),
        ));
    }
    let outcome = state.db.save_registration(&form).await?;
    Ok(Json(json!({ "status": "ok", "result": outcome })))
}

async fn preview_certificate(
    State(state): State<AppState>,
    Json(mut request): Json<CertificateRequest>,
) -> Result<Json<Value>> {
    state.complete_request(&mut request);
    let cert = generate_certificate(&request, &state.render)?;
    let qr_data_url = cert.layout.ops.iter().find_map(|op| match op {
        DrawOp::Qr {
            matrix, dark, light, ..
        } => matrix.to_data_url(*dark, *light).ok(),
        _ => None,
    });
    Ok(Json(json!({
        "certificateId": cert.certificate_id,
        "fileName": cert.file_name,
        "dataUrl": cert.data_url(),
        "qrDataUrl": qr_data_url,
        "qrPayload": cert.qr_payload(),
        "templateName": cert.layout.template_name,
        "language": cert.layout.language,
    })))
}

async fn download_certificate(
    State(state): State<AppState>,
    Json(mut request): Json<CertificateRequest>,
) -> Result<Response> {
    state.complete_request(&mut request);
    let cert = generate_certificate(&request, &state.render)?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", cert.file_name),
            ),
        ],
        cert.pdf,
    )
        .into_response())
}

async fn verify_certificate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let record = state.storage.get_certificate(&id).await?;
    let status = record
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Ok(Json(json!({
        "valid": status == "active",
        "certificate": record,
    })))
}

// Admin API

async fn test_connection(State(state): State<AppState>) -> Result<Json<Value>> {
    let outcome = state.db.test_connection().await?;
    Ok(Json(json!({
        "status": "ok",
        "store": state.db.store().name(),
        "result": outcome,
    })))
}

async fn list_participants(
    State(state): State<AppState>,
    Path(event): Path<String>,
) -> Result<Json<Value>> {
    let cache_key = format!("participants:{event}");
    match state.db.list_participants(&event).await {
        Ok(list) => {
            if let Err(e) = state.offline.cache_data(
                &cache_key,
                &json!(list),
                "participants",
                PARTICIPANT_CACHE_TTL,
            ) {
                warn!("Could not cache participants: {e}");
            }
            Ok(Json(json!({ "participants": list, "cached": false })))
        }
        Err(e) if e.is_network() => match state.offline.get_cached_data(&cache_key)? {
            Some(list) => Ok(Json(json!({ "participants": list, "cached": true }))),
            None => Err(e),
        },
        Err(e) => Err(e),
    }
}

async fn save_participants(
    State(state): State<AppState>,
    Extension(user): Extension<String>,
    Path(event): Path<String>,
    Json(inputs): Json<Vec<ParticipantInput>>,
) -> Result<Json<Value>> {
    let (participants, outcome) = state.db.save_participants(&event, &inputs).await?;
    log_action(&state, &user, "save_participants", json!({ "event": event, "count": participants.len() }));
    Ok(Json(json!({ "participants": participants, "result": outcome })))
}

async fn update_participant(
    State(state): State<AppState>,
    Path(event): Path<String>,
    Json(input): Json<ParticipantInput>,
) -> Result<Json<Value>> {
    let (participant, outcome) = state.db.update_participant(&event, &input).await?;
    Ok(Json(json!({ "participant": participant, "result": outcome })))
}

#[derive(Deserialize)]
struct CsvUploadQuery {
    event: Option<String>,
    /// `event` saves participants and the snapshot, `snapshot` only the snapshot
    save: Option<String>,
}

async fn upload_csv(
    State(state): State<AppState>,
    Extension(user): Extension<String>,
    Query(query): Query<CsvUploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    let mut text = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(e.to_string()))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::InvalidInput(e.to_string()))?;
            text = Some(String::from_utf8_lossy(&bytes).into_owned());
        }
    }
    let text = text.ok_or_else(|| AppError::InvalidInput("Missing file field".to_string()))?;
    let import = parse_participants_csv(&text)?;

    let event = query
        .event
        .unwrap_or_else(|| state.config.default_event_id.clone());
    let mut saved = Vec::new();
    match query.save.as_deref() {
        Some("event") => {
            let (_, outcome) = state
                .db
                .save_participants(&event, &import.participants())
                .await?;
            saved.push(json!({ "target": "participants", "result": outcome }));
            let outcome = state.db.save_csv_data(&import.snapshot_rows()).await?;
            saved.push(json!({ "target": "snapshot", "result": outcome }));
        }
        Some("snapshot") => {
            let outcome = state.db.save_csv_data(&import.snapshot_rows()).await?;
            saved.push(json!({ "target": "snapshot", "result": outcome }));
        }
        _ => {}
    }

    log_action(&state, &user, "csv_upload", json!({ "event": event, "rows": import.rows.len() }));
    Ok(Json(json!({
        "rows": import.rows,
        "issuesCount": import.issues_count(),
        "saved": saved,
    })))
}

async fn deliveries(
    State(state): State<AppState>,
    Path(event): Path<String>,
) -> Result<Json<Value>> {
    let statuses = state.db.delivery_statuses(&event).await?;
    let stats = DeliveryStats::from_statuses(&statuses);
    Ok(Json(json!({ "statuses": statuses, "stats": stats })))
}

#[derive(Deserialize)]
struct StatusUpdate {
    status: DeliveryState,
    #[serde(default)]
    meta: Value,
}

async fn set_delivery_status(
    State(state): State<AppState>,
    Path((event, participant)): Path<(String, String)>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Value>> {
    let outcome = state
        .db
        .set_delivery_status(&event, &participant, update.status, update.meta)
        .await?;
    Ok(Json(json!({ "result": outcome })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueRequest {
    participant_id: String,
    channel: Channel,
    #[serde(default)]
    payload: Value,
}

async fn queue_send(
    State(state): State<AppState>,
    Path(event): Path<String>,
    Json(body): Json<QueueRequest>,
) -> Result<Json<Value>> {
    let outcome = state
        .db
        .queue_send_certificate(&event, &body.participant_id, body.channel, body.payload)
        .await?;
    Ok(Json(json!({ "result": outcome })))
}

async fn event_certificates(
    State(state): State<AppState>,
    Path(event): Path<String>,
) -> Result<Json<Value>> {
    let certificates = state.storage.certificates_by_event(&event).await?;
    Ok(Json(json!({
        "summary": summarize(&certificates),
        "certificates": certificates,
    })))
}

async fn generate_and_store(
    State(state): State<AppState>,
    Extension(user): Extension<String>,
    Json(mut request): Json<CertificateRequest>,
) -> Result<Json<Value>> {
    state.complete_request(&mut request);
    let stored = state
        .storage
        .generate_and_store(&request, &state.render)
        .await?;
    log_action(
        &state,
        &user,
        "generate_certificate",
        json!({ "certificateId": stored.certificate.certificate_id }),
    );
    Ok(Json(json!({
        "certificateId": stored.certificate.certificate_id,
        "fileName": stored.certificate.file_name,
        "dataUrl": stored.certificate.data_url(),
        "storage": stored.storage,
        "metadata": stored.metadata,
        "metadataError": stored.metadata_error,
    })))
}

async fn get_certificate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    Ok(Json(state.storage.get_certificate(&id).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteQuery {
    cloudinary_id: Option<String>,
}

async fn delete_certificate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Json<Value> {
    let results = state
        .storage
        .delete_certificate(&id, query.cloudinary_id.as_deref())
        .await;
    Json(json!({ "success": true, "results": results }))
}

#[derive(Deserialize)]
struct SendEmailRequest {
    #[serde(default)]
    request: CertificateRequest,
    email: String,
}

async fn send_email(
    State(state): State<AppState>,
    Json(body): Json<SendEmailRequest>,
) -> Result<Json<Value>> {
    let mut request = body.request;
    request.participant.email = Some(body.email.clone());
    state.complete_request(&mut request);

    let stored = state
        .storage
        .generate_and_store(&request, &state.render)
        .await?;
    let email = CertificateEmail::from_stored(&stored, &body.email);
    let result = state.mailer.send_certificate(&email).await;

    if let (Some(pid), Some(event)) = (&request.participant.id, &request.event.id) {
        let status = if result.success {
            DeliveryState::Sent
        } else {
            DeliveryState::Failed
        };
        let meta = json!({ "certificateId": stored.certificate.certificate_id, "channel": "email" });
        if let Err(e) = state.db.set_delivery_status(event, pid, status, meta).await {
            warn!("Could not record delivery status for {pid}: {e}");
        }
    }

    Ok(Json(json!({
        "certificateId": stored.certificate.certificate_id,
        "storage": stored.storage,
        "email": result,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkRequest {
    event_id: String,
    #[serde(default)]
    request: CertificateRequest,
    /// Restrict the send to these participants
    #[serde(default)]
    participant_ids: Option<Vec<String>>,
}

async fn send_bulk(
    State(state): State<AppState>,
    Extension(user): Extension<String>,
    Json(body): Json<BulkRequest>,
) -> Result<Json<Value>> {
    if !state.mailer.is_configured() {
        return Err(AppError::NotConfigured("EmailJS"));
    }
    let mut participants = state.db.list_participants(&body.event_id).await?;
    if let Some(ids) = &body.participant_ids {
        participants.retain(|p| ids.contains(&p.id));
    }

    let mut base = body.request;
    base.event.id = Some(body.event_id.clone());
    state.complete_request(&mut base);

    let results = state
        .mailer
        .send_bulk(&state.storage, &participants, &base, &state.render, &state.config)
        .await;
    let sent = results.iter().filter(|r| r.result.success).count();
    log_action(
        &state,
        &user,
        "bulk_send",
        json!({ "event": body.event_id, "sent": sent, "total": results.len() }),
    );
    Ok(Json(json!({
        "sent": sent,
        "failed": results.len() - sent,
        "results": results,
    })))
}

async fn offline_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "store": state.db.store().name(),
        "storage": state.offline.storage_info(),
    }))
}

async fn offline_queue(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "pending": state.offline.pending_actions(),
        "deadLetters": state.offline.dead_letters(),
    }))
}

async fn offline_sync(State(state): State<AppState>) -> Result<Json<Value>> {
    let report = state.offline.sync_pending(state.executor.as_ref()).await?;
    Ok(Json(json!({ "report": report })))
}

async fn offline_requeue(State(state): State<AppState>) -> Result<Json<Value>> {
    let requeued = state.offline.requeue_dead_letters()?;
    Ok(Json(json!({ "requeued": requeued })))
}

async fn user_actions(
    State(state): State<AppState>,
    Extension(user): Extension<String>,
) -> Json<Value> {
    let actions: Vec<Value> = state
        .offline
        .user_actions(&user, 50)
        .into_iter()
        .map(|a| {
            json!({
                "id": a.id,
                "action": a.action,
                "metadata": a.metadata_json(),
                "timestamp": a.timestamp,
            })
        })
        .collect();
    Json(json!({ "actions": actions }))
}

fn log_action(state: &AppState, user: &str, action: &str, metadata: Value) {
    if let Err(e) = state.offline.store_user_action(user, action, &metadata) {
        warn!("Could not record {action} for {user}: {e}");
    }
}
