/*!
# EventEye

Event and hackathon management in Rust: participant import, verifiable PDF
certificates, storage fan-out and email delivery, with an offline queue
that keeps writes safe while the database is unreachable.

## Overview

Organizers upload a participant CSV, review flagged names, then generate
certificates in one of seven designs and in English or Hindi. Every
certificate carries a QR code whose JSON payload repeats the visible
certificate id, so a scan can be checked against the stored metadata.
Certificates are written to the document database and, when configured,
uploaded to Cloudinary; participants receive a link through EmailJS.

## Architecture

### Web Layer (feature `web`)
- **Technologies**: axum, handlebars, HTML/JS pages
- **Key Components**:
  - Public pages and the registration form
  - Admin dashboard behind an argon2 + session-cookie login
  - JSON API for participants, deliveries, certificates, email and the offline queue

### Service Layer
- Certificate layout (pure draw list) and PDF rendering with printpdf
- QR payload encoding and PNG rendering
- Name validation and suggestion
- Storage fan-out with per-backend outcomes
- EmailJS mailer with sequential bulk sends

### Data Layer
- `DocumentStore` trait: Firebase REST, a local JSON file, or memory
- Offline manager: pending actions, TTL cache and user action log,
  persisted with gzip + bincode

## Modules

- **config**: Environment configuration (`AppConfig::from_env`)
- **error**: Crate-wide `AppError` and `Result`
- **participant**: Participant records, ids and name validation
- **csv_import**: Participant CSV parsing
- **delivery**: Delivery states, statistics and send jobs
- **templates**: The seven certificate color presets
- **i18n**: English and Hindi certificate strings
- **metrics**: Helvetica text widths for centering
- **qr**: QR payload and matrix rendering
- **certificate**: Certificate layout and generation
- **pdf**: Draw list to PDF
- **offline**: Offline action queue, cache and replay
- **store**, **db**: Document stores and the data access layer
- **storage**: Certificate storage fan-out and metadata
- **mailer**: EmailJS certificate mail and SMTP account mail
- **login**: Users, sessions and auth pages
- **app**: Router, handlers and server startup

## Binaries

- `website` - the web application
- `certgen` - offline certificate generator (`single` and `batch` commands)
*/

pub mod certificate;
pub mod config;
pub mod csv_import;
pub mod delivery;
pub mod error;
pub mod i18n;
pub mod metrics;
pub mod offline;
pub mod participant;
pub mod pdf;
pub mod qr;
pub mod templates;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod db;
#[cfg(feature = "web")]
pub mod login;
#[cfg(feature = "web")]
pub mod mailer;
#[cfg(feature = "web")]
pub mod storage;
#[cfg(feature = "web")]
pub mod store;

pub use certificate::{CertificateRequest, GeneratedCertificate, generate_certificate};
pub use config::AppConfig;
pub use error::{AppError, Result};
pub use pdf::RenderOptions;
