#[cfg(feature = "web")]
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors raised by the EventEye services
///
/// Storage and email outcomes are reported as data (see `storage::BackendOutcome`
/// and `mailer::SendResult`); this type covers the failures that abort an operation.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transport-level failure: the remote end was never reached.
    #[error("Network unavailable: {0}")]
    Network(String),

    #[error("Remote service returned {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Certificate rendering failed: {0}")]
    Render(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// True when the failure happened before the request reached the remote service.
    pub fn is_network(&self) -> bool {
        matches!(self, AppError::Network(_))
    }
}

#[cfg(feature = "web")]
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            AppError::Network(err.to_string())
        } else if let Some(status) = err.status() {
            AppError::Remote {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            AppError::Storage(err.to_string())
        }
    }
}

impl From<printpdf::Error> for AppError {
    fn from(err: printpdf::Error) -> Self {
        AppError::Render(err.to_string())
    }
}

#[cfg(feature = "web")]
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InvalidInput(_) | AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Network(_) | AppError::Remote { .. } => StatusCode::BAD_GATEWAY,
            AppError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Render(_) | AppError::Storage(_) | AppError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (
            status,
            Json(serde_json::json!({
                "status": "error",
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}
