//! Errors surfaced by the share service and how they map onto HTTP.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use depot::{ArtifactId, StoreError};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::qr::QrError;

/// User-facing text for both missing and expired artifacts.
pub const NOT_FOUND_MESSAGE: &str = "File not found or has expired";

/// Why an upload was refused before anything was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NoFilePart,
    NoSelectedFile,
    TypeNotAllowed,
    Malformed(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFilePart => f.write_str("No file part"),
            Self::NoSelectedFile => f.write_str("No selected file"),
            Self::TypeNotAllowed => f.write_str("File type not allowed"),
            Self::Malformed(detail) => write!(f, "Malformed upload: {detail}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("{0}")]
    UploadRejected(Rejection),

    #[error("upload exceeds limit of {limit} bytes")]
    TooLarge { limit: u64 },

    /// Absent, or not a well-formed id.
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("artifact expired: {0}")]
    Expired(ArtifactId),

    #[error("no free artifact id after {0} attempts")]
    IdsExhausted(usize),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Qr(#[from] QrError),

    #[error("failed to render page: {0}")]
    Page(#[from] handlebars::RenderError),

    #[error("background task failed: {0}")]
    Task(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl ShareError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UploadRejected(_) => StatusCode::BAD_REQUEST,
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound(_) | Self::Expired(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::UploadRejected(_) => "bad_request",
            Self::TooLarge { .. } => "too_large",
            Self::NotFound(_) | Self::Expired(_) => "not_found",
            _ => "internal",
        }
    }

    /// What the client is told. Internal detail stays in the logs, and
    /// missing and expired look the same from outside.
    pub fn public_message(&self) -> String {
        match self {
            Self::UploadRejected(rejection) => rejection.to_string(),
            Self::TooLarge { limit } => format!("File too large (limit {})", human_bytes(*limit)),
            Self::NotFound(_) | Self::Expired(_) => NOT_FOUND_MESSAGE.to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

fn human_bytes(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MiB", bytes / MIB)
    } else {
        format!("{bytes} bytes")
    }
}

impl From<Rejection> for ShareError {
    fn from(rejection: Rejection) -> Self {
        Self::UploadRejected(rejection)
    }
}

impl IntoResponse for ShareError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = ErrorBody {
            code: self.code(),
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
