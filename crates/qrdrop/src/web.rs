//! HTTP surface.
//!
//! Browser flow: `GET /` form → `POST /upload` result page with an inline QR
//! code. Scripts use `POST /api/upload` for JSON. Downloads are served at
//! `/download/{id}` and at `/?file_id={id}&download=true`, whichever URL
//! style the QR codes carry.

pub mod pages;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use base64::prelude::{Engine as _, BASE64_STANDARD};
use bytes::Bytes;
use depot::{Payload, StoreError};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::error::{Rejection, ShareError};
use crate::qr;
use crate::share::ShareService;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared state for web handlers
#[derive(Clone)]
pub struct WebState {
    pub share: Arc<ShareService>,
    pub started_at: Instant,
    pub sweep_interval: Duration,
}

impl WebState {
    pub fn new(share: Arc<ShareService>, sweep_interval: Duration) -> Self {
        Self {
            share,
            started_at: Instant::now(),
            sweep_interval,
        }
    }

    fn ttl_minutes(&self) -> i64 {
        self.share.ttl().num_minutes()
    }
}

pub fn router(state: WebState) -> Router {
    let body_limit = usize::try_from(state.share.uploads().max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/", get(index))
        .route("/upload", get(upload_redirect).post(upload_form))
        .route("/api/upload", post(upload_api))
        .route("/download/{id}", get(download))
        .route("/qr/{id}", get(qr_code))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Run blocking store or QR work off the async runtime.
async fn blocking<T, F>(work: F) -> Result<T, ShareError>
where
    F: FnOnce() -> Result<T, ShareError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ShareError::Task(e.to_string()))?
}

#[derive(Debug, Default, Deserialize)]
struct IndexQuery {
    file_id: Option<String>,
    download: Option<String>,
}

/// Upload form, or a query-style download when `file_id` and `download` are set.
#[tracing::instrument(name = "http.index", skip(state))]
async fn index(State(state): State<WebState>, Query(query): Query<IndexQuery>) -> Response {
    if let (Some(file_id), Some(_)) = (query.file_id, query.download) {
        return serve_download(&state, file_id)
            .await
            .unwrap_or_else(IntoResponse::into_response);
    }

    match pages::index_page(
        None,
        &state.share.uploads().allowed_extensions,
        state.ttl_minutes(),
    ) {
        Ok(html) => Html(html).into_response(),
        Err(e) => ShareError::from(e).into_response(),
    }
}

async fn upload_redirect() -> Redirect {
    Redirect::to("/")
}

struct Upload {
    filename: String,
    data: Bytes,
}

/// Pull the `file` field out of a multipart body.
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
    limit: u64,
) -> Result<Upload, ShareError> {
    let mut multipart = multipart.map_err(|e| {
        debug!(error = %e, "Upload request is not multipart");
        ShareError::from(Rejection::NoFilePart)
    })?;

    let to_share_error = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ShareError::TooLarge { limit }
        } else {
            Rejection::Malformed(e.body_text()).into()
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(to_share_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(to_share_error)?;
        return Ok(Upload { filename, data });
    }

    Err(Rejection::NoFilePart.into())
}

async fn store_upload(
    state: &WebState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<crate::share::UploadReceipt, ShareError> {
    let upload = read_upload(multipart, state.share.uploads().max_upload_bytes).await?;
    let share = Arc::clone(&state.share);
    blocking(move || share.upload(&upload.filename, &upload.data)).await
}

/// Browser upload: renders the result page, or the form again with the error.
#[tracing::instrument(name = "http.upload", skip_all)]
async fn upload_form(
    State(state): State<WebState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let result = async {
        let receipt = store_upload(&state, multipart).await?;
        let url = receipt.download_url.clone();
        let png = blocking(move || Ok(qr::render_png(&url)?)).await?;
        Ok::<_, ShareError>(pages::result_page(
            &receipt,
            &BASE64_STANDARD.encode(png),
            state.ttl_minutes(),
            state.share.base_url().as_str(),
        )?)
    }
    .await;

    match result {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            let status = err.status();
            if status.is_server_error() {
                warn!(error = %err, "Upload failed");
            } else {
                debug!(error = %err, "Upload rejected");
            }
            match pages::index_page(
                Some(&err.public_message()),
                &state.share.uploads().allowed_extensions,
                state.ttl_minutes(),
            ) {
                Ok(html) => (status, Html(html)).into_response(),
                Err(_) => err.into_response(),
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: String,
    pub filename: String,
    pub download_url: String,
    pub qr_url: String,
    pub expires_at: String,
    pub expires_in_secs: i64,
}

#[tracing::instrument(name = "http.api.upload", skip_all)]
async fn upload_api(
    State(state): State<WebState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ShareError> {
    let receipt = store_upload(&state, multipart).await?;
    Ok(Json(UploadResponse {
        id: receipt.id.to_string(),
        qr_url: state.share.qr_url(&receipt.id),
        expires_in_secs: (receipt.expires_at - receipt.created_at).num_seconds(),
        expires_at: receipt.expires_at.to_rfc3339(),
        filename: receipt.filename,
        download_url: receipt.download_url,
    }))
}

#[tracing::instrument(name = "http.download", skip(state))]
async fn download(State(state): State<WebState>, Path(id): Path<String>) -> Response {
    serve_download(&state, id)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn serve_download(state: &WebState, raw_id: String) -> Result<Response, ShareError> {
    let share = Arc::clone(&state.share);
    let lookup_id = raw_id.clone();
    let artifact = blocking(move || share.download(&lookup_id)).await?;
    let meta = artifact.meta;

    let body = match artifact.payload {
        Payload::Inline(bytes) => Body::from(bytes),
        Payload::File(path) => match tokio::fs::File::open(&path).await {
            Ok(file) => Body::from_stream(ReaderStream::new(file)),
            // Swept between lookup and open.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ShareError::NotFound(raw_id));
            }
            Err(source) => {
                return Err(StoreError::Io {
                    context: "open payload",
                    path,
                    source,
                }
                .into());
            }
        },
    };

    info!(
        artifact.id = %meta.id,
        artifact.size_bytes = meta.size_bytes,
        "Serving download"
    );

    let content_type = HeaderValue::from_str(&meta.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&content_disposition(&meta.original_name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    let mut response = (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
        body,
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size_bytes));
    if let Ok(id) = HeaderValue::from_str(meta.id.as_str()) {
        response.headers_mut().insert("x-artifact-id", id);
    }
    Ok(response)
}

/// `attachment` with an ASCII fallback name and the exact UTF-8 name.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let encoded = urlencoding::encode(filename);

    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

/// PNG QR code of a live artifact's download URL.
#[tracing::instrument(name = "http.qr", skip(state))]
async fn qr_code(
    State(state): State<WebState>,
    Path(id): Path<String>,
) -> Result<Response, ShareError> {
    let share = Arc::clone(&state.share);
    let png = blocking(move || {
        let artifact = share.download(&id)?;
        Ok(qr::render_png(&share.download_url(&artifact.meta.id))?)
    })
    .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        png,
    )
        .into_response())
}

async fn health(State(state): State<WebState>) -> Json<serde_json::Value> {
    let store = state.share.store();
    Json(serde_json::json!({
        "status": "healthy",
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "storage": store.backend(),
        "artifacts": {
            "count": store.count(),
            "bytes": store.total_bytes(),
        },
        "ttl_secs": state.share.ttl().num_seconds(),
        "sweep_interval_secs": state.sweep_interval.as_secs(),
        "base_url": state.share.base_url().as_str(),
    }))
}
