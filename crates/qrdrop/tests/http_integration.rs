//! HTTP-level tests driving the router with `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use depot::{ArtifactStore, FileStore, MemoryStore};
use dropconf::{UploadsConfig, UrlStyle};
use qrdrop::web::{router, UploadResponse, WebState};
use qrdrop::{BaseUrl, ManualClock, ShareService, NOT_FOUND_MESSAGE};
use tower::ServiceExt;

const BOUNDARY: &str = "qrdrop-test-boundary";
const BODY_LIMIT: usize = 64 * 1024 * 1024;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 4, 18, 30, 0).unwrap()
}

struct Harness {
    app: Router,
    clock: Arc<ManualClock>,
    share: Arc<ShareService>,
}

fn harness_with(store: Arc<dyn ArtifactStore>, uploads: UploadsConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(t0()));
    let share = Arc::new(ShareService::new(
        store,
        clock.clone(),
        BaseUrl::parse("http://192.168.1.20:5000").unwrap(),
        uploads,
        StdDuration::from_secs(3600),
    ));
    let app = router(WebState::new(
        Arc::clone(&share),
        StdDuration::from_secs(300),
    ));
    Harness { app, clock, share }
}

fn harness() -> Harness {
    harness_with(Arc::new(MemoryStore::new()), UploadsConfig::default())
}

/// A multipart body with one field named `field`.
fn multipart_body(field: &str, filename: Option<&str>, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    match filename {
        Some(name) => body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        ),
        None => body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n").as_bytes(),
        ),
    }
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(path: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), BODY_LIMIT).await.unwrap().to_vec()
}

async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

async fn api_upload(app: &Router, filename: &str, data: &[u8]) -> UploadResponse {
    let response = send(
        app,
        upload_request("/api/upload", multipart_body("file", Some(filename), data)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_index_serves_form() {
    let h = harness();
    let response = send(&h.app, get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("<form action=\"/upload\""));
    assert!(html.contains("name=\"file\""));
    assert!(html.contains("after 60 minutes"));
}

#[tokio::test]
async fn test_get_upload_redirects_home() {
    let h = harness();
    let response = send(&h.app, get("/upload")).await;
    assert!(response.status().is_redirection());
    assert_eq!(response.headers()[header::LOCATION], "/");
}

#[tokio::test]
async fn test_api_upload_returns_links() {
    let h = harness();
    let upload = api_upload(&h.app, "report.pdf", b"%PDF-1.4").await;

    assert_eq!(upload.filename, "report.pdf");
    assert_eq!(upload.id.len(), 32);
    assert_eq!(
        upload.download_url,
        format!("http://192.168.1.20:5000/download/{}", upload.id)
    );
    assert_eq!(
        upload.qr_url,
        format!("http://192.168.1.20:5000/qr/{}", upload.id)
    );
    assert_eq!(upload.expires_in_secs, 3600);
    assert_eq!(
        upload.expires_at,
        (t0() + Duration::seconds(3600)).to_rfc3339()
    );
    assert_eq!(h.share.store().count(), 1);
}

#[tokio::test]
async fn test_form_upload_renders_qr_page() {
    let h = harness();
    let response = send(
        &h.app,
        upload_request("/upload", multipart_body("file", Some("a.txt"), b"0123456789")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response).await;
    assert!(html.contains("data:image/png;base64,iVBOR"));
    assert!(html.contains("http://192.168.1.20:5000/download/"));
    assert!(html.contains("<strong>a.txt</strong>"));
    assert!(html.contains("expires in 60 minutes"));
}

#[tokio::test]
async fn test_download_returns_bytes_and_headers() {
    let h = harness();
    let upload = api_upload(&h.app, "a.txt", b"0123456789").await;

    let response = send(&h.app, get(&format!("/download/{}", upload.id))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"a.txt\"; filename*=UTF-8''a.txt"
    );
    assert_eq!(headers[header::CONTENT_LENGTH], "10");
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    assert_eq!(headers["x-artifact-id"], upload.id.as_str());

    assert_eq!(body_bytes(response).await, b"0123456789");
}

#[tokio::test]
async fn test_query_style_download() {
    let uploads = UploadsConfig {
        url_style: UrlStyle::Query,
        ..UploadsConfig::default()
    };
    let h = harness_with(Arc::new(MemoryStore::new()), uploads);
    let upload = api_upload(&h.app, "a.txt", b"query style").await;
    assert_eq!(
        upload.download_url,
        format!(
            "http://192.168.1.20:5000/?file_id={}&download=true",
            upload.id
        )
    );

    let response = send(
        &h.app,
        get(&format!("/?file_id={}&download=true", upload.id)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"query style");

    // Without `download` the form is shown.
    let response = send(&h.app, get(&format!("/?file_id={}", upload.id))).await;
    assert!(body_text(response).await.contains("<form"));
}

#[tokio::test]
async fn test_unknown_and_malformed_ids_are_404() {
    let h = harness();
    for path in [
        "/download/0123456789abcdef0123456789abcdef",
        "/download/not-an-id",
        "/?file_id=zzz&download=true",
        "/qr/0123456789abcdef0123456789abcdef",
    ] {
        let response = send(&h.app, get(path)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
        let json = body_json(response).await;
        assert_eq!(json["message"], NOT_FOUND_MESSAGE, "{path}");
        assert_eq!(json["code"], "not_found");
    }
}

#[tokio::test]
async fn test_expired_download_looks_missing() {
    let h = harness();
    let upload = api_upload(&h.app, "a.txt", b"soon gone").await;

    h.clock.advance(Duration::seconds(3599));
    let response = send(&h.app, get(&format!("/download/{}", upload.id))).await;
    assert_eq!(response.status(), StatusCode::OK);

    h.clock.advance(Duration::seconds(2));
    let response = send(&h.app, get(&format!("/download/{}", upload.id))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], NOT_FOUND_MESSAGE);

    let response = send(&h.app, get(&format!("/qr/{}", upload.id))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_qr_endpoint_serves_png() {
    let h = harness();
    let upload = api_upload(&h.app, "a.txt", b"x").await;

    let response = send(&h.app, get(&format!("/qr/{}", upload.id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let png = body_bytes(response).await;
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
}

#[tokio::test]
async fn test_health_reports_store() {
    let h = harness();
    api_upload(&h.app, "a.txt", b"12345").await;

    let response = send(&h.app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["storage"], "memory");
    assert_eq!(json["artifacts"]["count"], 1);
    assert_eq!(json["artifacts"]["bytes"], 5);
    assert_eq!(json["ttl_secs"], 3600);
    assert_eq!(json["sweep_interval_secs"], 300);
    assert_eq!(json["base_url"], "http://192.168.1.20:5000");
}

#[tokio::test]
async fn test_upload_without_file_part() {
    let h = harness();
    let response = send(
        &h.app,
        upload_request("/api/upload", multipart_body("note", None, b"hello")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "No file part");

    let request = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = send(&h.app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "No file part");
}

#[tokio::test]
async fn test_upload_with_empty_filename() {
    let h = harness();
    let response = send(
        &h.app,
        upload_request("/upload", multipart_body("file", Some(""), b"")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = body_text(response).await;
    assert!(html.contains("<div class=\"error\">No selected file</div>"));
    assert!(html.contains("<form"));
}

#[tokio::test]
async fn test_upload_disallowed_type() {
    let h = harness();
    let response = send(
        &h.app,
        upload_request("/api/upload", multipart_body("file", Some("run.sh"), b"#!/bin/sh")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "File type not allowed");
    assert_eq!(h.share.store().count(), 0);
}

#[tokio::test]
async fn test_upload_over_limit() {
    let uploads = UploadsConfig {
        max_upload_bytes: 1024,
        ..UploadsConfig::default()
    };
    let h = harness_with(Arc::new(MemoryStore::new()), uploads);

    // Over the policy limit but inside the request body allowance.
    let response = send(
        &h.app,
        upload_request("/api/upload", multipart_body("file", Some("big.txt"), &[b'a'; 2048])),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        body_json(response).await["message"],
        "File too large (limit 1024 bytes)"
    );

    // Past the request body allowance entirely.
    let response = send(
        &h.app,
        upload_request(
            "/api/upload",
            multipart_body("file", Some("huge.txt"), &vec![b'a'; 256 * 1024]),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(h.share.store().count(), 0);
}

#[tokio::test]
async fn test_disk_backed_roundtrip() {
    let temp = tempfile::TempDir::new().unwrap();
    let store = Arc::new(FileStore::at_path(temp.path()).unwrap());
    let h = harness_with(store, UploadsConfig::default());

    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let upload = api_upload(&h.app, "résumé scan.zip", &payload).await;
    assert_eq!(upload.filename, "résumé_scan.zip");

    let response = send(&h.app, get(&format!("/download/{}", upload.id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"r_sum__scan.zip\"; filename*=UTF-8''r%C3%A9sum%C3%A9_scan.zip"
    );
    assert_eq!(body_bytes(response).await, payload);
}
