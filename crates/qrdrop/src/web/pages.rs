//! Server-rendered HTML for the browser flow.
//!
//! Pages are Handlebars templates; `{{value}}` is HTML-escaped by the
//! engine, so user-supplied names and messages are safe to interpolate.

use handlebars::{Handlebars, RenderError};
use serde_json::{json, Value};

use crate::share::UploadReceipt;

const LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>qrdrop</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 36rem; margin: 2rem auto; padding: 0 1rem; color: #222; }
  h1 { font-size: 1.6rem; }
  .card { border: 1px solid #ddd; border-radius: 8px; padding: 1.25rem; }
  .error { background: #fde8e8; color: #9b1c1c; border-radius: 6px; padding: .6rem .8rem; margin-bottom: 1rem; }
  .hint { color: #666; font-size: .9rem; }
  .qr { display: block; margin: 1rem auto; max-width: 100%; image-rendering: pixelated; }
  code { word-break: break-all; }
  button { padding: .5rem 1.2rem; font-size: 1rem; }
</style>
</head>
<body>
<h1>qrdrop</h1>
{{{body}}}</body>
</html>
"#;

const INDEX: &str = r#"{{#if error}}<div class="error">{{error}}</div>
{{/if}}<div class="card">
<p>Upload a file and scan the QR code to download it on another device.</p>
<form action="/upload" method="post" enctype="multipart/form-data">
  <p><input type="file" name="file" required{{#if accept}} accept="{{accept}}"{{/if}}></p>
  <p><button type="submit">Upload</button></p>
</form>
<p class="hint">Files are deleted after {{ttl_minutes}} minutes.</p>
</div>
"#;

const RESULT: &str = r#"<div class="card">
<p>Scan to download <strong>{{filename}}</strong>:</p>
<img class="qr" alt="QR code for {{filename}}" src="data:image/png;base64,{{qr_png_base64}}">
<p>Or open the link directly:<br><a href="{{download_url}}"><code>{{download_url}}</code></a></p>
<p class="hint">This link expires in {{ttl_minutes}} minutes ({{expires_at}}).</p>
<p class="hint">Server: <code>{{server}}</code></p>
<p><a href="/">Upload another file</a></p>
</div>
"#;

/// Render `body` with `data`, then wrap it in the page layout.
fn render(body: &str, data: &Value) -> Result<String, RenderError> {
    let handlebars = Handlebars::new();
    let body = handlebars.render_template(body, data)?;
    handlebars.render_template(LAYOUT, &json!({ "body": body }))
}

/// The upload form, optionally with an error banner.
pub fn index_page(
    error: Option<&str>,
    allowed_extensions: &[String],
    ttl_minutes: i64,
) -> Result<String, RenderError> {
    let accept = allowed_extensions
        .iter()
        .map(|ext| format!(".{}", ext.trim_start_matches('.')))
        .collect::<Vec<_>>()
        .join(",");

    render(
        INDEX,
        &json!({
            "error": error,
            "accept": accept,
            "ttl_minutes": ttl_minutes,
        }),
    )
}

/// Shown after a successful upload.
pub fn result_page(
    receipt: &UploadReceipt,
    qr_png_base64: &str,
    ttl_minutes: i64,
    server_address: &str,
) -> Result<String, RenderError> {
    render(
        RESULT,
        &json!({
            "filename": receipt.filename,
            "qr_png_base64": qr_png_base64,
            "download_url": receipt.download_url,
            "ttl_minutes": ttl_minutes,
            "expires_at": receipt.expires_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            "server": server_address,
        }),
    )
}
