//! HTTP API: multipart encrypt/decrypt endpoints
//!
//! Routes:
//!   POST /api/encrypt  - fields `file`, `passphrase`, optional `options` (JSON)
//!   POST /api/decrypt  - fields `eitxt` (file or text), `passphrase`
//!   GET  /healthz
//!   GET  /metrics      - when `server.metrics` is enabled

use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use axum::body::Body;
use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use prometheus_client::registry::Registry;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use eitxt_core::config::EitxtConfig;
use eitxt_core::{Compression, EitxtError, EitxtResult, EncryptOptions};
use eitxt_crypto::request::DEFAULT_NAME;
use eitxt_crypto::KDF_ALG;

use crate::error::ApiError;
use crate::metrics::{self, Metrics, Operation};

/// Allowance for multipart framing on top of the payload ceilings
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Ceiling for small text fields (passphrase, options)
const MAX_FIELD_BYTES: u64 = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EitxtConfig>,
    pub metrics: Metrics,
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(config: EitxtConfig) -> Self {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        Self {
            config: Arc::new(config),
            metrics,
            registry: Arc::new(registry),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let encrypt_limit = body_limit(state.config.limits.max_file_bytes);
    let decrypt_limit = body_limit(state.config.limits.max_text_bytes);

    let mut app = Router::new()
        .route(
            "/api/encrypt",
            post(encrypt_handler)
                .fallback(method_not_allowed)
                .layer(DefaultBodyLimit::max(encrypt_limit)),
        )
        .route(
            "/api/decrypt",
            post(decrypt_handler)
                .fallback(method_not_allowed)
                .layer(DefaultBodyLimit::max(decrypt_limit)),
        )
        .route("/healthz", get(metrics::healthz_handler));
    if state.config.server.metrics {
        app = app.route("/metrics", get(metrics::metrics_handler));
    }
    app.with_state(state)
}

/// Bind `server.listen` and serve until SIGINT/SIGTERM.
pub async fn run(config: EitxtConfig) -> anyhow::Result<()> {
    let addr = config.server.listen.clone();
    let app = router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow!("bind {addr}: {e}"))?;

    info!(addr = %addr, "eitxtd: listening on /api/encrypt, /api/decrypt, /healthz");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow!("http server: {e}"))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("ctrl-c handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown requested, draining connections");
}

fn body_limit(ceiling: u64) -> usize {
    usize::try_from(ceiling.saturating_add(MULTIPART_OVERHEAD)).unwrap_or(usize::MAX)
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "method not allowed" })),
    )
        .into_response()
}

// ── Multipart helpers ─────────────────────────────────────────────────────────

fn multipart_error(e: MultipartError, limit: u64) -> EitxtError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        // The transport limit tripped; the true size is unknown.
        EitxtError::TooLarge {
            limit,
            actual: limit.saturating_add(1),
        }
    } else {
        EitxtError::InvalidInput(format!("malformed multipart body: {}", e.body_text()))
    }
}

/// Drain `field`, failing once more than `limit` bytes arrive.
async fn read_field(field: &mut Field<'_>, limit: u64) -> EitxtResult<Vec<u8>> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
        EitxtError::check_size(buf.len() + chunk.len(), limit)?;
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

async fn read_text(field: &mut Field<'_>) -> EitxtResult<String> {
    let name = field.name().unwrap_or_default().to_string();
    let raw = read_field(field, MAX_FIELD_BYTES).await?;
    String::from_utf8(raw).map_err(|_| EitxtError::InvalidInput(format!("{name} must be UTF-8 text")))
}

fn open_multipart(multipart: Result<Multipart, MultipartRejection>) -> EitxtResult<Multipart> {
    multipart.map_err(|_| EitxtError::InvalidInput("multipart/form-data body required".into()))
}

fn required_passphrase(value: Option<String>) -> EitxtResult<SecretString> {
    match value {
        Some(p) if !p.is_empty() => Ok(SecretString::from(p)),
        _ => Err(EitxtError::InvalidInput("passphrase required".into())),
    }
}

/// `attachment; filename="..."` with the name reduced to a safe ASCII base name.
fn content_disposition(name: &str) -> EitxtResult<HeaderValue> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let base = match base {
        "" | "." | ".." => DEFAULT_NAME,
        b => b,
    };
    let safe: String = base
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() || c == ' ') && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{safe}\""))
        .map_err(|e| anyhow!("content-disposition: {e}").into())
}

// ── POST /api/encrypt ─────────────────────────────────────────────────────────

/// JSON carried in the optional `options` field. Absent members fall back to
/// the configured defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OptionsField {
    compression: Option<Compression>,
    chunk_bytes: Option<usize>,
    kdf: Option<KdfOptionsField>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KdfOptionsField {
    alg: Option<String>,
    iterations: Option<u32>,
}

fn resolve_options(config: &EitxtConfig, raw: Option<&str>) -> EitxtResult<EncryptOptions> {
    let mut options = config.encrypt_defaults();
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Ok(options);
    };

    let parsed: OptionsField = serde_json::from_str(raw)
        .map_err(|_| EitxtError::InvalidInput("invalid options format".into()))?;

    if let Some(c) = parsed.compression {
        options.compression = c;
    }
    if let Some(n) = parsed.chunk_bytes {
        options.chunk_bytes = n;
    }
    if let Some(kdf) = parsed.kdf {
        if let Some(alg) = kdf.alg {
            if alg != KDF_ALG {
                return Err(EitxtError::InvalidInput(format!("unsupported KDF algorithm: {alg}")));
            }
        }
        if let Some(n) = kdf.iterations {
            config.crypto.check_iterations(n)?;
            options.iterations = n;
        }
    }
    Ok(options)
}

struct Upload {
    file_name: String,
    mime: String,
    bytes: Vec<u8>,
}

async fn encrypt_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let result = encrypt(&state, multipart).await;
    state
        .metrics
        .record(Operation::Encrypt, metrics::outcome(&result), started.elapsed());
    Ok(result?)
}

async fn encrypt(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> EitxtResult<Response> {
    let mut multipart = open_multipart(multipart)?;
    let config = &state.config;
    let transport_limit = config.limits.max_file_bytes;

    let mut upload = None;
    let mut passphrase = None;
    let mut options = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, transport_limit))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = read_field(&mut field, config.limits.max_file_bytes).await?;
                upload = Some(Upload {
                    file_name,
                    mime,
                    bytes,
                });
            }
            "passphrase" => passphrase = Some(read_text(&mut field).await?),
            "options" => options = Some(read_text(&mut field).await?),
            other => tracing::debug!(field = other, "ignoring unknown multipart field"),
        }
    }

    let passphrase = required_passphrase(passphrase)?;
    let upload = upload.ok_or_else(|| EitxtError::InvalidInput("file required".into()))?;
    if !config.limits.is_mime_allowed(&upload.mime) {
        return Err(EitxtError::UnsupportedMedia(upload.mime));
    }
    let options = resolve_options(config, options.as_deref())?;

    let size = upload.bytes.len();
    let download = format!(
        "{}.eitxt",
        if upload.file_name.is_empty() {
            DEFAULT_NAME
        } else {
            upload.file_name.as_str()
        }
    );
    let disposition = content_disposition(&download)?;

    let armored = tokio::task::spawn_blocking(move || {
        eitxt_crypto::encrypt_request(
            &upload.bytes,
            &upload.mime,
            &upload.file_name,
            &passphrase,
            &options,
        )
    })
    .await
    .map_err(|e| anyhow!("encrypt task: {e}"))??;

    state.metrics.add_bytes(Operation::Encrypt, size);
    info!(bytes = size, armored_bytes = armored.len(), "encrypt: ok");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from(armored))
        .map_err(|e| anyhow!("building response: {e}").into())
}

// ── POST /api/decrypt ─────────────────────────────────────────────────────────

async fn decrypt_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let result = decrypt(&state, multipart).await;
    state
        .metrics
        .record(Operation::Decrypt, metrics::outcome(&result), started.elapsed());
    Ok(result?)
}

async fn decrypt(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> EitxtResult<Response> {
    let mut multipart = open_multipart(multipart)?;
    let limit = state.config.limits.max_text_bytes;

    let mut armored = None;
    let mut passphrase = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "eitxt" => armored = Some(read_field(&mut field, limit).await?),
            "passphrase" => passphrase = Some(read_text(&mut field).await?),
            other => tracing::debug!(field = other, "ignoring unknown multipart field"),
        }
    }

    let passphrase = required_passphrase(passphrase)?;
    let armored = armored
        .ok_or_else(|| EitxtError::InvalidInput("eitxt file or text required".into()))?;
    let text = String::from_utf8_lossy(&armored).into_owned();
    drop(armored);

    let file = tokio::task::spawn_blocking(move || eitxt_crypto::decrypt_request(&text, &passphrase))
        .await
        .map_err(|e| anyhow!("decrypt task: {e}"))??;

    state.metrics.add_bytes(Operation::Decrypt, file.bytes.len());
    info!(bytes = file.bytes.len(), mime = %file.mime, "decrypt: ok");

    let content_type = HeaderValue::from_str(&file.mime)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, content_disposition(&file.name)?)
        .header(header::CONTENT_LENGTH, file.bytes.len())
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .body(Body::from(file.bytes))
        .map_err(|e| anyhow!("building response: {e}").into())
}
