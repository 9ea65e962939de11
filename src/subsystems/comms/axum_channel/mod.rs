//! Axum-based HTTP channel serving the extraction API.
//!
//! `run()` drives the axum event loop; the [`CancellationToken`] is wired to
//! axum's graceful shutdown so in-flight requests finish before exit.
//!
//! ## URL layout
//!
//! ```text
//! POST /process               multipart: files[] + fields (JSON array)
//! POST /api/invoices/upload   multipart: file + fields (JSON or comma list)
//! GET  /api/health            ?probe=true also pings the backend
//! GET  /api/fields            field catalog with descriptions
//! GET  /favicon.ico           → 204
//! GET  /                      → index.html or built-in upload page
//! GET  /static/*              → files from http.static_dir
//! ```

mod api;
mod ui;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, StatusCode},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::config::HttpConfig;
use crate::error::AppError;
use crate::subsystems::extraction::InvoiceProcessor;

/// Room for multipart boundaries and the text parts on top of the file bytes.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

// ── Shared request state ──────────────────────────────────────────────────────

/// Axum router state injected into every handler via [`axum::extract::State`].
///
/// Cheap to clone: all fields are reference-counted.
#[derive(Clone)]
pub struct AxumState {
    /// Channel identifier used in log spans.
    pub channel_id: Arc<str>,
    pub processor: Arc<InvoiceProcessor>,
    pub http: Arc<HttpConfig>,
}

impl AxumState {
    pub fn new(channel_id: impl AsRef<str>, processor: Arc<InvoiceProcessor>, http: HttpConfig) -> Self {
        Self {
            channel_id: Arc::from(channel_id.as_ref()),
            processor,
            http: Arc::new(http),
        }
    }
}

// ── AxumChannel ───────────────────────────────────────────────────────────────

pub struct AxumChannel {
    channel_id: String,
    http: HttpConfig,
    processor: Arc<InvoiceProcessor>,
}

impl AxumChannel {
    pub fn new(channel_id: impl Into<String>, http: HttpConfig, processor: Arc<InvoiceProcessor>) -> Self {
        Self { channel_id: channel_id.into(), http, processor }
    }

    /// Bind and serve until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), AppError> {
        let bind_addr = self.http.bind.clone();
        let channel_id = self.channel_id.clone();
        let router = build_router(AxumState::new(&self.channel_id, self.processor, self.http));

        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| AppError::Server(format!("bind failed on {bind_addr}: {e}")))?;
        let local = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| bind_addr.clone());

        info!(%channel_id, bind_addr = %local, "http channel listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| AppError::Server(format!("axum server error: {e}")))?;

        info!(%channel_id, "http channel shut down");
        Ok(())
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

pub fn build_router(state: AxumState) -> Router {
    let body_limit = state.http.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);
    let cors = cors_layer(&state.http.cors_origins);
    let static_dir = state.http.static_dir.clone();

    let mut router = Router::new()
        .route("/process",             post(api::process))
        .route("/api/invoices/upload", post(api::upload))
        .route("/api/health",          get(api::health))
        .route("/api/fields",          get(api::fields))
        .route("/favicon.ico",         get(|| async { StatusCode::NO_CONTENT }))
        .route("/",                    get(ui::root));

    if let Some(dir) = static_dir {
        router = router.nest_service("/static", ServeDir::new(dir));
    }

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// `["*"]` allows any origin; otherwise only the listed ones.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
