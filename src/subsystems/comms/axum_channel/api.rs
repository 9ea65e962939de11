//! Axum handlers for the extraction API.
//!
//! Each handler receives [`AxumState`] via [`axum::extract::State`] and
//! returns an axum [`Response`]. Validation problems are answered with
//! `400 {"error": "..."}`; per-file processing errors travel inside the
//! result objects.

use axum::{
    Json,
    extract::{Multipart, Query, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use super::AxumState;
use crate::subsystems::extraction::document::{
    ALLOWED_EXTENSIONS, UploadedDocument, allowed_file, sanitize_filename,
};
use crate::subsystems::extraction::fields::{self, normalize_field_list};
use crate::subsystems::extraction::{ExtractionConfig, FailureKind};

// ── Request types ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub(super) struct HealthQuery {
    #[serde(default)]
    probe: bool,
}

/// Parts collected from a multipart upload form.
#[derive(Debug, Default)]
struct UploadForm {
    files: Vec<UploadedDocument>,
    /// Raw names as the client sent them, parallel to `files`.
    raw_names: Vec<String>,
    fields: Option<String>,
    output_language: Option<String>,
    output_format: Option<String>,
    include_line_items: Option<String>,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// `{"error": msg}` with the given status.
fn json_error(status: StatusCode, msg: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "error": msg.to_string() }))).into_response()
}

fn multipart_error(channel_id: &str, e: MultipartError) -> Response {
    warn!(%channel_id, error = %e, "malformed multipart body");
    json_error(e.status(), format!("Invalid multipart body: {}", e.body_text()))
}

async fn read_form(channel_id: &str, mut multipart: Multipart) -> Result<UploadForm, Response> {
    let mut form = UploadForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(multipart_error(channel_id, e)),
        };
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "files" | "file" => {
                let raw_name = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| multipart_error(channel_id, e))?;
                form.files.push(UploadedDocument {
                    file_name: sanitize_filename(&raw_name),
                    content_type,
                    bytes: bytes.to_vec(),
                });
                form.raw_names.push(raw_name);
            }
            "fields" | "output_language" | "output_format" | "include_line_items" => {
                let text = field.text().await.map_err(|e| multipart_error(channel_id, e))?;
                let slot = match name.as_str() {
                    "fields" => &mut form.fields,
                    "output_language" => &mut form.output_language,
                    "output_format" => &mut form.output_format,
                    _ => &mut form.include_line_items,
                };
                *slot = Some(text);
            }
            other => {
                warn!(%channel_id, part = other, "ignoring unknown form part");
            }
        }
    }

    Ok(form)
}

/// `fields` must be a JSON array of strings.
fn parse_fields_json(raw: &str) -> Result<Vec<String>, String> {
    serde_json::from_str::<Vec<String>>(raw)
        .map_err(|_| "Invalid 'fields': expected a JSON array of strings".to_string())
}

/// JSON array, or a comma-separated list.
fn parse_fields_lenient(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        if let Ok(list) = serde_json::from_str::<Vec<String>>(trimmed) {
            return list;
        }
    }
    trimmed.split(',').map(str::to_string).collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Build the per-request config from normalized `fields` and form overrides.
fn extraction_config(
    state: &AxumState,
    fields: Vec<String>,
    form: &UploadForm,
) -> Result<ExtractionConfig, String> {
    let fields = normalize_field_list(fields);
    if fields.is_empty() {
        return Err("No fields specified".to_string());
    }

    let mut config = ExtractionConfig::new(fields, state.processor.defaults());
    if let Some(lang) = form.output_language.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        config.output_language = lang.to_string();
    }
    if let Some(format) = form.output_format.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        config.output_format = format.to_string();
    }
    if let Some(raw) = form.include_line_items.as_deref() {
        config.include_line_items = parse_bool(raw)
            .ok_or_else(|| format!("Invalid 'include_line_items': {raw}"))?;
    }
    Ok(config)
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// POST /process: one result per uploaded file, in upload order.
pub(super) async fn process(State(state): State<AxumState>, multipart: Multipart) -> Response {
    let form = match read_form(&state.channel_id, multipart).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };

    if form.files.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "No files uploaded");
    }
    let Some(raw_fields) = form.fields.as_deref() else {
        return json_error(StatusCode::BAD_REQUEST, "Missing 'fields' form field");
    };
    let fields = match parse_fields_json(raw_fields) {
        Ok(f) => f,
        Err(msg) => return json_error(StatusCode::BAD_REQUEST, msg),
    };
    let config = match extraction_config(&state, fields, &form) {
        Ok(c) => c,
        Err(msg) => return json_error(StatusCode::BAD_REQUEST, msg),
    };

    info!(
        channel_id = %state.channel_id,
        files = form.files.len(),
        fields = config.fields.len(),
        "process request"
    );

    let results = state.processor.process_batch(form.files, &config).await;
    (StatusCode::OK, Json(results)).into_response()
}

/// POST /api/invoices/upload: single file, single result object.
pub(super) async fn upload(State(state): State<AxumState>, multipart: Multipart) -> Response {
    let mut form = match read_form(&state.channel_id, multipart).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };

    let (Some(upload), Some(raw_name)) = (form.files.pop(), form.raw_names.pop()) else {
        return json_error(StatusCode::BAD_REQUEST, "No file provided");
    };
    if !form.files.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "Only one file may be uploaded");
    }
    if raw_name.trim().is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "No file selected");
    }
    if !allowed_file(&upload.file_name) {
        return json_error(
            StatusCode::BAD_REQUEST,
            format!("File type not allowed. Allowed: {}", ALLOWED_EXTENSIONS.join(", ")),
        );
    }

    let fields = parse_fields_lenient(form.fields.as_deref().unwrap_or(""));
    let config = match extraction_config(&state, fields, &form) {
        Ok(c) => c,
        Err(msg) => return json_error(StatusCode::BAD_REQUEST, msg),
    };

    info!(channel_id = %state.channel_id, file_name = %upload.file_name, "upload request");

    let result = state.processor.process_file(upload, &config).await;
    let status = match result.failure {
        None => StatusCode::OK,
        Some(FailureKind::Document) => StatusCode::BAD_REQUEST,
        Some(FailureKind::Backend) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(result)).into_response()
}

/// GET /api/health[?probe=true]
pub(super) async fn health(State(state): State<AxumState>, Query(q): Query<HealthQuery>) -> Response {
    let backend = state.processor.backend();
    let mut body = json!({
        "status": "healthy",
        "processor": "ready",
        "backend": backend.name(),
    });

    if q.probe {
        match backend.ping().await {
            Ok(()) => body["backend_reachable"] = Value::Bool(true),
            Err(e) => {
                warn!(channel_id = %state.channel_id, error = %e, "backend probe failed");
                body["status"] = json!("degraded");
                body["backend_reachable"] = Value::Bool(false);
                body["backend_error"] = json!(e.to_string());
            }
        }
    }

    (StatusCode::OK, Json(body)).into_response()
}

/// GET /api/fields: the field catalog.
pub(super) async fn fields() -> Json<Value> {
    let mut names = Vec::new();
    let mut descriptions = Map::new();
    for (name, description) in fields::catalog() {
        names.push(Value::String(name.to_string()));
        descriptions.insert(name.to_string(), Value::String(description.to_string()));
    }
    Json(json!({ "fields": names, "descriptions": descriptions }))
}
