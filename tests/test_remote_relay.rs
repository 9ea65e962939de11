//! Remote and chat-completion backends against in-process mock servers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Multipart;
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use http_body_util::BodyExt;
use lopdf::{Document, Object, Stream, dictionary};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower::ServiceExt;

use invoice_relay::config::Config;
use invoice_relay::llm::providers;
use invoice_relay::subsystems::comms::{AxumState, build_router};
use invoice_relay::subsystems::extraction::document::UploadedDocument;
use invoice_relay::subsystems::extraction::{ExtractionConfig, InvoiceProcessor};

const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const BOUNDARY: &str = "----relay-test-boundary";
/// Header and a comment, no xref or objects: what a bare scan often looks like
/// to a text extractor.
const SCANNED_PDF: &[u8] = b"%PDF-1.4\n% scanned invoice, image only\n%%EOF\n";

// ── Mock servers ──────────────────────────────────────────────────────────────

async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Answers like the notebook-side relay: camelCase fields plus its own raw response.
async fn mock_process(mut multipart: Multipart) -> Response {
    let mut file_name = None;
    let mut content_type = None;
    let mut size = 0;
    let mut prompt = None;

    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                file_name = field.file_name().map(str::to_string);
                content_type = field.content_type().map(str::to_string);
                size = field.bytes().await.unwrap().len();
            }
            Some("prompt") => prompt = Some(field.text().await.unwrap()),
            _ => {}
        }
    }

    let (Some(file_name), Some(prompt)) = (file_name, prompt) else {
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"detail": "file and prompt required"})))
            .into_response();
    };

    Json(json!({
        "fileName": file_name,
        "promptUsed": prompt,
        "extractedFields": {
            "vendor_name": "XYZ Corp",
            "invoice_number": "INV-2024-001",
            "total_amount": "149.50"
        },
        "rawResponse": {"status": "mocked", "bytes": size, "contentType": content_type}
    }))
    .into_response()
}

async fn mock_chat_envelope() -> Json<Value> {
    Json(json!({
        "choices": [{"message": {"role": "assistant", "content":
            "Here you go:\n```json\n{\"extracted_fields\": {\"due_date\": \"2024-06-30\"}, \"confidence_score\": \"88%\"}\n```"
        }}]
    }))
}

async fn mock_failure() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"detail": "model not loaded"}))).into_response()
}

async fn mock_slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(3)).await;
    Json(json!({"extractedFields": {}}))
}

/// Chat completions: requires the bearer key and reports what it received.
async fn mock_completions(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let auth = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    if auth != Some("Bearer test-key") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "Incorrect API key provided", "code": "invalid_api_key"}})),
        )
            .into_response();
    }

    let content = &body["messages"][0]["content"];
    let shape = if content.is_array() { "vision" } else { "text" };
    let answer = json!({
        "extracted_fields": {"vendor_name": "ACME GmbH", "total_amount": "99.00 EUR"},
        "confidence_score": "95%",
        "processing_notes": format!(
            "model={} max_tokens={} shape={shape}",
            body["model"].as_str().unwrap_or(""),
            body["max_tokens"]
        )
    });

    Json(json!({
        "id": "chatcmpl-test",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": answer.to_string()}}]
    }))
    .into_response()
}

async fn mock_server() -> String {
    spawn(
        Router::new()
            .route("/process", post(mock_process))
            .route("/envelope", post(mock_chat_envelope))
            .route("/fail", post(mock_failure))
            .route("/slow", post(mock_slow))
            .route("/v1/chat/completions", post(mock_completions)),
    )
    .await
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn remote_config(url: String) -> Config {
    let mut config = Config::test_default(Path::new("config/prompts"));
    config.inference.provider = "remote".into();
    config.inference.remote.url = url;
    config.inference.remote.timeout_seconds = 1;
    config
}

fn openai_processor(base: &str, api_key: Option<&str>) -> InvoiceProcessor {
    let mut config = Config::test_default(Path::new("config/prompts"));
    config.inference.provider = "openai".into();
    config.inference.openai.api_base_url = format!("{base}/v1/chat/completions");
    config.inference.openai.model = "gpt-4o-mini".into();
    config.inference.openai.max_tokens = 2000;
    config.llm_api_key = api_key.map(str::to_string);
    InvoiceProcessor::from_config(&config).unwrap()
}

fn extraction(config: &Config, fields: &[&str]) -> ExtractionConfig {
    ExtractionConfig::new(fields.iter().map(|f| f.to_string()).collect(), &config.extraction)
}

fn png(name: &str) -> UploadedDocument {
    UploadedDocument { file_name: name.into(), content_type: Some("image/png".into()), bytes: PNG.to_vec() }
}

fn pdf(name: &str, bytes: &[u8]) -> UploadedDocument {
    UploadedDocument {
        file_name: name.into(),
        content_type: Some("application/pdf".into()),
        bytes: bytes.to_vec(),
    }
}

fn make_test_pdf(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let content = format!("BT /F1 12 Tf 100 700 Td ({text}) Tj ET");
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
    });
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
    });
    if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
        dict.set("Parent", pages_id);
    }
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

// ── Remote relay ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn remote_relay_forwards_file_and_summary_prompt() {
    let base = mock_server().await;
    let config = remote_config(format!("{base}/process"));
    let processor = InvoiceProcessor::from_config(&config).unwrap();

    let fields = extraction(&config, &["vendor_name", "total_amount", "due_date"]);
    let result = processor.process_file(png("scan.png"), &fields).await;

    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
    assert_eq!(
        result.prompt_used,
        "Extract the following fields from the invoice: Vendor Name, Total Amount, Due Date."
    );
    let extracted = result.extracted_fields.unwrap();
    assert_eq!(extracted["vendor_name"], "XYZ Corp");
    assert_eq!(extracted["due_date"], Value::Null);
    // Extra keys from the backend are kept.
    assert_eq!(extracted["invoice_number"], "INV-2024-001");
    assert_eq!(
        result.raw_response.unwrap(),
        json!({"status": "mocked", "bytes": PNG.len(), "contentType": "image/png"})
    );
}

#[tokio::test]
async fn remote_relay_forwards_pdf_as_is() {
    let base = mock_server().await;
    let config = remote_config(format!("{base}/process"));
    let processor = InvoiceProcessor::from_config(&config).unwrap();
    let bytes = make_test_pdf("Invoice INV-2024-001 Total 149.50");

    let result = processor.process_file(pdf("invoice.pdf", &bytes), &extraction(&config, &["vendor_name"])).await;

    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
    assert_eq!(result.file_name, "invoice.pdf");
    assert_eq!(result.extracted_fields.unwrap()["vendor_name"], "XYZ Corp");
    assert_eq!(
        result.raw_response.unwrap(),
        json!({"status": "mocked", "bytes": bytes.len(), "contentType": "application/pdf"})
    );
}

#[tokio::test]
async fn remote_relay_forwards_pdf_without_text_layer() {
    let base = mock_server().await;
    let config = remote_config(format!("{base}/process"));
    let processor = InvoiceProcessor::from_config(&config).unwrap();

    let result = processor.process_file(pdf("scan.pdf", SCANNED_PDF), &extraction(&config, &["total_amount"])).await;

    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
    assert_eq!(result.extracted_fields.unwrap()["total_amount"], "149.50");
    assert_eq!(
        result.raw_response.unwrap(),
        json!({"status": "mocked", "bytes": SCANNED_PDF.len(), "contentType": "application/pdf"})
    );
}

#[tokio::test]
async fn remote_relay_parses_chat_envelope() {
    let base = mock_server().await;
    let config = remote_config(format!("{base}/envelope"));
    let processor = InvoiceProcessor::from_config(&config).unwrap();

    let result = processor.process_file(png("a.png"), &extraction(&config, &["due_date"])).await;
    assert_eq!(result.extracted_fields.unwrap()["due_date"], "2024-06-30");
    assert_eq!(result.confidence.as_deref(), Some("88%"));
    assert!(result.raw_response.unwrap()["choices"].is_array());
}

#[tokio::test]
async fn remote_http_error_is_per_file_error() {
    let base = mock_server().await;
    let config = remote_config(format!("{base}/fail"));
    let processor = InvoiceProcessor::from_config(&config).unwrap();

    let results = processor
        .process_batch(vec![png("a.png"), png("b.png")], &extraction(&config, &["vendor_name"]))
        .await;
    assert_eq!(results.len(), 2);
    for r in &results {
        let err = r.error.as_deref().unwrap();
        assert!(err.contains("500"), "{err}");
        assert!(err.contains("model not loaded"), "{err}");
    }
}

#[tokio::test]
async fn remote_timeout_is_per_file_error() {
    let base = mock_server().await;
    let config = remote_config(format!("{base}/slow"));
    let processor = InvoiceProcessor::from_config(&config).unwrap();

    let result = processor.process_file(png("a.png"), &extraction(&config, &["vendor_name"])).await;
    assert!(result.error.unwrap().starts_with("request failed"));
}

#[tokio::test]
async fn remote_unreachable_fails_ping() {
    let config = remote_config("http://127.0.0.1:9/process".into());
    let backend = providers::build(&config.inference, None).unwrap();
    assert!(backend.ping().await.is_err());
}

#[tokio::test]
async fn remote_reachable_passes_ping() {
    let base = mock_server().await;
    let config = remote_config(format!("{base}/process"));
    let backend = providers::build(&config.inference, None).unwrap();
    // HEAD on a POST-only route answers 405, which still counts as reachable.
    backend.ping().await.unwrap();
}

// ── Through the router ────────────────────────────────────────────────────────

async fn upload_via_router(config: Config) -> (StatusCode, Value) {
    upload_file_via_router(config, "scan.png", "image/png", PNG).await
}

async fn upload_file_via_router(
    config: Config,
    file_name: &str,
    content_type: &str,
    bytes: &[u8],
) -> (StatusCode, Value) {
    let processor = InvoiceProcessor::from_config(&config).unwrap();
    let router = build_router(AxumState::new("test", Arc::new(processor), config.http));

    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(
        format!(
            "\r\n--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"fields\"\r\n\r\nvendor_name\r\n--{BOUNDARY}--\r\n"
        )
        .as_bytes(),
    );

    let request = Request::builder()
        .method("POST")
        .uri("/api/invoices/upload")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn upload_relays_end_to_end() {
    let base = mock_server().await;
    let (status, body) = upload_via_router(remote_config(format!("{base}/process"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fileName"], "scan.png");
    assert_eq!(body["extractedFields"]["vendor_name"], "XYZ Corp");
}

#[tokio::test]
async fn upload_relays_scanned_pdf() {
    let base = mock_server().await;
    let (status, body) =
        upload_file_via_router(remote_config(format!("{base}/process")), "scan.pdf", "application/pdf", SCANNED_PDF)
            .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fileName"], "scan.pdf");
    assert_eq!(body["rawResponse"]["contentType"], "application/pdf");
    assert_eq!(body["extractedFields"]["vendor_name"], "XYZ Corp");
}

#[tokio::test]
async fn upload_backend_failure_is_502() {
    let base = mock_server().await;
    let (status, body) = upload_via_router(remote_config(format!("{base}/fail"))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["fileName"], "scan.png");
    assert!(body["error"].as_str().unwrap().contains("model not loaded"));
}

// ── Chat completions ──────────────────────────────────────────────────────────

#[tokio::test]
async fn openai_image_goes_out_as_vision_message() {
    let base = mock_server().await;
    let processor = openai_processor(&base, Some("test-key"));
    let config = ExtractionConfig::new(vec!["vendor_name".into(), "due_date".into()], processor.defaults());

    let result = processor.process_file(png("scan.png"), &config).await;

    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
    assert!(result.prompt_used.contains("REQUIRED FIELDS:"));
    let extracted = result.extracted_fields.unwrap();
    assert_eq!(extracted["vendor_name"], "ACME GmbH");
    assert_eq!(extracted["due_date"], Value::Null);
    assert_eq!(extracted["total_amount"], "99.00 EUR");
    assert_eq!(result.confidence.as_deref(), Some("95%"));
    assert_eq!(
        result.processing_notes.as_deref(),
        Some("model=gpt-4o-mini max_tokens=2000 shape=vision")
    );
    assert_eq!(result.raw_response.unwrap()["id"], "chatcmpl-test");
}

#[tokio::test]
async fn openai_missing_key_surfaces_upstream_message() {
    let base = mock_server().await;
    let processor = openai_processor(&base, None);
    let config = ExtractionConfig::new(vec!["vendor_name".into()], processor.defaults());

    let result = processor.process_file(png("scan.png"), &config).await;
    let err = result.error.unwrap();
    assert!(err.contains("401"), "{err}");
    assert!(err.contains("Incorrect API key provided [code=invalid_api_key]"), "{err}");
}
