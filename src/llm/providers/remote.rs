//! Remote relay backend.
//!
//! Forwards the original upload to a model-serving endpoint as a multipart
//! form with two parts, `file` and `prompt`, and interprets whatever JSON comes
//! back. The endpoint is usually a notebook-hosted vision model fronted by a
//! small HTTP shim, so its answer shape is loose: a ready field map
//! (`extractedFields` / `extracted_fields`), or an OpenAI-style chat envelope
//! whose message content still needs parsing.

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{debug, error, trace};

use super::{check_status, http_client, probe};
use crate::llm::{InferenceOutput, InferenceRequest, ProviderError};
use crate::subsystems::extraction::parser::{self, ParsedExtraction};

#[derive(Debug, Clone)]
pub struct RemoteProvider {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl RemoteProvider {
    pub fn new(url: String, timeout_seconds: u64, api_key: Option<String>) -> Result<Self, ProviderError> {
        let client = http_client(timeout_seconds)?;
        Ok(Self { client, url, api_key })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn ping(&self) -> Result<(), ProviderError> {
        probe(&self.url, self.api_key.as_deref()).await
    }

    /// One multipart POST per document.
    pub async fn extract(&self, request: InferenceRequest<'_>) -> Result<InferenceOutput, ProviderError> {
        let doc = request.document;
        let part = Part::bytes(doc.bytes.clone())
            .file_name(doc.file_name.clone())
            .mime_str(doc.mime())
            .map_err(|e| ProviderError::Request(format!("invalid content type: {e}")))?;
        let form = Form::new()
            .part("file", part)
            .text("prompt", request.prompt.to_string());

        debug!(
            url = %self.url,
            file_name = %doc.file_name,
            size = doc.bytes.len(),
            prompt_len = request.prompt.len(),
            "relaying document"
        );
        trace!(prompt = %request.prompt, "relay prompt");

        let mut req = self.client.post(&self.url).multipart(form);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            error!(url = %self.url, error = %e, timeout = e.is_timeout(), "relay request failed (transport)");
            ProviderError::Request(e.to_string())
        })?;
        let response = check_status(response).await?;

        let body = response.json::<Value>().await.map_err(|e| {
            error!(error = %e, "relay response is not JSON");
            ProviderError::Decode(format!("failed to parse response body: {e}"))
        })?;

        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&body)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(response = %json, "full relay response");
        }

        interpret(body)
    }
}

/// Turn a relay response body into an [`InferenceOutput`].
fn interpret(body: Value) -> Result<InferenceOutput, ProviderError> {
    let obj = match &body {
        Value::Object(obj) => obj,
        Value::String(text) => {
            let parsed = parser::parse_model_response(text);
            return Ok(output(parsed, body.clone()));
        }
        other => {
            return Err(ProviderError::Decode(format!("expected a JSON object, got {other}")));
        }
    };

    // An error reported inside a 2xx body with nothing else to go on.
    if !obj.contains_key("extractedFields") && !obj.contains_key("extracted_fields") {
        if let Some(err) = obj.get("error") {
            let msg = err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string());
            return Err(ProviderError::Status(format!("remote endpoint reported: {msg}")));
        }
    }

    let parsed = if let Some(Value::Object(fields)) = obj.get("extractedFields") {
        ParsedExtraction {
            extracted_fields: fields.clone(),
            confidence_score: scalar(obj.get("confidence")),
            processing_notes: scalar(obj.get("processingNotes")),
        }
    } else if obj.contains_key("extracted_fields") {
        ParsedExtraction::from_object(obj.clone())
    } else {
        let content = parser::response_content(&body);
        if content.is_empty() {
            ParsedExtraction::sentinel(format!("Could not parse model response: {body}"))
        } else {
            parser::parse_model_response(content)
        }
    };

    let raw = obj.get("rawResponse").cloned().unwrap_or_else(|| body.clone());
    Ok(output(parsed, raw))
}

fn output(parsed: ParsedExtraction, raw_response: Value) -> InferenceOutput {
    InferenceOutput {
        extracted_fields: parsed.extracted_fields,
        raw_response,
        confidence: parsed.confidence_score,
        processing_notes: parsed.processing_notes,
    }
}

fn scalar(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
