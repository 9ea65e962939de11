//! OpenAI-compatible chat completion backend (`/v1/chat/completions`).
//!
//! PDFs go out as a plain user message (instructions followed by the document's
//! text layer); images go out as a vision message with a `text` part and an
//! `image_url` part carrying a `data:` URL. All OpenAI wire types are private
//! to this module.

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, trace};

use super::{check_status, http_client, probe};
use crate::llm::{InferenceOutput, InferenceRequest, ProviderError};
use crate::subsystems::extraction::document::DocumentContent;
use crate::subsystems::extraction::parser;

// ── Public provider ───────────────────────────────────────────────────────────

/// Adapter for any HTTP endpoint implementing `/v1/chat/completions`.
///
/// Covers OpenAI, OpenAI-compatible local servers (Ollama, LM Studio…),
/// and hosted alternatives. Constructed once at startup, then cheaply cloned
/// because `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    /// Build a provider from config values and an optional API key.
    ///
    /// `api_key` is `None` for keyless local models. When present it is sent
    /// as `Authorization: Bearer <key>` on every request.
    pub fn new(
        api_base_url: String,
        model: String,
        temperature: f32,
        max_tokens: u32,
        timeout_seconds: u64,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = http_client(timeout_seconds)?;
        Ok(Self { client, api_base_url, model, temperature, max_tokens, api_key })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// HEAD the completions endpoint with a 5-second timeout. Any HTTP
    /// response (including 4xx) means reachable.
    pub async fn ping(&self) -> Result<(), ProviderError> {
        probe(&self.api_base_url, self.api_key.as_deref()).await
    }

    /// One chat completion round-trip for one document.
    pub async fn extract(&self, request: InferenceRequest<'_>) -> Result<InferenceOutput, ProviderError> {
        // Some models (gpt-5 family) do not accept a temperature parameter.
        let temperature = if self.model.starts_with("gpt-5") {
            None
        } else {
            Some(self.temperature)
        };

        let content = user_content(request);
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: vec![Message { role: "user", content }],
            temperature,
            max_tokens: self.max_tokens,
        };

        debug!(
            model = %payload.model,
            temperature = ?payload.temperature,
            max_tokens = payload.max_tokens,
            file_name = %request.document.file_name,
            kind = request.document.kind.label(),
            "sending extraction request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            trace!(prompt = %request.prompt, "extraction prompt");
        }

        let mut req = self.client.post(&self.api_base_url).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            error!(url = %self.api_base_url, error = %e, "LLM HTTP request failed (transport)");
            ProviderError::Request(e.to_string())
        })?;
        let response = check_status(response).await?;

        let body = response.json::<Value>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize LLM response");
            ProviderError::Decode(format!("failed to parse response body: {e}"))
        })?;

        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&body)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(response = %json, "full LLM response payload");
        }

        let text = parser::response_content(&body).trim();
        if text.is_empty() {
            return Err(ProviderError::Decode("empty or missing content in response".into()));
        }

        let parsed = parser::parse_model_response(text);
        debug!(fields = parsed.extracted_fields.len(), "received LLM response");

        Ok(InferenceOutput {
            extracted_fields: parsed.extracted_fields,
            raw_response: body,
            confidence: parsed.confidence_score,
            processing_notes: parsed.processing_notes,
        })
    }
}

fn user_content(request: InferenceRequest<'_>) -> MessageContent {
    match &request.document.content {
        DocumentContent::Text(text) => {
            MessageContent::Text(format!("{}\n\nINVOICE TEXT:\n{}", request.prompt, text.trim()))
        }
        image @ DocumentContent::Image { .. } => {
            let url = image.data_url().unwrap_or_default();
            MessageContent::Parts(vec![
                ContentPart::Text { text: request.prompt.to_string() },
                ContentPart::ImageUrl { image_url: ImageUrl { url } },
            ])
        }
        DocumentContent::Passthrough => MessageContent::Text(request.prompt.to_string()),
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}
