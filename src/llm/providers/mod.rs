//! Inference backend implementations.
//!
//! `build(config, api_key)` is the factory, called once at startup.
//! Adding a new backend = new module + new match arm.

pub mod dummy;
pub mod openai_compatible;
pub mod remote;

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::error;

use crate::config::InferenceConfig;
use crate::llm::{InferenceBackend, ProviderError};

/// Hard timeout for reachability probes, independent of the request timeout.
const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Construct an `InferenceBackend` from config and an optional API key.
///
/// `api_key` is sourced from `LLM_API_KEY` env (never TOML) and is `None`
/// for keyless endpoints.
pub fn build(config: &InferenceConfig, api_key: Option<String>) -> Result<InferenceBackend, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(InferenceBackend::Dummy(dummy::DummyProvider)),
        "remote" => {
            let r = &config.remote;
            let p = remote::RemoteProvider::new(r.url.clone(), r.timeout_seconds, api_key)?;
            Ok(InferenceBackend::Remote(p))
        }
        "openai" | "openai-compatible" => {
            let oai = &config.openai;
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                oai.api_base_url.clone(),
                oai.model.clone(),
                oai.temperature,
                oai.max_tokens,
                oai.timeout_seconds,
                api_key,
            )?;
            Ok(InferenceBackend::OpenAiCompatible(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}

/// HTTP client with the per-request timeout applied.
fn http_client(timeout_seconds: u64) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))
}

/// HEAD `url`. Only a transport-level failure counts as unreachable.
async fn probe(url: &str, api_key: Option<&str>) -> Result<(), ProviderError> {
    let client = Client::builder()
        .timeout(PING_TIMEOUT)
        .build()
        .map_err(|e| ProviderError::Request(format!("failed to build ping client: {e}")))?;
    let mut req = client.head(url);
    if let Some(key) = api_key {
        req = req.bearer_auth(key);
    }
    req.send()
        .await
        .map(|_| ())
        .map_err(|e| ProviderError::Request(format!("unreachable: {e}")))
}

// Error envelopes: OpenAI-style `{"error": {"message": ...}}`, FastAPI-style
// `{"detail": ...}`, or a plain `{"error": "..."}`.
#[derive(Debug, Deserialize)]
struct OpenAiErrorEnvelope {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

fn error_message(body: &str) -> Option<String> {
    if let Ok(env) = serde_json::from_str::<OpenAiErrorEnvelope>(body) {
        let code = env
            .error
            .code
            .map(|v| match v {
                serde_json::Value::String(s) => format!(" [code={s}]"),
                other => format!(" [code={other}]"),
            })
            .unwrap_or_default();
        return Some(format!("{}{code}", env.error.message));
    }
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["detail", "error"].iter().find_map(|key| match value.get(key)? {
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    })
}

/// Consume the response and return it if successful, or a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let message = match error_message(&body) {
        Some(msg) => format!("HTTP {status} from {url}: {msg}"),
        None => format!("HTTP {status} from {url}: {}", body.trim()),
    };

    error!(%status, %message, "inference request returned HTTP error");
    Err(ProviderError::Status(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OpenAiConfig, RemoteConfig};

    fn config(provider: &str) -> InferenceConfig {
        InferenceConfig {
            provider: provider.into(),
            remote: RemoteConfig { url: "http://127.0.0.1:9/process".into(), timeout_seconds: 1 },
            openai: OpenAiConfig {
                api_base_url: "http://127.0.0.1:9/v1/chat/completions".into(),
                model: "m".into(),
                temperature: 0.0,
                max_tokens: 10,
                timeout_seconds: 1,
            },
        }
    }

    #[test]
    fn build_known_backends() {
        assert_eq!(build(&config("dummy"), None).unwrap().name(), "dummy");
        assert_eq!(build(&config("remote"), None).unwrap().name(), "remote");
        assert_eq!(build(&config("openai"), None).unwrap().name(), "openai");
        assert_eq!(build(&config("openai-compatible"), None).unwrap().name(), "openai");
    }

    #[test]
    fn only_remote_skips_content_extraction() {
        assert!(!build(&config("remote"), None).unwrap().reads_content());
        assert!(build(&config("openai"), None).unwrap().reads_content());
        assert!(build(&config("dummy"), None).unwrap().reads_content());
    }

    #[test]
    fn build_unknown_backend_errors() {
        let err = build(&config("colab"), None).unwrap_err();
        assert_eq!(err.to_string(), "unknown inference backend: colab");
    }

    #[test]
    fn error_message_shapes() {
        assert_eq!(
            error_message(r#"{"error": {"message": "bad key", "code": "invalid_api_key"}}"#).as_deref(),
            Some("bad key [code=invalid_api_key]")
        );
        assert_eq!(error_message(r#"{"detail": "Not Found"}"#).as_deref(), Some("Not Found"));
        assert_eq!(error_message(r#"{"error": "model crashed"}"#).as_deref(), Some("model crashed"));
        assert_eq!(error_message("<html>oops</html>"), None);
    }
}
