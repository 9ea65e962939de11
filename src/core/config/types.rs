//! Public configuration types.
//!
//! These are the resolved, ready-to-use structs the rest of the crate
//! consumes. Raw TOML deserialization types live in `raw.rs`.

use std::path::PathBuf;

// ── HTTP ────────────────────────────────────────────────────────────────────

/// HTTP ingress configuration (`[http]`).
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Socket address to bind the axum listener to.
    pub bind: String,
    /// Allowed CORS origins. A single `"*"` allows any origin.
    pub cors_origins: Vec<String>,
    /// Maximum accepted upload size per request, in bytes.
    pub max_upload_bytes: usize,
    /// Directory served under `/static` and used for `/` when it holds an `index.html`.
    pub static_dir: Option<PathBuf>,
    /// Directory holding prompt template files.
    pub prompts_dir: PathBuf,
}

// ── Extraction ──────────────────────────────────────────────────────────────

/// Which prompt the processor sends along with each document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    /// One-line field list (`Extract the following fields from the invoice: …`).
    Summary,
    /// Full instruction prompt with guidelines and the expected JSON skeleton.
    Detailed,
}

impl PromptStyle {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summary" => Some(Self::Summary),
            "detailed" => Some(Self::Detailed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Detailed => "detailed",
        }
    }
}

/// Extraction defaults (`[extraction]`). Per-request form values override them.
#[derive(Debug, Clone)]
pub struct ExtractionDefaults {
    pub output_language: String,
    pub output_format: String,
    pub include_line_items: bool,
    /// `None` means "pick by backend": summary for `remote`, detailed otherwise.
    pub prompt_style: Option<PromptStyle>,
}

// ── Inference ───────────────────────────────────────────────────────────────

/// Remote relay endpoint configuration (`[inference.remote]`).
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Full URL receiving the multipart `file` + `prompt` POST.
    pub url: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// OpenAI / OpenAI-compatible provider configuration (`[inference.openai]`).
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// Inference configuration.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Which backend is active (`"remote"`, `"openai"`, `"dummy"`).
    /// Maps to `default` in `[inference]`.
    pub provider: String,
    pub remote: RemoteConfig,
    pub openai: OpenAiConfig,
}

// ── Top-level ───────────────────────────────────────────────────────────────

/// Fully-resolved service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub service_name: String,
    pub log_level: String,
    /// Optional log file; stderr when `None`.
    pub log_file: Option<PathBuf>,
    pub http: HttpConfig,
    pub extraction: ExtractionDefaults,
    pub inference: InferenceConfig,
    /// API key from `LLM_API_KEY` env var, `None` for keyless endpoints.
    /// Never sourced from TOML.
    pub llm_api_key: Option<String>,
}

impl Config {
    /// Prompt style in effect, resolving the backend-dependent default.
    pub fn effective_prompt_style(&self) -> PromptStyle {
        self.extraction.prompt_style.unwrap_or_else(|| {
            if self.inference.provider == "remote" {
                PromptStyle::Summary
            } else {
                PromptStyle::Detailed
            }
        })
    }

    /// Model (or endpoint) label for log lines and the health body.
    pub fn backend_label(&self) -> String {
        match self.inference.provider.as_str() {
            "remote" => self.inference.remote.url.clone(),
            "openai" | "openai-compatible" => self.inference.openai.model.clone(),
            other => other.to_string(),
        }
    }
}
