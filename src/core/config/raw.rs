//! Raw TOML deserialization types.
//!
//! These structs mirror the TOML file shape and use `serde` defaults.
//! The `load` module converts them into the public `types` structs.

use serde::Deserialize;

// ── Top-level ────────────────────────────────────────────────────────────────

/// Raw TOML shape, the serde target before resolution.
#[derive(Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub service: RawService,
    #[serde(default)]
    pub http: RawHttp,
    #[serde(default)]
    pub extraction: RawExtraction,
    #[serde(default)]
    pub inference: RawInference,
}

#[derive(Deserialize)]
pub(super) struct RawService {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for RawService {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

// ── HTTP ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawHttp {
    #[serde(default = "default_http_bind")]
    pub bind: String,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default)]
    pub static_dir: Option<String>,
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: String,
}

impl Default for RawHttp {
    fn default() -> Self {
        Self {
            bind: default_http_bind(),
            cors_origins: default_cors_origins(),
            max_upload_bytes: default_max_upload_bytes(),
            static_dir: None,
            prompts_dir: default_prompts_dir(),
        }
    }
}

// ── Extraction ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawExtraction {
    #[serde(default = "default_output_language")]
    pub output_language: String,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default = "default_true")]
    pub include_line_items: bool,
    /// `"summary"` or `"detailed"`; unset picks by backend.
    #[serde(default)]
    pub prompt_style: Option<String>,
}

impl Default for RawExtraction {
    fn default() -> Self {
        Self {
            output_language: default_output_language(),
            output_format: default_output_format(),
            include_line_items: true,
            prompt_style: None,
        }
    }
}

// ── Inference ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawInference {
    #[serde(rename = "default", default = "default_inference_provider")]
    pub provider: String,
    #[serde(default)]
    pub remote: RawRemoteConfig,
    #[serde(default)]
    pub openai: RawOpenAiConfig,
}

impl Default for RawInference {
    fn default() -> Self {
        Self {
            provider: default_inference_provider(),
            remote: RawRemoteConfig::default(),
            openai: RawOpenAiConfig::default(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawRemoteConfig {
    #[serde(default = "default_remote_url")]
    pub url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RawRemoteConfig {
    fn default() -> Self {
        Self {
            url: default_remote_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_openai_temperature")]
    pub temperature: f32,
    #[serde(default = "default_openai_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            max_tokens: default_openai_max_tokens(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

// ── Defaults ────────────────────────────────────────────────────────────────

pub(super) fn default_service_name() -> String { "invoice-relay".to_string() }
pub(super) fn default_log_level() -> String { "info".to_string() }
pub(super) fn default_http_bind() -> String { "127.0.0.1:8000".to_string() }
pub(super) fn default_cors_origins() -> Vec<String> { vec!["*".to_string()] }
pub(super) fn default_max_upload_bytes() -> usize { 16 * 1024 * 1024 }
pub(super) fn default_prompts_dir() -> String { "config/prompts".to_string() }
pub(super) fn default_output_language() -> String { "en".to_string() }
pub(super) fn default_output_format() -> String { "json".to_string() }
pub(super) fn default_inference_provider() -> String { "remote".to_string() }
pub(super) fn default_remote_url() -> String { "http://127.0.0.1:8001/process".to_string() }
pub(super) fn default_timeout_seconds() -> u64 { 60 }
pub(super) fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
pub(super) fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
pub(super) fn default_openai_temperature() -> f32 { 0.1 }
pub(super) fn default_openai_max_tokens() -> u32 { 2000 }

fn default_true() -> bool {
    true
}
