//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or the path given with `-f`), then applies `INVOICE_RELAY_LOG_LEVEL`,
//! `INVOICE_RELAY_BIND` and `INVOICE_RELAY_REMOTE_URL` overrides.
//!
//! # Module layout
//!
//! - **types**: public configuration structs (`Config`, `HttpConfig`,
//!   `InferenceConfig`, …).
//! - **raw**: raw TOML deserialization types. These mirror the file shape
//!   and use serde defaults; kept private.
//! - **load**: loading logic: `merge_toml`, `load_raw_merged`, `load`,
//!   `load_from`, `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{expand_home, load, load_from, Overrides};
pub use types::*;

impl Config {
    /// Safe `Config` for tests: dummy backend and no API key.
    pub fn test_default(prompts_dir: &std::path::Path) -> Self {
        Self {
            service_name: "test".into(),
            log_level: "info".into(),
            log_file: None,
            http: HttpConfig {
                bind: "127.0.0.1:0".into(),
                cors_origins: raw::default_cors_origins(),
                max_upload_bytes: raw::default_max_upload_bytes(),
                static_dir: None,
                prompts_dir: prompts_dir.to_path_buf(),
            },
            extraction: ExtractionDefaults {
                output_language: raw::default_output_language(),
                output_format: raw::default_output_format(),
                include_line_items: true,
                prompt_style: None,
            },
            inference: InferenceConfig {
                provider: "dummy".into(),
                remote: RemoteConfig {
                    url: "http://127.0.0.1:0/process".into(),
                    timeout_seconds: 1,
                },
                openai: OpenAiConfig {
                    api_base_url: "http://127.0.0.1:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    max_tokens: 256,
                    timeout_seconds: 1,
                },
            },
            llm_api_key: None,
        }
    }
}
