//! Configuration loading with env-var overrides.
//!
//! Reads TOML files, supports `[meta] base = "..."` inheritance chains,
//! and applies `INVOICE_RELAY_*` env overrides.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AppError;

use super::raw::RawConfig;
use super::types::*;

/// Values that take precedence over the TOML file.
///
/// [`load`] fills this from the environment; tests construct it directly
/// instead of mutating env vars.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub log_level: Option<String>,
    pub bind: Option<String>,
    pub remote_url: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("INVOICE_RELAY_LOG_LEVEL").ok(),
            bind: env::var("INVOICE_RELAY_BIND").ok(),
            remote_url: env::var("INVOICE_RELAY_REMOTE_URL").ok(),
        }
    }
}

/// Deep-merge two TOML values.
/// Tables are merged recursively; the overlay only needs to specify keys that
/// differ from the base. For every other type (string, integer, array, …)
/// the overlay value replaces the base value wholesale.
fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_tbl), toml::Value::Table(overlay_tbl)) => {
            for (key, ov_val) in overlay_tbl {
                let merged = match base_tbl.remove(&key) {
                    Some(base_val) => merge_toml(base_val, ov_val),
                    None => ov_val,
                };
                base_tbl.insert(key, merged);
            }
            toml::Value::Table(base_tbl)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file, follow any `[meta] base = "..."` chain, and return the
/// fully merged `toml::Value`. `visited` carries canonicalized paths already
/// seen in this chain so circular references are caught early.
fn load_raw_merged(
    path: &Path,
    visited: &mut HashSet<PathBuf>,
) -> Result<toml::Value, AppError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Err(AppError::Config(format!(
            "circular base reference detected at: {}",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let overlay_val: toml::Value = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    if let Some(base_str) = overlay_val
        .get("meta")
        .and_then(|m| m.get("base"))
        .and_then(|b| b.as_str())
    {
        let base_path = if Path::new(base_str).is_absolute() {
            PathBuf::from(base_str)
        } else {
            path.parent().unwrap_or(Path::new(".")).join(base_str)
        };
        let base_val = load_raw_merged(&base_path, visited)?;
        Ok(merge_toml(base_val, overlay_val))
    } else {
        Ok(overlay_val)
    }
}

/// Load config from the given path, or `config/default.toml`, then apply env-var overrides.
/// If no path is given and `config/default.toml` does not exist, built-in defaults are used.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let overrides = Overrides::from_env();

    if let Some(path) = config_path {
        return load_from(Path::new(path), &overrides);
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        load_from(default_path, &overrides)
    } else {
        resolve(RawConfig::default(), &overrides)
    }
}

/// Loader that accepts an explicit path and overrides.
/// Follows `[meta] base = "..."` inheritance chains before resolving.
pub fn load_from(path: &Path, overrides: &Overrides) -> Result<Config, AppError> {
    let merged_val = load_raw_merged(path, &mut HashSet::new())?;

    let parsed: RawConfig = Deserialize::deserialize(merged_val)
        .map_err(|e: toml::de::Error| {
            AppError::Config(format!("config error in {}: {e}", path.display()))
        })?;

    resolve(parsed, overrides)
}

/// Turn the raw TOML shape into the public [`Config`].
fn resolve(parsed: RawConfig, overrides: &Overrides) -> Result<Config, AppError> {
    let prompt_style = match parsed.extraction.prompt_style.as_deref() {
        None => None,
        Some(s) => Some(PromptStyle::parse(s).ok_or_else(|| {
            AppError::Config(format!(
                "extraction.prompt_style must be \"summary\" or \"detailed\", got \"{s}\""
            ))
        })?),
    };

    if parsed.http.max_upload_bytes == 0 {
        return Err(AppError::Config("http.max_upload_bytes must be greater than zero".into()));
    }

    let cors_origins: Vec<String> = parsed
        .http
        .cors_origins
        .into_iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();

    Ok(Config {
        service_name: parsed.service.name,
        log_level: overrides
            .log_level
            .clone()
            .unwrap_or(parsed.service.log_level),
        log_file: parsed.service.log_file.as_deref().map(expand_home),
        http: HttpConfig {
            bind: overrides.bind.clone().unwrap_or(parsed.http.bind),
            cors_origins,
            max_upload_bytes: parsed.http.max_upload_bytes,
            static_dir: parsed.http.static_dir.as_deref().map(expand_home),
            prompts_dir: expand_home(&parsed.http.prompts_dir),
        },
        extraction: ExtractionDefaults {
            output_language: parsed.extraction.output_language,
            output_format: parsed.extraction.output_format,
            include_line_items: parsed.extraction.include_line_items,
            prompt_style,
        },
        inference: InferenceConfig {
            provider: parsed.inference.provider,
            remote: RemoteConfig {
                url: overrides
                    .remote_url
                    .clone()
                    .unwrap_or(parsed.inference.remote.url),
                timeout_seconds: parsed.inference.remote.timeout_seconds.max(1),
            },
            openai: OpenAiConfig {
                api_base_url: parsed.inference.openai.api_base_url,
                model: parsed.inference.openai.model,
                temperature: parsed.inference.openai.temperature,
                max_tokens: parsed.inference.openai.max_tokens,
                timeout_seconds: parsed.inference.openai.timeout_seconds.max(1),
            },
        },
        llm_api_key: env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty()),
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
