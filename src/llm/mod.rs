//! Inference backend abstraction.
//!
//! `InferenceBackend` is an enum over concrete backends. Each backend makes
//! exactly one outbound call per document, bounded by its configured timeout,
//! and returns an [`InferenceOutput`] with the fields it could extract.
//!
//! Backends are shared immutable capabilities; clone them freely.

pub mod providers;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::subsystems::extraction::document::PreparedDocument;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown inference backend: {0}")]
    UnknownProvider(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("{0}")]
    Status(String),
    #[error("invalid response: {0}")]
    Decode(String),
}

// ── Request / response ───────────────────────────────────────────────────────

/// One document plus the prompt that goes with it.
#[derive(Debug, Clone, Copy)]
pub struct InferenceRequest<'a> {
    pub document: &'a PreparedDocument,
    pub prompt: &'a str,
    /// Field names the caller asked for.
    pub fields: &'a [String],
}

/// What a backend produced for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOutput {
    pub extracted_fields: Map<String, Value>,
    /// Upstream body as received (or the relevant part of it).
    pub raw_response: Value,
    pub confidence: Option<String>,
    pub processing_notes: Option<String>,
}

// ── Backend enum ──────────────────────────────────────────────────────────────

/// All available inference backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new match arms.
#[derive(Debug, Clone)]
pub enum InferenceBackend {
    Dummy(providers::dummy::DummyProvider),
    Remote(providers::remote::RemoteProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
}

impl InferenceBackend {
    /// Send one document to the backend.
    pub async fn extract(&self, request: InferenceRequest<'_>) -> Result<InferenceOutput, ProviderError> {
        match self {
            InferenceBackend::Dummy(p) => p.extract(request).await,
            InferenceBackend::Remote(p) => p.extract(request).await,
            InferenceBackend::OpenAiCompatible(p) => p.extract(request).await,
        }
    }

    /// Reachability probe. Any HTTP answer counts as reachable.
    pub async fn ping(&self) -> Result<(), ProviderError> {
        match self {
            InferenceBackend::Dummy(_) => Ok(()),
            InferenceBackend::Remote(p) => p.ping().await,
            InferenceBackend::OpenAiCompatible(p) => p.ping().await,
        }
    }

    /// Whether the backend reads the extracted document content. The remote
    /// relay forwards the original bytes and leaves extraction to the far side.
    pub fn reads_content(&self) -> bool {
        !matches!(self, InferenceBackend::Remote(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            InferenceBackend::Dummy(_) => "dummy",
            InferenceBackend::Remote(_) => "remote",
            InferenceBackend::OpenAiCompatible(_) => "openai",
        }
    }
}
