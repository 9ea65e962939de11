//! Invoice extraction pipeline.
//!
//! [`InvoiceProcessor`] owns the configured inference backend and turns each
//! upload into a [`FileResult`]: classify, prepare content when the backend
//! reads it, build the prompt, call the backend once, align the returned
//! fields with the request.
//! Failures are captured per file and never abort a batch.

pub mod document;
pub mod fields;
pub mod parser;
pub mod prompt;

use std::path::PathBuf;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::{Config, ExtractionDefaults, PromptStyle};
use crate::llm::{InferenceBackend, InferenceOutput, InferenceRequest, ProviderError, providers};
use document::{DocumentError, UploadedDocument};

/// Per-request extraction settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionConfig {
    pub fields: Vec<String>,
    pub output_language: String,
    pub output_format: String,
    pub include_line_items: bool,
}

impl ExtractionConfig {
    /// `fields` with the configured defaults for everything else.
    pub fn new(fields: Vec<String>, defaults: &ExtractionDefaults) -> Self {
        Self {
            fields,
            output_language: defaults.output_language.clone(),
            output_format: defaults.output_format.clone(),
            include_line_items: defaults.include_line_items,
        }
    }

    /// Fields that are prompted for and reported: `line_items` is dropped
    /// when line items are disabled.
    pub fn effective_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| self.include_line_items || f.as_str() != fields::LINE_ITEMS)
            .cloned()
            .collect()
    }
}

/// Outcome for one uploaded file, as returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    pub file_name: String,
    pub prompt_used: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_fields: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Which stage failed; not part of the wire format.
    #[serde(skip)]
    pub failure: Option<FailureKind>,
}

/// Where a per-file failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The upload itself was unusable (type, empty, unreadable PDF).
    Document,
    /// The inference backend call failed.
    Backend,
}

impl FileResult {
    fn success(file_name: String, prompt_used: String, requested: &[String], output: InferenceOutput) -> Self {
        Self {
            file_name,
            prompt_used,
            extracted_fields: Some(parser::align_fields(requested, output.extracted_fields)),
            raw_response: Some(output.raw_response),
            confidence: output.confidence,
            processing_notes: output.processing_notes,
            error: None,
            failure: None,
        }
    }

    fn failure(file_name: String, prompt_used: String, error: &ExtractionError) -> Self {
        let kind = match error {
            ExtractionError::Document(_) => FailureKind::Document,
            ExtractionError::Inference(_) => FailureKind::Backend,
        };
        Self {
            file_name,
            prompt_used,
            extracted_fields: None,
            raw_response: None,
            confidence: None,
            processing_notes: None,
            error: Some(error.to_string()),
            failure: Some(kind),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Inference(#[from] ProviderError),
}

/// Runs uploads through the configured backend.
#[derive(Debug, Clone)]
pub struct InvoiceProcessor {
    backend: InferenceBackend,
    defaults: ExtractionDefaults,
    prompts_dir: PathBuf,
    prompt_style: PromptStyle,
}

impl InvoiceProcessor {
    pub fn new(
        backend: InferenceBackend,
        defaults: ExtractionDefaults,
        prompts_dir: PathBuf,
        prompt_style: PromptStyle,
    ) -> Self {
        Self { backend, defaults, prompts_dir, prompt_style }
    }

    /// Build the backend named in `config` and wrap it.
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let backend = providers::build(&config.inference, config.llm_api_key.clone())?;
        Ok(Self::new(
            backend,
            config.extraction.clone(),
            config.http.prompts_dir.clone(),
            config.effective_prompt_style(),
        ))
    }

    pub fn backend(&self) -> &InferenceBackend {
        &self.backend
    }

    pub fn defaults(&self) -> &ExtractionDefaults {
        &self.defaults
    }

    pub fn prompt_style(&self) -> PromptStyle {
        self.prompt_style
    }

    /// Prompt sent along with every document of a request.
    pub fn prompt_for(&self, config: &ExtractionConfig) -> String {
        match self.prompt_style {
            PromptStyle::Summary => prompt::summary_prompt(&config.effective_fields()),
            PromptStyle::Detailed => prompt::extraction_prompt(&self.prompts_dir, config),
        }
    }

    /// Process one upload. Never fails: errors land in `FileResult::error`.
    pub async fn process_file(&self, upload: UploadedDocument, config: &ExtractionConfig) -> FileResult {
        let file_name = upload.file_name.clone();
        let prompt = self.prompt_for(config);
        let requested = config.effective_fields();

        match self.run(upload, &prompt, &requested).await {
            Ok(output) => {
                info!(
                    file_name = %file_name,
                    backend = self.backend.name(),
                    fields = output.extracted_fields.len(),
                    "invoice processed"
                );
                FileResult::success(file_name, prompt, &requested, output)
            }
            Err(e) => {
                warn!(file_name = %file_name, backend = self.backend.name(), error = %e, "invoice failed");
                FileResult::failure(file_name, prompt, &e)
            }
        }
    }

    async fn run(
        &self,
        upload: UploadedDocument,
        prompt: &str,
        requested: &[String],
    ) -> Result<InferenceOutput, ExtractionError> {
        let prepared = document::prepare(upload, self.backend.reads_content()).await?;
        let request = InferenceRequest { document: &prepared, prompt, fields: requested };
        Ok(self.backend.extract(request).await?)
    }

    /// Process uploads one after another, in order. One result per upload.
    pub async fn process_batch(&self, uploads: Vec<UploadedDocument>, config: &ExtractionConfig) -> Vec<FileResult> {
        let batch_id = Uuid::new_v4();
        let span = info_span!("batch", %batch_id, files = uploads.len());

        async move {
            debug!(
                fields = ?config.fields,
                language = %config.output_language,
                format = %config.output_format,
                line_items = config.include_line_items,
                style = self.prompt_style.as_str(),
                "batch started"
            );
            let mut results = Vec::with_capacity(uploads.len());
            for upload in uploads {
                results.push(self.process_file(upload, config).await);
            }
            let failed = results.iter().filter(|r| r.is_error()).count();
            info!(processed = results.len(), failed, "batch complete");
            results
        }
        .instrument(span)
        .await
    }
}
