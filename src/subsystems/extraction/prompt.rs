//! Extraction prompt generation.
//!
//! Two prompt forms exist:
//!
//! - the **summary** prompt, a one-line field list that the remote relay
//!   endpoint expands on its side;
//! - the **detailed** prompt, a full instruction block with guidelines and the
//!   expected JSON skeleton, used for chat-completion backends.
//!
//! The detailed body is a template loaded through [`PromptBuilder`] from
//! `<prompts_dir>/invoice_extraction.md`, falling back to a built-in copy with
//! the same placeholders when the file is missing.
//!
//! ## Placeholders
//!
//! ```text
//! {{fields}}          "- name: description" lines
//! {{json_structure}}  one skeleton entry per field
//! {{guidelines}}      numbered extraction guidelines
//! {{language}}        output language code
//! ```

use std::fs;
use std::path::PathBuf;

use super::fields::{self, FieldKind, LINE_ITEMS};
use super::ExtractionConfig;

const SEPARATOR: &str = "\n\n";

pub const EXTRACTION_TEMPLATE_FILE: &str = "invoice_extraction.md";

const BUILTIN_EXTRACTION_TEMPLATE: &str = r#"You are an expert invoice data extraction system. Analyze the provided invoice document and extract the following information:

REQUIRED FIELDS:
{{fields}}

EXTRACTION GUIDELINES:
{{guidelines}}

OUTPUT FORMAT:
Return the extracted data as a JSON object with the following structure:
{
    "extracted_fields": {
        {{json_structure}}
    },
    "confidence_score": "percentage of confidence in extraction accuracy",
    "processing_notes": "any relevant notes about the extraction process"
}

LANGUAGE: Extract and return all text in {{language}}

IMPORTANT: Only return the JSON object, no additional text or explanations."#;

const LINE_ITEMS_SKELETON: &str = r#""line_items": [
        {
            "description": "item description",
            "quantity": "quantity",
            "unit_price": "price per unit",
            "total": "total amount"
        }
    ]"#;

/// Fluent builder that assembles a layered prompt from template files.
///
/// Layers are trimmed and joined with a blank line; `{{key}}` placeholders
/// are substituted in a single left-to-right pass at [`build`](Self::build)
/// time. Substituted values are never rescanned, so a value that itself
/// contains `{{...}}` stays literal.
pub struct PromptBuilder {
    prompts_dir: PathBuf,
    parts: Vec<String>,
    vars: Vec<(String, String)>,
}

impl PromptBuilder {
    /// Create a builder rooted at `prompts_dir` (e.g. `"config/prompts"`).
    pub fn new(prompts_dir: impl Into<PathBuf>) -> Self {
        Self {
            prompts_dir: prompts_dir.into(),
            parts: Vec::new(),
            vars: Vec::new(),
        }
    }

    /// Append a layer loaded from `filename`, or `fallback` when the file is
    /// missing or empty.
    pub fn layer_or(mut self, filename: &str, fallback: &str) -> Self {
        let path = self.prompts_dir.join(filename);
        let text = match fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) | Err(_) => {
                tracing::debug!(path = %path.display(), "prompt layer not found, using fallback");
                fallback.to_string()
            }
        };
        self.push(text);
        self
    }

    /// Register a `{{key}}` substitution. A later value for the same key wins.
    pub fn var(mut self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.vars.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.vars.push((key.to_string(), value)),
        }
        self
    }

    /// Join all layers and apply variable substitution.
    pub fn build(self) -> String {
        substitute(&self.parts.join(SEPARATOR), &self.vars)
    }

    fn push(&mut self, text: String) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.parts.push(trimmed.to_string());
        }
    }
}

/// Replace known `{{key}}` placeholders in `template`. Unknown ones are kept.
fn substitute(template: &str, vars: &[(String, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let known = after.find("}}").and_then(|end| {
            let key = &after[..end];
            vars.iter().find(|(k, _)| k == key).map(|(_, v)| (end, v))
        });
        match known {
            Some((end, value)) => {
                out.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// `Extract the following fields from the invoice: Vendor Name, Total Amount.`
pub fn summary_prompt(fields: &[String]) -> String {
    let names: Vec<String> = fields.iter().map(|f| fields::humanize(f)).collect();
    format!("Extract the following fields from the invoice: {}.", names.join(", "))
}

/// One `- field: description` line per field.
pub fn field_list<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| format!("- {}: {}", f.as_ref(), fields::describe(f.as_ref())))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Expected-output skeleton, one entry per field.
pub fn json_structure<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| {
            let f = f.as_ref();
            match FieldKind::of(f) {
                FieldKind::LineItems => LINE_ITEMS_SKELETON.to_string(),
                FieldKind::Amount => format!("\"{f}\": \"amount with currency\""),
                FieldKind::Date => format!("\"{f}\": \"YYYY-MM-DD\""),
                FieldKind::Quantity => format!("\"{f}\": \"numeric quantity\""),
                FieldKind::Text => format!("\"{f}\": \"extracted value\""),
            }
        })
        .collect::<Vec<_>>()
        .join(",\n        ")
}

/// Numbered extraction guidelines. The line-items rule only appears when
/// line items are requested.
fn guidelines(with_line_items: bool) -> String {
    let mut rules = vec![
        "Extract information exactly as it appears in the document",
        "For dates, use the format found in the document or convert to YYYY-MM-DD if unclear",
        "For monetary amounts, include currency symbols and preserve decimal places",
    ];
    if with_line_items {
        rules.push("For line items, extract all available items with their details");
    }
    rules.push("If a field is not found, use null or empty string");
    rules.push("Be precise and accurate - double-check all extracted values");

    rules
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {r}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full instruction prompt for `config`.
pub fn extraction_prompt(prompts_dir: impl Into<PathBuf>, config: &ExtractionConfig) -> String {
    let fields = config.effective_fields();
    let with_line_items = fields.iter().any(|f| f == LINE_ITEMS);

    PromptBuilder::new(prompts_dir)
        .layer_or(EXTRACTION_TEMPLATE_FILE, BUILTIN_EXTRACTION_TEMPLATE)
        .var("fields", field_list(&fields))
        .var("json_structure", json_structure(&fields))
        .var("guidelines", guidelines(with_line_items))
        .var("language", config.output_language.clone())
        .build()
}
