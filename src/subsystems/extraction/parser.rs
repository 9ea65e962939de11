//! Best-effort parsing of model output into structured fields.
//!
//! Models are asked to answer with a bare JSON object but frequently wrap it
//! in prose or markdown fences. The parser looks for the object and never
//! fails: when nothing usable is found it returns the empty sentinel with a
//! note explaining why.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

/// First `{` to last `}` across lines.
static JSON_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("static regex"));

/// Contents of a ```` ```json ```` (or bare ```` ``` ````) fence.
static FENCED_JSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").expect("static regex"));

pub const NO_CONFIDENCE: &str = "0%";

/// Structured view of a model answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExtraction {
    pub extracted_fields: Map<String, Value>,
    pub confidence_score: Option<String>,
    pub processing_notes: Option<String>,
}

impl ParsedExtraction {
    /// Empty result carrying an explanation.
    pub fn sentinel(note: impl Into<String>) -> Self {
        Self {
            extracted_fields: Map::new(),
            confidence_score: Some(NO_CONFIDENCE.to_string()),
            processing_notes: Some(note.into()),
        }
    }

    /// Build from a decoded JSON object.
    ///
    /// An object with an `extracted_fields` (or `extractedFields`) key is the
    /// full envelope; any other object is taken to be the field map itself.
    pub fn from_object(mut obj: Map<String, Value>) -> Self {
        let confidence_score = obj
            .remove("confidence_score")
            .or_else(|| obj.remove("confidence"))
            .and_then(|v| scalar_to_string(&v));
        let processing_notes = obj
            .remove("processing_notes")
            .or_else(|| obj.remove("processingNotes"))
            .and_then(|v| scalar_to_string(&v));

        let fields = obj
            .remove("extracted_fields")
            .or_else(|| obj.remove("extractedFields"));

        let extracted_fields = match fields {
            Some(Value::Object(map)) => map,
            Some(_) => Map::new(),
            None => obj,
        };

        Self { extracted_fields, confidence_score, processing_notes }
    }
}

fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Pull `choices[0].message.content` out of an OpenAI-style response.
/// Returns `""` when the envelope does not have that shape.
pub fn response_content(response: &Value) -> &str {
    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or("")
}

/// Locate the JSON object inside free text.
fn find_json_block(text: &str) -> Option<&str> {
    if let Some(caps) = FENCED_JSON_RE.captures(text) {
        if let Some(m) = caps.get(1) {
            return Some(m.as_str());
        }
    }
    JSON_OBJECT_RE.find(text).map(|m| m.as_str())
}

/// Parse a model's free-text answer. Never fails.
pub fn parse_model_response(text: &str) -> ParsedExtraction {
    let trimmed = text.trim();

    let candidate = if trimmed.starts_with('{') {
        Some(trimmed)
    } else {
        find_json_block(trimmed)
    };

    let Some(block) = candidate else {
        return ParsedExtraction::sentinel(format!("Could not parse model response: {trimmed}"));
    };

    match serde_json::from_str::<Value>(block) {
        Ok(Value::Object(obj)) => ParsedExtraction::from_object(obj),
        Ok(other) => ParsedExtraction::sentinel(format!(
            "Error parsing response: expected a JSON object, got {}",
            kind_name(&other)
        )),
        Err(e) => ParsedExtraction::sentinel(format!("Error parsing response: {e}")),
    }
}

fn kind_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Make every requested field present, `null` where the model had nothing.
///
/// Requested fields come first, in request order; extra keys the model
/// returned are kept after them.
pub fn align_fields(requested: &[String], mut extracted: Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for field in requested {
        let value = extracted.remove(field).unwrap_or(Value::Null);
        out.insert(field.clone(), value);
    }
    out.extend(extracted);
    out
}
