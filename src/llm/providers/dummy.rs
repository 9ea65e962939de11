//! Dummy backend: answers with canned invoice values and never touches the
//! network. Used for local runs and for exercising the HTTP surface in tests.

use serde_json::{Map, Value, json};

use crate::llm::{InferenceOutput, InferenceRequest, ProviderError};

const MOCK_VALUES: &[(&str, &str)] = &[
    ("vendor_name", "XYZ Corp"),
    ("invoice_number", "INV-2024-001"),
    ("total_amount", "149.50"),
];

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    /// Canned value for each requested field, `null` for the rest.
    pub async fn extract(&self, request: InferenceRequest<'_>) -> Result<InferenceOutput, ProviderError> {
        let mut fields = Map::new();
        for name in request.fields {
            let value = MOCK_VALUES
                .iter()
                .find(|(k, _)| *k == name.as_str())
                .map(|(_, v)| Value::String((*v).to_string()))
                .unwrap_or(Value::Null);
            fields.insert(name.clone(), value);
        }

        Ok(InferenceOutput {
            extracted_fields: fields,
            raw_response: json!({ "status": "mocked" }),
            confidence: None,
            processing_notes: None,
        })
    }
}
