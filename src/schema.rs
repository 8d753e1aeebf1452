//! The response contract: the schema declared to the provider and the
//! parser that enforces it on the way back.
//!
//! The provider is never trusted past this module. [`parse_response`] is the
//! only way to obtain an [`AnalysisResult`], and it either yields a fully
//! populated value or a [`SchemaError`]; there is no partially valid result
//! and no field-by-field defaulting.

use crate::output::AnalysisResult;
use serde_json::{json, Value};
use thiserror::Error;

/// Top-level fields every response must carry.
pub const REQUIRED_FIELDS: [&str; 9] = [
    "summary",
    "metrics",
    "chartData",
    "expenseBreakdown",
    "comparisonData",
    "insights",
    "riskRating",
    "riskReason",
    "currency",
];

/// Why a provider answer was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// The text is not JSON at all.
    #[error("response is not valid JSON: {0}")]
    Malformed(String),

    /// JSON, but the top level is not an object.
    #[error("response is JSON but not an object")]
    NotAnObject,

    /// A required field is absent or `null`.
    #[error("required field `{0}` is missing or null")]
    MissingField(&'static str),

    /// Field present with the wrong type or enum value.
    #[error("response does not match the declared schema: {0}")]
    Mismatch(String),
}

/// The response schema in the OpenAPI subset that Gemini's
/// `generationConfig.responseSchema` accepts.
///
/// Other providers get the same document embedded in their instruction.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": { "type": "STRING" },
            "currency": { "type": "STRING" },
            "riskReason": { "type": "STRING" },
            "metrics": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "label": { "type": "STRING" },
                        "value": { "type": "STRING" },
                        "trend": { "type": "STRING", "enum": ["up", "down", "neutral"] },
                        "change": { "type": "STRING" },
                        "color": { "type": "STRING" },
                        "details": { "type": "STRING" }
                    },
                    "required": ["label", "value", "trend", "change", "color"]
                }
            },
            "chartData": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "period": { "type": "STRING" },
                        "revenue": { "type": "NUMBER" },
                        "expenses": { "type": "NUMBER" },
                        "profit": { "type": "NUMBER" }
                    },
                    "required": ["period", "revenue", "expenses", "profit"]
                }
            },
            "expenseBreakdown": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "value": { "type": "NUMBER" },
                        "color": { "type": "STRING" }
                    },
                    "required": ["name", "value", "color"]
                }
            },
            "comparisonData": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "label": { "type": "STRING" },
                        "current": { "type": "NUMBER" },
                        "previous": { "type": "NUMBER" }
                    },
                    "required": ["label", "current", "previous"]
                }
            },
            "insights": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "category": { "type": "STRING" },
                        "title": { "type": "STRING" },
                        "description": { "type": "STRING" },
                        "recommendation": { "type": "STRING" },
                        "severity": { "type": "STRING", "enum": ["high", "medium", "low"] }
                    },
                    "required": ["category", "title", "description", "recommendation", "severity"]
                }
            },
            "riskRating": { "type": "NUMBER" }
        },
        "required": REQUIRED_FIELDS
    })
}

/// Parse the provider's raw text into an [`AnalysisResult`].
///
/// Top-level required fields are checked by name first so the error says
/// which one is missing; nested shape and enum checks are delegated to serde.
pub fn parse_response(raw: &str) -> Result<AnalysisResult, SchemaError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| SchemaError::Malformed(e.to_string()))?;

    let object = value.as_object().ok_or(SchemaError::NotAnObject)?;
    for field in REQUIRED_FIELDS {
        match object.get(field) {
            None | Some(Value::Null) => return Err(SchemaError::MissingField(field)),
            Some(_) => {}
        }
    }

    serde_json::from_value(value).map_err(|e| SchemaError::Mismatch(e.to_string()))
}
