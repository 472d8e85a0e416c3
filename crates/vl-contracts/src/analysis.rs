use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Characters of raw model output kept as the summary when a structured
/// reply carries no `summary` of its own.
pub const SUMMARY_PREFIX_CHARS: usize = 500;
pub const STRUCTURED_CONFIDENCE: f64 = 0.9;
pub const FREEFORM_CONFIDENCE: f64 = 0.8;

/// Where an analysed image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    File,
    Clipboard,
    Url,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::File => "file",
            Provenance::Clipboard => "clipboard",
            Provenance::Url => "url",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub file_size: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub summary: String,
    pub confidence: f64,
    pub metadata: ImageMetadata,
}

/// An analysis as returned over the tool boundary: the result fields plus
/// the `source` tag, flattened into one JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcedAnalysis {
    #[serde(flatten)]
    pub result: AnalysisResult,
    pub source: Provenance,
}

/// Keys the model may use when it answers with a JSON object. Unknown keys
/// are ignored and every known key accepts any JSON shape, so an odd
/// `layout` never costs the reply its `summary`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StructuredReply {
    pub description: Option<Value>,
    pub content: Option<Value>,
    #[serde(rename = "type")]
    pub kind: Option<Value>,
    pub layout: Option<Value>,
    pub issues: Option<Value>,
    pub details: Option<Value>,
    pub summary: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    Structured { reply: StructuredReply, raw: String },
    Freeform(String),
}

impl Interpretation {
    /// Only a JSON object counts as structured; arrays and scalars are text.
    pub fn parse(raw: &str) -> Self {
        let decoded = serde_json::from_str::<Value>(raw).and_then(|value| match value {
            Value::Object(_) => serde_json::from_value::<StructuredReply>(value),
            other => Err(serde::de::Error::custom(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        });
        match decoded {
            Ok(reply) => Interpretation::Structured {
                reply,
                raw: raw.to_string(),
            },
            Err(err) => {
                log::debug!("model reply is not structured JSON ({err}); using freeform text");
                Interpretation::Freeform(raw.to_string())
            }
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Interpretation::Structured { .. })
    }

    pub fn into_result(self, metadata: ImageMetadata) -> AnalysisResult {
        match self {
            Interpretation::Structured { reply, raw } => {
                let summary = text_field(reply.summary)
                    .unwrap_or_else(|| raw.chars().take(SUMMARY_PREFIX_CHARS).collect());
                AnalysisResult {
                    description: text_field(reply.description).or(text_field(reply.content)),
                    kind: text_field(reply.kind),
                    layout: present(reply.layout),
                    issues: present(reply.issues),
                    details: present(reply.details),
                    summary,
                    confidence: STRUCTURED_CONFIDENCE,
                    metadata,
                }
            }
            Interpretation::Freeform(text) => AnalysisResult {
                description: None,
                kind: None,
                layout: None,
                issues: None,
                details: None,
                summary: text,
                confidence: FREEFORM_CONFIDENCE,
                metadata,
            },
        }
    }
}

/// Strings pass through; other non-null values are rendered as compact JSON.
/// Blank text counts as absent.
fn text_field(value: Option<Value>) -> Option<String> {
    let text = match value? {
        Value::Null => return None,
        Value::String(text) => text,
        other => other.to_string(),
    };
    (!text.trim().is_empty()).then_some(text)
}

fn present(value: Option<Value>) -> Option<Value> {
    value.filter(|value| !value.is_null())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
