//! Wire types for the voice detection API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ApiError;

/// Languages the detector accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Tamil,
    English,
    Hindi,
    Malayalam,
    Telugu,
}

impl Language {
    /// All supported languages, in display order.
    pub const ALL: [Language; 5] = [
        Language::Tamil,
        Language::English,
        Language::Hindi,
        Language::Malayalam,
        Language::Telugu,
    ];

    /// Returns the wire name of the language.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Tamil => "Tamil",
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Malayalam => "Malayalam",
            Language::Telugu => "Telugu",
        }
    }

    /// Comma-joined list of supported languages, e.g. for error messages.
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(Language::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown language tag.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown language: {0}")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    /// Tags are matched exactly; "english" is not "English".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| UnknownLanguage(s.to_string()))
    }
}

/// Classification label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    AiGenerated,
    Human,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::AiGenerated => write!(f, "AI_GENERATED"),
            Classification::Human => write!(f, "HUMAN"),
        }
    }
}

/// Request body as received on the wire.
///
/// Every field is optional so that incomplete bodies can reach the
/// validator and be rejected with a proper message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,
}

impl ClassificationRequest {
    /// Create a request with all three fields set.
    pub fn new(
        language: impl Into<String>,
        audio_format: impl Into<String>,
        audio_base64: impl Into<String>,
    ) -> Self {
        Self {
            language: Some(language.into()),
            audio_format: Some(audio_format.into()),
            audio_base64: Some(audio_base64.into()),
        }
    }
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub language: Language,
    pub audio_format: String,
    pub audio_base64: String,
}

/// Output of the classification collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub classification: Classification,
    /// Certainty in [0.0, 1.0].
    pub confidence_score: f64,
    pub explanation: String,
}

impl ClassificationResult {
    pub fn new(
        classification: Classification,
        confidence_score: f64,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            classification,
            confidence_score,
            explanation: explanation.into(),
        }
    }
}

/// Success payload: the collaborator result plus the echoed language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationSuccess {
    pub language: Language,
    pub classification: Classification,
    pub confidence_score: f64,
    pub explanation: String,
}

impl ClassificationSuccess {
    pub fn new(language: Language, result: ClassificationResult) -> Self {
        Self {
            language,
            classification: result.classification,
            confidence_score: result.confidence_score,
            explanation: result.explanation,
        }
    }
}

/// Response body, discriminated by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResponseEnvelope {
    Success(ClassificationSuccess),
    Error { message: String },
}

impl ResponseEnvelope {
    /// Create an error envelope.
    pub fn error(message: impl Into<String>) -> Self {
        ResponseEnvelope::Error {
            message: message.into(),
        }
    }

    /// Returns the wire status tag.
    pub fn status(&self) -> &'static str {
        match self {
            ResponseEnvelope::Success(_) => "success",
            ResponseEnvelope::Error { .. } => "error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResponseEnvelope::Success(_))
    }

    /// Returns the error message, if this is an error envelope.
    pub fn message(&self) -> Option<&str> {
        match self {
            ResponseEnvelope::Error { message } => Some(message),
            ResponseEnvelope::Success(_) => None,
        }
    }

    /// Returns the success payload, if any.
    pub fn success(&self) -> Option<&ClassificationSuccess> {
        match self {
            ResponseEnvelope::Success(s) => Some(s),
            ResponseEnvelope::Error { .. } => None,
        }
    }
}

impl From<ApiError> for ResponseEnvelope {
    fn from(err: ApiError) -> Self {
        ResponseEnvelope::error(err.to_string())
    }
}

impl From<ClassificationSuccess> for ResponseEnvelope {
    fn from(s: ClassificationSuccess) -> Self {
        ResponseEnvelope::Success(s)
    }
}
