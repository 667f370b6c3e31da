//! Error types for VoiceGuard.

use thiserror::Error;

/// Caller-facing error taxonomy.
///
/// The `Display` output is exactly the message placed in the error envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Credential missing or wrong
    #[error("Invalid API key or malformed request")]
    Auth,

    /// Request shape rejected
    #[error("{0}")]
    Validation(String),

    /// Collaborator failed; the cause is only logged
    #[error("Internal processing error during voice analysis.")]
    Internal,
}

impl ApiError {
    /// Short kind name, used in logs and for HTTP status mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Auth => "auth",
            ApiError::Validation(_) => "validation",
            ApiError::Internal => "internal",
        }
    }
}

/// Failures of the classification collaborator.
///
/// These never reach API callers.
#[derive(Error, Debug)]
pub enum ClassifyError {
    /// No API key configured for the remote model
    #[error("api key is required for gemini classifier")]
    MissingApiKey,

    /// Transport failure (connect, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the remote API
    #[error("Gemini API error {status}: {body}")]
    Api { status: u16, body: String },

    /// No text candidate in the response
    #[error("no response text received from model")]
    EmptyResponse,

    /// Output parsed but violates the result contract
    #[error("malformed model output: {0}")]
    Malformed(String),

    /// Output was not valid JSON for the result type
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Scenario runner errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    /// A run is already in progress
    #[error("a scenario run is already in progress")]
    AlreadyRunning,

    /// The run task was cancelled or panicked
    #[error("scenario run interrupted: {0}")]
    Interrupted(String),
}
