//! VoiceGuard - voice authenticity detection API.
//!
//! This crate implements the controller behind `POST /api/voice-detection`:
//! a caller submits a language tag and a base64-encoded MP3 sample and gets
//! back either a classification (HUMAN / AI_GENERATED) or a structured error.
//!
//! - Request validation against a fixed contract (API key, required fields,
//!   language, audio format)
//! - Dispatch to a pluggable [`Classifier`] (Google Gemini, or a fixed stub)
//! - A self-verifying scenario harness that drives the pipeline through a
//!   fixed table of cases
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use voiceguard::{ClassificationRequest, Headers, ServiceConfig, StaticClassifier, VoiceDetectionHandler};
//!
//! let config = ServiceConfig::default();
//! let handler = VoiceDetectionHandler::new(&config, Arc::new(StaticClassifier::default()));
//!
//! let headers = Headers::new().with("x-api-key", &config.api_key);
//! let body = ClassificationRequest::new("Tamil", "mp3", voiceguard::fixtures::silence_mp3_base64());
//! let response = handler.handle(&headers, &body).await;
//! ```
//!
//! # Modules
//!
//! - [`types`]: Wire types and the response envelope
//! - [`validator`]: Header and body validation
//! - [`dispatcher`]: Collaborator invocation and result mapping
//! - [`classifier`]: The collaborator trait and a deterministic implementation
//! - [`gemini`]: Gemini-backed classifier
//! - [`scenario`]: The fixed scenario table
//! - [`runner`]: Sequential scenario runner with progress tracking

pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod exchange;
pub mod fixtures;
pub mod gemini;
pub mod handler;
pub mod runner;
pub mod scenario;
pub mod types;
pub mod validator;

// Re-exports for convenience
pub use classifier::{Classifier, StaticClassifier};
pub use config::{GeminiSettings, RunnerSettings, ServiceConfig};
pub use dispatcher::{strip_data_uri, ClassificationDispatcher};
pub use error::{ApiError, ClassifyError, RunnerError};
pub use exchange::ExchangeLog;
pub use gemini::GeminiClassifier;
pub use handler::VoiceDetectionHandler;
pub use runner::{
    RunReport, RunState, RunStats, RunStatus, ScenarioOutcome, ScenarioRunner, ScenarioState,
};
pub use scenario::{default_scenarios, Category, ExpectedStatus, ObservedStatus, Scenario};
pub use types::{
    Classification, ClassificationRequest, ClassificationResult, ClassificationSuccess, Language,
    ResponseEnvelope, ValidatedRequest,
};
pub use validator::{Headers, RequestValidator};

/// Route path of the voice detection endpoint.
pub const VOICE_DETECTION_PATH: &str = "/api/voice-detection";
