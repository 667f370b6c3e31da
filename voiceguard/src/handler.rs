//! The voice detection controller: validation followed by dispatch.

use std::sync::Arc;

use tracing::{info, warn};

use crate::classifier::Classifier;
use crate::config::ServiceConfig;
use crate::dispatcher::ClassificationDispatcher;
use crate::error::ApiError;
use crate::types::{ClassificationRequest, ClassificationSuccess, ResponseEnvelope};
use crate::validator::{Headers, RequestValidator};

/// Controller for `POST /api/voice-detection`.
///
/// Holds only read-only state and may be shared across tasks.
#[derive(Clone)]
pub struct VoiceDetectionHandler {
    validator: RequestValidator,
    dispatcher: ClassificationDispatcher,
    endpoint: String,
}

impl VoiceDetectionHandler {
    pub fn new(config: &ServiceConfig, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            validator: RequestValidator::new(config.api_key.clone()),
            dispatcher: ClassificationDispatcher::new(classifier),
            endpoint: config.endpoint.clone(),
        }
    }

    /// Endpoint URL for display.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Handle a request and produce the response envelope.
    pub async fn handle(&self, headers: &Headers, body: &ClassificationRequest) -> ResponseEnvelope {
        match self.process(headers, body).await {
            Ok(success) => success.into(),
            Err(e) => e.into(),
        }
    }

    /// Like [`handle`](Self::handle) but keeps the error kind.
    pub async fn process(
        &self,
        headers: &Headers,
        body: &ClassificationRequest,
    ) -> Result<ClassificationSuccess, ApiError> {
        let request = self.validator.validate(headers, body).inspect_err(|e| {
            warn!(endpoint = %self.endpoint, kind = e.kind(), "request rejected: {}", e);
        })?;

        let success = self.dispatcher.dispatch(&request).await?;
        info!(
            endpoint = %self.endpoint,
            language = %success.language,
            classification = %success.classification,
            confidence = success.confidence_score,
            "voice analysis complete"
        );
        Ok(success)
    }
}
