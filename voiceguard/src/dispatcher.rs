//! Dispatch of validated requests to the classifier.

use std::sync::Arc;

use tracing::{debug, error};

use crate::classifier::Classifier;
use crate::error::ApiError;
use crate::types::{ClassificationSuccess, ValidatedRequest};

/// Strip a data-URI prefix (`data:audio/mp3;base64,`).
///
/// Everything after the first comma is returned; payloads without a comma
/// are returned unchanged.
pub fn strip_data_uri(payload: &str) -> &str {
    match payload.split_once(',') {
        Some((_, rest)) => rest,
        None => payload,
    }
}

/// Invokes the classifier for a validated request.
#[derive(Clone)]
pub struct ClassificationDispatcher {
    classifier: Arc<dyn Classifier>,
}

impl ClassificationDispatcher {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// Single attempt; any classifier failure becomes [`ApiError::Internal`].
    pub async fn dispatch(
        &self,
        request: &ValidatedRequest,
    ) -> Result<ClassificationSuccess, ApiError> {
        let payload = strip_data_uri(&request.audio_base64);
        debug!(
            classifier = self.classifier.name(),
            language = %request.language,
            payload_len = payload.len(),
            "dispatching classification"
        );

        match self.classifier.classify(payload, request.language).await {
            Ok(result) => Ok(ClassificationSuccess::new(request.language, result)),
            Err(e) => {
                error!(
                    classifier = self.classifier.name(),
                    language = %request.language,
                    "voice analysis failed: {}",
                    e
                );
                Err(ApiError::Internal)
            }
        }
    }
}
