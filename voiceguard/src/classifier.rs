//! The classification collaborator.
//!
//! The actual audio forensics happen outside this crate. [`Classifier`] is
//! the seam: production code plugs in [`GeminiClassifier`](crate::gemini::GeminiClassifier),
//! tests and offline runs plug in [`StaticClassifier`].

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::ClassifyError;
use crate::types::{Classification, ClassificationResult, Language};

/// Trait for audio classifiers.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify a base64-encoded MP3 sample spoken in `language`.
    ///
    /// Called once per request; implementations must not retry internally.
    async fn classify(
        &self,
        audio_base64: &str,
        language: Language,
    ) -> Result<ClassificationResult, ClassifyError>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "classifier"
    }
}

/// Deterministic classifier returning a fixed result.
#[derive(Debug)]
pub struct StaticClassifier {
    result: ClassificationResult,
    calls: AtomicUsize,
}

impl StaticClassifier {
    pub fn new(result: ClassificationResult) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `classify` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for StaticClassifier {
    fn default() -> Self {
        Self::new(ClassificationResult::new(
            Classification::Human,
            0.92,
            "Irregular micro-breaths and natural pitch variation; consistent noise floor.",
        ))
    }
}

#[async_trait]
impl Classifier for StaticClassifier {
    async fn classify(
        &self,
        _audio_base64: &str,
        _language: Language,
    ) -> Result<ClassificationResult, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}
