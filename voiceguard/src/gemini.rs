//! Google Gemini classifier.
//!
//! Sends the audio sample inline with a forensic-analysis prompt and asks for
//! structured JSON output matching [`ClassificationResult`].
//!
//! # Example
//!
//! ```rust,ignore
//! use voiceguard::gemini::GeminiClassifier;
//! use voiceguard::{Classifier, GeminiSettings, Language};
//!
//! let classifier = GeminiClassifier::new(GeminiSettings {
//!     api_key: "AIza...".to_string(),
//!     ..Default::default()
//! })?;
//! let result = classifier.classify(&audio_base64, Language::English).await?;
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::classifier::Classifier;
use crate::config::GeminiSettings;
use crate::error::ClassifyError;
use crate::types::{ClassificationResult, Language};

const SYSTEM_INSTRUCTION: &str = "You are a world-class audio forensic analyst. \
Your analysis must be extremely critical. If you detect ANY signs of neural synthesis \
(vocoder artifacts, unnatural phase coherence), classify as AI_GENERATED. \
Be precise with your confidence score based on the strength of the artifacts found.";

const AUDIO_MIME_TYPE: &str = "audio/mp3";

/// Gemini-backed classifier.
pub struct GeminiClassifier {
    client: Client,
    settings: GeminiSettings,
}

impl GeminiClassifier {
    /// Create a classifier. Fails if no API key is configured.
    pub fn new(settings: GeminiSettings) -> Result<Self, ClassifyError> {
        if settings.api_key.is_empty() {
            return Err(ClassifyError::MissingApiKey);
        }
        let client = Client::builder().timeout(settings.timeout()).build()?;
        Ok(Self { client, settings })
    }

    /// Get the settings.
    pub fn settings(&self) -> &GeminiSettings {
        &self.settings
    }

    fn api_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model,
            self.settings.api_key
        )
    }

    /// Build the `generateContent` request body.
    pub fn build_request(&self, audio_base64: &str, language: Language) -> Value {
        json!({
            "systemInstruction": {
                "parts": [{"text": SYSTEM_INSTRUCTION}]
            },
            "contents": [{
                "role": "user",
                "parts": [
                    {"text": forensic_prompt(language)},
                    {"inline_data": {"mime_type": AUDIO_MIME_TYPE, "data": audio_base64}},
                ]
            }],
            "generationConfig": {
                "maxOutputTokens": self.settings.max_output_tokens,
                "thinkingConfig": {"thinkingBudget": self.settings.thinking_budget},
                "responseMimeType": "application/json",
                "responseSchema": response_schema(),
            }
        })
    }
}

fn forensic_prompt(language: Language) -> String {
    format!(
        "Perform a deep forensic acoustic analysis on the provided audio sample to detect \
if it is AI-generated (Deepfake/TTS) or Human.

Target Language: {language}

Analysis Framework:
1. Spectral Artifacts: listen for high-frequency metallic buzzing, phasing, or vocoder quality common in neural vocoders.
2. Breath Dynamics: humans have natural, irregular micro-breaths between phrases; synthetic speech has none, or repetitive breath sounds that do not match the exertion of speech.
3. Prosody & Intonation: check for flat pitch or unnaturally perfect rhythm (isochrony).
4. Noise Floor: humans have a consistent background noise floor; synthetic audio often has digital silence between words or spectral gating artifacts.
5. Glottal Artifacts: listen to vocal fry and glottal stops.

Evaluate the evidence and determine the likelihood.

Return a strictly formatted JSON response."
    )
}

fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "classification": {"type": "STRING", "enum": ["AI_GENERATED", "HUMAN"]},
            "confidenceScore": {
                "type": "NUMBER",
                "description": "A precise float between 0.0 and 1.0 representing certainty. 1.0 is absolute certainty."
            },
            "explanation": {
                "type": "STRING",
                "description": "Technical forensic explanation citing specific artifacts (e.g., 'Lack of breathing sounds', 'Metallic phasing at 8kHz')."
            }
        },
        "required": ["classification", "confidenceScore", "explanation"]
    })
}

/// Extract and check the classification from a `generateContent` response.
pub fn parse_response(json: &Value) -> Result<ClassificationResult, ClassifyError> {
    if let Some(err) = json.get("error") {
        let msg = err["message"].as_str().unwrap_or("Unknown error");
        return Err(ClassifyError::Malformed(format!("Gemini error: {}", msg)));
    }

    // Skip thought parts; the answer is the first plain text part.
    let text = json["candidates"][0]["content"]["parts"]
        .as_array()
        .and_then(|parts| {
            parts
                .iter()
                .filter(|p| !p["thought"].as_bool().unwrap_or(false))
                .find_map(|p| p["text"].as_str())
        })
        .filter(|t| !t.trim().is_empty())
        .ok_or(ClassifyError::EmptyResponse)?;

    let result: ClassificationResult = serde_json::from_str(text.trim())?;
    check_result(&result)?;
    Ok(result)
}

fn check_result(result: &ClassificationResult) -> Result<(), ClassifyError> {
    if !(0.0..=1.0).contains(&result.confidence_score) {
        return Err(ClassifyError::Malformed(format!(
            "confidenceScore {} outside [0.0, 1.0]",
            result.confidence_score
        )));
    }
    if result.explanation.trim().is_empty() {
        return Err(ClassifyError::Malformed("empty explanation".to_string()));
    }
    Ok(())
}

#[async_trait]
impl Classifier for GeminiClassifier {
    async fn classify(
        &self,
        audio_base64: &str,
        language: Language,
    ) -> Result<ClassificationResult, ClassifyError> {
        let body = self.build_request(audio_base64, language);

        let response = self
            .client
            .post(self.api_url())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(ClassifyError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let json: Value = response.json().await?;
        parse_response(&json)
    }

    fn name(&self) -> &str {
        &self.settings.model
    }
}
