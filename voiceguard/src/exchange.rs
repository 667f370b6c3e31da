//! Request/response log for display.

use std::fmt;

use serde_json::{json, Value};

use crate::types::{ClassificationRequest, ResponseEnvelope};
use crate::validator::Headers;

/// Payloads longer than this are truncated in the log.
const TRUNCATE_ABOVE: usize = 50;

/// Characters kept from a truncated payload.
const KEEP_PREFIX: usize = 30;

/// One request and (optionally) its response.
#[derive(Debug, Clone)]
pub struct ExchangeLog {
    pub endpoint: String,
    pub headers: Headers,
    pub body: ClassificationRequest,
    pub response: Option<ResponseEnvelope>,
}

impl ExchangeLog {
    pub fn new(endpoint: impl Into<String>, headers: Headers, body: ClassificationRequest) -> Self {
        Self {
            endpoint: endpoint.into(),
            headers,
            body,
            response: None,
        }
    }

    pub fn with_response(mut self, response: ResponseEnvelope) -> Self {
        self.response = Some(response);
        self
    }

    /// Request as JSON, with the audio payload shortened.
    pub fn request_json(&self) -> Value {
        let mut body = serde_json::to_value(&self.body).unwrap_or_else(|_| json!({}));
        if let Some(audio) = body.get_mut("audioBase64") {
            if let Some(s) = audio.as_str() {
                *audio = Value::String(truncate_payload(s));
            }
        }
        json!({
            "headers": self.headers,
            "body": body,
        })
    }
}

/// Shorten a long base64 payload for display.
pub fn truncate_payload(s: &str) -> String {
    if s.chars().count() <= TRUNCATE_ABOVE {
        return s.to_string();
    }
    let prefix: String = s.chars().take(KEEP_PREFIX).collect();
    format!("{}...[truncated]...", prefix)
}

impl fmt::Display for ExchangeLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ">>> POST {}", self.endpoint)?;
        let request = serde_json::to_string_pretty(&self.request_json()).map_err(|_| fmt::Error)?;
        writeln!(f, "{}", request)?;
        writeln!(f)?;
        match &self.response {
            Some(response) => {
                writeln!(f, "<<< Response Body ({})", response.status())?;
                let body = serde_json::to_string_pretty(response).map_err(|_| fmt::Error)?;
                writeln!(f, "{}", body)
            }
            None => writeln!(f, "<<< Waiting for response..."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_payload_untouched() {
        assert_eq!(truncate_payload("SUQz"), "SUQz");
        let exactly = "A".repeat(50);
        assert_eq!(truncate_payload(&exactly), exactly);
    }

    #[test]
    fn long_payload_truncated() {
        let long = "B".repeat(51);
        assert_eq!(
            truncate_payload(&long),
            format!("{}...[truncated]...", "B".repeat(30))
        );
    }

    #[test]
    fn render_shows_endpoint_and_status() {
        let log = ExchangeLog::new(
            "https://example.test/api/voice-detection",
            Headers::new().with("x-api-key", "k"),
            ClassificationRequest::new("Tamil", "mp3", "C".repeat(400)),
        )
        .with_response(ResponseEnvelope::error("Invalid API key or malformed request"));

        let out = log.to_string();
        assert!(out.starts_with(">>> POST https://example.test/api/voice-detection"));
        assert!(out.contains("...[truncated]..."));
        assert!(!out.contains(&"C".repeat(31)));
        assert!(out.contains("<<< Response Body (error)"));
        assert!(out.contains("Invalid API key"));
    }

    #[test]
    fn pending_response() {
        let log = ExchangeLog::new("e", Headers::new(), ClassificationRequest::default());
        assert!(log.to_string().contains("Waiting for response"));
        assert_eq!(log.request_json()["body"], json!({}));
    }
}
