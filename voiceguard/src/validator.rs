//! Request validation.
//!
//! Checks run in a fixed order and stop at the first failure:
//! credential, required fields, language, audio format.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::types::{ClassificationRequest, Language, ValidatedRequest};

/// Canonical credential header name.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Upper-case spelling accepted as a fallback.
pub const API_KEY_HEADER_UPPER: &str = "X-API-KEY";

/// Only accepted audio format (compared case-insensitively).
pub const SUPPORTED_AUDIO_FORMAT: &str = "mp3";

/// Request headers as name/value pairs.
///
/// Names are stored as given; lookups are exact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// The presented credential: `x-api-key`, or `X-API-KEY` when the
    /// lower-case header is absent or empty.
    pub fn api_key(&self) -> Option<&str> {
        self.get(API_KEY_HEADER)
            .filter(|v| !v.is_empty())
            .or_else(|| self.get(API_KEY_HEADER_UPPER))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Validates headers and body against the API contract.
#[derive(Clone)]
pub struct RequestValidator {
    api_key: String,
}

impl std::fmt::Debug for RequestValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestValidator")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl RequestValidator {
    /// Create a validator accepting exactly `api_key`.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// Validate a request. Pure and deterministic.
    pub fn validate(
        &self,
        headers: &Headers,
        body: &ClassificationRequest,
    ) -> Result<ValidatedRequest, ApiError> {
        if !self.credential_matches(headers.api_key()) {
            return Err(ApiError::Auth);
        }

        let (language, audio_format, audio_base64) = match (
            non_empty(&body.language),
            non_empty(&body.audio_format),
            non_empty(&body.audio_base64),
        ) {
            (Some(l), Some(f), Some(a)) => (l, f, a),
            _ => {
                return Err(ApiError::Validation(
                    "Missing required fields: language, audioFormat, or audioBase64".to_string(),
                ));
            }
        };

        let language: Language = language.parse().map_err(|_| {
            ApiError::Validation(format!(
                "Unsupported language. Supported: {}",
                Language::supported_list()
            ))
        })?;

        if !audio_format.eq_ignore_ascii_case(SUPPORTED_AUDIO_FORMAT) {
            return Err(ApiError::Validation(
                "Invalid audioFormat. Only \"mp3\" is supported.".to_string(),
            ));
        }

        Ok(ValidatedRequest {
            language,
            audio_format: audio_format.to_string(),
            audio_base64: audio_base64.to_string(),
        })
    }

    fn credential_matches(&self, presented: Option<&str>) -> bool {
        match presented {
            Some(key) => key.as_bytes().ct_eq(self.api_key.as_bytes()).into(),
            None => false,
        }
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "sk_test_123456789";

    fn validator() -> RequestValidator {
        RequestValidator::new(KEY)
    }

    fn auth() -> Headers {
        Headers::new().with(API_KEY_HEADER, KEY)
    }

    fn body() -> ClassificationRequest {
        ClassificationRequest::new("English", "mp3", "SUQzBAAAAAAA")
    }

    #[test]
    fn accepts_valid_request() {
        let v = validator().validate(&auth(), &body()).unwrap();
        assert_eq!(v.language, Language::English);
        assert_eq!(v.audio_format, "mp3");
        assert_eq!(v.audio_base64, "SUQzBAAAAAAA");
    }

    #[test]
    fn wrong_key_rejected() {
        let headers = Headers::new().with(API_KEY_HEADER, "wrong_key");
        assert_eq!(
            validator().validate(&headers, &body()),
            Err(ApiError::Auth)
        );
    }

    #[test]
    fn missing_key_rejected() {
        assert_eq!(
            validator().validate(&Headers::new(), &body()),
            Err(ApiError::Auth)
        );
    }

    #[test]
    fn key_value_is_case_sensitive() {
        let headers = Headers::new().with(API_KEY_HEADER, KEY.to_uppercase());
        assert_eq!(
            validator().validate(&headers, &body()),
            Err(ApiError::Auth)
        );
    }

    #[test]
    fn uppercase_header_name_accepted() {
        let headers = Headers::new().with(API_KEY_HEADER_UPPER, KEY);
        assert!(validator().validate(&headers, &body()).is_ok());
    }

    #[test]
    fn mixed_case_header_name_not_looked_up() {
        let headers = Headers::new().with("X-Api-Key", KEY);
        assert_eq!(
            validator().validate(&headers, &body()),
            Err(ApiError::Auth)
        );
    }

    #[test]
    fn auth_checked_before_body() {
        let headers = Headers::new().with(API_KEY_HEADER, "wrong_key");
        let empty = ClassificationRequest::default();
        assert_eq!(validator().validate(&headers, &empty), Err(ApiError::Auth));
    }

    #[test]
    fn missing_fields() {
        for body in [
            ClassificationRequest {
                audio_base64: None,
                ..body()
            },
            ClassificationRequest {
                language: Some(String::new()),
                ..body()
            },
            ClassificationRequest {
                audio_format: None,
                ..body()
            },
        ] {
            let err = validator().validate(&auth(), &body).unwrap_err();
            assert!(err.to_string().contains("Missing required fields"), "{err}");
        }
    }

    #[test]
    fn presence_checked_before_language() {
        let body = ClassificationRequest {
            language: Some("Spanish".into()),
            audio_base64: None,
            ..body()
        };
        let err = validator().validate(&auth(), &body).unwrap_err();
        assert!(err.to_string().contains("Missing required fields"));
    }

    #[test]
    fn unsupported_language_lists_all() {
        let body = ClassificationRequest::new("Spanish", "mp3", "AAAA");
        let err = validator().validate(&auth(), &body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported language. Supported: Tamil, English, Hindi, Malayalam, Telugu"
        );
    }

    #[test]
    fn language_checked_before_format() {
        let body = ClassificationRequest::new("Spanish", "wav", "AAAA");
        let err = validator().validate(&auth(), &body).unwrap_err();
        assert!(err.to_string().starts_with("Unsupported language"));
    }

    #[test]
    fn format_is_case_insensitive() {
        let body = ClassificationRequest::new("Hindi", "MP3", "AAAA");
        let v = validator().validate(&auth(), &body).unwrap();
        assert_eq!(v.audio_format, "MP3");
    }

    #[test]
    fn wav_rejected() {
        let body = ClassificationRequest::new("English", "wav", "AAAA");
        let err = validator().validate(&auth(), &body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid audioFormat. Only \"mp3\" is supported."
        );
    }

    #[test]
    fn debug_redacts_key() {
        let dbg = format!("{:?}", validator());
        assert!(!dbg.contains(KEY));
    }
}
