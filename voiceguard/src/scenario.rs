//! The fixed scenario table.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fixtures::silence_mp3_base64;
use crate::types::{ClassificationRequest, Language, ResponseEnvelope};
use crate::validator::{API_KEY_HEADER, API_KEY_HEADER_UPPER, Headers};

/// Scenario category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Auth,
    Validation,
    Functional,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Auth => write!(f, "AUTH"),
            Category::Validation => write!(f, "VALIDATION"),
            Category::Functional => write!(f, "FUNCTIONAL"),
        }
    }
}

/// Status a scenario expects from the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedStatus {
    Success,
    Error,
}

/// Status actually observed; `Exception` marks a fault inside the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObservedStatus {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "EXCEPTION")]
    Exception,
}

impl ObservedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservedStatus::Success => "success",
            ObservedStatus::Error => "error",
            ObservedStatus::Exception => "EXCEPTION",
        }
    }

    pub fn of(envelope: &ResponseEnvelope) -> Self {
        match envelope {
            ResponseEnvelope::Success(_) => ObservedStatus::Success,
            ResponseEnvelope::Error { .. } => ObservedStatus::Error,
        }
    }

    fn matches(&self, expected: ExpectedStatus) -> bool {
        matches!(
            (self, expected),
            (ObservedStatus::Success, ExpectedStatus::Success)
                | (ObservedStatus::Error, ExpectedStatus::Error)
        )
    }
}

impl fmt::Display for ExpectedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedStatus::Success => write!(f, "success"),
            ExpectedStatus::Error => write!(f, "error"),
        }
    }
}

impl fmt::Display for ObservedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named input with its expected outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub category: Category,
    pub name: String,
    pub description: String,
    pub headers: Headers,
    pub body: ClassificationRequest,
    pub expected_status: ExpectedStatus,
    /// Substring the error message must contain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_message_fragment: Option<String>,
}

impl Scenario {
    /// Pass condition: same status, and the message contains the expected
    /// fragment when one is given.
    pub fn check(&self, observed: ObservedStatus, message: Option<&str>) -> bool {
        if !observed.matches(self.expected_status) {
            return false;
        }
        match &self.expected_message_fragment {
            Some(fragment) => message.is_some_and(|m| m.contains(fragment.as_str())),
            None => true,
        }
    }

    /// Human-readable expectation, e.g. `status "error" containing "Invalid API key"`.
    pub fn expectation(&self) -> String {
        match &self.expected_message_fragment {
            Some(f) => format!("status \"{}\" containing \"{}\"", self.expected_status, f),
            None => format!("status \"{}\"", self.expected_status),
        }
    }
}

struct ScenarioDef {
    id: &'static str,
    category: Category,
    name: &'static str,
    description: &'static str,
    headers: Headers,
    body: ClassificationRequest,
    expected: ExpectedStatus,
    fragment: Option<&'static str>,
}

impl From<ScenarioDef> for Scenario {
    fn from(d: ScenarioDef) -> Self {
        Scenario {
            id: d.id.to_string(),
            category: d.category,
            name: d.name.to_string(),
            description: d.description.to_string(),
            headers: d.headers,
            body: d.body,
            expected_status: d.expected,
            expected_message_fragment: d.fragment.map(str::to_string),
        }
    }
}

/// Build the scenario table for a service accepting `api_key`.
///
/// Order is significant: scenarios run T01 first.
pub fn default_scenarios(api_key: &str) -> Vec<Scenario> {
    let sample = silence_mp3_base64();
    let auth = || {
        Headers::new()
            .with("Content-Type", "application/json")
            .with(API_KEY_HEADER, api_key)
    };

    let mut defs = vec![
        ScenarioDef {
            id: "T01",
            category: Category::Auth,
            name: "Invalid API Key",
            description: "Requests with incorrect API keys should be rejected.",
            headers: Headers::new()
                .with("Content-Type", "application/json")
                .with(API_KEY_HEADER, "wrong_key"),
            body: ClassificationRequest::new("English", "mp3", "..."),
            expected: ExpectedStatus::Error,
            fragment: Some("Invalid API key"),
        },
        ScenarioDef {
            id: "T02",
            category: Category::Validation,
            name: "Missing Audio Base64",
            description: "Payloads missing required fields must fail.",
            headers: auth(),
            body: ClassificationRequest {
                language: Some("English".into()),
                audio_format: Some("mp3".into()),
                audio_base64: None,
            },
            expected: ExpectedStatus::Error,
            fragment: Some("Missing required fields"),
        },
        ScenarioDef {
            id: "T03",
            category: Category::Validation,
            name: "Unsupported Language",
            description: "Languages outside the fixed 5 must be rejected.",
            headers: auth(),
            body: ClassificationRequest::new("Spanish", "mp3", sample.clone()),
            expected: ExpectedStatus::Error,
            fragment: Some("Unsupported language"),
        },
        ScenarioDef {
            id: "T04",
            category: Category::Validation,
            name: "Invalid Audio Format",
            description: "Only MP3 format is supported.",
            headers: auth(),
            body: ClassificationRequest::new("English", "wav", sample.clone()),
            expected: ExpectedStatus::Error,
            fragment: Some("Invalid audioFormat"),
        },
    ];

    const FUNCTIONAL: [(&str, Language, &str, &str); 5] = [
        (
            "T05",
            Language::English,
            "Valid Request (English)",
            "Correct payload should return success and classification.",
        ),
        (
            "T06",
            Language::Tamil,
            "Valid Request (Tamil)",
            "Correct payload for Tamil should return success.",
        ),
        (
            "T07",
            Language::Hindi,
            "Valid Request (Hindi)",
            "Correct payload for Hindi should return success.",
        ),
        (
            "T08",
            Language::Malayalam,
            "Valid Request (Malayalam)",
            "Correct payload for Malayalam should return success.",
        ),
        (
            "T09",
            Language::Telugu,
            "Valid Request (Telugu)",
            "Correct payload for Telugu should return success.",
        ),
    ];
    for (id, language, name, description) in FUNCTIONAL {
        defs.push(ScenarioDef {
            id,
            category: Category::Functional,
            name,
            description,
            headers: auth(),
            body: ClassificationRequest::new(language.as_str(), "mp3", sample.clone()),
            expected: ExpectedStatus::Success,
            fragment: None,
        });
    }

    defs.push(ScenarioDef {
        id: "T10",
        category: Category::Auth,
        name: "Upper-case API Key Header",
        description: "The X-API-KEY spelling of the header is accepted.",
        headers: Headers::new()
            .with("Content-Type", "application/json")
            .with(API_KEY_HEADER_UPPER, api_key),
        body: ClassificationRequest::new("English", "mp3", sample.clone()),
        expected: ExpectedStatus::Success,
        fragment: None,
    });
    defs.push(ScenarioDef {
        id: "T11",
        category: Category::Functional,
        name: "Data URI Payload, Upper-case Format",
        description: "A data: URI prefix is stripped and \"MP3\" matches case-insensitively.",
        headers: auth(),
        body: ClassificationRequest::new(
            "Tamil",
            "MP3",
            crate::fixtures::data_uri("audio/mp3", &sample),
        ),
        expected: ExpectedStatus::Success,
        fragment: None,
    });

    defs.into_iter().map(Scenario::from).collect()
}
