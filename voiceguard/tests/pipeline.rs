//! End-to-end checks of the validation/dispatch pipeline and the scenario
//! harness, using a deterministic classifier.

use std::sync::Arc;

use async_trait::async_trait;
use voiceguard::fixtures::{data_uri, silence_mp3_base64};
use voiceguard::validator::{API_KEY_HEADER, API_KEY_HEADER_UPPER};
use voiceguard::{
    Classification, ClassificationRequest, ClassificationResult, Classifier, ClassifyError,
    Headers, Language, ResponseEnvelope, ScenarioRunner, ServiceConfig, StaticClassifier,
    VoiceDetectionHandler, default_scenarios,
};

const KEY: &str = "sk_test_123456789";

struct Unavailable;

#[async_trait]
impl Classifier for Unavailable {
    async fn classify(
        &self,
        _audio_base64: &str,
        _language: Language,
    ) -> Result<ClassificationResult, ClassifyError> {
        Err(ClassifyError::EmptyResponse)
    }
}

fn handler() -> (Arc<StaticClassifier>, VoiceDetectionHandler) {
    let classifier = Arc::new(StaticClassifier::new(ClassificationResult::new(
        Classification::Human,
        0.92,
        "Natural micro-breaths between phrases.",
    )));
    let h = VoiceDetectionHandler::new(&ServiceConfig::default(), classifier.clone());
    (classifier, h)
}

fn valid_headers() -> Headers {
    Headers::new()
        .with("Content-Type", "application/json")
        .with(API_KEY_HEADER, KEY)
}

fn message(env: &ResponseEnvelope) -> &str {
    env.message().expect("error envelope")
}

#[tokio::test]
async fn wrong_key_always_rejected_regardless_of_body() {
    let (classifier, h) = handler();
    let bodies = [
        ClassificationRequest::default(),
        ClassificationRequest::new("English", "mp3", silence_mp3_base64()),
        ClassificationRequest::new("Spanish", "wav", "..."),
    ];
    for key in ["wrong_key", "", "sk_test_12345678", "SK_TEST_123456789"] {
        for body in &bodies {
            let headers = Headers::new().with(API_KEY_HEADER, key);
            let env = h.handle(&headers, body).await;
            assert!(message(&env).contains("Invalid API key"), "key={key:?}");
        }
    }
    assert_eq!(classifier.calls(), 0);
}

#[tokio::test]
async fn missing_fields_rejected() {
    let (_, h) = handler();
    let sample = silence_mp3_base64();
    let cases = [
        ClassificationRequest {
            language: None,
            ..ClassificationRequest::new("English", "mp3", sample.clone())
        },
        ClassificationRequest {
            audio_format: Some(String::new()),
            ..ClassificationRequest::new("English", "mp3", sample.clone())
        },
        ClassificationRequest {
            audio_base64: None,
            ..ClassificationRequest::new("English", "mp3", sample.clone())
        },
    ];
    for body in &cases {
        let env = h.handle(&valid_headers(), body).await;
        assert!(message(&env).contains("Missing required fields"));
    }
}

#[tokio::test]
async fn unsupported_languages_rejected() {
    let (_, h) = handler();
    for tag in ["Spanish", "french", "tamil", "ENGLISH", " Hindi"] {
        let body = ClassificationRequest::new(tag, "mp3", silence_mp3_base64());
        let env = h.handle(&valid_headers(), &body).await;
        assert!(message(&env).contains("Unsupported language"), "tag={tag:?}");
    }
}

#[tokio::test]
async fn non_mp3_formats_rejected() {
    let (_, h) = handler();
    for format in ["wav", "ogg", "mp4", "mp3 ", "audio/mp3"] {
        let body = ClassificationRequest::new("English", format, silence_mp3_base64());
        let env = h.handle(&valid_headers(), &body).await;
        assert!(message(&env).contains("Invalid audioFormat"), "format={format:?}");
    }
}

#[tokio::test]
async fn success_echoes_language() {
    let (classifier, h) = handler();
    for language in Language::ALL {
        for format in ["mp3", "MP3", "Mp3"] {
            let body = ClassificationRequest::new(language.as_str(), format, silence_mp3_base64());
            let env = h.handle(&valid_headers(), &body).await;
            let ok = env.success().expect("success");
            assert_eq!(ok.language, language);
            assert_eq!(ok.language.as_str(), body.language.as_deref().unwrap());
        }
    }
    assert_eq!(classifier.calls(), 15);
}

#[tokio::test]
async fn upper_case_header_and_data_uri() {
    let (_, h) = handler();
    let headers = Headers::new().with(API_KEY_HEADER_UPPER, KEY);
    let body = ClassificationRequest::new(
        "Malayalam",
        "mp3",
        data_uri("audio/mp3", &silence_mp3_base64()),
    );
    assert!(h.handle(&headers, &body).await.is_success());
}

#[tokio::test]
async fn collaborator_failure_is_generic_error() {
    let h = VoiceDetectionHandler::new(&ServiceConfig::default(), Arc::new(Unavailable));
    let body = ClassificationRequest::new("English", "mp3", silence_mp3_base64());
    let env = h.handle(&valid_headers(), &body).await;
    assert_eq!(
        env,
        ResponseEnvelope::error("Internal processing error during voice analysis.")
    );
}

#[tokio::test]
async fn literal_scenarios() {
    let (_, h) = handler();
    let sample = silence_mp3_base64();

    // (a)
    let env = h
        .handle(
            &Headers::new().with(API_KEY_HEADER, "wrong_key"),
            &ClassificationRequest::new("English", "mp3", sample.clone()),
        )
        .await;
    assert_eq!(env.status(), "error");
    assert!(message(&env).contains("Invalid API key"));

    // (b)
    let env = h
        .handle(
            &valid_headers(),
            &ClassificationRequest {
                language: Some("English".into()),
                audio_format: Some("mp3".into()),
                audio_base64: None,
            },
        )
        .await;
    assert!(message(&env).contains("Missing required fields"));

    // (c)
    let env = h
        .handle(
            &valid_headers(),
            &ClassificationRequest::new("Spanish", "mp3", sample.clone()),
        )
        .await;
    assert!(message(&env).contains("Unsupported language"));

    // (d)
    let env = h
        .handle(
            &valid_headers(),
            &ClassificationRequest::new("English", "wav", sample.clone()),
        )
        .await;
    assert!(message(&env).contains("Invalid audioFormat"));

    // (e)
    let env = h
        .handle(
            &valid_headers(),
            &ClassificationRequest::new("Tamil", "mp3", sample),
        )
        .await;
    assert_eq!(env.status(), "success");
    let ok = env.success().unwrap();
    assert_eq!(ok.language, Language::Tamil);
    assert_eq!(ok.classification, Classification::Human);
    assert_eq!(ok.confidence_score, 0.92);
}

#[tokio::test]
async fn rerunning_table_is_idempotent() {
    let (_, h) = handler();
    let runner = ScenarioRunner::new(h, default_scenarios(KEY));

    let first = runner.run_all().await.unwrap();
    let second = runner.run_all().await.unwrap();

    let verdicts = |r: &voiceguard::RunReport| {
        r.outcomes
            .iter()
            .map(|o| (o.id.clone(), o.passed, o.observed_status, o.observed_message.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(verdicts(&first), verdicts(&second));
    assert!(first.all_passed());
    assert_eq!(second.stats, first.stats);
}

#[tokio::test]
async fn table_with_wrong_configured_key_fails_functional_scenarios() {
    // Scenarios built for a different key than the service accepts.
    let (_, h) = handler();
    let runner = ScenarioRunner::new(h, default_scenarios("sk_other"));
    let report = runner.run_all().await.unwrap();

    assert_eq!(report.stats.executed, report.stats.total);
    // T01 still passes (expects auth error); everything else hits auth.
    assert_eq!(report.stats.passed, 1);
    assert!(
        report
            .outcomes
            .iter()
            .skip(1)
            .all(|o| o.observed_message.as_deref()
                == Some("Invalid API key or malformed request"))
    );
}
