//! HTTP server exposing the API and the live test suite.
//!
//! API endpoints:
//! - POST /api/voice-detection - Classify a sample (x-api-key header)
//! - POST /api/tests/run       - Start a scenario run in the background
//! - GET  /api/tests/status    - RunProgress JSON
//! - GET  /api/tests/report    - RunReport JSON
//! - GET  /api/tests/events    - SSE progress stream
//! - GET  /                    - Static files or a fallback page

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{
        Html, IntoResponse, Json,
        sse::{Event, Sse},
    },
    routing::{get, post},
};
use futures::stream::Stream;
use serde::Serialize;
use serde_json::json;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};
use voiceguard::runner::{RunProgress, RunState};
use voiceguard::{
    ApiError, ClassificationRequest, Headers, ResponseEnvelope, RunnerError, ScenarioRunner,
    VOICE_DETECTION_PATH, VoiceDetectionHandler,
};

/// SSE update message format
#[derive(Debug, Clone, Serialize)]
struct ProgressUpdate {
    #[serde(rename = "type")]
    update_type: String,
    progress: RunProgress,
}

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    handler: Arc<VoiceDetectionHandler>,
    runner: ScenarioRunner,
}

impl AppState {
    pub fn new(handler: VoiceDetectionHandler, runner: ScenarioRunner) -> Self {
        Self {
            handler: Arc::new(handler),
            runner,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let mut app = Router::new()
        .route(VOICE_DETECTION_PATH, post(voice_detection))
        .route("/api/tests/run", post(tests_run))
        .route("/api/tests/status", get(tests_status))
        .route("/api/tests/report", get(tests_report))
        .route("/api/tests/events", get(tests_events))
        .with_state(state);

    // Serve static files or fallback to embedded
    match static_dir {
        Some(dir) if dir.exists() => {
            app = app.fallback_service(ServeDir::new(dir));
        }
        Some(dir) => {
            warn!("static dir not found: {:?}", dir);
            app = app.route("/", get(fallback_index));
        }
        None => {
            app = app.route("/", get(fallback_index));
        }
    }
    app
}

/// Start the HTTP server.
pub async fn start_server(addr: &str, state: AppState, static_dir: Option<PathBuf>) -> Result<()> {
    let endpoint = state.handler.endpoint().to_string();
    let app = router(state, static_dir);

    let addr = parse_addr(addr)?;
    info!("server started at http://{}", addr);
    println!("Server started at http://{}", addr);
    println!("  - POST {}  Voice detection ({})", VOICE_DETECTION_PATH, endpoint);
    println!("  - POST /api/tests/run     Start the scenario suite");
    println!("  - GET  /api/tests/status  Current progress");
    println!("  - GET  /api/tests/report  Report (JSON)");
    println!("  - GET  /api/tests/events  SSE progress stream");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Parse address string to SocketAddr.
fn parse_addr(addr: &str) -> Result<SocketAddr> {
    let addr = if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    };
    Ok(addr.parse()?)
}

fn to_headers(map: &HeaderMap) -> Headers {
    map.iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

fn status_code(err: &ApiError) -> StatusCode {
    match err {
        ApiError::Auth => StatusCode::UNAUTHORIZED,
        ApiError::Validation(_) => StatusCode::BAD_REQUEST,
        ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn voice_detection(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    // An unparseable body is treated as one with no fields.
    let request: ClassificationRequest = serde_json::from_slice(&body).unwrap_or_else(|e| {
        debug!("request body is not a valid classification request: {}", e);
        ClassificationRequest::default()
    });

    match state.handler.process(&to_headers(&headers), &request).await {
        Ok(success) => (StatusCode::OK, Json(ResponseEnvelope::from(success))),
        Err(e) => (status_code(&e), Json(ResponseEnvelope::from(e))),
    }
}

async fn tests_run(State(state): State<AppState>) -> impl IntoResponse {
    match state.runner.start().await {
        // The run task is detached; progress is read through the runner.
        Ok(_) => (
            StatusCode::ACCEPTED,
            Json(json!({"status": "started", "total": state.runner.scenarios().len()})),
        ),
        Err(e @ RunnerError::AlreadyRunning) => (
            StatusCode::CONFLICT,
            Json(json!({"status": "error", "message": e.to_string()})),
        ),
        Err(e) => {
            warn!("scenario run not started: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "message": e.to_string()})),
            )
        }
    }
}

async fn tests_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.runner.progress().await)
}

async fn tests_report(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.runner.report().await)
}

async fn tests_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let runner = state.runner.clone();

    let stream = async_stream::stream! {
        // Send initial state
        let progress = runner.progress().await;
        let initial_state = progress.status.state;
        let mut last_executed = progress.stats.executed;
        yield Ok(progress_event("init", progress));

        if initial_state == RunState::Completed {
            return;
        }

        // Poll for updates
        let mut interval = tokio::time::interval(tokio::time::Duration::from_millis(500));

        loop {
            interval.tick().await;

            let progress = runner.progress().await;
            let state = progress.status.state;
            let executed = progress.stats.executed;

            let update_type = if state == RunState::Completed {
                "all_done"
            } else if executed != last_executed {
                "scenario_done"
            } else {
                continue;
            };
            last_executed = executed;
            yield Ok(progress_event(update_type, progress));

            if state == RunState::Completed {
                break;
            }
        }
    };

    Sse::new(stream)
}

fn progress_event(update_type: &str, progress: RunProgress) -> Event {
    let update = ProgressUpdate {
        update_type: update_type.to_string(),
        progress,
    };
    let data = serde_json::to_string(&update).unwrap_or_default();
    Event::default().data(data)
}

/// Fallback index page when no static dir is provided.
async fn fallback_index() -> impl IntoResponse {
    Html(FALLBACK_HTML)
}

/// Minimal fallback HTML when no static dir is provided
const FALLBACK_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>VoiceGuard</title>
    <style>
        :root { --bg: #0f172a; --text: #e2e8f0; --text-muted: #94a3b8; --blue: #38bdf8; }
        body { font-family: -apple-system, sans-serif; background: var(--bg); color: var(--text); padding: 2rem; text-align: center; }
        h1 { margin-bottom: 1rem; }
        p { color: var(--text-muted); }
        a { color: var(--blue); }
        code { background: rgba(255,255,255,0.1); padding: 0.2rem 0.5rem; border-radius: 4px; }
    </style>
</head>
<body>
    <h1>VoiceGuard</h1>
    <p>No static files directory specified.</p>
    <p>Use <code>--serve-static</code> to specify the web UI directory.</p>
    <p style="margin-top: 2rem;">API endpoints available:</p>
    <p><code>POST /api/voice-detection</code> · <code>POST /api/tests/run</code></p>
    <p><a href="/api/tests/status">/api/tests/status</a> · <a href="/api/tests/report">/api/tests/report</a></p>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;
    use voiceguard::fixtures::silence_mp3_base64;
    use voiceguard::{ServiceConfig, StaticClassifier, default_scenarios};

    use super::*;

    fn app() -> Router {
        app_with_pacing(Duration::ZERO)
    }

    fn app_with_pacing(pacing: Duration) -> Router {
        let config = ServiceConfig::default();
        let handler = VoiceDetectionHandler::new(&config, Arc::new(StaticClassifier::default()));
        let runner = ScenarioRunner::new(handler.clone(), default_scenarios(&config.api_key))
            .with_pacing(pacing);
        router(AppState::new(handler, runner), None)
    }

    fn run_request() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/tests/run")
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn detect(key: Option<(&str, &str)>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(VOICE_DETECTION_PATH)
            .header("content-type", "application/json");
        if let Some((name, value)) = key {
            builder = builder.header(name, value);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn detection_success() {
        let app = app();
        let (status, body) = send(
            &app,
            detect(
                Some(("x-api-key", "sk_test_123456789")),
                json!({"language": "Tamil", "audioFormat": "mp3", "audioBase64": silence_mp3_base64()}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["language"], "Tamil");
        assert_eq!(body["classification"], "HUMAN");
    }

    #[tokio::test]
    async fn detection_upper_case_header() {
        let app = app();
        let (status, _) = send(
            &app,
            detect(
                Some(("X-API-KEY", "sk_test_123456789")),
                json!({"language": "Hindi", "audioFormat": "MP3", "audioBase64": "SUQz"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn detection_auth_error() {
        let app = app();
        let (status, body) = send(
            &app,
            detect(Some(("x-api-key", "wrong_key")), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body,
            json!({"status": "error", "message": "Invalid API key or malformed request"})
        );
    }

    #[tokio::test]
    async fn detection_validation_error() {
        let app = app();
        let (status, body) = send(
            &app,
            detect(
                Some(("x-api-key", "sk_test_123456789")),
                json!({"language": "Spanish", "audioFormat": "mp3", "audioBase64": "SUQz"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .starts_with("Unsupported language")
        );
    }

    #[tokio::test]
    async fn malformed_json_is_missing_fields() {
        let app = app();
        let req = Request::builder()
            .method("POST")
            .uri(VOICE_DETECTION_PATH)
            .header("x-api-key", "sk_test_123456789")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .contains("Missing required fields")
        );
    }

    #[tokio::test]
    async fn run_suite_over_http() {
        let app = app();
        let (status, body) = send(&app, run_request()).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["total"], 11);

        let mut completed = false;
        for _ in 0..200 {
            let req = Request::builder()
                .uri("/api/tests/status")
                .body(Body::empty())
                .unwrap();
            let (_, progress) = send(&app, req).await;
            if progress["status"]["state"] == "completed" {
                completed = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(completed, "suite did not complete");

        let req = Request::builder()
            .uri("/api/tests/report")
            .body(Body::empty())
            .unwrap();
        let (status, report) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["passed"], 11);
        assert_eq!(report["outcomes"][0]["id"], "T01");
    }

    #[tokio::test]
    async fn second_run_request_conflicts() {
        // Long pacing keeps the first run in flight.
        let app = app_with_pacing(Duration::from_secs(60));

        let (first, _) = send(&app, run_request()).await;
        let (second, body) = send(&app, run_request()).await;
        assert_eq!(first, StatusCode::ACCEPTED);
        assert_eq!(second, StatusCode::CONFLICT);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "a scenario run is already in progress");
    }

    #[tokio::test]
    async fn idle_status() {
        let app = app();
        let req = Request::builder()
            .uri("/api/tests/status")
            .body(Body::empty())
            .unwrap();
        let (_, progress) = send(&app, req).await;
        assert_eq!(progress["status"]["state"], "idle");
        assert_eq!(progress["stats"]["total"], 11);
        assert_eq!(progress["scenarios"][0]["state"], "pending");
    }

    #[test]
    fn parse_addr_forms() {
        assert_eq!(
            parse_addr(":8080").unwrap(),
            "0.0.0.0:8080".parse::<SocketAddr>().unwrap()
        );
        assert!(parse_addr("127.0.0.1:3000").is_ok());
        assert!(parse_addr("nope").is_err());
    }
}
