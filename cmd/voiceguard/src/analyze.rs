//! `voiceguard analyze` - send one audio file through the pipeline.

use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::Args;
use tracing::warn;
use voiceguard::fixtures::data_uri;
use voiceguard::validator::API_KEY_HEADER;
use voiceguard::{
    ClassificationRequest, ExchangeLog, Headers, ResponseEnvelope, ServiceConfig,
    VOICE_DETECTION_PATH, VoiceDetectionHandler,
};

const NETWORK_ERROR: &str = "Network error or server unreachable.";

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Audio file to analyze
    #[arg(short = 'f', long)]
    file: PathBuf,

    /// Spoken language (Tamil, English, Hindi, Malayalam, Telugu)
    #[arg(short = 'l', long)]
    language: String,

    /// Audio format sent in the request
    #[arg(long, default_value = "mp3")]
    format: String,

    /// API key to present (defaults to the configured key)
    #[arg(long)]
    api_key: Option<String>,

    /// Send the payload as a data: URI, as a browser upload would
    #[arg(long)]
    data_uri: bool,

    /// Base URL of a running voiceguard server (e.g. http://127.0.0.1:8080)
    #[arg(long)]
    remote: Option<String>,

    /// Use the deterministic classifier instead of Gemini (local mode only)
    #[arg(long)]
    stub: bool,
}

pub async fn run(config: &ServiceConfig, args: AnalyzeArgs) -> Result<()> {
    let audio = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    if audio.is_empty() {
        anyhow::bail!("{} is empty", args.file.display());
    }

    let encoded = STANDARD.encode(&audio);
    let payload = if args.data_uri {
        data_uri("audio/mp3", &encoded)
    } else {
        encoded
    };

    let headers = Headers::new()
        .with("Content-Type", "application/json")
        .with(
            API_KEY_HEADER,
            args.api_key.clone().unwrap_or_else(|| config.api_key.clone()),
        );
    let body = ClassificationRequest::new(args.language.clone(), args.format.clone(), payload);

    let (endpoint, response) = match &args.remote {
        Some(base) => {
            let url = format!("{}{}", base.trim_end_matches('/'), VOICE_DETECTION_PATH);
            let response = send_remote(&url, &headers, &body).await;
            (url, response)
        }
        None => {
            let classifier = crate::build_classifier(config, args.stub)?;
            let handler = VoiceDetectionHandler::new(config, classifier);
            let response = handler.handle(&headers, &body).await;
            (config.endpoint.clone(), response)
        }
    };

    let log = ExchangeLog::new(endpoint, headers, body).with_response(response);
    println!("{}", log);
    Ok(())
}

/// POST to a remote server; any transport or decode failure becomes an
/// error envelope.
async fn send_remote(
    url: &str,
    headers: &Headers,
    body: &ClassificationRequest,
) -> ResponseEnvelope {
    let client = reqwest::Client::new();
    let mut request = client.post(url).json(body);
    for (name, value) in headers.iter() {
        if name.eq_ignore_ascii_case("content-type") {
            continue;
        }
        request = request.header(name, value);
    }

    let response = match request.send().await {
        Ok(r) => r,
        Err(e) => {
            warn!("request to {} failed: {}", url, e);
            return ResponseEnvelope::error(NETWORK_ERROR);
        }
    };

    match response.json::<ResponseEnvelope>().await {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("invalid response from {}: {}", url, e);
            ResponseEnvelope::error(NETWORK_ERROR)
        }
    }
}
