//! Minimal Gemini `generateContent` client for our use-cases.
//!
//! One POST per call, bounded by a timeout that cancels the in-flight request.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key (it travels in the query string, so URLs are not logged either).

use std::time::{Duration, Instant};

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::domain::FailureKind;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Why a generation call produced no usable text.
#[derive(Debug, Error)]
pub enum GenerationError {
  #[error("network error: {0}")]
  Network(String),
  #[error("timed out after {0:?}")]
  Timeout(Duration),
  #[error("api error: {0}")]
  Api(String),
  #[error("response too short ({0} chars)")]
  EmptyResponse(usize),
}

impl GenerationError {
  pub fn kind(&self) -> FailureKind {
    match self {
      GenerationError::Network(_) => FailureKind::NetworkError,
      GenerationError::Timeout(_) => FailureKind::Timeout,
      GenerationError::Api(_) => FailureKind::ApiError,
      GenerationError::EmptyResponse(_) => FailureKind::EmptyResponse,
    }
  }
}

pub type GenerationResult = Result<String, GenerationError>;

/// Per-call knobs. The timeout covers the whole exchange (send + body read).
#[derive(Clone, Debug, PartialEq)]
pub struct CallSettings {
  pub timeout: Duration,
  pub min_response_chars: usize,
  pub max_output_tokens: u32,
  pub temperature: f32,
  pub top_p: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorStatus {
  pub working: bool,
  pub model: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

#[derive(Clone)]
pub struct GeminiClient {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
  settings: CallSettings,
}

impl GeminiClient {
  pub fn new(api_key: String, base_url: String, model: String, settings: CallSettings) -> Self {
    // No client-level timeout: every call is bounded by its own budget below.
    let client = reqwest::Client::new();
    let base_url = base_url.trim_end_matches('/').to_string();
    Self { client, api_key, base_url, model, settings }
  }

  /// Construct the client if we find GEMINI_API_KEY; otherwise return None.
  pub fn from_env(settings: CallSettings) -> Option<Self> {
    let api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
    Some(Self::new(api_key, base_url, model, settings))
  }

  fn endpoint(&self) -> Result<reqwest::Url, GenerationError> {
    let model_path = if self.model.starts_with("models/") {
      self.model.clone()
    } else {
      format!("models/{}", self.model)
    };
    let mut url = reqwest::Url::parse(&format!("{}/{}:generateContent", self.base_url, model_path))
      .map_err(|e| GenerationError::Api(format!("invalid endpoint: {e}")))?;
    url.query_pairs_mut().append_pair("key", &self.api_key);
    Ok(url)
  }

  /// Lesson generation with the client's default settings.
  pub async fn generate(&self, prompt: &str) -> GenerationResult {
    let settings = self.settings.clone();
    self.generate_with(prompt, &settings).await
  }

  /// Single attempt, no retries. Dropping the request future on timeout aborts the connection.
  #[instrument(level = "info", skip(self, prompt, settings), fields(model = %self.model, prompt_len = prompt.len()))]
  pub async fn generate_with(&self, prompt: &str, settings: &CallSettings) -> GenerationResult {
    let url = self.endpoint()?;
    let req = GenerateRequest {
      contents: vec![ReqContent { parts: vec![ReqPart { text: prompt }] }],
      generation_config: GenerationConfig {
        max_output_tokens: settings.max_output_tokens,
        temperature: settings.temperature,
        top_p: settings.top_p,
      },
    };

    let start = Instant::now();
    let exchange = async {
      let res = self.client.post(url)
        .header(USER_AGENT, "tutor-backend/0.1")
        .header(CONTENT_TYPE, "application/json")
        .json(&req).send().await.map_err(|e| classify_transport(e, settings.timeout))?;
      let status = res.status();
      let body = res.text().await.map_err(|e| classify_transport(e, settings.timeout))?;
      Ok::<_, GenerationError>((status, body))
    };

    let (status, body) = match tokio::time::timeout(settings.timeout, exchange).await {
      Ok(r) => r,
      Err(_) => Err(GenerationError::Timeout(settings.timeout)),
    }
    .map_err(|e| {
      error!(elapsed = ?start.elapsed(), error = %e, "Gemini call failed");
      e
    })?;

    if !status.is_success() {
      let msg = extract_api_error(&body).unwrap_or_else(|| crate::util::trunc_for_log(&body, 200));
      error!(elapsed = ?start.elapsed(), %status, "Gemini returned non-success status");
      return Err(GenerationError::Api(format!("HTTP {}: {}", status, msg)));
    }

    let text = extract_candidate_text(&body)?;
    let chars = text.trim().chars().count();
    if chars < settings.min_response_chars {
      warn!(elapsed = ?start.elapsed(), chars, min = settings.min_response_chars, "Gemini response too short");
      return Err(GenerationError::EmptyResponse(chars));
    }
    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Gemini response received");
    Ok(text)
  }

  /// Tiny request to check that the key and endpoint work.
  #[instrument(level = "info", skip(self), fields(model = %self.model))]
  pub async fn probe(&self) -> GeneratorStatus {
    let settings = CallSettings {
      min_response_chars: 1,
      max_output_tokens: 50,
      temperature: 0.7,
      ..self.settings.clone()
    };
    let result = self
      .generate_with("Hello, this is a test message. Please respond with a short greeting in English.", &settings)
      .await;
    GeneratorStatus {
      working: result.is_ok(),
      model: self.model.clone(),
      error: result.err().map(|e| e.to_string()),
    }
  }
}

fn classify_transport(e: reqwest::Error, budget: Duration) -> GenerationError {
  if e.is_timeout() {
    GenerationError::Timeout(budget)
  } else if e.is_decode() {
    GenerationError::Api(e.to_string())
  } else {
    GenerationError::Network(e.to_string())
  }
}

/// Pull `candidates[0].content.parts[0].text` out of a success body.
fn extract_candidate_text(body: &str) -> Result<String, GenerationError> {
  let parsed: GenerateResponse = serde_json::from_str(body)
    .map_err(|e| GenerationError::Api(format!("malformed response JSON: {e}")))?;
  if let Some(err) = parsed.error {
    return Err(GenerationError::Api(err.message.unwrap_or_else(|| "unknown error".into())));
  }
  parsed
    .candidates
    .into_iter()
    .next()
    .and_then(|c| c.content)
    .and_then(|c| c.parts.into_iter().next())
    .and_then(|p| p.text)
    .ok_or_else(|| GenerationError::Api("response has no generated content".into()))
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_api_error(body: &str) -> Option<String> {
  serde_json::from_str::<GenerateResponse>(body).ok()?.error?.message
}

// --- Wire DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
  contents: Vec<ReqContent<'a>>,
  generation_config: GenerationConfig,
}
#[derive(Serialize)]
struct ReqContent<'a> { parts: Vec<ReqPart<'a>> }
#[derive(Serialize)]
struct ReqPart<'a> { text: &'a str }
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  max_output_tokens: u32,
  temperature: f32,
  top_p: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] error: Option<ApiErrorBody>,
}
#[derive(Deserialize)]
struct Candidate { #[serde(default)] content: Option<Content> }
#[derive(Deserialize)]
struct Content { #[serde(default)] parts: Vec<Part> }
#[derive(Deserialize)]
struct Part { #[serde(default)] text: Option<String> }
#[derive(Deserialize)]
struct ApiErrorBody { #[serde(default)] message: Option<String> }

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{http::StatusCode, response::IntoResponse, Json, Router};
  use tokio::net::TcpListener;

  fn settings(timeout: Duration) -> CallSettings {
    CallSettings { timeout, min_response_chars: 100, max_output_tokens: 800, temperature: 0.8, top_p: 0.9 }
  }

  fn client_for(base: String, timeout: Duration) -> GeminiClient {
    GeminiClient::new("test-key".into(), base, DEFAULT_MODEL.into(), settings(timeout))
  }

  /// Serve `router` on an ephemeral port and return its base URL.
  async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      let _ = axum::serve(listener, router).await;
    });
    format!("http://{}/v1beta", addr)
  }

  fn candidate_body(text: &str) -> serde_json::Value {
    serde_json::json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
  }

  #[tokio::test]
  async fn returns_generated_text() {
    let story = "Once upon a time in Madurai, Meera counted the kolam dots. ".repeat(3);
    let expected = story.clone();
    let base = serve(Router::new().fallback(move || {
      let body = candidate_body(&story);
      async move { Json(body) }
    }))
    .await;

    let text = client_for(base, Duration::from_secs(5)).generate("prompt").await.unwrap();
    assert_eq!(text, expected);
  }

  #[tokio::test]
  async fn short_text_is_an_empty_response() {
    let base = serve(Router::new().fallback(|| async { Json(candidate_body("Hi!")) })).await;
    let err = client_for(base, Duration::from_secs(5)).generate("prompt").await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::EmptyResponse);
  }

  #[tokio::test]
  async fn non_success_status_is_an_api_error() {
    let base = serve(Router::new().fallback(|| async {
      (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({ "error": { "message": "API key not valid" } })),
      )
        .into_response()
    }))
    .await;
    let err = client_for(base, Duration::from_secs(5)).generate("prompt").await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::ApiError);
    assert!(err.to_string().contains("API key not valid"));
  }

  #[tokio::test]
  async fn missing_candidates_is_an_api_error() {
    let base = serve(Router::new().fallback(|| async { Json(serde_json::json!({ "candidates": [] })) })).await;
    let err = client_for(base, Duration::from_secs(5)).generate("prompt").await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::ApiError);
  }

  #[tokio::test]
  async fn refused_connection_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let err = client_for(format!("http://{}", addr), Duration::from_secs(5))
      .generate("prompt")
      .await
      .unwrap_err();
    assert_eq!(err.kind(), FailureKind::NetworkError);
  }

  #[tokio::test]
  async fn silent_server_times_out_within_budget() {
    // Accepts connections and never answers.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      let mut held = Vec::new();
      while let Ok((sock, _)) = listener.accept().await {
        held.push(sock);
      }
    });

    let budget = Duration::from_millis(300);
    let start = Instant::now();
    let err = client_for(format!("http://{}", addr), budget).generate("prompt").await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Timeout);
    assert!(start.elapsed() < Duration::from_secs(3));
  }

  #[test]
  fn request_body_matches_wire_format() {
    let req = GenerateRequest {
      contents: vec![ReqContent { parts: vec![ReqPart { text: "hi" }] }],
      generation_config: GenerationConfig { max_output_tokens: 800, temperature: 0.5, top_p: 0.9 },
    };
    let v = serde_json::to_value(&req).unwrap();
    assert_eq!(v["contents"][0]["parts"][0]["text"], "hi");
    assert_eq!(v["generationConfig"]["maxOutputTokens"], 800);
    assert!(v["generationConfig"].get("topP").is_some());
  }

  #[test]
  fn endpoint_puts_key_in_query() {
    let c = client_for("https://example.test/v1beta/".into(), Duration::from_secs(1));
    let url = c.endpoint().unwrap();
    assert_eq!(url.path(), "/v1beta/models/gemini-2.0-flash:generateContent");
    assert_eq!(url.query(), Some("key=test-key"));
  }
}
