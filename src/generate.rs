//! Generation client for the language-model inference backend.
//!
//! [`OllamaGenerator`] posts a single non-streaming request to Ollama's
//! `/api/generate` endpoint. Every transport-level failure becomes
//! [`GenerationError::BackendUnavailable`]; raw `reqwest` errors never
//! leave this module.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::BackendConfig;
use crate::error::GenerationError;

/// Text returned when the backend answers successfully without a
/// `response` field.
pub const NO_RESPONSE_CONTENT: &str = "No response content available.";

/// A language model that turns a prompt into an answer.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Model identifier sent with every request.
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// [`Generator`] backed by an Ollama server.
pub struct OllamaGenerator {
    url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &BackendConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::BackendUnavailable(e.to_string()))?;
        Ok(Self {
            url: config.url.clone(),
            model: config.model.clone(),
            client,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        debug!(model = %self.model, prompt_chars = prompt.len(), "calling inference backend");
        let started = Instant::now();

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, url = %self.url, "inference backend request failed");
                GenerationError::BackendUnavailable(e.to_string())
            })?;

        let status = response.status();
        debug!(%status, elapsed_ms = started.elapsed().as_millis() as u64, "inference backend replied");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "inference backend returned an error");
            return Err(GenerationError::BackendUnavailable(format!(
                "backend returned {}: {}",
                status,
                body.trim()
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::BackendUnavailable(format!("invalid response: {}", e)))?;
        Ok(body
            .response
            .unwrap_or_else(|| NO_RESPONSE_CONTENT.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    /// Serve `router` on an ephemeral port and return its `/api/generate` URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api/generate", addr)
    }

    fn generator(url: String) -> OllamaGenerator {
        OllamaGenerator::new(&BackendConfig {
            url,
            model: "test-model".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn sends_model_prompt_and_no_streaming() {
        let router = Router::new().route(
            "/api/generate",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "test-model");
                assert_eq!(body["stream"], false);
                Json(json!({ "response": format!("echo: {}", body["prompt"].as_str().unwrap()) }))
            }),
        );
        let gen = generator(serve(router).await);
        assert_eq!(gen.generate("hi").await.unwrap(), "echo: hi");
    }

    #[tokio::test]
    async fn missing_response_field_uses_fallback_text() {
        let router = Router::new().route("/api/generate", post(|| async { Json(json!({"done": true})) }));
        let gen = generator(serve(router).await);
        assert_eq!(gen.generate("hi").await.unwrap(), NO_RESPONSE_CONTENT);
    }

    #[tokio::test]
    async fn non_success_status_is_backend_unavailable() {
        let router = Router::new().route(
            "/api/generate",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model crashed") }),
        );
        let gen = generator(serve(router).await);
        let err = gen.generate("hi").await.unwrap_err();
        assert!(matches!(err, GenerationError::BackendUnavailable(ref m) if m.contains("500")));
    }

    #[tokio::test]
    async fn unreachable_backend_is_backend_unavailable() {
        let gen = generator("http://127.0.0.1:1/api/generate".to_string());
        let err = gen.generate("hi").await.unwrap_err();
        assert!(matches!(err, GenerationError::BackendUnavailable(_)));
    }
}
