use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::prompt::ANALYSIS_SYSTEM_PROMPT;
use super::StructuringError;
use crate::config::AppConfig;

/// Text-in, text-out access to the inference service.
#[async_trait::async_trait]
pub trait InferenceClient: Send + Sync {
    async fn infer(&self, prompt: &str) -> Result<String, StructuringError>;
}

/// Ollama HTTP client (`/api/generate`, non-streaming).
pub struct OllamaClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(
        base_url: &str,
        model: &str,
        timeout_secs: u64,
        api_key: Option<String>,
    ) -> Result<Self, StructuringError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StructuringError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            client,
            timeout_secs,
        })
    }

    /// Client for the configured endpoint, or `None` when no endpoint is set.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, StructuringError> {
        config
            .ollama_url
            .as_deref()
            .map(|url| {
                Self::new(
                    url,
                    &config.model,
                    config.inference_timeout_secs,
                    config.api_key.clone(),
                )
            })
            .transpose()
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    format: &'a str,
    stream: bool,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait::async_trait]
impl InferenceClient for OllamaClient {
    async fn infer(&self, prompt: &str) -> Result<String, StructuringError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system: ANALYSIS_SYSTEM_PROMPT,
            format: "json",
            stream: false,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                StructuringError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                StructuringError::Connection(self.base_url.clone())
            } else {
                StructuringError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StructuringError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                StructuringError::Timeout(self.timeout_secs)
            } else {
                StructuringError::MalformedResponse(format!("Unexpected response envelope: {e}"))
            }
        })?;

        Ok(parsed.response)
    }
}

/// Deterministic client for tests and offline runs.
///
/// Replays queued responses in order, then repeats the fallback forever.
/// Every prompt received is recorded.
pub struct MockInferenceClient {
    queued: Mutex<VecDeque<Result<String, StructuringError>>>,
    fallback: Result<String, StructuringError>,
    prompts: Mutex<Vec<String>>,
}

impl MockInferenceClient {
    /// Always answer with `response`.
    pub fn new(response: &str) -> Self {
        Self::sequence(Vec::new(), Ok(response.to_string()))
    }

    /// Always fail with `error`.
    pub fn failing(error: StructuringError) -> Self {
        Self::sequence(Vec::new(), Err(error))
    }

    /// Answer from `responses` first, then with `fallback`.
    pub fn sequence(
        responses: Vec<Result<String, StructuringError>>,
        fallback: Result<String, StructuringError>,
    ) -> Self {
        Self {
            queued: Mutex::new(responses.into()),
            fallback,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().ok().and_then(|p| p.last().cloned())
    }
}

#[async_trait::async_trait]
impl InferenceClient for MockInferenceClient {
    async fn infer(&self, prompt: &str) -> Result<String, StructuringError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let next = self.queued.lock().ok().and_then(|mut q| q.pop_front());
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
