//! Text-generation backends. The controller only sees the [`Backend`]
//! trait; [`OllamaClient`] talks to a local Ollama server over HTTP.
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const PREFERRED_MODEL: &str = "qwen3:0.6b";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl GenerationOptions {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.num_predict.is_none() && self.seed.is_none()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub options: GenerationOptions,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("cannot reach backend: {0}")]
    Unavailable(String),
    #[error("backend request timed out")]
    Timeout,
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

pub trait Backend: Send + Sync {
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<Completion, BackendError>> + Send;
}

impl<B: Backend> Backend for Arc<B> {
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<Completion, BackendError>> + Send {
        (**self).complete(request)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size_bytes: u64,
}

/// Pick the small default model when it is installed, else the first one.
pub fn preferred_model(models: &[ModelInfo]) -> Option<&ModelInfo> {
    models
        .iter()
        .find(|m| {
            let name = m.name.to_lowercase();
            name.contains(PREFERRED_MODEL) || name.contains("qwen3-0.6b")
        })
        .or_else(|| models.first())
}

#[derive(Clone, Debug)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "GenerationOptions::is_empty")]
    options: &'a GenerationOptions,
}

#[derive(Deserialize)]
struct GenerateReply {
    response: String,
}

#[derive(Deserialize)]
struct TagsReply {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    size: u64,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Installed models, `:latest` stripped, sorted by name.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        let response = self
            .http
            .get(self.url("api/tags"))
            .send()
            .await
            .map_err(map_reqwest)?;
        let response = check_status(response).await?;
        let reply: TagsReply = response.json().await.map_err(map_reqwest)?;
        Ok(models_from_tags(reply))
    }
}

impl Backend for OllamaClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, BackendError> {
        let body = GenerateBody {
            model: &request.model,
            prompt: &request.prompt,
            stream: false,
            options: &request.options,
        };
        let response = self
            .http
            .post(self.url("api/generate"))
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest)?;
        let response = check_status(response).await?;
        let reply: GenerateReply = response.json().await.map_err(map_reqwest)?;
        Ok(Completion {
            text: reply.response,
        })
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

fn map_reqwest(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout
    } else if err.is_decode() {
        BackendError::Malformed(err.to_string())
    } else {
        BackendError::Unavailable(err.to_string())
    }
}

fn models_from_tags(reply: TagsReply) -> Vec<ModelInfo> {
    let mut models: Vec<ModelInfo> = reply
        .models
        .into_iter()
        .filter_map(|entry| {
            let name = entry.name.or(entry.model)?;
            let name = name.strip_suffix(":latest").unwrap_or(&name).to_string();
            Some(ModelInfo {
                name,
                size_bytes: entry.size,
            })
        })
        .collect();
    models.sort_by_key(|m| m.name.to_lowercase());
    models
}
