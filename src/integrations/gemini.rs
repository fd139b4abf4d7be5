//! Google Gemini API Client.
//!
//! Supports:
//! - `generateContent` with optional JSON response mode
//! - `embedContent` and `batchEmbedContents` for retrieval embeddings

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EmbedPurpose, EmbeddingProvider, TextGenerator};
use crate::config::{self, Config};
use crate::{Error, Result};

/// Upper bound on texts per `batchEmbedContents` request.
pub const MAX_EMBED_BATCH: usize = 100;

/// Google Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    generative_model: String,
    embedding_model: String,
    embed_batch_size: usize,
    politeness_delay: Duration,
}

impl GeminiClient {
    /// Create client from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            config.google_api_key.clone(),
            &config.generative_model,
            &config.embedding_model,
        )?
        .with_base_url(&config.gemini_base_url)
        .with_timeout(config.request_timeout)?
        .with_politeness_delay(config.politeness_delay))
    }

    /// Create client with API key and model names.
    pub fn new<S: Into<String>>(
        api_key: S,
        generative_model: &str,
        embedding_model: &str,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::NotConfigured("GOOGLE_API_KEY is empty".to_string()));
        }

        Ok(Self {
            http: build_http(Duration::from_secs(config::REQUEST_TIMEOUT_SECS))?,
            api_key,
            base_url: config::GEMINI_API_BASE_URL.to_string(),
            generative_model: generative_model.to_string(),
            embedding_model: embedding_model.to_string(),
            embed_batch_size: MAX_EMBED_BATCH,
            politeness_delay: Duration::from_millis(config::POLITENESS_DELAY_MS),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http = build_http(timeout)?;
        Ok(self)
    }

    pub fn with_politeness_delay(mut self, delay: Duration) -> Self {
        self.politeness_delay = delay;
        self
    }

    pub fn with_embed_batch_size(mut self, size: usize) -> Self {
        self.embed_batch_size = size.clamp(1, MAX_EMBED_BATCH);
        self
    }

    pub fn generative_model(&self) -> &str {
        &self.generative_model
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        model: &str,
        method: &str,
        body: &B,
    ) -> Result<R> {
        let url = format!(
            "{}/{}:{}?key={}",
            self.base_url,
            model_path(model),
            method,
            self.api_key
        );

        let response = self.http.post(&url).json(body).send().await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text)
            .map_err(|e| Error::Parse(format!("Invalid Gemini response: {} - {}", e, text)))
    }

    /// Send a prompt and return the first text part.
    pub async fn generate_content(&self, prompt: &str, structured: bool) -> Result<String> {
        let payload = GenerateRequest {
            contents: vec![Content::user(prompt)],
            generation_config: GenerationConfig {
                temperature: 0.2,
                max_output_tokens: 8192,
                response_mime_type: structured.then(|| "application/json".to_string()),
            },
        };

        let response: GenerateResponse = self
            .post(&self.generative_model, "generateContent", &payload)
            .await?;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| Error::Parse("Empty response from Gemini".to_string()))?;

        if structured {
            serde_json::from_str::<serde_json::Value>(&text)
                .map_err(|e| Error::Parse(format!("Structured reply is not JSON: {}", e)))?;
        }

        Ok(text)
    }

    async fn embed_one(&self, text: &str, purpose: EmbedPurpose) -> Result<Vec<f32>> {
        let payload = self.embed_request(text, purpose);
        let response: EmbedResponse = self
            .post(&self.embedding_model, "embedContent", &payload)
            .await?;
        Ok(response.embedding.values)
    }

    async fn embed_many(&self, texts: &[String], purpose: EmbedPurpose) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for (page, chunk) in texts.chunks(self.embed_batch_size).enumerate() {
            if page > 0 {
                tokio::time::sleep(self.politeness_delay).await;
            }
            debug!(page, size = chunk.len(), "Gemini batch embedding");

            let payload = BatchEmbedRequest {
                requests: chunk
                    .iter()
                    .map(|t| self.embed_request(t, purpose))
                    .collect(),
            };
            let response: BatchEmbedResponse = self
                .post(&self.embedding_model, "batchEmbedContents", &payload)
                .await?;

            if response.embeddings.len() != chunk.len() {
                return Err(Error::Embedding(format!(
                    "expected {} embeddings, got {}",
                    chunk.len(),
                    response.embeddings.len()
                )));
            }
            vectors.extend(response.embeddings.into_iter().map(|e| e.values));
        }

        Ok(vectors)
    }

    fn embed_request(&self, text: &str, purpose: EmbedPurpose) -> EmbedRequest {
        EmbedRequest {
            model: model_path(&self.embedding_model),
            content: Content::user(text),
            task_type: purpose.task_type(),
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str, structured: bool) -> Result<String> {
        self.generate_content(prompt, structured).await
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiClient {
    async fn embed(&self, text: &str, purpose: EmbedPurpose) -> Result<Vec<f32>> {
        self.embed_one(text, purpose).await
    }

    async fn embed_batch(&self, texts: &[String], purpose: EmbedPurpose) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.embed_many(texts, purpose).await
    }
}

fn build_http(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent("pubmed_search/0.1.0")
        .timeout(timeout)
        .build()
        .map_err(|e| Error::NotConfigured(format!("HTTP client error: {}", e)))
}

/// Gemini addresses models as `models/<name>`.
fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

// === Request types ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn user(text: &str) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest {
    model: String,
    content: Content,
    task_type: &'static str,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

// === Response types ===

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Embedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Embedding>,
}

#[derive(Debug, Deserialize)]
struct Embedding {
    values: Vec<f32>,
}
