//! External integrations module.
//!
//! Provides the collaborator seams the pipelines depend on:
//! - record source (PubMed E-utilities)
//! - embeddings and text generation (Google Gemini)
//! - an unconfigured stand-in for missing credentials

pub mod gemini;
pub mod pubmed;
pub mod unconfigured;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::models::DocumentRecord;
use crate::Result;

pub use gemini::GeminiClient;
pub use pubmed::PubMedClient;
pub use unconfigured::Unconfigured;

/// Keyword search backend.
///
/// Both methods are total from the caller's view: implementations swallow
/// irrecoverable failures and return the empty case.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Up to `max_count` ids plus the total match count.
    async fn find_ids(&self, query: &str, max_count: usize) -> (Vec<String>, u64);

    /// Full records for the given ids, in source order.
    async fn fetch_details(&self, ids: &[String]) -> Vec<DocumentRecord>;
}

/// What an embedding will be compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedPurpose {
    Query,
    Document,
}

impl EmbedPurpose {
    /// Gemini task type name.
    pub fn task_type(&self) -> &'static str {
        match self {
            EmbedPurpose::Query => "RETRIEVAL_QUERY",
            EmbedPurpose::Document => "RETRIEVAL_DOCUMENT",
        }
    }
}

/// Text to vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str, purpose: EmbedPurpose) -> Result<Vec<f32>>;

    /// Output `i` corresponds to input `i`.
    async fn embed_batch(&self, texts: &[String], purpose: EmbedPurpose) -> Result<Vec<Vec<f32>>>;
}

/// Prompt to text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// With `structured` set the reply must be JSON.
    async fn generate(&self, prompt: &str, structured: bool) -> Result<String>;

    /// False for stand-ins that can never answer.
    fn is_configured(&self) -> bool {
        true
    }
}

/// Gemini-backed providers when a key is configured, otherwise the
/// [`Unconfigured`] stand-in for both.
pub fn ai_backends(
    config: &crate::config::Config,
) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn TextGenerator>)> {
    if config.has_google_api_key() {
        let client = Arc::new(GeminiClient::from_config(config)?);
        Ok((client.clone(), client))
    } else {
        warn!("GOOGLE_API_KEY not found; semantic reranking and graph extraction are disabled");
        let backend = Arc::new(Unconfigured::new("GOOGLE_API_KEY not found"));
        Ok((backend.clone(), backend))
    }
}
