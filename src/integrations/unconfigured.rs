//! Stand-in AI backend used when no credential is available.

use async_trait::async_trait;

use super::{EmbedPurpose, EmbeddingProvider, TextGenerator};
use crate::{Error, Result};

/// Fails every call with [`Error::NotConfigured`].
#[derive(Debug, Clone)]
pub struct Unconfigured {
    reason: String,
}

impl Unconfigured {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    fn error(&self) -> Error {
        Error::NotConfigured(self.reason.clone())
    }
}

#[async_trait]
impl TextGenerator for Unconfigured {
    async fn generate(&self, _prompt: &str, _structured: bool) -> Result<String> {
        Err(self.error())
    }

    fn is_configured(&self) -> bool {
        false
    }
}

#[async_trait]
impl EmbeddingProvider for Unconfigured {
    async fn embed(&self, _text: &str, _purpose: EmbedPurpose) -> Result<Vec<f32>> {
        Err(self.error())
    }

    async fn embed_batch(
        &self,
        _texts: &[String],
        _purpose: EmbedPurpose,
    ) -> Result<Vec<Vec<f32>>> {
        Err(self.error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_call_names_the_missing_credential() {
        let backend = Unconfigured::new("GOOGLE_API_KEY not found");
        assert!(!backend.is_configured());
        assert_eq!(backend.reason(), "GOOGLE_API_KEY not found");

        let err = backend.generate("prompt", true).await.unwrap_err();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));

        let err = backend.embed("text", EmbedPurpose::Query).await.unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)));
    }
}
