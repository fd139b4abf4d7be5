//! Query correction through the generative backend.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::integrations::TextGenerator;
use crate::prompts::Prompt;
use crate::Result;

/// Proposes a corrected or clarified form of a free-text query.
#[derive(Clone)]
pub struct QueryCorrector {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl QueryCorrector {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Raw model reply; errors and timeouts propagate.
    pub async fn try_suggest(&self, query: &str) -> Result<Option<String>> {
        let prompt = Prompt::QueryCorrection.render(&[("query", query)]);
        let reply = tokio::time::timeout(self.timeout, self.generator.generate(&prompt, false))
            .await??;
        Ok(accept_suggestion(query, &reply))
    }

    /// Suggestion when the model proposes a different query; `None` otherwise,
    /// including on any failure.
    pub async fn suggest(&self, query: &str) -> Option<String> {
        match self.try_suggest(query).await {
            Ok(suggestion) => {
                debug!(query, ?suggestion, "query correction");
                suggestion
            }
            Err(err) => {
                warn!(query, "Query suggestion generation failed: {}", err);
                None
            }
        }
    }
}

/// Keep a reply only if it is non-empty and differs ignoring case.
fn accept_suggestion(query: &str, reply: &str) -> Option<String> {
    let suggestion = reply.trim();
    if suggestion.is_empty() || suggestion.to_lowercase() == query.to_lowercase() {
        None
    } else {
        Some(suggestion.to_string())
    }
}
