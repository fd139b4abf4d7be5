//! Hybrid search: keyword retrieval from the record source, then semantic
//! reranking of the abstracts against the user's intent.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{Config, MAX_TOP_K, MIN_TOP_K};
use crate::correction::QueryCorrector;
use crate::integrations::{
    ai_backends, EmbedPurpose, EmbeddingProvider, PubMedClient, RecordSource, TextGenerator,
};
use crate::models::{AdvancedClause, DocumentRecord, ScoredDocument, SearchOutcome};
use crate::{metrics, query, Error, Result};

/// Orchestrates correction, retrieval and reranking.
pub struct HybridSearch {
    source: Arc<dyn RecordSource>,
    embedder: Arc<dyn EmbeddingProvider>,
    corrector: QueryCorrector,
    embed_timeout: Duration,
    source_timeout: Duration,
}

impl HybridSearch {
    pub fn new(
        source: Arc<dyn RecordSource>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn TextGenerator>,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            embedder,
            corrector: QueryCorrector::new(generator, timeout),
            embed_timeout: timeout,
            source_timeout: timeout,
        }
    }

    /// PubMed plus Gemini, or PubMed alone when no Gemini key is set.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = Arc::new(PubMedClient::from_config(config)?);
        let (embedder, generator) = ai_backends(config)?;
        Ok(Self::new(source, embedder, generator, config.request_timeout)
            .with_source_timeout(config.source_timeout()))
    }

    /// Deadline for each record-source stage, which may retry internally.
    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    /// Run a free-text search.
    ///
    /// `keyword_query`, when non-blank, is sent to the record source
    /// verbatim; otherwise the corrected query (if any) or `query` itself.
    /// Reranking always compares against `query`.
    pub async fn search(
        &self,
        query: &str,
        keyword_query: Option<&str>,
        top_k: usize,
        correct_query: bool,
    ) -> Result<SearchOutcome> {
        validate_request(query, top_k)?;
        metrics::record_search("simple");
        self.run(query, keyword_query, top_k, correct_query).await
    }

    /// Compile field clauses into a keyword query and rerank against the
    /// concatenated clause values. No correction is attempted.
    pub async fn advanced_search(
        &self,
        clauses: &[AdvancedClause],
        top_k: usize,
    ) -> Result<SearchOutcome> {
        let compiled = query::compile(clauses)?;
        let intent = query::semantic_intent(clauses);
        validate_request(&intent, top_k)?;
        debug!(compiled = %compiled, intent = %intent, "Compiled advanced query");
        metrics::record_search("advanced");
        self.run(&intent, Some(&compiled), top_k, false).await
    }

    async fn run(
        &self,
        query: &str,
        keyword_query: Option<&str>,
        top_k: usize,
        correct_query: bool,
    ) -> Result<SearchOutcome> {
        let suggestion = if correct_query {
            self.corrector.suggest(query).await
        } else {
            None
        };

        let keyword_query = keyword_query
            .filter(|q| !q.trim().is_empty())
            .map(str::to_string)
            .or_else(|| suggestion.clone())
            .unwrap_or_else(|| query.to_string());

        info!(query, keyword_query = %keyword_query, top_k, "Starting hybrid search");

        let (ids, total_results) =
            match timeout(self.source_timeout, self.source.find_ids(&keyword_query, top_k)).await {
                Ok(found) => found,
                Err(_) => {
                    warn!(keyword_query = %keyword_query, "Keyword search timed out");
                    (Vec::new(), 0)
                }
            };

        if ids.is_empty() {
            info!(keyword_query = %keyword_query, "No records matched");
            return Ok(SearchOutcome::empty(suggestion));
        }

        let records = match timeout(self.source_timeout, self.source.fetch_details(&ids)).await {
            Ok(records) => records,
            Err(_) => {
                warn!(count = ids.len(), "Fetching record details timed out");
                Vec::new()
            }
        };

        let results = self.rerank(query, records).await;
        info!(
            returned = results.len(),
            total_results, "Hybrid search finished"
        );

        Ok(SearchOutcome {
            results,
            suggestion,
            total_results,
        })
    }

    /// Scored records first by descending similarity, then records without
    /// abstracts in source order. Any embedding failure yields every record
    /// unscored in source order.
    async fn rerank(&self, query: &str, records: Vec<DocumentRecord>) -> Vec<ScoredDocument> {
        let abstracts: Vec<String> = records
            .iter()
            .filter_map(|r| r.abstract_str().map(str::to_string))
            .collect();

        if abstracts.is_empty() {
            metrics::record_rerank("unscored");
            return records.into_iter().map(ScoredDocument::unscored).collect();
        }

        let scores = match self.score(query, &abstracts).await {
            Ok(scores) => scores,
            Err(err) => {
                warn!("Semantic reranking failed, returning keyword order: {}", err);
                metrics::record_rerank("degraded");
                return records.into_iter().map(ScoredDocument::unscored).collect();
            }
        };

        let (with_abstract, without_abstract): (Vec<_>, Vec<_>) = records
            .into_iter()
            .partition(|r| r.abstract_str().is_some());

        let mut scored: Vec<ScoredDocument> = with_abstract
            .into_iter()
            .zip(scores)
            .map(|(record, score)| ScoredDocument::scored(record, score))
            .collect();
        // sort_by is stable, so ties keep source order
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.extend(without_abstract.into_iter().map(ScoredDocument::unscored));

        metrics::record_rerank("scored");
        scored
    }

    async fn score(&self, query: &str, abstracts: &[String]) -> Result<Vec<f32>> {
        let query_embedding = async {
            let embedding = timeout(
                self.embed_timeout,
                self.embedder.embed(query, EmbedPurpose::Query),
            )
            .await??;
            Ok::<_, Error>(embedding)
        };
        let document_embeddings = async {
            let embeddings = timeout(
                self.embed_timeout,
                self.embedder.embed_batch(abstracts, EmbedPurpose::Document),
            )
            .await??;
            Ok::<_, Error>(embeddings)
        };
        let (query_vec, doc_vecs) = tokio::try_join!(query_embedding, document_embeddings)?;

        if doc_vecs.len() != abstracts.len() {
            return Err(Error::Embedding(format!(
                "expected {} document embeddings, got {}",
                abstracts.len(),
                doc_vecs.len()
            )));
        }

        doc_vecs
            .iter()
            .map(|doc| cosine_similarity(&query_vec, doc))
            .collect()
    }
}

/// Reject blank queries and out-of-range result limits.
pub fn validate_request(query: &str, top_k: usize) -> Result<()> {
    if query.trim().is_empty() {
        return Err(Error::InvalidInput("Query cannot be empty.".to_string()));
    }
    if !(MIN_TOP_K..=MAX_TOP_K).contains(&top_k) {
        return Err(Error::InvalidInput(format!(
            "top_k must be between {} and {}, got {}",
            MIN_TOP_K, MAX_TOP_K, top_k
        )));
    }
    Ok(())
}

/// Cosine similarity in [-1, 1].
///
/// Fails on empty or mismatched vectors and on a zero-norm input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.is_empty() || a.len() != b.len() {
        return Err(Error::Embedding(format!(
            "cannot compare vectors of dimension {} and {}",
            a.len(),
            b.len()
        )));
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(Error::Embedding("zero-norm embedding".to_string()));
    }

    let similarity = dot / (norm_a * norm_b);
    if similarity.is_finite() {
        Ok(similarity)
    } else {
        Err(Error::Embedding("non-finite similarity".to_string()))
    }
}
