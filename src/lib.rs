//! PubMed Hybrid Search Library
//!
//! This library provides tools to:
//! - Search PubMed by keyword and rerank results by semantic similarity
//! - Compile field-based advanced queries into PubMed boolean syntax
//! - Suggest corrected queries through a generative model
//! - Extract source-attributed knowledge graphs from article abstracts

pub mod config;
pub mod correction;
pub mod error;
pub mod graph;
pub mod integrations;
pub mod metrics;
pub mod models;
pub mod prompts;
pub mod query;
pub mod retry;
pub mod search;

// Re-export common types
pub use config::Config;
pub use correction::QueryCorrector;
pub use error::{Error, Result};
pub use graph::{build_context, Extraction, ExtractionStage, KnowledgeGraphExtractor, SourceMap};
pub use integrations::{GeminiClient, PubMedClient, Unconfigured};
pub use models::{
    AdvancedClause, DocumentRecord, GraphLink, GraphNode, KnowledgeGraph, Operator,
    ScoredDocument, SearchOutcome,
};
pub use prompts::{load_prompt, Prompt};
pub use retry::RetryPolicy;
pub use search::{cosine_similarity, HybridSearch};

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
