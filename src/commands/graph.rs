//! Knowledge graph extraction from a context file or a fresh search

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::graph::{build_context, KnowledgeGraphExtractor};
use crate::integrations::ai_backends;
use crate::models::KnowledgeGraph;

use super::search::{search, SearchArgs};

/// Where the extraction context comes from
#[derive(Debug, Clone)]
pub enum GraphInput {
    /// Pre-built context text on disk
    File(PathBuf),
    /// Run a search and build the context from its results
    Query(String),
}

/// Graph command arguments
#[derive(Debug, Clone)]
pub struct GraphArgs {
    pub input: GraphInput,
    pub top_k: usize,
}

/// Resolve the context text for extraction.
async fn load_context(config: &Config, args: &GraphArgs) -> Result<String> {
    match &args.input {
        GraphInput::File(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read context file {}", path.display())),
        GraphInput::Query(query) => {
            let outcome = search(
                config,
                &SearchArgs {
                    query: query.clone(),
                    top_k: args.top_k,
                    correct_query: false,
                },
            )
            .await?;
            Ok(build_context(outcome.results.iter().map(|r| &r.record)))
        }
    }
}

pub async fn extract(config: &Config, args: &GraphArgs) -> Result<KnowledgeGraph> {
    let context = load_context(config, args).await?;
    let (_, generator) = ai_backends(config)?;
    let extractor = KnowledgeGraphExtractor::new(generator, config.request_timeout);

    let extraction = extractor.run(&context).await?;
    info!(
        "Graph from {} stage: {} nodes, {} links",
        extraction.stage.as_str(),
        extraction.graph.nodes.len(),
        extraction.graph.links.len()
    );

    Ok(extraction.graph)
}

pub async fn run(config: &Config, args: GraphArgs) -> Result<()> {
    let graph = extract(config, &args).await?;
    super::print_json(&graph)
}
