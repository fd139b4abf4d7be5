//! Free-text hybrid search

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::models::SearchOutcome;
use crate::search::HybridSearch;

/// Search command arguments
#[derive(Debug, Clone)]
pub struct SearchArgs {
    pub query: String,
    pub top_k: usize,
    /// Ask the generative backend for a corrected query first
    pub correct_query: bool,
}

/// Run a search and return the outcome without printing.
pub async fn search(config: &Config, args: &SearchArgs) -> Result<SearchOutcome> {
    let engine = HybridSearch::from_config(config)?;
    let outcome = engine
        .search(&args.query, None, args.top_k, args.correct_query)
        .await?;

    info!(
        "Found {} results ({} total matches)",
        outcome.results.len(),
        outcome.total_results
    );
    if let Some(suggestion) = &outcome.suggestion {
        info!("Did you mean: {}", suggestion);
    }

    Ok(outcome)
}

pub async fn run(config: &Config, args: SearchArgs) -> Result<()> {
    let outcome = search(config, &args).await?;
    super::print_json(&outcome)
}
