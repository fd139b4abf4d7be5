//! Field-based advanced search

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::models::{AdvancedClause, Operator};
use crate::search::HybridSearch;

/// Advanced command arguments
#[derive(Debug, Clone)]
pub struct AdvancedArgs {
    pub clauses: Vec<AdvancedClause>,
    pub top_k: usize,
}

/// Parse `FIELD=VALUE[:OP]`.
///
/// The suffix is only taken as an operator when it names one, so values
/// may themselves contain colons.
pub fn parse_clause(raw: &str) -> std::result::Result<AdvancedClause, String> {
    let (field, rest) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE[:OP], got '{}'", raw))?;

    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{}'", raw));
    }

    let clause = match rest.rsplit_once(':') {
        Some((value, op)) => match op.parse::<Operator>() {
            Ok(operator) => AdvancedClause::new(field, value).with_operator(operator),
            Err(_) => AdvancedClause::new(field, rest),
        },
        None => AdvancedClause::new(field, rest),
    };
    Ok(clause)
}

pub async fn run(config: &Config, args: AdvancedArgs) -> Result<()> {
    let engine = HybridSearch::from_config(config)?;
    let outcome = engine.advanced_search(&args.clauses, args.top_k).await?;

    info!(
        "Found {} results ({} total matches)",
        outcome.results.len(),
        outcome.total_results
    );

    super::print_json(&outcome)
}
