//! Advanced query compilation.
//!
//! Turns an ordered list of field/value/operator clauses into one PubMed
//! boolean query string.

use crate::models::AdvancedClause;
use crate::{Error, Result};

/// Field name that searches every field; no `[tag]` is emitted for it.
pub const ALL_FIELDS: &str = "All Fields";

/// Render one clause as `(value[field])`, or `None` when its value is blank.
fn render_clause(clause: &AdvancedClause) -> Option<String> {
    let value = clause.value.trim().replace('"', "\"\"");
    if value.is_empty() {
        return None;
    }

    let value = if value.contains(char::is_whitespace) {
        format!("\"{}\"", value)
    } else {
        value
    };

    if clause.field == ALL_FIELDS {
        Some(format!("({})", value))
    } else {
        Some(format!("({}[{}])", value, clause.field))
    }
}

/// Compile clauses into a boolean query.
///
/// Blank clauses are skipped. The operator placed before the n-th surviving
/// part is the operator of the clause at index n-1 of the *original* list,
/// so a skipped clause shifts operator attribution.
pub fn compile(clauses: &[AdvancedClause]) -> Result<String> {
    if clauses.is_empty() {
        return Err(Error::InvalidQuery(
            "Advanced search clauses cannot be empty.".to_string(),
        ));
    }

    let parts: Vec<String> = clauses.iter().filter_map(render_clause).collect();

    let mut parts = parts.into_iter();
    let mut query = parts.next().ok_or_else(|| {
        Error::InvalidQuery("All search clauses were empty or invalid.".to_string())
    })?;

    for (i, part) in parts.enumerate() {
        query.push_str(&format!(" {} {}", clauses[i].operator, part));
    }

    Ok(query)
}

/// Free-text intent behind a clause list, used for semantic reranking.
pub fn semantic_intent(clauses: &[AdvancedClause]) -> String {
    clauses
        .iter()
        .map(|c| c.value.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
