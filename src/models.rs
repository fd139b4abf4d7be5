//! Data model shared by the search and graph pipelines.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Base URL for article links built from a PubMed id.
pub const PUBMED_ARTICLE_URL: &str = "https://pubmed.ncbi.nlm.nih.gov";

/// Placeholder author string when a record lists nobody.
pub const NO_AUTHORS: &str = "No authors listed";

/// Placeholder title when a record carries none.
pub const NO_TITLE: &str = "No title available";

/// Build the canonical article URL for a PubMed id.
pub fn article_url(pmid: &str) -> String {
    format!("{}/{}/", PUBMED_ARTICLE_URL, pmid)
}

/// A fetched article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    #[serde(rename = "pmid")]
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    pub authors: String,
    pub url: String,
}

impl DocumentRecord {
    /// Create a record; the URL is derived from the id.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        abstract_text: Option<String>,
        authors: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let url = article_url(&id);
        Self {
            id,
            title: title.into(),
            abstract_text: abstract_text.filter(|a| !a.trim().is_empty()),
            authors: authors.into(),
            url,
        }
    }

    /// Abstract text if present and non-blank.
    pub fn abstract_str(&self) -> Option<&str> {
        self.abstract_text
            .as_deref()
            .filter(|a| !a.trim().is_empty())
    }
}

/// A record with an optional similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    #[serde(flatten)]
    pub record: DocumentRecord,
    #[serde(default)]
    pub score: Option<f32>,
}

impl ScoredDocument {
    pub fn unscored(record: DocumentRecord) -> Self {
        Self {
            record,
            score: None,
        }
    }

    pub fn scored(record: DocumentRecord, score: f32) -> Self {
        Self {
            record,
            score: Some(score),
        }
    }
}

/// Result of a hybrid search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub results: Vec<ScoredDocument>,
    pub suggestion: Option<String>,
    /// Match count reported by the record source, not the number fetched.
    pub total_results: u64,
}

impl SearchOutcome {
    pub fn empty(suggestion: Option<String>) -> Self {
        Self {
            results: Vec::new(),
            suggestion,
            total_results: 0,
        }
    }
}

/// Boolean operator joining advanced clauses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    #[default]
    And,
    Or,
    Not,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "AND" => Ok(Operator::And),
            "OR" => Ok(Operator::Or),
            "NOT" => Ok(Operator::Not),
            other => Err(Error::InvalidQuery(format!("unknown operator: {}", other))),
        }
    }
}

/// One field/value/operator clause of an advanced query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancedClause {
    pub field: String,
    pub value: String,
    #[serde(default)]
    pub operator: Operator,
}

impl AdvancedClause {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            operator: Operator::And,
        }
    }

    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.operator = operator;
        self
    }
}

/// Entity node of an extracted knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub group: String,
    pub pmid: String,
    pub url: String,
}

/// Relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    pub label: String,
}

/// Validated node/link graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

impl KnowledgeGraph {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
