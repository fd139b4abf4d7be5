//! Knowledge graph extraction from article context.
//!
//! Extraction is a short linear state machine:
//! 1. index the cited articles ([`SourceMap`]),
//! 2. ask for entities plus relationships,
//! 3. when that yields no nodes, ask for entities only (never links),
//! 4. attribute every node to a source article and drop anything that
//!    would leave the graph inconsistent.
//!
//! Generation failures never escape; they move the machine to the next
//! state or to an empty graph.

pub mod context;
pub mod source_map;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::integrations::TextGenerator;
use crate::models::{GraphLink, GraphNode, KnowledgeGraph};
use crate::prompts::Prompt;
use crate::{metrics, Error, Result};

pub use context::{build_context, MAX_CONTEXT_RECORDS};
pub use source_map::{SourceMap, ARTICLE_MARKER, UNKNOWN};

/// Shortest context accepted for extraction, in characters.
pub const MIN_CONTEXT_CHARS: usize = 100;

/// Which extraction attempt produced the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStage {
    Primary,
    Fallback,
    /// No attempt left any valid node.
    Failed,
}

impl ExtractionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStage::Primary => "primary",
            ExtractionStage::Fallback => "fallback",
            ExtractionStage::Failed => "failed",
        }
    }
}

/// Validated graph plus the stage it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub stage: ExtractionStage,
    pub graph: KnowledgeGraph,
}

/// Model output before validation; every field may be missing.
#[derive(Debug, Default, Deserialize)]
struct RawGraph {
    #[serde(default)]
    nodes: Option<Vec<Value>>,
    #[serde(default)]
    links: Option<Vec<Value>>,
}

impl RawGraph {
    fn has_nodes(&self) -> bool {
        self.nodes.as_ref().is_some_and(|nodes| !nodes.is_empty())
    }
}

/// Turns article context into a [`KnowledgeGraph`] using the generative
/// backend.
#[derive(Clone)]
pub struct KnowledgeGraphExtractor {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl KnowledgeGraphExtractor {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Extract a graph from `context`.
    ///
    /// Fails only when the context is shorter than [`MIN_CONTEXT_CHARS`] or
    /// the backend is unconfigured; every other failure yields an empty graph.
    pub async fn extract(&self, context: &str) -> Result<KnowledgeGraph> {
        self.run(context).await.map(|extraction| extraction.graph)
    }

    /// Like [`extract`](Self::extract) but also reports the stage reached.
    pub async fn run(&self, context: &str) -> Result<Extraction> {
        let length = context.chars().count();
        if length < MIN_CONTEXT_CHARS {
            return Err(Error::InvalidInput(format!(
                "Context must be at least {} characters, got {}",
                MIN_CONTEXT_CHARS, length
            )));
        }
        if !self.generator.is_configured() {
            return Err(Error::NotConfigured(
                "text generation backend is not configured".to_string(),
            ));
        }

        let sources = SourceMap::from_context(context);
        debug!(sources = sources.len(), "Indexed context sources");

        let (stage, raw) = match self.attempt(Prompt::GraphPrimary, context).await {
            Some(raw) if raw.has_nodes() => (ExtractionStage::Primary, Some(raw)),
            _ => {
                info!("Primary extraction produced no nodes, trying entities only");
                let raw = self
                    .attempt(Prompt::GraphFallback, context)
                    .await
                    .map(|raw| RawGraph {
                        nodes: raw.nodes,
                        links: Some(Vec::new()),
                    });
                (ExtractionStage::Fallback, raw)
            }
        };

        let graph = match raw {
            Some(raw) if raw.nodes.is_some() => validate(raw, &sources),
            _ => KnowledgeGraph::empty(),
        };

        let stage = if graph.is_empty() {
            warn!("Graph extraction produced no valid nodes");
            ExtractionStage::Failed
        } else {
            info!(
                stage = stage.as_str(),
                nodes = graph.nodes.len(),
                links = graph.links.len(),
                "Graph extraction finished"
            );
            stage
        };
        metrics::record_graph(stage.as_str());

        Ok(Extraction { stage, graph })
    }

    /// One structured generation round; `None` on any failure.
    async fn attempt(&self, prompt: Prompt, context: &str) -> Option<RawGraph> {
        let text = prompt.render(&[("context", context)]);
        let reply = match timeout(self.timeout, self.generator.generate(&text, true)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => {
                warn!(prompt = prompt.filename(), "Graph generation failed: {}", err);
                return None;
            }
            Err(_) => {
                warn!(prompt = prompt.filename(), "Graph generation timed out");
                return None;
            }
        };

        match serde_json::from_str::<RawGraph>(&reply) {
            Ok(raw) => Some(raw),
            Err(err) => {
                warn!(prompt = prompt.filename(), "Graph reply is not a graph: {}", err);
                None
            }
        }
    }
}

/// String form of a scalar field; `None` when missing, null or structured.
fn scalar(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Attribute nodes to sources, then drop incomplete or repeated nodes and
/// dangling links. The first node with a given id wins.
fn validate(raw: RawGraph, sources: &SourceMap) -> KnowledgeGraph {
    let (fallback_pmid, fallback_url) = sources.first();
    let mut seen: HashSet<String> = HashSet::new();

    let nodes: Vec<GraphNode> = raw
        .nodes
        .unwrap_or_default()
        .iter()
        .filter_map(|node| {
            let pmid = scalar(node, "pmid").unwrap_or_else(|| fallback_pmid.to_string());
            let url = sources.url_for(&pmid).unwrap_or(fallback_url).to_string();
            let node = GraphNode {
                id: scalar(node, "id")?,
                label: scalar(node, "label")?,
                group: scalar(node, "group")?,
                pmid,
                url,
            };
            seen.insert(node.id.clone()).then_some(node)
        })
        .collect();

    let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let links: Vec<GraphLink> = raw
        .links
        .unwrap_or_default()
        .iter()
        .filter_map(|link| {
            let source = scalar(link, "source")?;
            let target = scalar(link, "target")?;
            if !ids.contains(source.as_str()) || !ids.contains(target.as_str()) {
                return None;
            }
            Some(GraphLink {
                source,
                target,
                label: scalar(link, "label").unwrap_or_default(),
            })
        })
        .collect();

    KnowledgeGraph { nodes, links }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::Unconfigured;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies and records the prompts it saw.
    struct Scripted {
        replies: Mutex<VecDeque<Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, prompt: &str, structured: bool) -> Result<String> {
            assert!(structured);
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Unknown("no scripted reply".into())))
        }
    }

    fn ok(json: &str) -> Result<String> {
        Ok(json.to_string())
    }

    fn padded(text: &str) -> String {
        format!("{text}\n\n{}", "Background text about the studied compounds. ".repeat(4))
    }

    fn extractor(generator: Arc<Scripted>) -> KnowledgeGraphExtractor {
        KnowledgeGraphExtractor::new(generator, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn primary_graph_is_attributed_to_sources() {
        let generator = Scripted::new(vec![ok(r#"{
            "nodes": [
                {"id": "DrugX", "label": "DrugX", "group": "Drug", "pmid": "111"},
                {"id": "GeneY", "label": "GeneY", "group": "Gene", "pmid": "222"}
            ],
            "links": [{"source": "DrugX", "target": "GeneY", "label": "inhibits"}]
        }"#)]);
        let context = padded(
            "From article pmid:111 url:http://a\nFrom article pmid:222 url:http://b",
        );

        let extraction = extractor(generator.clone()).run(&context).await.unwrap();

        assert_eq!(extraction.stage, ExtractionStage::Primary);
        let graph = extraction.graph;
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[0].url, "http://a");
        assert_eq!(graph.nodes[1].url, "http://b");
        assert_eq!(graph.links.len(), 1);
        assert_eq!(graph.links[0].label, "inhibits");
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn fallback_used_when_primary_has_no_nodes() {
        let generator = Scripted::new(vec![
            ok(r#"{"nodes": [], "links": []}"#),
            ok(r#"{"nodes": [{"id": "Aspirin", "label": "Aspirin", "group": "Drug"}],
                   "links": [{"source": "Aspirin", "target": "Aspirin", "label": "self"}]}"#),
        ]);

        let extraction = extractor(generator.clone())
            .run(&padded("no article markers here"))
            .await
            .unwrap();

        assert_eq!(extraction.stage, ExtractionStage::Fallback);
        let graph = extraction.graph;
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].pmid, UNKNOWN);
        assert_eq!(graph.nodes[0].url, UNKNOWN);
        assert!(graph.links.is_empty());
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn malformed_primary_reply_falls_back() {
        let generator = Scripted::new(vec![
            ok("not json at all"),
            ok(r#"{"nodes": [{"id": "TP53", "label": "TP53", "group": "Gene"}]}"#),
        ]);
        let context = padded("From article pmid:7 url:http://seven");

        let graph = extractor(generator).extract(&context).await.unwrap();

        assert_eq!(graph.nodes[0].pmid, "7");
        assert_eq!(graph.nodes[0].url, "http://seven");
    }

    #[tokio::test]
    async fn unknown_pmid_gets_first_source_url() {
        let generator = Scripted::new(vec![ok(
            r#"{"nodes": [{"id": "X", "label": "X", "group": "Drug", "pmid": "999"}], "links": []}"#,
        )]);
        let context = padded("From article pmid:1 url:http://one\nFrom article pmid:2 url:http://two");

        let graph = extractor(generator).extract(&context).await.unwrap();

        assert_eq!(graph.nodes[0].pmid, "999");
        assert_eq!(graph.nodes[0].url, "http://one");
    }

    #[tokio::test]
    async fn incomplete_nodes_and_dangling_links_are_dropped() {
        let generator = Scripted::new(vec![ok(r#"{
            "nodes": [
                {"id": "A", "label": "A", "group": "Drug"},
                {"id": "B", "label": "B"},
                {"id": "C", "label": "C", "group": null}
            ],
            "links": [
                {"source": "A", "target": "B", "label": "binds"},
                {"source": "A", "target": "Z", "label": "binds"},
                {"source": "A", "target": "A", "label": "regulates"}
            ]
        }"#)]);

        let graph = extractor(generator).extract(&padded("text")).await.unwrap();

        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["A"]);
        assert_eq!(graph.links.len(), 1);
        assert_eq!(graph.links[0].label, "regulates");
    }

    #[tokio::test]
    async fn repeated_node_ids_keep_first_node() {
        let generator = Scripted::new(vec![ok(r#"{
            "nodes": [
                {"id": "Aspirin", "label": "Aspirin", "group": "Drug"},
                {"id": "Aspirin", "label": "ASA", "group": "Chemical"},
                {"id": "Headache", "label": "Headache", "group": "Disease"}
            ],
            "links": [{"source": "Aspirin", "target": "Headache", "label": "treats"}]
        }"#)]);

        let graph = extractor(generator).extract(&padded("text")).await.unwrap();

        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["Aspirin", "Headache"]);
        assert_eq!(graph.nodes[0].label, "Aspirin");
        assert_eq!(graph.nodes[0].group, "Drug");
        assert_eq!(graph.links.len(), 1);
    }

    #[tokio::test]
    async fn both_attempts_failing_gives_empty_graph() {
        let generator = Scripted::new(vec![
            Err(Error::Http("connection reset".into())),
            ok(r#"{"links": []}"#),
        ]);

        let extraction = extractor(generator).run(&padded("text")).await.unwrap();

        assert_eq!(extraction.stage, ExtractionStage::Failed);
        assert!(extraction.graph.is_empty());
        assert!(extraction.graph.links.is_empty());
    }

    #[tokio::test]
    async fn short_context_is_rejected() {
        let generator = Scripted::new(Vec::new());
        let err = extractor(generator.clone()).extract("too short").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn unconfigured_backend_fails_fast() {
        let extractor = KnowledgeGraphExtractor::new(
            Arc::new(Unconfigured::new("GOOGLE_API_KEY not found")),
            Duration::from_secs(1),
        );
        let err = extractor.extract(&padded("text")).await.unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)));
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let raw: RawGraph = serde_json::from_str(
            r#"{"nodes": [{"id": 5, "label": "Five", "group": "Gene", "pmid": 12}]}"#,
        )
        .unwrap();
        let graph = validate(raw, &SourceMap::default());
        assert_eq!(graph.nodes[0].id, "5");
        assert_eq!(graph.nodes[0].pmid, "12");
        assert_eq!(graph.nodes[0].url, UNKNOWN);
    }
}
