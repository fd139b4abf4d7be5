//! PubMed hybrid search CLI - main entry point

use clap::{ArgGroup, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use pubmed_search::commands::{self, AdvancedArgs, GraphArgs, GraphInput, SearchArgs};
use pubmed_search::config::Config;
use pubmed_search::models::AdvancedClause;
use pubmed_search::metrics;
use tracing::warn;

#[derive(Parser)]
#[command(name = "pubmed_search")]
#[command(about = "PubMed hybrid search and knowledge graph extraction", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    /// Path to config.yml (defaults to ./config.yml, then ../config.yml)
    #[arg(long, env = "PUBMED_SEARCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Keyword search with semantic reranking
    Search {
        /// Free-text query
        query: String,

        /// Number of records to retrieve (20-200)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Skip the query correction step
        #[arg(long, default_value_t = false)]
        no_correct: bool,
    },

    /// Field-based boolean search
    Advanced {
        /// Clause as FIELD=VALUE[:AND|OR|NOT]; repeat for more clauses
        #[arg(long = "clause", required = true, value_parser = commands::parse_clause)]
        clauses: Vec<AdvancedClause>,

        /// Number of records to retrieve (20-200)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Extract a knowledge graph from article context
    #[command(group(ArgGroup::new("input").required(true).args(["file", "query"])))]
    Graph {
        /// Context file with "From article pmid:<id> url:<url>: ..." lines
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Search query whose results become the context
        #[arg(short, long)]
        query: Option<String>,

        /// Number of records to retrieve when searching (20-200)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Search { .. } => "search",
            Commands::Advanced { .. } => "advanced",
            Commands::Graph { .. } => "graph",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging; stdout carries the JSON result
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("pubmed_search=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from_file(path).map_err(anyhow::Error::msg)?,
        None => Config::new(),
    };

    let command_name = cli.command.name();
    metrics::record_command_start(command_name);
    let start = Instant::now();

    let result = execute_command(&config, cli.command).await;

    metrics::record_command_result(command_name, start.elapsed(), result.is_ok());

    result
}

async fn execute_command(config: &Config, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Search {
            query,
            top_k,
            no_correct,
        } => {
            let args = SearchArgs {
                query,
                top_k: top_k.unwrap_or(config.default_top_k),
                correct_query: !no_correct,
            };
            commands::search::run(config, args).await?;
        }
        Commands::Advanced { clauses, top_k } => {
            let args = AdvancedArgs {
                clauses,
                top_k: top_k.unwrap_or(config.default_top_k),
            };
            commands::advanced::run(config, args).await?;
        }
        Commands::Graph { file, query, top_k } => {
            let input = match (file, query) {
                (Some(path), _) => GraphInput::File(path),
                (None, Some(query)) => GraphInput::Query(query),
                (None, None) => anyhow::bail!("either --file or --query is required"),
            };
            let args = GraphArgs {
                input,
                top_k: top_k.unwrap_or(config.default_top_k),
            };
            commands::graph::run(config, args).await?;
        }
    }

    Ok(())
}
