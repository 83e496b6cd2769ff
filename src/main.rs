use kg_text2sql::compiler::JoinResolver;
use kg_text2sql::config::{self, LlmConfig};
use kg_text2sql::graph::RelationshipGraph;
use kg_text2sql::llm::LlmClient;
use kg_text2sql::metadata::SchemaSeed;
use kg_text2sql::pipeline::{PipelineOptions, QueryPlanPipeline};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kg-text2sql")]
#[command(about = "Natural language to SQL over a schema relationship graph")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate SQL for a natural-language question
    Generate {
        /// The question in natural language
        query: String,

        /// Schema seed file (default: $SCHEMA_PATH or metadata/schema.json)
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// OpenAI-compatible API key (or set OPENAI_API_KEY env var)
        #[arg(long)]
        api_key: Option<String>,

        /// Model name (or set LLM_MODEL env var)
        #[arg(long)]
        model: Option<String>,

        /// Per-call LLM timeout in seconds (or set LLM_TIMEOUT_SECS env var)
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Print every stage's output as JSON
        #[arg(long)]
        details: bool,
    },
    /// Resolve joins for a set of tables without calling the LLM
    Plan {
        /// Table names, as they appear in the schema
        #[arg(required = true)]
        tables: Vec<String>,

        /// Join context, e.g. "Country"
        #[arg(short, long)]
        context: Option<String>,

        #[arg(short, long)]
        schema: Option<PathBuf>,
    },
    /// Show graph statistics and optionally export a JSON snapshot
    Graph {
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Write the graph snapshot as JSON to this path
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Generate { query, schema, api_key, model, timeout_secs, details } => {
            run_generate(query, schema, api_key, model, timeout_secs, details).await
        }
        Commands::Plan { tables, context, schema } => run_plan(tables, context, schema),
        Commands::Graph { schema, export } => run_graph(schema, export),
    }
}

fn load_graph(schema: Option<PathBuf>) -> Result<Arc<RelationshipGraph>> {
    let path = schema.unwrap_or_else(config::schema_path_from_env);
    info!("Loading schema from {:?}", path);
    let graph = SchemaSeed::load(&path)
        .and_then(SchemaSeed::into_graph)
        .with_context(|| format!("Failed to build relationship graph from {}", path.display()))?;
    Ok(Arc::new(graph))
}

async fn run_generate(
    query: String,
    schema: Option<PathBuf>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    details: bool,
) -> Result<()> {
    let graph = load_graph(schema)?;

    let mut llm_config = match api_key {
        Some(key) => LlmConfig::from_lookup(|name| match name {
            "OPENAI_API_KEY" => Some(key.clone()),
            _ => std::env::var(name).ok(),
        }),
        None => LlmConfig::from_env(),
    }?;
    if let Some(model) = model {
        llm_config.model = model;
    }
    if let Some(secs) = timeout_secs {
        llm_config.timeout = Duration::from_secs(secs);
    }

    let llm = Arc::new(LlmClient::from_config(&llm_config));
    info!("Using model {}", llm.model());

    let pipeline = QueryPlanPipeline::new(graph, llm).with_options(PipelineOptions {
        llm_timeout: llm_config.timeout,
        ..PipelineOptions::default()
    });

    let result = pipeline.process(&query).await?;

    if details {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for pair in &result.join_info.unsatisfied_pairs {
            eprintln!(
                "warning: no join between {} and {} matches context '{}' (available: {})",
                pair.table1,
                pair.table2,
                pair.requested_context,
                pair.available_contexts.join(", ")
            );
        }
        println!("{}", result.sql_query);
    }
    Ok(())
}

fn run_plan(tables: Vec<String>, context: Option<String>, schema: Option<PathBuf>) -> Result<()> {
    let graph = load_graph(schema)?;
    let resolver = JoinResolver::new(graph);
    let plan = resolver.plan(&tables, context.as_deref());
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn run_graph(schema: Option<PathBuf>, export: Option<PathBuf>) -> Result<()> {
    let graph = load_graph(schema)?;
    println!("{}", graph.render_stats_report());

    if let Some(path) = export {
        write_snapshot(&graph, &path)?;
        println!("Snapshot written to {}", path.display());
    }
    Ok(())
}

fn write_snapshot(graph: &RelationshipGraph, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = graph.snapshot().to_json_pretty()?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
