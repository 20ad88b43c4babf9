//! biokg CLI: load extractor output into the knowledge graph.
//!
//! Usage:
//!   biokg load findings --input findings.jsonl [--db path] [--dry-run]
//!   biokg load external --input items.jsonl [--metrics-output metrics.jsonl]
//!   biokg stats [--db path]
//!   biokg reconcile [--db path]

use biokg::graph::NodeLabel;
use biokg::storage::NodeFilter;
use biokg::{
    BatchCoordinator, ExternalItemAdapter, FindingAdapter, FindingIdPolicy, GraphStore, IngestError,
    LoaderConfig, MatchPolicy, OpenStore, RecordAdapter, RunMetrics, SqliteStore, StorageResult,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Parser)]
#[command(
    name = "biokg",
    version,
    about = "Idempotent ingestion for a space-biology knowledge graph"
)]
struct Cli {
    /// Log verbosity (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "BIOKG_LOG_LEVEL", default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct StoreArgs {
    /// Path to SQLite database file
    #[arg(long, env = "BIOKG_DB")]
    db: Option<PathBuf>,
    /// Logical database name, used when no --db path is given
    #[arg(long, env = "BIOKG_DATABASE", default_value = "biokg")]
    database: String,
}

impl StoreArgs {
    /// Explicit path, or `<data_dir>/biokg/<database>.db`
    fn path(&self) -> PathBuf {
        if let Some(db) = &self.db {
            return db.clone();
        }
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
        let biokg_dir = data_dir.join("biokg");
        std::fs::create_dir_all(&biokg_dir).ok();
        biokg_dir.join(format!("{}.db", self.database))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Source {
    /// Research findings extracted from papers
    Findings,
    /// News items, explainers, newsletters and library records
    External,
}

#[derive(Args, Debug)]
struct LoadArgs {
    /// Kind of records in the input file
    #[arg(value_enum)]
    source: Source,
    /// Line-delimited JSON input
    #[arg(long)]
    input: PathBuf,
    #[command(flatten)]
    store: StoreArgs,
    /// Records per batch (defaults to 100 for findings, 50 for external items)
    #[arg(long, env = "BIOKG_BATCH_SIZE")]
    batch_size: Option<usize>,
    /// Run every record against the store and roll it back instead of committing
    #[arg(long)]
    dry_run: bool,
    /// Extra attempts for a record that hit a write conflict
    #[arg(long, env = "BIOKG_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,
    /// Batches loaded in parallel
    #[arg(long, default_value_t = 1)]
    concurrency: usize,
    /// Derive ids for findings without a uuid from their content
    #[arg(long)]
    deterministic_finding_ids: bool,
    /// Fill fields missing on existing nodes instead of leaving them untouched
    #[arg(long)]
    enrich: bool,
    /// Append this run's counters as one JSON line to this file
    #[arg(long, env = "BIOKG_METRICS_OUTPUT")]
    metrics_output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a file of records into the graph
    Load(LoadArgs),
    /// Print node and relationship counts
    Stats {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// List papers that are still placeholders without a title
    Reconcile {
        #[command(flatten)]
        store: StoreArgs,
        /// Maximum number of papers to list
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
}

fn open_store(args: &StoreArgs) -> StorageResult<Arc<SqliteStore>> {
    SqliteStore::open(args.path()).map(Arc::new)
}

fn loader_config(args: &LoadArgs) -> LoaderConfig {
    let policy = if args.enrich {
        MatchPolicy::FillMissing
    } else {
        MatchPolicy::KeepCreationFields
    };
    let config = LoaderConfig::new()
        .with_dry_run(args.dry_run)
        .with_max_retries(args.max_retries)
        .with_match_policy(policy);
    match args.batch_size {
        Some(n) => config.with_batch_size(n),
        None => config,
    }
}

async fn run_load<A: RecordAdapter + 'static>(adapter: A, args: &LoadArgs) -> Result<RunMetrics, IngestError> {
    let config = loader_config(args);
    let store = open_store(&args.store).map_err(IngestError::Connection)?;
    let coordinator = Arc::new(BatchCoordinator::new(store.clone(), adapter, config)?);

    let token = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping after the current batch");
            token.cancel();
        }
    });

    let input = args.input.clone();
    let metrics = if args.concurrency > 1 {
        Arc::clone(&coordinator)
            .load_file_concurrent(input, args.concurrency)
            .await?
    } else {
        let worker = Arc::clone(&coordinator);
        tokio::task::spawn_blocking(move || worker.load_file(&input))
            .await
            .map_err(|e| IngestError::Worker(e.to_string()))??
    };

    let input_name = args.input.display().to_string();
    metrics.log_summary(&input_name);

    let mut graph_counters = BTreeMap::new();
    if !args.dry_run {
        match store.stats() {
            Ok(stats) => graph_counters = stats.to_counters(),
            Err(e) => warn!(error = %e, "could not read graph statistics"),
        }
    }
    if let Some(path) = &args.metrics_output {
        metrics.append_to_log(path, &input_name, &graph_counters)?;
    }

    let mut summary = metrics.counters();
    summary.append(&mut graph_counters);
    match serde_json::to_string_pretty(&summary) {
        Ok(text) => println!("{}", text),
        Err(e) => warn!(error = %e, "could not render summary"),
    }
    if !metrics.failed_records.is_empty() {
        eprintln!("{} record(s) not loaded:", metrics.failed_records.len());
        for (record, reason) in &metrics.failed_records {
            eprintln!("  {}: {}", record, reason);
        }
    }
    Ok(metrics)
}

async fn cmd_load(args: LoadArgs) -> i32 {
    let result = match args.source {
        Source::Findings => {
            let ids = if args.deterministic_finding_ids {
                FindingIdPolicy::ContentHash
            } else {
                FindingIdPolicy::Random
            };
            run_load(FindingAdapter::new().with_id_policy(ids), &args).await
        }
        Source::External => run_load(ExternalItemAdapter::new(), &args).await,
    };
    match result {
        Ok(_) => 0,
        Err(e) => {
            error!(error = %e, "load aborted");
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_stats(store: &SqliteStore) -> i32 {
    let stats = match store.stats() {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    println!("{:<20}  {:>10}", "NODE LABEL", "COUNT");
    println!("{}", "-".repeat(32));
    for (label, count) in &stats.nodes {
        println!("{:<20}  {:>10}", label.as_str(), count);
    }
    println!();
    println!("{:<20}  {:>10}", "RELATIONSHIP", "COUNT");
    println!("{}", "-".repeat(32));
    for (edge_type, count) in &stats.edges {
        println!("{:<20}  {:>10}", edge_type.as_str(), count);
    }
    match store.dangling_edge_count() {
        Ok(0) => 0,
        Ok(n) => {
            eprintln!("Warning: {} relationship(s) point at missing nodes", n);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_reconcile(store: &SqliteStore, limit: usize) -> i32 {
    let filter = NodeFilter::new()
        .with_label(NodeLabel::Paper)
        .missing("title")
        .with_limit(limit);
    let papers = match store.find_nodes(&filter) {
        Ok(papers) => papers,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if papers.is_empty() {
        println!("No placeholder papers.");
        return 0;
    }
    println!("{:<16}  {:>11}  {:<25}", "PAPER", "OCCURRENCES", "FIRST SEEN");
    println!("{}", "-".repeat(56));
    for paper in papers {
        println!(
            "{:<16}  {:>11}  {:<25}",
            paper.key.value(),
            paper.occurrence_count,
            paper.first_seen.to_rfc3339()
        );
    }
    0
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    let code = match cli.command {
        Commands::Load(args) => cmd_load(args).await,
        Commands::Stats { store } => match open_store(&store) {
            Ok(store) => cmd_stats(&store),
            Err(e) => {
                eprintln!("Error: failed to open database: {}", e);
                1
            }
        },
        Commands::Reconcile { store, limit } => match open_store(&store) {
            Ok(store) => cmd_reconcile(&store, limit),
            Err(e) => {
                eprintln!("Error: failed to open database: {}", e);
                1
            }
        },
    };
    std::process::exit(code);
}
