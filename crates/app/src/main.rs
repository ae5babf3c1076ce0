use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use manual_vectors_core::{
    collect_status, ingest_manuals, preview, relevance_percent, ExpectedCount, ExpectedCounts,
    IngestionOptions, LocalStore, LopdfExtractor, ManualSource, OpenAiConfig, OpenAiEmbedder,
    QueryOutcome, SearchCoordinator, SearchQuery, StoreStatus, DEFAULT_COLLECTION,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_OPENAI_BASE_URL, DEFAULT_STORE_DIR, PREVIEW_CHARS,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "manual-vectors", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory that holds the vector store
    #[arg(long, env = "MANUAL_STORE_DIR", default_value = DEFAULT_STORE_DIR, global = true)]
    store_dir: PathBuf,

    #[command(flatten)]
    openai: OpenAiArgs,
}

#[derive(Args)]
struct OpenAiArgs {
    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    openai_api_key: Option<String>,

    /// Embedding model; must match between ingest and query
    #[arg(long, default_value = DEFAULT_EMBEDDING_MODEL, global = true)]
    embedding_model: String,

    /// OpenAI-compatible API base URL
    #[arg(long, default_value = DEFAULT_OPENAI_BASE_URL, global = true)]
    openai_base_url: String,

    /// HTTP timeout for embedding requests, in seconds
    #[arg(long, default_value = "60", global = true)]
    request_timeout_secs: u64,
}

impl OpenAiArgs {
    fn config(&self) -> OpenAiConfig {
        OpenAiConfig {
            api_key: self.openai_api_key.clone(),
            model: self.embedding_model.clone(),
            base_url: self.openai_base_url.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Vectorize PDF manuals page by page, replacing their collections.
    Ingest {
        /// PDF and target collection; defaults to Admin.pdf and User_Guide.pdf.
        #[arg(long = "manual", value_name = "PATH=COLLECTION")]
        manuals: Vec<ManualSource>,
        /// Pages per embeddings request.
        #[arg(long, default_value = "50")]
        batch_size: usize,
        /// Pause between batches, in milliseconds.
        #[arg(long, default_value = "500")]
        batch_pause_ms: u64,
        /// Wait before retrying a failed batch, in milliseconds.
        #[arg(long, default_value = "2000")]
        retry_delay_ms: u64,
        /// Characters kept per page.
        #[arg(long, default_value = "32000")]
        max_page_chars: usize,
        /// Log extraction progress every N pages.
        #[arg(long, default_value = "100")]
        progress_every: u32,
    },
    /// Semantic search over one collection.
    Query {
        /// Question or search text
        query: String,
        /// Collection to search
        #[arg(default_value = DEFAULT_COLLECTION)]
        collection: String,
        /// Number of results
        #[arg(default_value = "5")]
        results: usize,
    },
    /// Show collections, document counts and store size.
    Status {
        /// Expected document count for a collection.
        #[arg(long = "expected", value_name = "NAME=COUNT")]
        expected: Vec<ExpectedCount>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        store = %cli.store_dir.display(),
        "manual-vectors boot"
    );

    match cli.command {
        Command::Ingest {
            manuals,
            batch_size,
            batch_pause_ms,
            retry_delay_ms,
            max_page_chars,
            progress_every,
        } => {
            let options = IngestionOptions {
                batch_size,
                batch_pause: Duration::from_millis(batch_pause_ms),
                retry_delay: Duration::from_millis(retry_delay_ms),
                max_page_chars,
                progress_every,
            };
            let manuals = if manuals.is_empty() {
                ManualSource::defaults()
            } else {
                manuals
            };
            run_ingest(&cli.store_dir, &cli.openai, &manuals, &options).await
        }
        Command::Query {
            query,
            collection,
            results,
        } => {
            let search_query = SearchQuery {
                text: query,
                collection,
                top_k: results,
            };
            run_query(&cli.store_dir, &cli.openai, &search_query).await
        }
        Command::Status { expected } => {
            let mut counts = ExpectedCounts::defaults();
            for item in expected {
                counts.insert(item.collection, item.count);
            }
            run_status(&cli.store_dir, &counts).await;
            Ok(())
        }
    }
}

fn rule() -> String {
    "=".repeat(60)
}

async fn run_ingest(
    store_dir: &Path,
    openai: &OpenAiArgs,
    manuals: &[ManualSource],
    options: &IngestionOptions,
) -> anyhow::Result<()> {
    println!("{}", rule());
    println!("Vectorizing manuals ({} embeddings)", openai.embedding_model);
    println!("{}", rule());

    let embedder = OpenAiEmbedder::new(&openai.config())?;
    println!("API key found, model: {}", openai.embedding_model);

    let store = LocalStore::new(store_dir);
    let report = ingest_manuals(&LopdfExtractor, &embedder, &store, manuals, options).await;

    for skipped in &report.skipped {
        println!("! {} not found, skipped", skipped.path.display());
    }
    for manual in &report.ingested {
        println!(
            "+ {}: {} documents from {} pages in {} batches",
            manual.collection, manual.records, manual.total_pages, manual.batches
        );
    }
    for failed in &report.failed {
        println!("x {}: {}", failed.path.display(), failed.reason);
    }

    println!();
    println!("{}", rule());
    println!("Vectorization finished");
    println!("{}", rule());
    println!("Store saved in: {}", store_dir.display());
    println!("Try: manual-vectors query 'your question'");
    Ok(())
}

async fn run_query(
    store_dir: &Path,
    openai: &OpenAiArgs,
    query: &SearchQuery,
) -> anyhow::Result<()> {
    let embedder = OpenAiEmbedder::new(&openai.config())?;
    let coordinator = SearchCoordinator::new(embedder, LocalStore::new(store_dir));

    println!("Searching {}: '{}'", query.collection, query.text);
    println!("{}", rule());

    let hits = match coordinator.search(query).await? {
        QueryOutcome::Hits(hits) => hits,
        QueryOutcome::CollectionNotFound {
            requested,
            available,
        } => {
            println!("Collection '{requested}' not found");
            println!("   Available collections: {available:?}");
            return Ok(());
        }
    };

    if hits.is_empty() {
        println!("Nothing found");
        return Ok(());
    }

    for (position, hit) in hits.iter().enumerate() {
        println!();
        println!(
            "Result #{} (relevance: {:.1}%)",
            position + 1,
            relevance_percent(hit.distance)
        );
        println!("   Source: {}", hit.metadata.source);
        println!(
            "   Page: {}/{}",
            hit.metadata.page, hit.metadata.total_pages
        );
        println!("   {}", "-".repeat(56));
        println!("   {}", preview(&hit.text, PREVIEW_CHARS));
    }
    println!();
    Ok(())
}

async fn run_status(store_dir: &Path, expected: &ExpectedCounts) {
    let store = LocalStore::new(store_dir);
    let status = match collect_status(&store, store_dir, expected).await {
        Ok(status) => status,
        Err(error) => {
            warn!(error = %error, "status check failed");
            println!("Could not read store at {}: {error}", store_dir.display());
            return;
        }
    };

    let (collections, total_bytes) = match status {
        StoreStatus::Missing => {
            println!("Store not found at {}", store_dir.display());
            println!("   Run: manual-vectors ingest");
            return;
        }
        StoreStatus::Empty => {
            println!("Vectorization status");
            println!("{}", rule());
            println!("Store is empty");
            return;
        }
        StoreStatus::Ready {
            collections,
            total_bytes,
        } => (collections, total_bytes),
    };

    println!("Vectorization status");
    println!("{}", rule());
    println!();
    println!("Collections found: {}", collections.len());
    println!();

    for collection in &collections {
        let expected = collection
            .expected
            .map_or_else(|| "?".to_string(), |count| count.to_string());
        println!("{}", collection.name);
        println!("   Documents: {}/{}", collection.count, expected);
        if let Some(progress) = collection.progress_percent() {
            println!("   Progress: {progress:.1}%");
        }
        if let Some(created_at) = collection.created_at {
            println!("   Created: {}", created_at.to_rfc3339());
        }
        if let Some(sample) = &collection.sample {
            println!("   Source: {}", sample.source);
            println!("   Sample page: {}/{}", sample.page, sample.total_pages);
        }
        println!();
    }

    println!(
        "Store size: {:.1} MB",
        total_bytes as f64 / (1024.0 * 1024.0)
    );
    println!();
    println!("{}", rule());
    println!("Example query:");
    println!("  manual-vectors query 'user settings'");
}
