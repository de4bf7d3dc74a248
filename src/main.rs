use clap::{Parser, Subcommand};
use collector_service::{raw_message_queue, PersistenceWorker, SearchCollector, StreamCollector};
use database::Database;
use keywatch_core::{AppConfig, CoreError, JsonNormalizer};
use link_resolver::{HttpResolver, LinkResolutionEngine};
use source_client::{HttpSearchSource, HttpStreamSource, IngestStats};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Parser)]
#[command(name = "keywatch", about = "Keyword-driven post collector and link resolver")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the stream and search collectors with the persistence worker
    Collect,
    /// Resolve collected posts' links in batches
    Resolve {
        /// Stop after this many batches instead of draining the backlog
        #[arg(long)]
        max_batches: Option<u32>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "keywatch=debug,collector_service=debug,link_resolver=info,source_client=info,database=info".to_string()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("Fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CoreError> {
    let config = AppConfig::load(&cli.config)?;
    let db = Database::connect(&config.storage.url).await?;
    db.run_migrations().await?;

    match cli.command {
        Command::Collect => collect(config, db).await,
        Command::Resolve { max_batches } => resolve(config, db, max_batches).await,
    }
}

/// Spawn the two collectors and the persistence worker; they communicate
/// only through the raw-message queue and run until process termination.
async fn collect(config: AppConfig, db: Database) -> Result<(), CoreError> {
    tracing::info!("Starting keywatch collection");

    let keywords = config.keyword_set();
    let stats = Arc::new(IngestStats::new());
    let (tx, rx) = raw_message_queue();

    let stream_source = HttpStreamSource::new(&config.source)?;
    let search_source = HttpSearchSource::new(&config.source)?;

    let stream_collector = StreamCollector::new(
        stream_source,
        keywords.clone(),
        tx.clone(),
        Arc::clone(&stats),
        config.debug,
    );
    let search_collector = SearchCollector::init(
        search_source,
        keywords,
        tx,
        Arc::clone(&stats),
        config.collect.page_size,
        config.collect.terms_per_query,
        config.debug,
    )
    .await?;
    let worker = PersistenceWorker::new(rx, db, JsonNormalizer, Arc::clone(&stats), config.debug);

    let stream_task = tokio::spawn(stream_collector.run());
    let search_task = tokio::spawn(search_collector.run());
    let persist_task = tokio::spawn(worker.run());
    let progress_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(PROGRESS_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            let snapshot = stats.snapshot();
            tracing::info!(
                "Progress: {} stream + {} search records enqueued, {} saved, {} failures",
                snapshot.stream_enqueued,
                snapshot.search_enqueued,
                snapshot.saved,
                snapshot.save_failures
            );
        }
    });

    let _ = tokio::try_join!(stream_task, search_task, persist_task, progress_task);
    Ok(())
}

async fn resolve(
    config: AppConfig,
    db: Database,
    max_batches: Option<u32>,
) -> Result<(), CoreError> {
    let resolver = HttpResolver::new(&config.resolve)?;
    let engine = LinkResolutionEngine::new(db, resolver, config.resolve.batch_size, config.debug);

    match max_batches {
        Some(batches) => {
            for _ in 0..batches {
                if engine.run_batch().await?.is_none() {
                    break;
                }
            }
        }
        None => {
            let totals = engine.run_to_completion().await?;
            tracing::info!(
                "Resolution finished: {} posts seen, {} redirections resolved, {} skipped",
                totals.batch,
                totals.resolved,
                totals.skipped
            );
        }
    }
    Ok(())
}
