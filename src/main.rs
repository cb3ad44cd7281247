use anyhow::Result;
use clap::Parser;
use mixtape_server::background_jobs::jobs::load_index_entries;
use mixtape_server::background_jobs::{JobContext, JobOrchestrator};
use mixtape_server::config::{
    AppConfig, CliConfig, FileConfig, DEFAULT_JOB_TIMEOUT_SECS, DEFAULT_PORT,
    DEFAULT_WATCHDOG_INTERVAL_SECS,
};
use mixtape_server::ingestion::FeatureIngestor;
use mixtape_server::job_store::{JobStore, SqliteJobStore};
use mixtape_server::library_store::SqliteLibraryStore;
use mixtape_server::playlists::{PlaylistGenerator, SqlitePlaylistStore};
use mixtape_server::server::{run_server, ServerState};
use mixtape_server::similarity::{SimilarityCache, SqliteSimilarityStore};
use mixtape_server::tracks::SimilarityType;
use mixtape_server::vector_index::VectorIndexManager;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mixtape-server", about = "Music similarity and playlist generation server")]
struct Args {
    /// Directory holding the SQLite databases.
    #[arg(long)]
    db_dir: Option<PathBuf>,

    /// Port to listen on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Maximum seconds a background job may run before the watchdog fails it.
    #[arg(long, default_value_t = DEFAULT_JOB_TIMEOUT_SECS)]
    job_timeout_secs: u64,

    /// Seconds between watchdog sweeps.
    #[arg(long, default_value_t = DEFAULT_WATCHDOG_INTERVAL_SECS)]
    watchdog_interval_secs: u64,

    /// Optional TOML config file; values there override CLI arguments.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let file_config = args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let cli = CliConfig {
        db_dir: args.db_dir,
        port: args.port,
        job_timeout_secs: args.job_timeout_secs,
        watchdog_interval_secs: args.watchdog_interval_secs,
    };
    let config = AppConfig::resolve(&cli, file_config)?;
    info!("Starting mixtape-server with db_dir {:?}", config.db_dir);

    let library_store = Arc::new(SqliteLibraryStore::new(config.library_db_path())?);
    let similarity_store = Arc::new(SqliteSimilarityStore::new(config.similarity_db_path())?);
    let playlist_store = Arc::new(SqlitePlaylistStore::new(config.playlists_db_path())?);
    let job_store = Arc::new(SqliteJobStore::new(config.server_db_path())?);

    let stale = job_store.mark_stale_jobs_failed()?;
    if stale > 0 {
        info!("Marked {} stale job runs as failed from previous run", stale);
    }

    let index_manager = Arc::new(VectorIndexManager::new(config.index_dimensions.clone()));
    for similarity_type in SimilarityType::ALL {
        let entries = load_index_entries(library_store.as_ref(), similarity_type)?;
        if entries.is_empty() {
            continue;
        }
        let generation = index_manager
            .build(similarity_type, entries)
            .map_err(|e| anyhow::anyhow!("Startup index build failed: {}", e))?;
        info!(
            "Rebuilt {} index at startup (generation {})",
            similarity_type, generation
        );
    }

    let similarity_cache = Arc::new(SimilarityCache::new(
        similarity_store,
        index_manager.clone(),
        library_store.clone(),
    ));
    let orchestrator = Arc::new(JobOrchestrator::new(job_store, config.job_timeout));
    let generator = Arc::new(PlaylistGenerator::new(
        playlist_store.clone(),
        library_store.clone(),
        similarity_cache.clone(),
    ));
    let ingestor = Arc::new(FeatureIngestor::new(
        library_store.clone(),
        index_manager.clone(),
        similarity_cache.clone(),
    ));

    let shutdown_token = CancellationToken::new();
    let job_context = JobContext::new(
        shutdown_token.clone(),
        orchestrator.clone(),
        library_store.clone(),
        index_manager.clone(),
    );
    tokio::spawn(
        orchestrator
            .clone()
            .run_watchdog(config.watchdog_interval, shutdown_token.clone()),
    );

    let state = ServerState {
        start_time: Instant::now(),
        library_store,
        playlist_store,
        index_manager,
        similarity_cache,
        orchestrator,
        generator,
        ingestor,
        job_context,
    };

    let result = run_server(state, config.port).await;
    shutdown_token.cancel();
    result
}
