//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own set of databases.

use super::constants::*;
use mixtape_server::background_jobs::{JobContext, JobOrchestrator};
use mixtape_server::ingestion::FeatureIngestor;
use mixtape_server::job_store::SqliteJobStore;
use mixtape_server::library_store::{LibraryStore, SqliteLibraryStore};
use mixtape_server::playlists::{PlaylistGenerator, PlaylistStore, SqlitePlaylistStore};
use mixtape_server::server::{build_router, ServerState};
use mixtape_server::similarity::{SimilarityCache, SqliteSimilarityStore};
use mixtape_server::vector_index::{IndexDimensions, VectorIndexManager};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Test server instance with isolated databases
///
/// When dropped, the server shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Library store for direct database access in tests
    pub library_store: Arc<dyn LibraryStore>,

    /// Playlist store for direct database access in tests
    pub playlist_store: Arc<dyn PlaylistStore>,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    shutdown_token: CancellationToken,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// The server starts with empty databases and no built indexes; seed it
    /// through the HTTP API (see `fixtures::seed_catalog`).
    ///
    /// # Panics
    ///
    /// Panics if store creation, port binding or server startup fails, or if
    /// the server does not become ready within the timeout.
    pub async fn spawn() -> Self {
        let temp_db_dir = TempDir::new().expect("Failed to create temp db dir");

        let library_store = Arc::new(
            SqliteLibraryStore::new(temp_db_dir.path().join("library.db"))
                .expect("Failed to open library store"),
        );
        let similarity_store = Arc::new(
            SqliteSimilarityStore::new(temp_db_dir.path().join("similarity.db"))
                .expect("Failed to open similarity store"),
        );
        let playlist_store = Arc::new(
            SqlitePlaylistStore::new(temp_db_dir.path().join("playlists.db"))
                .expect("Failed to open playlist store"),
        );
        let job_store = Arc::new(
            SqliteJobStore::new(temp_db_dir.path().join("server.db"))
                .expect("Failed to open job store"),
        );

        let index_manager = Arc::new(VectorIndexManager::new(IndexDimensions {
            essentia: ESSENTIA_DIM,
            tensorflow: TENSORFLOW_DIM,
        }));
        let similarity_cache = Arc::new(SimilarityCache::new(
            similarity_store,
            index_manager.clone(),
            library_store.clone(),
        ));
        let orchestrator = Arc::new(JobOrchestrator::new(job_store, Duration::from_secs(60)));
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
                .run_watchdog(Duration::from_millis(100), shutdown_token.clone()),
        );

        let state = ServerState {
            start_time: Instant::now(),
            library_store: library_store.clone(),
            playlist_store: playlist_store.clone(),
            index_manager,
            similarity_cache,
            orchestrator,
            generator,
            ingestor,
            job_context,
        };
        let app = build_router(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            library_store,
            playlist_store,
            _temp_db_dir: temp_db_dir,
            shutdown_token,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir is cleaned up automatically
    }
}
