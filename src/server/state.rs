use axum::extract::FromRef;

use crate::background_jobs::{JobContext, JobOrchestrator};
use crate::ingestion::FeatureIngestor;
use crate::library_store::LibraryStore;
use crate::playlists::{PlaylistGenerator, PlaylistStore};
use crate::similarity::SimilarityCache;
use crate::vector_index::VectorIndexManager;
use std::sync::Arc;
use std::time::Instant;

pub type GuardedLibraryStore = Arc<dyn LibraryStore>;
pub type GuardedPlaylistStore = Arc<dyn PlaylistStore>;
pub type GuardedIndexManager = Arc<VectorIndexManager>;
pub type GuardedSimilarityCache = Arc<SimilarityCache>;
pub type GuardedOrchestrator = Arc<JobOrchestrator>;
pub type GuardedGenerator = Arc<PlaylistGenerator>;
pub type GuardedIngestor = Arc<FeatureIngestor>;

#[derive(Clone)]
pub struct ServerState {
    pub start_time: Instant,
    pub library_store: GuardedLibraryStore,
    pub playlist_store: GuardedPlaylistStore,
    pub index_manager: GuardedIndexManager,
    pub similarity_cache: GuardedSimilarityCache,
    pub orchestrator: GuardedOrchestrator,
    pub generator: GuardedGenerator,
    pub ingestor: GuardedIngestor,
    pub job_context: JobContext,
}

impl FromRef<ServerState> for GuardedLibraryStore {
    fn from_ref(input: &ServerState) -> Self {
        input.library_store.clone()
    }
}

impl FromRef<ServerState> for GuardedPlaylistStore {
    fn from_ref(input: &ServerState) -> Self {
        input.playlist_store.clone()
    }
}

impl FromRef<ServerState> for GuardedIndexManager {
    fn from_ref(input: &ServerState) -> Self {
        input.index_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedSimilarityCache {
    fn from_ref(input: &ServerState) -> Self {
        input.similarity_cache.clone()
    }
}

impl FromRef<ServerState> for GuardedOrchestrator {
    fn from_ref(input: &ServerState) -> Self {
        input.orchestrator.clone()
    }
}

impl FromRef<ServerState> for GuardedGenerator {
    fn from_ref(input: &ServerState) -> Self {
        input.generator.clone()
    }
}

impl FromRef<ServerState> for GuardedIngestor {
    fn from_ref(input: &ServerState) -> Self {
        input.ingestor.clone()
    }
}

impl FromRef<ServerState> for JobContext {
    fn from_ref(input: &ServerState) -> Self {
        input.job_context.clone()
    }
}
