use super::orchestrator::JobOrchestrator;
use crate::library_store::LibraryStore;
use crate::vector_index::VectorIndexManager;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Context provided to jobs during execution.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for shutdown requests.
    pub cancellation_token: CancellationToken,

    /// Orchestrator, for progress reporting.
    pub orchestrator: Arc<JobOrchestrator>,

    /// Access to tracks, vectors and analysis summaries.
    pub library_store: Arc<dyn LibraryStore>,

    /// The live vector indexes.
    pub index_manager: Arc<VectorIndexManager>,
}

impl JobContext {
    pub fn new(
        cancellation_token: CancellationToken,
        orchestrator: Arc<JobOrchestrator>,
        library_store: Arc<dyn LibraryStore>,
        index_manager: Arc<VectorIndexManager>,
    ) -> Self {
        Self {
            cancellation_token,
            orchestrator,
            library_store,
            index_manager,
        }
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
