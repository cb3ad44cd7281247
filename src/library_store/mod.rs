//! Track library storage: tracks, feature vectors and analysis summaries.
//!
//! This is the read side for the recommendation layer. Analysis rows are only
//! ever written by the ingestion path; the index, cache and playlist layers
//! treat them as read-only.

mod models;
mod schema;
mod store;
mod trait_def;

pub use models::{PlaylistCandidate, TrackAnalysis};
pub use schema::LIBRARY_VERSIONED_SCHEMAS;
pub use store::SqliteLibraryStore;
pub use trait_def::LibraryStore;
