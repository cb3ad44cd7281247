//! Persistent similarity cache over the vector indexes.
//!
//! Scores have no TTL; cached pairs stay valid until an ingestion event
//! invalidates the track that produced them.

mod cache;
mod models;
mod schema;
mod store;
mod trait_def;

pub use cache::SimilarityCache;
pub use models::SimilarityError;
pub use schema::SIMILARITY_VERSIONED_SCHEMAS;
pub use store::SqliteSimilarityStore;
pub use trait_def::SimilarityStore;
