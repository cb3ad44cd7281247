//! In-memory approximate-neighbor indexes, one per similarity type.
//!
//! Indexes are immutable generation snapshots behind an atomic pointer swap,
//! so searches never observe a half-built index and rebuilds never block
//! readers.

mod generation;
mod manager;
mod types;

pub use generation::IndexGeneration;
pub use manager::{fuse_combined, IndexDimensions, VectorIndexManager};
pub use types::{IndexError, SearchHit};
