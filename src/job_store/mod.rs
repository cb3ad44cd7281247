//! Persisted job run history (`server.db`).

mod models;
mod schema;
mod store;
mod trait_def;

pub use models::{JobRun, JobRunStatus};
pub use schema::SERVER_VERSIONED_SCHEMAS;
pub use store::SqliteJobStore;
pub use trait_def::JobStore;
