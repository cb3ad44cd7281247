pub mod background_jobs;
pub mod config;
pub mod ingestion;
pub mod job_store;
pub mod library_store;
pub mod playlists;
pub mod server;
pub mod similarity;
pub mod sqlite_persistence;
pub mod tracks;
pub mod vector_index;

pub use config::{AppConfig, CliConfig, FileConfig};
