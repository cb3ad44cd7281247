mod file_config;

pub use file_config::{FileConfig, IndexConfig};

use crate::vector_index::IndexDimensions;
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 30 * 60;
pub const DEFAULT_WATCHDOG_INTERVAL_SECS: u64 = 30;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub job_timeout_secs: u64,
    pub watchdog_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    /// Watchdog limit for a single job run.
    pub job_timeout: Duration,
    /// How often the watchdog sweeps running jobs.
    pub watchdog_interval: Duration,
    pub index_dimensions: IndexDimensions,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);

        let job_timeout_secs = file.job_timeout_secs.unwrap_or(cli.job_timeout_secs);
        if job_timeout_secs == 0 {
            bail!("job_timeout_secs must be positive");
        }
        let watchdog_interval_secs = file
            .watchdog_interval_secs
            .unwrap_or(cli.watchdog_interval_secs);
        if watchdog_interval_secs == 0 {
            bail!("watchdog_interval_secs must be positive");
        }

        let index_file = file.index.unwrap_or_default();
        let defaults = IndexDimensions::default();
        let index_dimensions = IndexDimensions {
            essentia: index_file.essentia_dimension.unwrap_or(defaults.essentia),
            tensorflow: index_file
                .tensorflow_dimension
                .unwrap_or(defaults.tensorflow),
        };
        if index_dimensions.essentia == 0 || index_dimensions.tensorflow == 0 {
            bail!("Index dimensions must be positive");
        }

        Ok(Self {
            db_dir,
            port,
            job_timeout: Duration::from_secs(job_timeout_secs),
            watchdog_interval: Duration::from_secs(watchdog_interval_secs),
            index_dimensions,
        })
    }

    pub fn library_db_path(&self) -> PathBuf {
        self.db_dir.join("library.db")
    }

    pub fn similarity_db_path(&self) -> PathBuf {
        self.db_dir.join("similarity.db")
    }

    pub fn playlists_db_path(&self) -> PathBuf {
        self.db_dir.join("playlists.db")
    }

    pub fn server_db_path(&self) -> PathBuf {
        self.db_dir.join("server.db")
    }
}
