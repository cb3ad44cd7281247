//! Shared constants for end-to-end tests

/// Timeout for individual HTTP requests
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Maximum time to wait for the server to become ready
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Polling interval while waiting for server readiness
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Maximum time to wait for a background job to reach a terminal status
pub const JOB_WAIT_TIMEOUT_MS: u64 = 5000;

/// Polling interval while waiting for a job
pub const JOB_POLL_INTERVAL_MS: u64 = 10;

/// Vector dimensions used by test servers. Small on purpose so fixture
/// vectors stay readable.
pub const ESSENTIA_DIM: usize = 2;
pub const TENSORFLOW_DIM: usize = 3;

/// Analyzer version stamped on all fixture deliveries
pub const ANALYZER_VERSION: &str = "test-analyzer-1.0";
