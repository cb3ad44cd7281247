//! HTTP client for end-to-end tests
//!
//! Wraps reqwest and provides one method per server endpoint. When routes or
//! request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::json;
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// GET /
    pub async fn home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    // ========================================================================
    // Track Endpoints
    // ========================================================================

    /// POST /tracks
    pub async fn create_track(&self, id: &str, duration_secs: f64) -> Response {
        self.client
            .post(format!("{}/tracks", self.base_url))
            .json(&json!({
                "id": id,
                "file_ref": format!("files/{}.flac", id),
                "title": format!("Track {}", id),
                "duration_secs": duration_secs,
            }))
            .send()
            .await
            .expect("Create track request failed")
    }

    /// GET /tracks/{id}
    pub async fn get_track(&self, id: &str) -> Response {
        self.client
            .get(format!("{}/tracks/{}", self.base_url, id))
            .send()
            .await
            .expect("Get track request failed")
    }

    /// POST /tracks/{id}/deactivate
    pub async fn deactivate_track(&self, id: &str) -> Response {
        self.client
            .post(format!("{}/tracks/{}/deactivate", self.base_url, id))
            .send()
            .await
            .expect("Deactivate track request failed")
    }

    /// GET /tracks/{id}/similar?type=...&limit=...
    pub async fn similar(&self, id: &str, similarity_type: &str, limit: usize) -> Response {
        self.client
            .get(format!(
                "{}/tracks/{}/similar?type={}&limit={}",
                self.base_url, id, similarity_type, limit
            ))
            .send()
            .await
            .expect("Similar request failed")
    }

    // ========================================================================
    // Ingestion Endpoints
    // ========================================================================

    /// POST /ingestion/features
    pub async fn ingest(&self, delivery: serde_json::Value) -> Response {
        self.client
            .post(format!("{}/ingestion/features", self.base_url))
            .json(&delivery)
            .send()
            .await
            .expect("Ingest request failed")
    }

    // ========================================================================
    // Index and Job Endpoints
    // ========================================================================

    /// POST /index/{type}/rebuild
    pub async fn rebuild_index(&self, similarity_type: &str) -> Response {
        self.client
            .post(format!(
                "{}/index/{}/rebuild",
                self.base_url, similarity_type
            ))
            .send()
            .await
            .expect("Rebuild request failed")
    }

    /// POST /index/{type}/rebuild?force=true
    pub async fn force_rebuild_index(&self, similarity_type: &str) -> Response {
        self.client
            .post(format!(
                "{}/index/{}/rebuild?force=true",
                self.base_url, similarity_type
            ))
            .send()
            .await
            .expect("Rebuild request failed")
    }

    /// POST /index/batch
    pub async fn run_batch_index(&self) -> Response {
        self.client
            .post(format!("{}/index/batch", self.base_url))
            .send()
            .await
            .expect("Batch index request failed")
    }

    /// POST /index/{type}/tracks/{id}
    pub async fn add_to_index(&self, similarity_type: &str, track_id: &str) -> Response {
        self.client
            .post(format!(
                "{}/index/{}/tracks/{}",
                self.base_url, similarity_type, track_id
            ))
            .send()
            .await
            .expect("Add to index request failed")
    }

    /// GET /jobs/{name}
    pub async fn job_status(&self, name: &str) -> Response {
        self.client
            .get(format!("{}/jobs/{}", self.base_url, name))
            .send()
            .await
            .expect("Job status request failed")
    }

    /// Polls GET /jobs/{name} until the job reaches a terminal status and
    /// returns the final snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the job does not finish within the timeout.
    pub async fn wait_for_job(&self, name: &str) -> serde_json::Value {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(JOB_WAIT_TIMEOUT_MS);

        loop {
            let snapshot: serde_json::Value = self
                .job_status(name)
                .await
                .json()
                .await
                .expect("Job snapshot was not JSON");
            match snapshot["status"].as_str() {
                Some("completed") | Some("failed") | Some("timed_out") => return snapshot,
                _ => {}
            }

            if start.elapsed() > timeout {
                panic!(
                    "Job {} did not finish within {}ms, last snapshot: {}",
                    name, JOB_WAIT_TIMEOUT_MS, snapshot
                );
            }
            tokio::time::sleep(Duration::from_millis(JOB_POLL_INTERVAL_MS)).await;
        }
    }

    // ========================================================================
    // Playlist Endpoints
    // ========================================================================

    /// POST /playlists/templates
    pub async fn create_template(&self, body: serde_json::Value) -> Response {
        self.client
            .post(format!("{}/playlists/templates", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Create template request failed")
    }

    /// POST /playlists/generate
    pub async fn generate(
        &self,
        template_id: &str,
        params_override: Option<serde_json::Value>,
    ) -> Response {
        self.client
            .post(format!("{}/playlists/generate", self.base_url))
            .json(&json!({
                "template_id": template_id,
                "params_override": params_override,
            }))
            .send()
            .await
            .expect("Generate request failed")
    }

    /// GET /playlists/{id}
    pub async fn get_playlist(&self, id: &str) -> Response {
        self.client
            .get(format!("{}/playlists/{}", self.base_url, id))
            .send()
            .await
            .expect("Get playlist request failed")
    }

    /// GET /playlists/{id}/stats
    pub async fn playlist_stats(&self, id: &str) -> Response {
        self.client
            .get(format!("{}/playlists/{}/stats", self.base_url, id))
            .send()
            .await
            .expect("Playlist stats request failed")
    }
}
