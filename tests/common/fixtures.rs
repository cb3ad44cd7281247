//! Fixture data for end-to-end tests
//!
//! Seeds a small catalog through the HTTP API. Essentia vectors are 2-d unit
//! vectors at fixed angles from track 1, so cosine ordering against track 1
//! is known by construction: T2 closest, then T3, T4 and T5.

use super::client::TestClient;
use super::constants::ANALYZER_VERSION;
use serde_json::json;

pub const TRACK_1: &str = "track-1";
pub const TRACK_2: &str = "track-2";
pub const TRACK_3: &str = "track-3";
pub const TRACK_4: &str = "track-4";
pub const TRACK_5: &str = "track-5";

pub struct FixtureTrack {
    pub id: &'static str,
    pub duration_secs: f64,
    /// Angle from track 1 in degrees; determines essentia similarity.
    pub angle_deg: f32,
    pub bpm: f64,
    pub energy: f64,
    pub valence: f64,
    pub genre: &'static str,
    pub quality_score: f64,
}

/// Five tracks; TRACK_5 has a quality score below the default confidence
/// threshold and is excluded from playlist candidate pools.
pub const FIXTURE_TRACKS: &[FixtureTrack] = &[
    FixtureTrack {
        id: TRACK_1,
        duration_secs: 240.0,
        angle_deg: 0.0,
        bpm: 128.0,
        energy: 0.9,
        valence: 0.8,
        genre: "techno",
        quality_score: 0.9,
    },
    FixtureTrack {
        id: TRACK_2,
        duration_secs: 180.0,
        angle_deg: 10.0,
        bpm: 140.0,
        energy: 0.8,
        valence: 0.7,
        genre: "techno",
        quality_score: 0.9,
    },
    FixtureTrack {
        id: TRACK_3,
        duration_secs: 200.0,
        angle_deg: 30.0,
        bpm: 90.0,
        energy: 0.5,
        valence: 0.5,
        genre: "ambient",
        quality_score: 0.9,
    },
    FixtureTrack {
        id: TRACK_4,
        duration_secs: 220.0,
        angle_deg: 80.0,
        bpm: 70.0,
        energy: 0.2,
        valence: 0.3,
        genre: "ambient",
        quality_score: 0.9,
    },
    FixtureTrack {
        id: TRACK_5,
        duration_secs: 160.0,
        angle_deg: 170.0,
        bpm: 200.0,
        energy: 0.1,
        valence: 0.1,
        genre: "noise",
        quality_score: 0.3,
    },
];

/// A 2-d unit vector at the given angle in degrees.
pub fn essentia_vector(angle_deg: f32) -> Vec<f32> {
    let radians = angle_deg.to_radians();
    vec![radians.cos(), radians.sin()]
}

/// A full essentia delivery body for one fixture track.
pub fn essentia_delivery(track: &FixtureTrack) -> serde_json::Value {
    json!({
        "track_id": track.id,
        "similarity_type": "essentia",
        "vector": essentia_vector(track.angle_deg),
        "quality_score": track.quality_score,
        "analyzer_version": ANALYZER_VERSION,
        "features": {
            "bpm": track.bpm,
            "energy": track.energy,
            "valence": track.valence,
            "genre": track.genre,
        },
    })
}

/// Creates all fixture tracks and ingests their essentia vectors.
///
/// # Panics
///
/// Panics if any request fails, indicating a test infrastructure problem.
pub async fn seed_catalog(client: &TestClient) {
    for track in FIXTURE_TRACKS {
        let response = client.create_track(track.id, track.duration_secs).await;
        assert!(
            response.status().is_success(),
            "Failed to create fixture track {}",
            track.id
        );

        let response = client.ingest(essentia_delivery(track)).await;
        assert!(
            response.status().is_success(),
            "Failed to ingest fixture track {}: {:?}",
            track.id,
            response.text().await
        );
    }
}

/// Triggers an essentia index rebuild and waits for the job to complete.
/// Forces, so it also works when an index is already live.
pub async fn rebuild_essentia_index(client: &TestClient) {
    let response = client.force_rebuild_index("essentia").await;
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json().await.unwrap();
    let job_name = body["job"].as_str().expect("Rebuild response had no job");

    let snapshot = client.wait_for_job(job_name).await;
    assert_eq!(
        snapshot["status"], "completed",
        "Rebuild job did not complete: {}",
        snapshot
    );
}
