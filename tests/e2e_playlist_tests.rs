//! End-to-end tests for playlist templates and generation
//!
//! Tests POST /playlists/templates, POST /playlists/generate,
//! GET /playlists/{id} and GET /playlists/{id}/stats.

mod common;

use common::*;
use mixtape_server::playlists::PlaylistStore;
use reqwest::StatusCode;
use serde_json::json;

async fn create_energy_template(client: &TestClient, id: &str, length: usize) {
    let response = client
        .create_template(json!({
            "id": id,
            "name": "High energy",
            "params": { "type": "energy", "min_energy": 0.6, "max_energy": 1.0, "length": length },
        }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_create_template() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .create_template(json!({
            "name": "Chill",
            "params": { "type": "mood", "target_valence": 0.3, "length": 5 },
        }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["id"].as_str().is_some_and(|id| !id.is_empty()));
    assert_eq!(body["name"], "Chill");
    assert_eq!(body["params"]["type"], "mood");
    assert_eq!(body["params"]["length"], 5);
}

#[tokio::test]
async fn test_create_template_rejects_invalid_params() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .create_template(json!({
            "name": "Empty",
            "params": { "type": "mood", "target_valence": 0.3, "length": 0 },
        }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_unknown_template_returns_not_found() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.generate("ghost", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_energy_template_generates_playlist() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    seed_catalog(&client).await;
    create_energy_template(&client, "tpl", 3).await;

    let response = client.generate("tpl", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let generation: serde_json::Value = response.json().await.unwrap();
    assert_eq!(generation["success"], true);
    assert_eq!(generation["regeneration_count"], 0);
    assert!(generation["quality_score"].as_f64().unwrap() > 0.0);

    let playlist_id = generation["playlist_id"].as_str().unwrap();
    let response = client.get_playlist(playlist_id).await;
    assert_eq!(response.status(), StatusCode::OK);
    let playlist: serde_json::Value = response.json().await.unwrap();
    assert_eq!(playlist["template_id"], "tpl");
    assert_eq!(playlist["track_count"], 3);

    // Tracks 1 and 2 sit inside the energy range, track 3 is closest to it;
    // track 5 would score higher but is below the quality gate.
    let tracks = playlist["tracks"].as_array().unwrap();
    let ids: Vec<&str> = tracks
        .iter()
        .map(|t| t["track_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![TRACK_1, TRACK_2, TRACK_3]);
    for (position, track) in tracks.iter().enumerate() {
        assert_eq!(track["position"], position);
        assert!(!track["selection_reason"].as_str().unwrap().is_empty());
        assert!(track["selection_score"].as_f64().is_some());
    }

    let response = client.playlist_stats(playlist_id).await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats: serde_json::Value = response.json().await.unwrap();
    assert_eq!(stats["track_count"], 3);
    assert_eq!(stats["total_duration_secs"], 620.0);
}

#[tokio::test]
async fn test_insufficient_candidates_commits_nothing() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    seed_catalog(&client).await;

    let response = client
        .create_template(json!({
            "id": "tpl",
            "name": "Noise only",
            "params": { "type": "genre", "genre": "noise", "length": 2 },
        }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client.generate("tpl", None).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("candidates"));

    // The attempt left a provenance row but no playlist.
    assert!(server
        .playlist_store
        .latest_successful_generation("tpl")
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_regeneration_count_increments() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    seed_catalog(&client).await;
    create_energy_template(&client, "tpl", 3).await;

    let first: serde_json::Value = client.generate("tpl", None).await.json().await.unwrap();
    let second: serde_json::Value = client.generate("tpl", None).await.json().await.unwrap();
    assert_eq!(first["regeneration_count"], 0);
    assert_eq!(second["regeneration_count"], 1);
    assert_ne!(first["playlist_id"], second["playlist_id"]);

    // Same template, same library: the track lists match.
    let tracks_of = |playlist: serde_json::Value| -> Vec<String> {
        playlist["tracks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["track_id"].as_str().unwrap().to_string())
            .collect()
    };
    let first_tracks = tracks_of(
        client
            .get_playlist(first["playlist_id"].as_str().unwrap())
            .await
            .json()
            .await
            .unwrap(),
    );
    let second_tracks = tracks_of(
        client
            .get_playlist(second["playlist_id"].as_str().unwrap())
            .await
            .json()
            .await
            .unwrap(),
    );
    assert_eq!(first_tracks, second_tracks);
}

#[tokio::test]
async fn test_params_override_applies_to_single_attempt() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    seed_catalog(&client).await;

    let response = client
        .create_template(json!({
            "id": "tpl",
            "name": "Techno",
            "params": { "type": "genre", "genre": "techno", "length": 2 },
        }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let override_params = json!({ "type": "mood", "target_valence": 0.5, "length": 3 });
    let generation: serde_json::Value = client
        .generate("tpl", Some(override_params))
        .await
        .json()
        .await
        .unwrap();
    let playlist: serde_json::Value = client
        .get_playlist(generation["playlist_id"].as_str().unwrap())
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(playlist["track_count"], 3);

    // The stored template is untouched.
    let generation: serde_json::Value = client.generate("tpl", None).await.json().await.unwrap();
    let playlist: serde_json::Value = client
        .get_playlist(generation["playlist_id"].as_str().unwrap())
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(playlist["track_count"], 2);
}

#[tokio::test]
async fn test_similarity_template() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    seed_catalog(&client).await;
    rebuild_essentia_index(&client).await;

    let response = client
        .create_template(json!({
            "id": "tpl",
            "name": "Like track 1",
            "params": {
                "type": "similarity",
                "seed_track_id": TRACK_1,
                "similarity_type": "essentia",
                "min_score": 0.6,
                "length": 2,
            },
        }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let generation: serde_json::Value = client.generate("tpl", None).await.json().await.unwrap();
    assert_eq!(generation["success"], true);

    let playlist: serde_json::Value = client
        .get_playlist(generation["playlist_id"].as_str().unwrap())
        .await
        .json()
        .await
        .unwrap();
    let tracks = playlist["tracks"].as_array().unwrap();
    let ids: Vec<&str> = tracks
        .iter()
        .map(|t| t["track_id"].as_str().unwrap())
        .collect();
    // The seed never appears in its own playlist.
    assert_eq!(ids, vec![TRACK_2, TRACK_3]);
    assert!(tracks
        .iter()
        .all(|t| t["selection_reason"].as_str().unwrap().contains("similarity")));
}

#[tokio::test]
async fn test_order_by_bpm() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    seed_catalog(&client).await;

    let response = client
        .create_template(json!({
            "id": "tpl",
            "name": "Workout",
            "params": {
                "type": "energy",
                "min_energy": 0.4,
                "max_energy": 1.0,
                "length": 3,
                "order_by": "bpm",
            },
        }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let generation: serde_json::Value = client.generate("tpl", None).await.json().await.unwrap();
    let playlist: serde_json::Value = client
        .get_playlist(generation["playlist_id"].as_str().unwrap())
        .await
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = playlist["tracks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["track_id"].as_str().unwrap())
        .collect();
    // Selection picks tracks 1-3, the bpm key reorders them descending.
    assert_eq!(ids, vec![TRACK_2, TRACK_1, TRACK_3]);
}

#[tokio::test]
async fn test_unknown_playlist_returns_not_found() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    assert_eq!(
        client.get_playlist("ghost").await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        client.playlist_stats("ghost").await.status(),
        StatusCode::NOT_FOUND
    );
}
