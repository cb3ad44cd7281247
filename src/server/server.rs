use super::state::{
    GuardedGenerator, GuardedIndexManager, GuardedIngestor, GuardedLibraryStore,
    GuardedOrchestrator, GuardedPlaylistStore, GuardedSimilarityCache, ServerState,
};
use crate::background_jobs::jobs::{BatchIndexJob, IndexRebuildJob};
use crate::background_jobs::{JobContext, JobError, JobSnapshot};
use crate::ingestion::{FeatureDelivery, IngestError, IngestOutcome};
use crate::playlists::{
    GenerateError, GeneratedPlaylist, Playlist, PlaylistEntry, PlaylistStats, PlaylistTemplate,
    TemplateParams,
};
use crate::similarity::SimilarityError;
use crate::tracks::{SimilarityType, Track, TrackStatus};
use crate::vector_index::{fuse_combined, IndexError, SearchHit};
use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal(message: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::internal(e)
    }
}

impl From<IndexError> for ApiError {
    fn from(e: IndexError) -> Self {
        let status = match e {
            IndexError::NotBuilt(_) => StatusCode::CONFLICT,
            IndexError::DimensionMismatch { .. } => StatusCode::BAD_REQUEST,
        };
        ApiError::new(status, e.to_string())
    }
}

impl From<SimilarityError> for ApiError {
    fn from(e: SimilarityError) -> Self {
        match e {
            SimilarityError::Index(inner) => inner.into(),
            SimilarityError::NoVector { .. } => {
                ApiError::new(StatusCode::NOT_FOUND, e.to_string())
            }
            SimilarityError::Storage(inner) => ApiError::internal(inner),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::UnknownTrack(_) => ApiError::new(StatusCode::NOT_FOUND, e.to_string()),
            IngestError::InvalidDelivery(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, e.to_string())
            }
            IngestError::Index(inner) => inner.into(),
            IngestError::Similarity(inner) => inner.into(),
            IngestError::Storage(inner) => ApiError::internal(inner),
        }
    }
}

impl From<GenerateError> for ApiError {
    fn from(e: GenerateError) -> Self {
        match e {
            GenerateError::UnknownTemplate(_) => {
                ApiError::new(StatusCode::NOT_FOUND, e.to_string())
            }
            GenerateError::InvalidTemplateParameters(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, e.to_string())
            }
            GenerateError::InsufficientCandidates { .. } => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            GenerateError::Similarity(inner) => inner.into(),
            GenerateError::Storage(inner) => ApiError::internal(inner),
        }
    }
}

impl From<JobError> for ApiError {
    fn from(e: JobError) -> Self {
        let status = match e {
            JobError::AlreadyRunning => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, e.to_string())
    }
}

fn parse_similarity_type(raw: &str) -> Result<SimilarityType, ApiError> {
    SimilarityType::parse(raw).ok_or_else(|| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("Unknown similarity type: {}", raw),
        )
    })
}

#[derive(Serialize)]
struct HomeResponse {
    server: &'static str,
    uptime: String,
}

fn format_uptime(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!(
        "{}d {}h {}m {}s",
        secs / 86400,
        (secs % 86400) / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

async fn home(State(state): State<ServerState>) -> Json<HomeResponse> {
    Json(HomeResponse {
        server: "mixtape-server",
        uptime: format_uptime(state.start_time.elapsed()),
    })
}

#[derive(Deserialize)]
struct TrackUpsertRequest {
    id: String,
    file_ref: String,
    title: Option<String>,
    duration_secs: f64,
}

async fn upsert_track(
    State(library): State<GuardedLibraryStore>,
    Json(request): Json<TrackUpsertRequest>,
) -> Result<Json<Track>, ApiError> {
    let now = chrono::Utc::now().timestamp();
    let track = Track {
        id: request.id,
        file_ref: request.file_ref,
        title: request.title,
        duration_secs: request.duration_secs,
        status: TrackStatus::Discovered,
        active: true,
        created_at: now,
        updated_at: now,
    };
    library.upsert_track(&track)?;
    let track = library
        .get_track(&track.id)?
        .ok_or_else(|| ApiError::internal("Track vanished after upsert"))?;
    Ok(Json(track))
}

async fn get_track(
    State(library): State<GuardedLibraryStore>,
    Path(track_id): Path<String>,
) -> Result<Json<Track>, ApiError> {
    let track = library
        .get_track(&track_id)?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Track not found"))?;
    Ok(Json(track))
}

async fn deactivate_track(
    State(ingestor): State<GuardedIngestor>,
    Path(track_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    ingestor.deactivate_track(&track_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct RebuildQuery {
    #[serde(default)]
    force: bool,
}

async fn rebuild_index(
    State(orchestrator): State<GuardedOrchestrator>,
    State(index): State<GuardedIndexManager>,
    State(job_context): State<JobContext>,
    Path(similarity_type): Path<String>,
    Query(query): Query<RebuildQuery>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let similarity_type = parse_similarity_type(&similarity_type)?;
    // Throwing away a live index is an explicit decision.
    if index.is_built(similarity_type) && !query.force {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            format!(
                "{} index is already built, pass force=true to rebuild it",
                similarity_type
            ),
        ));
    }
    let job = Arc::new(IndexRebuildJob::new(similarity_type));
    let name = crate::background_jobs::jobs::rebuild_job_name(similarity_type);
    orchestrator.spawn(job, job_context, "api")?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "job": name }))))
}

async fn run_batch_index(
    State(orchestrator): State<GuardedOrchestrator>,
    State(job_context): State<JobContext>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    orchestrator.spawn(Arc::new(BatchIndexJob), job_context, "api")?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "job": crate::background_jobs::jobs::BATCH_INDEX_JOB_NAME })),
    ))
}

async fn job_status(
    State(orchestrator): State<GuardedOrchestrator>,
    Path(name): Path<String>,
) -> Json<JobSnapshot> {
    Json(orchestrator.status(&name))
}

async fn add_to_index(
    State(index): State<GuardedIndexManager>,
    State(library): State<GuardedLibraryStore>,
    Path((similarity_type, track_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let similarity_type = parse_similarity_type(&similarity_type)?;

    let vector = match similarity_type {
        SimilarityType::Essentia | SimilarityType::Tensorflow => library
            .get_feature_vector(&track_id, similarity_type)?
            .map(|f| f.vector),
        SimilarityType::Combined => {
            let essentia = library.get_feature_vector(&track_id, SimilarityType::Essentia)?;
            let tensorflow = library.get_feature_vector(&track_id, SimilarityType::Tensorflow)?;
            match (essentia, tensorflow) {
                (Some(e), Some(t)) => Some(fuse_combined(&e.vector, &t.vector)),
                _ => None,
            }
        }
    };
    let vector = vector.ok_or_else(|| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            format!("Track {} has no {} vector", track_id, similarity_type),
        )
    })?;

    index.add(similarity_type, &track_id, vector)?;
    Ok(Json(json!({
        "track_id": track_id,
        "similarity_type": similarity_type.as_str(),
    })))
}

#[derive(Deserialize)]
struct SimilarQuery {
    #[serde(rename = "type")]
    similarity_type: String,
    #[serde(default = "default_similar_limit")]
    limit: usize,
}

fn default_similar_limit() -> usize {
    20
}

async fn similar_tracks(
    State(cache): State<GuardedSimilarityCache>,
    Path(track_id): Path<String>,
    Query(query): Query<SimilarQuery>,
) -> Result<Json<Vec<SearchHit>>, ApiError> {
    let similarity_type = parse_similarity_type(&query.similarity_type)?;
    let hits = tokio::task::spawn_blocking(move || {
        cache.get_similar(&track_id, similarity_type, query.limit)
    })
    .await
    .map_err(ApiError::internal)??;
    Ok(Json(hits))
}

#[derive(Deserialize)]
struct CreateTemplateRequest {
    id: Option<String>,
    name: String,
    params: TemplateParams,
}

async fn create_template(
    State(store): State<GuardedPlaylistStore>,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<PlaylistTemplate>), ApiError> {
    request
        .params
        .validate()
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e))?;

    let template = PlaylistTemplate {
        id: request.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        name: request.name,
        params: request.params,
        created_at: chrono::Utc::now().timestamp(),
    };
    store.insert_template(&template)?;
    let template = store
        .get_template(&template.id)?
        .ok_or_else(|| ApiError::internal("Template vanished after insert"))?;
    Ok((StatusCode::CREATED, Json(template)))
}

#[derive(Deserialize)]
struct GenerateRequest {
    template_id: String,
    params_override: Option<TemplateParams>,
}

/// Generations of the same template are serialized through the orchestrator
/// under `generate_playlist:<template_id>`; concurrent requests for the same
/// template get `409`.
async fn generate_playlist(
    State(orchestrator): State<GuardedOrchestrator>,
    State(generator): State<GuardedGenerator>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GeneratedPlaylist>, ApiError> {
    let job_name = format!("generate_playlist:{}", request.template_id);
    let handle = orchestrator.start(&job_name, "api")?;

    // The handle is completed inside the blocking task, which runs to the end
    // even when the client disconnects and this future is dropped. A dropped
    // request must not leave the job slot stuck in running.
    let result = tokio::task::spawn_blocking(move || {
        let result = generator.generate(&request.template_id, request.params_override);
        match &result {
            Ok(_) => orchestrator.complete(handle, Ok(())),
            Err(e) => orchestrator.complete(handle, Err(e.to_string())),
        }
        result
    })
    .await;

    match result {
        Ok(Ok(generation)) => Ok(Json(generation)),
        Ok(Err(e)) => Err(e.into()),
        Err(join_err) => Err(ApiError::internal(join_err)),
    }
}

#[derive(Serialize)]
struct PlaylistResponse {
    #[serde(flatten)]
    playlist: Playlist,
    tracks: Vec<PlaylistEntry>,
}

async fn get_playlist(
    State(store): State<GuardedPlaylistStore>,
    Path(playlist_id): Path<String>,
) -> Result<Json<PlaylistResponse>, ApiError> {
    let playlist = store
        .get_playlist(&playlist_id)?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Playlist not found"))?;
    let tracks = store.get_playlist_entries(&playlist_id)?;
    Ok(Json(PlaylistResponse { playlist, tracks }))
}

async fn playlist_stats(
    State(store): State<GuardedPlaylistStore>,
    Path(playlist_id): Path<String>,
) -> Result<Json<PlaylistStats>, ApiError> {
    let stats = store
        .playlist_stats(&playlist_id)?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Playlist not found"))?;
    Ok(Json(stats))
}

async fn ingest_features(
    State(ingestor): State<GuardedIngestor>,
    Json(delivery): Json<FeatureDelivery>,
) -> Result<Json<IngestOutcome>, ApiError> {
    let outcome =
        tokio::task::spawn_blocking(move || ingestor.ingest(delivery))
            .await
            .map_err(ApiError::internal)??;
    Ok(Json(outcome))
}

pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/tracks", post(upsert_track))
        .route("/tracks/{id}", get(get_track))
        .route("/tracks/{id}/deactivate", post(deactivate_track))
        .route("/tracks/{id}/similar", get(similar_tracks))
        .route("/ingestion/features", post(ingest_features))
        .route("/index/batch", post(run_batch_index))
        .route("/index/{type}/rebuild", post(rebuild_index))
        .route("/index/{type}/tracks/{id}", post(add_to_index))
        .route("/jobs/{name}", get(job_status))
        .route("/playlists/templates", post(create_template))
        .route("/playlists/generate", post(generate_playlist))
        .route("/playlists/{id}", get(get_playlist))
        .route("/playlists/{id}/stats", get(playlist_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(state: ServerState, port: u16) -> Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Listening on port {}", port);
    Ok(axum::serve(listener, app).await?)
}
