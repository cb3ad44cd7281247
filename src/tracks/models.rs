use serde::{Deserialize, Serialize};

/// Default confidence threshold below which tracks are excluded from
/// playlist generation unless manually overridden.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Lifecycle status of a track.
///
/// Created as `Discovered` by the discovery collaborator, advanced by
/// metadata extraction, analysis and indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    Discovered,
    HasMetadata,
    Analyzed,
    Indexed,
    Failed,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackStatus::Discovered => "discovered",
            TrackStatus::HasMetadata => "has_metadata",
            TrackStatus::Analyzed => "analyzed",
            TrackStatus::Indexed => "indexed",
            TrackStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "discovered" => Some(TrackStatus::Discovered),
            "has_metadata" => Some(TrackStatus::HasMetadata),
            "analyzed" => Some(TrackStatus::Analyzed),
            "indexed" => Some(TrackStatus::Indexed),
            "failed" => Some(TrackStatus::Failed),
            _ => None,
        }
    }
}

/// A named similarity scoring method. Each type has its own vector space
/// and its own index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityType {
    Essentia,
    Tensorflow,
    /// Fusion of the two source spaces: the L2-normalized essentia vector
    /// concatenated with the L2-normalized tensorflow vector.
    Combined,
}

impl SimilarityType {
    pub const ALL: [SimilarityType; 3] = [
        SimilarityType::Essentia,
        SimilarityType::Tensorflow,
        SimilarityType::Combined,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityType::Essentia => "essentia",
            SimilarityType::Tensorflow => "tensorflow",
            SimilarityType::Combined => "combined",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "essentia" => Some(SimilarityType::Essentia),
            "tensorflow" => Some(SimilarityType::Tensorflow),
            "combined" => Some(SimilarityType::Combined),
            _ => None,
        }
    }
}

impl std::fmt::Display for SimilarityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A track in the library.
///
/// The file reference is opaque here; the discovery collaborator owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub file_ref: String,
    pub title: Option<String>,
    pub duration_secs: f64,
    pub status: TrackStatus,
    /// Soft-deactivation flag. Tracks referenced by playlists are never
    /// deleted, only deactivated.
    pub active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A feature vector delivered by the external analysis stage.
///
/// Immutable once written: re-analysis produces a new vector that replaces
/// the old row and invalidates downstream cache and index entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub track_id: String,
    pub similarity_type: SimilarityType,
    pub vector: Vec<f32>,
    pub analyzed_at: i64,
    pub analyzer_version: String,
}

/// Analysis quality fields, gating playlist eligibility. Embedded in the
/// per-track analysis summary row and in feature deliveries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisQuality {
    /// Primary analyzer (essentia) quality score in [0, 1].
    pub quality_score: f64,
    /// Secondary analyzer (tensorflow) score, when available.
    pub secondary_score: Option<f64>,
    pub confidence_threshold: f64,
    pub manual_override: bool,
    pub override_reason: Option<String>,
}

impl AnalysisQuality {
    /// Whether this track may enter a playlist candidate pool.
    pub fn passes_gate(&self) -> bool {
        self.manual_override || self.quality_score >= self.confidence_threshold
    }
}

/// Encode an f32 vector as a little-endian BLOB for SQLite storage.
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode a little-endian BLOB back into an f32 vector.
///
/// Returns None if the blob length is not a multiple of 4.
pub fn decode_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}
