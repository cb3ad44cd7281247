use super::generation::IndexGeneration;
use super::types::{IndexError, SearchHit};
use crate::tracks::SimilarityType;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Per-type vector dimensions. Defaults match the analyzer outputs.
#[derive(Debug, Clone)]
pub struct IndexDimensions {
    pub essentia: usize,
    pub tensorflow: usize,
}

impl Default for IndexDimensions {
    fn default() -> Self {
        Self {
            essentia: 32,
            tensorflow: 128,
        }
    }
}

impl IndexDimensions {
    /// The combined index holds both source vectors concatenated.
    pub fn of(&self, similarity_type: SimilarityType) -> usize {
        match similarity_type {
            SimilarityType::Essentia => self.essentia,
            SimilarityType::Tensorflow => self.tensorflow,
            SimilarityType::Combined => self.essentia + self.tensorflow,
        }
    }
}

/// Owns one index per similarity type.
///
/// Generations are immutable; every mutation publishes a new `Arc` under a
/// short write lock, and searches run on the snapshot they grabbed so a
/// concurrent rebuild never bleeds into in-flight results.
pub struct VectorIndexManager {
    dimensions: IndexDimensions,
    indexes: RwLock<HashMap<SimilarityType, Arc<IndexGeneration>>>,
}

impl VectorIndexManager {
    pub fn new(dimensions: IndexDimensions) -> Self {
        Self {
            dimensions,
            indexes: RwLock::new(HashMap::new()),
        }
    }

    pub fn dimension_of(&self, similarity_type: SimilarityType) -> usize {
        self.dimensions.of(similarity_type)
    }

    fn check_dimension(
        &self,
        similarity_type: SimilarityType,
        vector: &[f32],
    ) -> Result<(), IndexError> {
        let expected = self.dimensions.of(similarity_type);
        if vector.len() != expected {
            return Err(IndexError::DimensionMismatch {
                similarity_type,
                expected,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    fn snapshot(&self, similarity_type: SimilarityType) -> Result<Arc<IndexGeneration>, IndexError> {
        self.indexes
            .read()
            .unwrap()
            .get(&similarity_type)
            .cloned()
            .ok_or(IndexError::NotBuilt(similarity_type))
    }

    /// Whether any generation exists for the type yet.
    pub fn is_built(&self, similarity_type: SimilarityType) -> bool {
        self.indexes.read().unwrap().contains_key(&similarity_type)
    }

    /// Replace the index wholesale. An empty build is valid and establishes
    /// the type's dimensionality. Returns the new generation number.
    pub fn build(
        &self,
        similarity_type: SimilarityType,
        entries: Vec<(String, Vec<f32>)>,
    ) -> Result<u64, IndexError> {
        let dimension = self.dimensions.of(similarity_type);
        for (_, vector) in &entries {
            self.check_dimension(similarity_type, vector)?;
        }

        let count = entries.len();
        let mut indexes = self.indexes.write().unwrap();
        let generation = indexes
            .get(&similarity_type)
            .map(|g| g.generation() + 1)
            .unwrap_or(1);
        indexes.insert(
            similarity_type,
            Arc::new(IndexGeneration::new(generation, dimension, entries)),
        );
        info!(
            "Built {} index generation {} with {} vectors",
            similarity_type, generation, count
        );
        Ok(generation)
    }

    /// Add or replace one vector. Visible to searches immediately.
    pub fn add(
        &self,
        similarity_type: SimilarityType,
        track_id: &str,
        vector: Vec<f32>,
    ) -> Result<(), IndexError> {
        self.check_dimension(similarity_type, &vector)?;
        let mut indexes = self.indexes.write().unwrap();
        let current = indexes
            .get(&similarity_type)
            .ok_or(IndexError::NotBuilt(similarity_type))?;
        let next = current.with_entry(track_id, vector);
        indexes.insert(similarity_type, Arc::new(next));
        Ok(())
    }

    /// Remove a vector. Removing an absent id, or from a type that was never
    /// built, is a no-op.
    pub fn remove(&self, similarity_type: SimilarityType, track_id: &str) {
        let mut indexes = self.indexes.write().unwrap();
        if let Some(current) = indexes.get(&similarity_type) {
            if let Some(next) = current.without_entry(track_id) {
                indexes.insert(similarity_type, Arc::new(next));
            }
        }
    }

    /// k-NN search on the current generation, at most `k` hits.
    pub fn search(
        &self,
        similarity_type: SimilarityType,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        self.check_dimension(similarity_type, query)?;
        let snapshot = self.snapshot(similarity_type)?;
        Ok(snapshot.search(query, k))
    }

    /// The indexed vector for a track, if present.
    pub fn vector_of(
        &self,
        similarity_type: SimilarityType,
        track_id: &str,
    ) -> Result<Option<Vec<f32>>, IndexError> {
        let snapshot = self.snapshot(similarity_type)?;
        Ok(snapshot.vector_of(track_id).map(|v| v.to_vec()))
    }
}

/// Fuse the two source vectors into a combined one: each side L2-normalized
/// so neither analyzer dominates, then concatenated (essentia first).
pub fn fuse_combined(essentia: &[f32], tensorflow: &[f32]) -> Vec<f32> {
    let mut fused = Vec::with_capacity(essentia.len() + tensorflow.len());
    fused.extend(l2_normalized(essentia));
    fused.extend(l2_normalized(tensorflow));
    fused
}

fn l2_normalized(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|x| x / norm).collect()
}
