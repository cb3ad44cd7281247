//! Feature ingestion: the single trusted entry point for results from the
//! external analysis stage.

mod ingestor;
mod models;

pub use ingestor::FeatureIngestor;
pub use models::{FeatureDelivery, IngestError, IngestOutcome, ScalarFeatures};
