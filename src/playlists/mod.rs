//! Template-driven playlist generation with per-track provenance.

mod generator;
mod models;
mod schema;
mod store;
mod templates;
mod trait_def;

pub use generator::PlaylistGenerator;
pub use models::{
    GenerateError, GeneratedPlaylist, Playlist, PlaylistEntry, PlaylistStats, PlaylistTemplate,
};
pub use schema::PLAYLISTS_VERSIONED_SCHEMAS;
pub use store::SqlitePlaylistStore;
pub use templates::{OrderBy, TemplateParams, TemplateRule};
pub use trait_def::PlaylistStore;
