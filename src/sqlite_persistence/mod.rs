mod versioned_schema;

pub use versioned_schema::{
    migrate_if_needed, Column, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

pub const BASE_DB_VERSION: usize = 70000;
