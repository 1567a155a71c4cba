//! Columnar snapshot export
//!
//! Writes the transformed table to a single Parquet file for fast reload
//! outside the database.

pub mod writer;

pub use writer::{
    column_type, snapshot_schema, write_snapshot, SnapshotConfig, SnapshotStats,
    DEFAULT_SNAPSHOT_PATH, TABLE_NAME_KEY,
};
