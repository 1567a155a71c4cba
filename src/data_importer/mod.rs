// Data importer module for PostgreSQL import functionality
pub mod importer;
pub mod postgres;
pub mod reset;
pub mod sql_generator;

#[cfg(test)]
mod tests;

// Re-export main types and traits
pub use importer::{
    import_table, surface_notices, ImportConfig, ImportResult, InsertMode, SqlExecutor,
};
pub use postgres::{bind_cell, PostgresExecutor};
pub use reset::{reset_database, ResetResult, DEFAULT_RESET_SCRIPT};
pub use sql_generator::*;
