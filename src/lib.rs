pub mod config;
pub mod error;
pub mod types;
pub mod tsv_loader;
pub mod transform;
pub mod snapshot;
pub mod data_importer;
pub mod pipeline;
