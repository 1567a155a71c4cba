// One importer run: optional reset, then load, transform, snapshot and insert
use crate::data_importer::{
    import_table, reset_database, ImportConfig, ImportResult, ResetResult, SqlExecutor,
    DEFAULT_RESET_SCRIPT,
};
use crate::error::Result;
use crate::snapshot::{write_snapshot, SnapshotConfig, SnapshotStats};
use crate::transform::{CityTransformer, TransformConfig, TransformStatistics};
use crate::tsv_loader::{load_tsv, TsvDialect};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Everything one run needs besides the database connection
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub reset_db: bool,
    pub reset_script: PathBuf,
    pub source_tsv: Option<PathBuf>,
    pub dialect: TsvDialect,
    pub transform: TransformConfig,
    /// Write a columnar snapshot when set
    pub snapshot: Option<SnapshotConfig>,
    pub import: ImportConfig,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            reset_db: false,
            reset_script: PathBuf::from(DEFAULT_RESET_SCRIPT),
            source_tsv: None,
            dialect: TsvDialect::default(),
            transform: TransformConfig::default(),
            snapshot: None,
            import: ImportConfig::default(),
        }
    }
}

/// What a run did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub reset: Option<ResetResult>,
    pub source_tsv: Option<PathBuf>,
    pub columns: Vec<String>,
    pub rows_loaded: u64,
    pub transform: Option<TransformStatistics>,
    pub snapshot: Option<SnapshotStats>,
    pub import: Option<ImportResult>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            reset: None,
            source_tsv: None,
            columns: Vec::new(),
            rows_loaded: 0,
            transform: None,
            snapshot: None,
            import: None,
        }
    }

    pub fn rows_inserted(&self) -> u64 {
        self.import.as_ref().map_or(0, |i| i.rows_inserted)
    }

    pub fn summary(&self) -> String {
        format!(
            "reset={}, rows_loaded={}, rows_inserted={}, snapshot={}",
            self.reset.is_some(),
            self.rows_loaded,
            self.rows_inserted(),
            self.snapshot
                .as_ref()
                .map(|s| s.path.display().to_string())
                .unwrap_or_else(|| "none".to_string())
        )
    }

    pub async fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

/// Execute one run.
///
/// Without an executor nothing touches a database: a requested reset is
/// skipped, and the file is still loaded, transformed and snapshotted.
pub async fn run<E: SqlExecutor>(
    options: &RunOptions,
    mut executor: Option<&mut E>,
) -> Result<RunReport> {
    let mut report = RunReport::new();

    if options.reset_db {
        match executor.as_deref_mut() {
            Some(executor) => {
                report.reset = Some(reset_database(executor, &options.reset_script).await?);
            }
            None => warn!("No database connection; skipping reset"),
        }
    }

    if let Some(source) = &options.source_tsv {
        let mut table = load_tsv(source, options.dialect).await?;
        report.source_tsv = Some(source.clone());
        report.columns = table.columns.clone();
        report.rows_loaded = table.rows.len() as u64;

        let transformer = CityTransformer::with_config(options.transform.clone());
        report.transform = Some(transformer.transform(&mut table)?);

        if let Some(snapshot) = &options.snapshot {
            report.snapshot = Some(write_snapshot(&table, snapshot)?);
        }

        match executor.as_deref_mut() {
            Some(executor) => {
                report.import = Some(import_table(executor, &table, &options.import).await?);
            }
            None => info!("No database connection; skipping insertion"),
        }
    }

    report.finished_at = Some(Utc::now());
    Ok(report)
}
