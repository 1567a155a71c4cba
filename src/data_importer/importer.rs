// Row-by-row import of the transformed table
use crate::data_importer::sql_generator::{validate_statement, InsertStatementBuilder};
use crate::error::{ImporterError, Result};
use crate::types::{Cell, Table, DEFAULT_TARGET_TABLE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Something that can run SQL and collect server notices.
///
/// Implemented for a live PostgreSQL connection; tests substitute a recorder.
#[allow(async_fn_in_trait)]
pub trait SqlExecutor {
    /// Run a script that may contain several statements
    async fn batch_execute(&mut self, script: &str) -> Result<()>;

    /// Run one statement given as SQL text
    async fn execute(&mut self, statement: &str) -> Result<u64>;

    /// Run one parameterized statement, binding `params` in order
    async fn execute_prepared(&mut self, statement: &str, params: &[&Cell]) -> Result<u64>;

    /// Notices received since the last call, oldest first
    fn take_notices(&mut self) -> Vec<String>;
}

/// How row values reach the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertMode {
    /// One SQL text statement per row with values spliced in as literals
    Literal,
    /// One prepared statement reused for every row
    Prepared,
}

/// Configuration for the database import
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub target_table: String,
    pub mode: InsertMode,
    /// Parse every literal statement before sending it
    pub validate_statements: bool,
    /// Log progress every this many rows
    pub progress_interval: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            target_table: DEFAULT_TARGET_TABLE.to_string(),
            mode: InsertMode::Literal,
            validate_statements: false,
            progress_interval: 10_000,
        }
    }
}

/// Outcome of a database import
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportResult {
    pub rows_inserted: u64,
    pub notices: Vec<String>,
}

/// Insert every row of `table`, in file order, one statement per row.
///
/// The first failing row aborts the import.
#[instrument(skip_all, fields(table = %config.target_table, mode = ?config.mode))]
pub async fn import_table<E: SqlExecutor>(
    executor: &mut E,
    table: &Table,
    config: &ImportConfig,
) -> Result<ImportResult> {
    let builder = InsertStatementBuilder::for_table(config.target_table.as_str(), table)?;
    let prepared = builder.prepared_statement();
    let mut result = ImportResult::default();

    info!("Dumping {} rows to database", table.rows.len());
    for (index, row) in table.rows.iter().enumerate() {
        match config.mode {
            InsertMode::Literal => {
                let statement = builder.literal_statement(row);
                if config.validate_statements {
                    validate_statement(&statement).map_err(|e| {
                        ImporterError::parse(format!("row {}: {}", index + 1, e))
                    })?;
                }
                executor.execute(&statement).await?;
            }
            InsertMode::Prepared => {
                executor
                    .execute_prepared(&prepared, &builder.ordered_cells(row))
                    .await?;
            }
        }
        result.rows_inserted += 1;

        if config.progress_interval > 0 && result.rows_inserted % config.progress_interval as u64 == 0 {
            debug!("Inserted {} of {} rows", result.rows_inserted, table.rows.len());
        }
    }

    result.notices = surface_notices(executor);
    info!("Inserted {} rows into {}", result.rows_inserted, config.target_table);
    Ok(result)
}

/// Drain pending server notices and log them for the operator
pub fn surface_notices<E: SqlExecutor>(executor: &mut E) -> Vec<String> {
    let notices = executor.take_notices();
    for notice in &notices {
        info!("Server notice: {}", notice);
    }
    notices
}
