// Database reset from an external SQL script
use crate::data_importer::importer::{surface_notices, SqlExecutor};
use crate::data_importer::sql_generator::count_statements;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument, warn};

/// Default location of the reset script, relative to the working directory
pub const DEFAULT_RESET_SCRIPT: &str = "reset_database.sql";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResetResult {
    /// Statement count from the pre-flight parse, if the script parsed
    pub statements: Option<usize>,
    pub notices: Vec<String>,
}

/// Drop and recreate the schema by running the script at `script_path`.
///
/// Destructive. Execution errors are returned as-is.
#[instrument(skip_all, fields(script = %script_path.display()))]
pub async fn reset_database<E: SqlExecutor>(executor: &mut E, script_path: &Path) -> Result<ResetResult> {
    info!("Resetting database");
    let script = tokio::fs::read_to_string(script_path).await?;

    // sqlparser does not cover every PL/pgSQL construct, so this only informs
    let statements = match count_statements(&script) {
        Ok(count) => {
            info!("Reset script has {} statements", count);
            Some(count)
        }
        Err(e) => {
            warn!("Could not pre-parse reset script: {}", e);
            None
        }
    };

    executor.batch_execute(&script).await?;
    let notices = surface_notices(executor);
    info!("Successfully reset");

    Ok(ResetResult { statements, notices })
}
