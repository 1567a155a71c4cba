use crate::error::{ImporterError, Result};
use crate::types::{Cell, Table, ALT_NAME_COLUMN};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What to put in cells that were empty in the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingValuePolicy {
    /// Replace with the number 0, regardless of column type
    Zero,
    /// Keep as missing, rendered as SQL NULL
    Null,
}

/// Configuration for the cell transforms
#[derive(Debug, Clone)]
pub struct TransformConfig {
    /// Double single quotes and backslash-escape double quotes in text cells,
    /// needed when values are spliced into SQL text
    pub escape_quotes: bool,
    /// Policy for empty cells
    pub missing_values: MissingValuePolicy,
    /// Column holding comma-separated alternate names
    pub name_list_column: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            escape_quotes: true,
            missing_values: MissingValuePolicy::Zero,
            name_list_column: ALT_NAME_COLUMN.to_string(),
        }
    }
}

/// Counters for what the transforms touched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformStatistics {
    pub single_quotes_escaped: u64,
    pub double_quotes_escaped: u64,
    pub name_lists_split: u64,
    pub missing_values_filled: u64,
}

/// Applies the fixed transform sequence to a loaded table
pub struct CityTransformer {
    config: TransformConfig,
}

impl CityTransformer {
    pub fn new() -> Self {
        Self {
            config: TransformConfig::default(),
        }
    }

    pub fn with_config(config: TransformConfig) -> Self {
        Self { config }
    }

    /// Transform the table in place.
    ///
    /// Steps run in order: single quotes, double quotes, the name list column,
    /// then missing values.
    pub fn transform(&self, table: &mut Table) -> Result<TransformStatistics> {
        let mut stats = TransformStatistics::default();

        if self.config.escape_quotes {
            for cell in table.rows.iter_mut().flatten() {
                if let Cell::Text(text) = cell {
                    if text.contains('\'') {
                        stats.single_quotes_escaped += 1;
                        *text = escape_single_quotes(text);
                    }
                }
            }
            for cell in table.rows.iter_mut().flatten() {
                if let Cell::Text(text) = cell {
                    if text.contains('"') {
                        stats.double_quotes_escaped += 1;
                        *text = escape_double_quotes(text);
                    }
                }
            }
        }

        let list_index = table
            .column_index(&self.config.name_list_column)
            .ok_or_else(|| {
                ImporterError::schema(format!(
                    "table has no '{}' column",
                    self.config.name_list_column
                ))
            })?;
        for row in &mut table.rows {
            let cell = &mut row[list_index];
            *cell = Cell::List(split_names(cell));
            stats.name_lists_split += 1;
        }

        if self.config.missing_values == MissingValuePolicy::Zero {
            for cell in table.rows.iter_mut().flatten() {
                if cell.is_missing() {
                    *cell = Cell::Int(0);
                    stats.missing_values_filled += 1;
                }
            }
        }

        debug!("Transform statistics: {:?}", stats);
        Ok(stats)
    }
}

impl Default for CityTransformer {
    fn default() -> Self {
        Self::new()
    }
}

pub fn escape_single_quotes(text: &str) -> String {
    text.replace('\'', "''")
}

pub fn escape_double_quotes(text: &str) -> String {
    text.replace('"', "\\\"")
}

/// Comma-split and trim a name list; anything that is not text is an empty list
pub fn split_names(cell: &Cell) -> Vec<String> {
    match cell {
        Cell::Text(text) => text.split(',').map(|tok| tok.trim().to_string()).collect(),
        Cell::List(tokens) => tokens.clone(),
        _ => Vec::new(),
    }
}
