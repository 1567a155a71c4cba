//! Table to Parquet conversion
//!
//! Column types are derived from the cells each column actually holds, the
//! same way the table was typed at load time.

use crate::error::{ImporterError, Result};
use crate::types::{Cell, Table};
use arrow::array::{ArrayRef, Float64Builder, Int64Builder, ListBuilder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Default snapshot file, overwritten on every run
pub const DEFAULT_SNAPSHOT_PATH: &str = "citysearch.city.parquet";

/// Metadata key naming the table stored in the file
pub const TABLE_NAME_KEY: &str = "table";

/// Configuration for the snapshot export
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub path: PathBuf,
    /// Name recorded under [`TABLE_NAME_KEY`]
    pub table_name: String,
    /// ZSTD compression level (1-22)
    pub compression_level: i32,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            table_name: "root".to_string(),
            compression_level: 3,
        }
    }
}

/// Statistics from a snapshot export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub path: PathBuf,
    pub rows_written: u64,
    pub bytes_written: u64,
}

/// Arrow type of a column, from the cells it contains.
///
/// Integers only: Int64. Any float among numbers: Float64. Lists only:
/// List<Utf8>. Anything else, including an all-missing column: Utf8.
pub fn column_type<'a>(cells: impl Iterator<Item = &'a Cell>) -> DataType {
    let mut ints = false;
    let mut floats = false;
    let mut lists = false;
    let mut other = false;

    for cell in cells {
        match cell {
            Cell::Missing => {}
            Cell::Int(_) => ints = true,
            Cell::Float(_) => floats = true,
            Cell::List(_) => lists = true,
            Cell::Text(_) => other = true,
        }
    }

    match (ints, floats, lists, other) {
        (true, false, false, false) => DataType::Int64,
        (_, true, false, false) => DataType::Float64,
        (false, false, true, false) => list_type(),
        _ => DataType::Utf8,
    }
}

fn list_type() -> DataType {
    DataType::List(Arc::new(Field::new("item", DataType::Utf8, true)))
}

/// Build the Arrow schema for a table, tagged with the table name
pub fn snapshot_schema(table: &Table, table_name: &str) -> Schema {
    let fields: Vec<Field> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| Field::new(name, column_type(table.column_cells(i)), true))
        .collect();
    let metadata = HashMap::from([(TABLE_NAME_KEY.to_string(), table_name.to_string())]);
    Schema::new_with_metadata(fields, metadata)
}

/// Write the whole table to a single Parquet file, replacing any existing file
pub fn write_snapshot(table: &Table, config: &SnapshotConfig) -> Result<SnapshotStats> {
    let schema = Arc::new(snapshot_schema(table, &config.table_name));
    let columns = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, field)| build_column(table, i, field.data_type()))
        .collect::<Result<Vec<ArrayRef>>>()?;
    let batch = RecordBatch::try_new(schema.clone(), columns)?;

    let file = File::create(&config.path)?;
    let props = writer_properties(config)?;
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    let bytes_written = std::fs::metadata(&config.path)?.len();
    info!(
        "Wrote snapshot {} ({} rows, {} bytes)",
        config.path.display(),
        table.rows.len(),
        bytes_written
    );

    Ok(SnapshotStats {
        path: config.path.clone(),
        rows_written: table.rows.len() as u64,
        bytes_written,
    })
}

fn writer_properties(config: &SnapshotConfig) -> Result<WriterProperties> {
    let zstd_level = ZstdLevel::try_new(config.compression_level)?;

    Ok(WriterProperties::builder()
        .set_compression(Compression::ZSTD(zstd_level))
        .set_key_value_metadata(Some(vec![KeyValue::new(
            TABLE_NAME_KEY.to_string(),
            config.table_name.clone(),
        )]))
        .build())
}

fn build_column(table: &Table, index: usize, data_type: &DataType) -> Result<ArrayRef> {
    let cells = table.column_cells(index);
    let array: ArrayRef = match data_type {
        DataType::Int64 => {
            let mut builder = Int64Builder::with_capacity(table.rows.len());
            for cell in cells {
                match cell {
                    Cell::Int(v) => builder.append_value(*v),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Float64 => {
            let mut builder = Float64Builder::with_capacity(table.rows.len());
            for cell in cells {
                match cell {
                    Cell::Int(v) => builder.append_value(*v as f64),
                    Cell::Float(v) => builder.append_value(*v),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::List(_) => {
            let mut builder = ListBuilder::new(StringBuilder::new());
            for cell in cells {
                match cell {
                    Cell::List(tokens) => {
                        for token in tokens {
                            builder.values().append_value(token);
                        }
                        builder.append(true);
                    }
                    _ => builder.append(false),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Utf8 => {
            let mut builder = StringBuilder::new();
            for cell in cells {
                match cell {
                    Cell::Missing => builder.append_null(),
                    other => builder.append_value(other.to_string()),
                }
            }
            Arc::new(builder.finish())
        }
        other => {
            return Err(ImporterError::schema(format!(
                "unsupported snapshot column type {:?}",
                other
            )))
        }
    };
    Ok(array)
}
