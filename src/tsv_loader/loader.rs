// Loads the city TSV file into an in-memory table
use crate::error::{ImporterError, Result};
use crate::tsv_loader::reader::{TsvDialect, TsvReader};
use crate::types::{city_column, Cell, ColumnKind, Table, CITY_COLUMNS};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Read and parse a TSV file with a header row matching the city schema
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn load_tsv(path: &Path, dialect: TsvDialect) -> Result<Table> {
    let bytes = tokio::fs::read(path).await?;
    let text = String::from_utf8(bytes).map_err(|e| {
        ImporterError::parse(format!("{} is not valid UTF-8: {}", path.display(), e))
    })?;

    let table = parse_table(&text, dialect)?;
    info!(
        "Imported {} with columns {:?} and shape {:?}",
        path.display(),
        table.columns,
        table.shape()
    );
    Ok(table)
}

/// Parse TSV text into a table.
///
/// Column order comes from the header, which must name every city column
/// exactly once.
pub fn parse_table(text: &str, dialect: TsvDialect) -> Result<Table> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = TsvReader::new(dialect).read_records(text)?.into_iter();

    let header = records
        .next()
        .ok_or_else(|| ImporterError::parse("input has no header row"))?;
    let kinds = validate_header(&header.fields)?;

    let mut table = Table::new(header.fields);
    for record in records {
        if record.fields.len() > kinds.len() {
            return Err(ImporterError::parse(format!(
                "line {} has {} fields but the header has {}",
                record.line,
                record.fields.len(),
                kinds.len()
            )));
        }

        let mut row: Vec<Cell> = record
            .fields
            .iter()
            .zip(&kinds)
            .map(|(raw, kind)| Cell::from_field(raw, *kind))
            .collect();
        row.resize(kinds.len(), Cell::Missing);
        table.rows.push(row);
    }

    debug!("Parsed {} rows", table.rows.len());
    Ok(table)
}

fn validate_header(columns: &[String]) -> Result<Vec<ColumnKind>> {
    let mut seen = HashSet::new();
    let mut kinds = Vec::with_capacity(columns.len());
    let mut unexpected = Vec::new();

    for name in columns {
        if !seen.insert(name.as_str()) {
            return Err(ImporterError::schema(format!("duplicate column '{}' in header", name)));
        }
        match city_column(name) {
            Some(spec) => kinds.push(spec.kind),
            None => unexpected.push(name.as_str()),
        }
    }

    let missing: Vec<&str> = CITY_COLUMNS
        .iter()
        .map(|c| c.name)
        .filter(|name| !seen.contains(name))
        .collect();

    if !missing.is_empty() || !unexpected.is_empty() {
        return Err(ImporterError::schema(format!(
            "header does not match the city schema (missing: {:?}, unexpected: {:?})",
            missing, unexpected
        )));
    }

    Ok(kinds)
}
