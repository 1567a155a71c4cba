use crate::error::{ImporterError, Result};
use crate::types::{Cell, Table, CITY_COLUMNS};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// Builds per-row INSERT statements for the city table.
///
/// Values always follow the fixed city column order; each column is looked up
/// by name in the loaded table, so the file's header order does not matter.
#[derive(Debug, Clone)]
pub struct InsertStatementBuilder {
    target_table: String,
    /// Table column index for each city column, in insert order
    positions: Vec<usize>,
}

impl InsertStatementBuilder {
    pub fn for_table(target_table: impl Into<String>, table: &Table) -> Result<Self> {
        let positions = CITY_COLUMNS
            .iter()
            .map(|spec| {
                table.column_index(spec.name).ok_or_else(|| {
                    ImporterError::schema(format!("table has no '{}' column", spec.name))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            target_table: target_table.into(),
            positions,
        })
    }

    pub fn target_table(&self) -> &str {
        &self.target_table
    }

    pub fn column_list(&self) -> String {
        CITY_COLUMNS
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Cells of a row in insert order
    pub fn ordered_cells<'a>(&self, row: &'a [Cell]) -> Vec<&'a Cell> {
        self.positions.iter().map(|&i| &row[i]).collect()
    }

    /// INSERT with every value spliced in as SQL literal text.
    ///
    /// Text is wrapped in single quotes as-is; callers escape it beforehand.
    pub fn literal_statement(&self, row: &[Cell]) -> String {
        let values = self
            .ordered_cells(row)
            .into_iter()
            .map(render_literal)
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "insert into {} ({}) values ({});",
            self.target_table,
            self.column_list(),
            values
        )
    }

    /// INSERT with one positional parameter per column
    pub fn prepared_statement(&self) -> String {
        let placeholders = (1..=CITY_COLUMNS.len())
            .map(|i| format!("${}", i))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "insert into {} ({}) values ({})",
            self.target_table,
            self.column_list(),
            placeholders
        )
    }
}

/// Render a cell as SQL literal text
pub fn render_literal(cell: &Cell) -> String {
    match cell {
        Cell::Missing => "NULL".to_string(),
        Cell::Int(v) => v.to_string(),
        Cell::Float(v) => v.to_string(),
        Cell::Text(_) | Cell::List(_) => format!("'{}'", cell),
    }
}

/// Check that `sql` parses as PostgreSQL
pub fn validate_statement(sql: &str) -> Result<()> {
    Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .map(|_| ())
        .map_err(|e| ImporterError::parse(format!("invalid SQL: {}", e)))
}

/// Number of statements in a SQL script
pub fn count_statements(script: &str) -> Result<usize> {
    Parser::parse_sql(&PostgreSqlDialect {}, script)
        .map(|statements| statements.len())
        .map_err(|e| ImporterError::parse(format!("invalid SQL: {}", e)))
}
