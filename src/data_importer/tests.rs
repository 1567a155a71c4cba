use super::*;
use crate::error::{ImporterError, Result};
use crate::types::{Cell, Table, CITY_COLUMNS};
use std::collections::VecDeque;
use tokio_postgres::types::Type;

/// Records every call instead of talking to a database
#[derive(Default)]
struct RecordingExecutor {
    scripts: Vec<String>,
    statements: Vec<String>,
    prepared: Vec<(String, Vec<Cell>)>,
    pending_notices: VecDeque<String>,
    fail_on_call: Option<usize>,
}

impl RecordingExecutor {
    fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.statements.len() + self.prepared.len()
    }

    fn check_failure(&self) -> Result<()> {
        match self.fail_on_call {
            Some(n) if self.calls() == n => Err(ImporterError::schema(
                "duplicate key value violates unique constraint \"city_pkey\"",
            )),
            _ => Ok(()),
        }
    }
}

impl SqlExecutor for RecordingExecutor {
    async fn batch_execute(&mut self, script: &str) -> Result<()> {
        self.scripts.push(script.to_string());
        self.pending_notices
            .push_back("NOTICE: schema \"citysearch\" does not exist, skipping".to_string());
        Ok(())
    }

    async fn execute(&mut self, statement: &str) -> Result<u64> {
        self.statements.push(statement.to_string());
        self.check_failure()?;
        Ok(1)
    }

    async fn execute_prepared(&mut self, statement: &str, params: &[&Cell]) -> Result<u64> {
        self.prepared
            .push((statement.to_string(), params.iter().map(|c| (*c).clone()).collect()));
        self.check_failure()?;
        Ok(1)
    }

    fn take_notices(&mut self) -> Vec<String> {
        self.pending_notices.drain(..).collect()
    }
}

fn city_row(values: &[(&str, Cell)]) -> Vec<Cell> {
    CITY_COLUMNS
        .iter()
        .map(|c| {
            values
                .iter()
                .find(|(name, _)| *name == c.name)
                .map(|(_, cell)| cell.clone())
                .unwrap_or(Cell::Int(0))
        })
        .collect()
}

fn city_table(rows: Vec<Vec<Cell>>) -> Table {
    Table {
        columns: CITY_COLUMNS.iter().map(|c| c.name.to_string()).collect(),
        rows,
    }
}

fn text(value: &str) -> Cell {
    Cell::Text(value.to_string())
}

#[cfg(test)]
mod sql_generator_tests {
    use super::*;

    #[test]
    fn test_render_literal() {
        assert_eq!(render_literal(&Cell::Int(42)), "42");
        assert_eq!(render_literal(&Cell::Float(-72.5898)), "-72.5898");
        assert_eq!(render_literal(&text("US")), "'US'");
        assert_eq!(render_literal(&Cell::List(vec![])), "'{}'");
        assert_eq!(render_literal(&Cell::List(vec!["a".into()])), "'{\"a\"}'");
        assert_eq!(render_literal(&Cell::Missing), "NULL");
    }

    #[test]
    fn test_literal_statement_layout() {
        let table = city_table(vec![city_row(&[
            ("id", Cell::Int(1)),
            ("name", text("Springfield")),
            ("alt_name", Cell::List(vec!["Springfield Township".into()])),
        ])]);
        let builder = InsertStatementBuilder::for_table("citysearch.city", &table).unwrap();
        let statement = builder.literal_statement(&table.rows[0]);

        assert!(statement.starts_with(
            "insert into citysearch.city (id, name, ascii, alt_name, lat, long, feat_class, \
             feat_code, country, cc2, admin1, admin2, admin3, admin4, population, elevation, \
             dem, tz, modified_at) values (1,'Springfield',0,'{\"Springfield Township\"}',"
        ));
        assert!(statement.ends_with(");"));
        validate_statement(&statement).unwrap();
    }

    #[test]
    fn test_values_follow_city_order_not_header_order() {
        let mut columns: Vec<String> = CITY_COLUMNS.iter().map(|c| c.name.to_string()).collect();
        columns.swap(0, 1);
        let mut row = vec![Cell::Int(0); CITY_COLUMNS.len()];
        row[0] = text("Swapped");
        row[1] = Cell::Int(99);
        let table = Table { columns, rows: vec![row] };

        let builder = InsertStatementBuilder::for_table("citysearch.city", &table).unwrap();
        assert!(builder.literal_statement(&table.rows[0]).contains("values (99,'Swapped',"));
        assert_eq!(builder.ordered_cells(&table.rows[0])[0], &Cell::Int(99));
    }

    #[test]
    fn test_escaped_apostrophe_parses() {
        let table = city_table(vec![city_row(&[("name", text("O''Fallon"))])]);
        let builder = InsertStatementBuilder::for_table("citysearch.city", &table).unwrap();
        let statement = builder.literal_statement(&table.rows[0]);

        assert!(statement.contains("'O''Fallon'"));
        validate_statement(&statement).unwrap();
    }

    #[test]
    fn test_unescaped_apostrophe_is_invalid_sql() {
        let table = city_table(vec![city_row(&[("name", text("O'Fallon"))])]);
        let builder = InsertStatementBuilder::for_table("citysearch.city", &table).unwrap();
        let err = validate_statement(&builder.literal_statement(&table.rows[0])).unwrap_err();
        assert!(matches!(err, ImporterError::Parse { .. }));
    }

    #[test]
    fn test_prepared_statement_placeholders() {
        let table = city_table(vec![]);
        let builder = InsertStatementBuilder::for_table("citysearch.city", &table).unwrap();
        let statement = builder.prepared_statement();

        assert!(statement.contains("values ($1, $2, $3,"));
        assert!(statement.ends_with("$19)"));
        validate_statement(&statement).unwrap();
    }

    #[test]
    fn test_builder_requires_every_city_column() {
        let table = Table::new(vec!["id".to_string(), "name".to_string()]);
        let err = InsertStatementBuilder::for_table("citysearch.city", &table).unwrap_err();
        assert!(matches!(err, ImporterError::Schema { .. }));
    }

    #[test]
    fn test_count_statements() {
        let script = "DROP SCHEMA IF EXISTS citysearch CASCADE;\nCREATE SCHEMA citysearch;";
        assert_eq!(count_statements(script).unwrap(), 2);
        assert!(count_statements("CREATE NONSENSE (").is_err());
    }
}

#[cfg(test)]
mod importer_tests {
    use super::*;

    #[tokio::test]
    async fn test_literal_import_runs_one_statement_per_row_in_order() {
        let table = city_table(vec![
            city_row(&[("id", Cell::Int(1)), ("name", text("Alpha"))]),
            city_row(&[("id", Cell::Int(2)), ("name", text("Beta"))]),
        ]);
        let mut executor = RecordingExecutor::default();

        let result = import_table(&mut executor, &table, &ImportConfig::default())
            .await
            .unwrap();

        assert_eq!(result.rows_inserted, 2);
        assert_eq!(executor.statements.len(), 2);
        assert!(executor.statements[0].contains("values (1,'Alpha',"));
        assert!(executor.statements[1].contains("values (2,'Beta',"));
        assert!(executor.prepared.is_empty());
    }

    #[tokio::test]
    async fn test_prepared_import_binds_cells_in_city_order() {
        let table = city_table(vec![city_row(&[
            ("id", Cell::Int(7)),
            ("name", text("O'Neill")),
            ("alt_name", Cell::List(vec!["A".into(), "B".into()])),
        ])]);
        let config = ImportConfig {
            mode: InsertMode::Prepared,
            ..ImportConfig::default()
        };
        let mut executor = RecordingExecutor::default();

        import_table(&mut executor, &table, &config).await.unwrap();

        assert!(executor.statements.is_empty());
        let (statement, params) = &executor.prepared[0];
        assert!(statement.contains("$19"));
        assert_eq!(params.len(), CITY_COLUMNS.len());
        assert_eq!(params[0], Cell::Int(7));
        assert_eq!(params[1], text("O'Neill"));
        assert_eq!(params[3], Cell::List(vec!["A".into(), "B".into()]));
    }

    #[tokio::test]
    async fn test_failing_row_aborts_the_rest() {
        let table = city_table(vec![
            city_row(&[("id", Cell::Int(1))]),
            city_row(&[("id", Cell::Int(1))]),
            city_row(&[("id", Cell::Int(3))]),
        ]);
        let mut executor = RecordingExecutor::failing_on(2);

        let err = import_table(&mut executor, &table, &ImportConfig::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("city_pkey"));
        assert_eq!(executor.statements.len(), 2);
    }

    #[tokio::test]
    async fn test_validation_stops_before_sending_bad_sql() {
        let table = city_table(vec![
            city_row(&[("name", text("Fine"))]),
            city_row(&[("name", text("O'Fallon"))]),
        ]);
        let config = ImportConfig {
            validate_statements: true,
            ..ImportConfig::default()
        };
        let mut executor = RecordingExecutor::default();

        let err = import_table(&mut executor, &table, &config).await.unwrap_err();

        match err {
            ImporterError::Parse { message } => assert!(message.starts_with("row 2:")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(executor.statements.len(), 1);
    }

    #[tokio::test]
    async fn test_import_surfaces_notices() {
        let table = city_table(vec![city_row(&[("id", Cell::Int(1))])]);
        let mut executor = RecordingExecutor::default();
        executor.pending_notices.push_back("WARNING: slow insert".to_string());

        let result = import_table(&mut executor, &table, &ImportConfig::default())
            .await
            .unwrap();

        assert_eq!(result.notices, vec!["WARNING: slow insert".to_string()]);
        assert!(executor.take_notices().is_empty());
    }
}

#[cfg(test)]
mod reset_tests {
    use super::*;

    #[tokio::test]
    async fn test_reset_runs_script_and_surfaces_notices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reset_database.sql");
        let script = "DROP SCHEMA IF EXISTS citysearch CASCADE;\nCREATE SCHEMA citysearch;\n";
        tokio::fs::write(&path, script).await.unwrap();
        let mut executor = RecordingExecutor::default();

        let result = reset_database(&mut executor, &path).await.unwrap();

        assert_eq!(executor.scripts, vec![script.to_string()]);
        assert_eq!(result.statements, Some(2));
        assert_eq!(result.notices.len(), 1);
        assert!(result.notices[0].contains("schema \"citysearch\" does not exist"));
    }

    #[tokio::test]
    async fn test_reset_runs_scripts_the_parser_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reset_database.sql");
        tokio::fs::write(&path, "CREATE FUNCTION f() RETURNS int AS $$ SELECT 1 $$ LANGUAGE sql; ???")
            .await
            .unwrap();
        let mut executor = RecordingExecutor::default();

        let result = reset_database(&mut executor, &path).await.unwrap();

        assert_eq!(result.statements, None);
        assert_eq!(executor.scripts.len(), 1);
    }

    #[tokio::test]
    async fn test_reset_missing_script() {
        let mut executor = RecordingExecutor::default();
        let err = reset_database(&mut executor, std::path::Path::new("/nonexistent/reset.sql"))
            .await
            .unwrap_err();

        assert!(matches!(err, ImporterError::Io(_)));
        assert!(executor.scripts.is_empty());
    }
}

#[cfg(test)]
mod bind_tests {
    use super::*;

    #[test]
    fn test_bind_integers() {
        assert!(bind_cell(&Cell::Int(5), &Type::INT4).is_ok());
        assert!(bind_cell(&Cell::Float(5.0), &Type::INT8).is_ok());
        assert!(bind_cell(&text("12"), &Type::INT2).is_ok());
        assert!(bind_cell(&Cell::Missing, &Type::INT4).is_ok());
        assert!(bind_cell(&Cell::Int(i64::MAX), &Type::INT4).is_err());
        assert!(bind_cell(&text("twelve"), &Type::INT8).is_err());
        assert!(bind_cell(&Cell::Float(1.5), &Type::INT4).is_err());
    }

    #[test]
    fn test_bind_text_and_arrays() {
        assert!(bind_cell(&text("US"), &Type::BPCHAR).is_ok());
        assert!(bind_cell(&Cell::Int(1), &Type::TEXT).is_ok());
        assert!(bind_cell(&Cell::List(vec!["a".into()]), &Type::TEXT_ARRAY).is_ok());
        assert!(bind_cell(&Cell::Float(4.5), &Type::FLOAT8).is_ok());
    }

    #[test]
    fn test_bind_dates() {
        assert!(bind_cell(&text("2019-02-10"), &Type::DATE).is_ok());
        assert!(bind_cell(&text("2019-02-10"), &Type::TIMESTAMP).is_ok());
        assert!(bind_cell(&text("yesterday"), &Type::DATE).is_err());
        assert!(bind_cell(&Cell::Int(0), &Type::DATE).is_err());
    }

    #[test]
    fn test_bind_unsupported_type() {
        let err = bind_cell(&Cell::Int(1), &Type::BOOL).err().unwrap();
        assert!(matches!(err, ImporterError::Schema { .. }));
    }
}
