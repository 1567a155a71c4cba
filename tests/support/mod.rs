// Shared fixtures for the integration tests
use citysearch_importer::data_importer::SqlExecutor;
use citysearch_importer::error::Result;
use citysearch_importer::types::{Cell, CITY_COLUMNS};
use std::path::{Path, PathBuf};

/// Executor that records everything it is asked to run
#[derive(Default)]
pub struct RecordingExecutor {
    pub scripts: Vec<String>,
    pub statements: Vec<String>,
    pub prepared: Vec<(String, Vec<Cell>)>,
    pub notices: Vec<String>,
}

impl SqlExecutor for RecordingExecutor {
    async fn batch_execute(&mut self, script: &str) -> Result<()> {
        self.scripts.push(script.to_string());
        self.notices
            .push("NOTICE: schema \"citysearch\" does not exist, skipping".to_string());
        Ok(())
    }

    async fn execute(&mut self, statement: &str) -> Result<u64> {
        self.statements.push(statement.to_string());
        Ok(1)
    }

    async fn execute_prepared(&mut self, statement: &str, params: &[&Cell]) -> Result<u64> {
        self.prepared
            .push((statement.to_string(), params.iter().map(|c| (*c).clone()).collect()));
        Ok(1)
    }

    fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }
}

/// Render one TSV line with the given columns set and every other column empty
pub fn tsv_line(values: &[(&str, &str)]) -> String {
    CITY_COLUMNS
        .iter()
        .map(|c| {
            values
                .iter()
                .find(|(name, _)| *name == c.name)
                .map(|(_, v)| *v)
                .unwrap_or("")
        })
        .collect::<Vec<_>>()
        .join("\t")
}

pub fn tsv_header() -> String {
    CITY_COLUMNS.iter().map(|c| c.name).collect::<Vec<_>>().join("\t")
}

/// Two cities: a plain one and one with an apostrophe in its name
pub fn two_city_rows() -> Vec<String> {
    vec![
        tsv_line(&[
            ("id", "4951788"),
            ("name", "Springfield"),
            ("ascii", "Springfield"),
            ("alt_name", "Springfield, Springfield Township"),
            ("lat", "42.10148"),
            ("long", "-72.58981"),
            ("feat_class", "P"),
            ("feat_code", "PPLA2"),
            ("country", "US"),
            ("admin1", "MA"),
            ("admin2", "013"),
            ("population", "153606"),
            ("elevation", "21"),
            ("dem", "24"),
            ("tz", "America/New_York"),
            ("modified_at", "2017-05-23"),
        ]),
        tsv_line(&[
            ("id", "4402245"),
            ("name", "O'Fallon"),
            ("ascii", "O'Fallon"),
            ("lat", "38.81061"),
            ("long", "-90.69985"),
            ("feat_class", "P"),
            ("feat_code", "PPL"),
            ("country", "US"),
            ("admin1", "MO"),
            ("admin2", "183"),
            ("population", "86274"),
            ("dem", "168"),
            ("tz", "America/Chicago"),
            ("modified_at", "2017-05-23"),
        ]),
    ]
}

pub fn write_tsv(dir: &Path, rows: &[String]) -> PathBuf {
    let path = dir.join("cities.tsv");
    let mut text = tsv_header();
    text.push('\n');
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    std::fs::write(&path, text).expect("write fixture");
    path
}
