use std::fmt;

/// Fully qualified table the importer writes to by default
pub const DEFAULT_TARGET_TABLE: &str = "citysearch.city";

/// Column holding the comma-separated alternate names
pub const ALT_NAME_COLUMN: &str = "alt_name";

/// How raw text from the source file is interpreted for a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Whole numbers, falling back to float then text
    Integer,
    /// Floating point numbers, falling back to text
    Float,
    /// Free text
    Text,
    /// Comma-separated list of names, stored as a text array
    NameList,
    /// Calendar date in `YYYY-MM-DD` form, kept as text until bound
    Date,
}

/// One column of the city table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn column(name: &'static str, kind: ColumnKind) -> ColumnSpec {
    ColumnSpec { name, kind }
}

/// CityRecord columns in insert order
pub static CITY_COLUMNS: [ColumnSpec; 19] = [
    column("id", ColumnKind::Integer),
    column("name", ColumnKind::Text),
    column("ascii", ColumnKind::Text),
    column("alt_name", ColumnKind::NameList),
    column("lat", ColumnKind::Float),
    column("long", ColumnKind::Float),
    column("feat_class", ColumnKind::Text),
    column("feat_code", ColumnKind::Text),
    column("country", ColumnKind::Text),
    column("cc2", ColumnKind::Text),
    column("admin1", ColumnKind::Text),
    column("admin2", ColumnKind::Text),
    column("admin3", ColumnKind::Text),
    column("admin4", ColumnKind::Text),
    column("population", ColumnKind::Integer),
    column("elevation", ColumnKind::Integer),
    column("dem", ColumnKind::Integer),
    column("tz", ColumnKind::Text),
    column("modified_at", ColumnKind::Date),
];

/// Look up a CityRecord column by name
pub fn city_column(name: &str) -> Option<&'static ColumnSpec> {
    CITY_COLUMNS.iter().find(|c| c.name == name)
}

/// A single value of the in-memory table
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Empty field in the source file
    Missing,
    Int(i64),
    Float(f64),
    Text(String),
    /// Tokenized name list, rendered as a PostgreSQL array literal
    List(Vec<String>),
}

impl Cell {
    /// Interpret a raw field according to the column kind.
    ///
    /// Empty fields are missing. Numeric kinds fall back to text when the
    /// value does not parse, so nothing in the file is dropped.
    pub fn from_field(raw: &str, kind: ColumnKind) -> Self {
        if raw.is_empty() {
            return Cell::Missing;
        }
        match kind {
            ColumnKind::Integer => raw
                .parse::<i64>()
                .map(Cell::Int)
                .ok()
                .or_else(|| parse_finite(raw).map(Cell::Float))
                .unwrap_or_else(|| Cell::Text(raw.to_string())),
            ColumnKind::Float => parse_finite(raw)
                .map(Cell::Float)
                .unwrap_or_else(|| Cell::Text(raw.to_string())),
            ColumnKind::Text | ColumnKind::NameList | ColumnKind::Date => {
                Cell::Text(raw.to_string())
            }
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }
}

fn parse_finite(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => Ok(()),
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
            Cell::List(tokens) => {
                f.write_str("{")?;
                for (i, token) in tokens.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "\"{}\"", token)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// The whole source file held in memory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Column names in header order
    pub columns: Vec<String>,
    /// Rows in file order, each with one cell per column
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)
    }

    pub fn column_cells(&self, index: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |row| &row[index])
    }
}
