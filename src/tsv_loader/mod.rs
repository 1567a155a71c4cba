// Section-sign quoted TSV loading
pub mod reader;
pub mod loader;


pub use reader::{TsvDialect, TsvReader, TsvRecord};
pub use loader::{load_tsv, parse_table};
