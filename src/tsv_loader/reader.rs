// Tokenizer for tab-separated files quoted with a multi-byte quote character
use crate::error::{ImporterError, Result};
use tracing::trace;

/// Field delimiter and quote character of a delimited file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsvDialect {
    pub delimiter: char,
    pub quote: char,
}

impl Default for TsvDialect {
    fn default() -> Self {
        Self {
            delimiter: '\t',
            quote: '\u{00A7}',
        }
    }
}

/// One logical record and the line it started on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsvRecord {
    pub line: usize,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Splits text into records.
///
/// A field that starts with the quote character may contain delimiters and
/// newlines; a doubled quote inside it is a literal quote. Quote characters in
/// the middle of an unquoted field are literal. Blank lines are skipped.
pub struct TsvReader {
    dialect: TsvDialect,
}

impl TsvReader {
    pub fn new(dialect: TsvDialect) -> Self {
        Self { dialect }
    }

    pub fn read_records(&self, input: &str) -> Result<Vec<TsvRecord>> {
        let TsvDialect { delimiter, quote } = self.dialect;
        let mut records = Vec::new();
        let mut fields: Vec<String> = Vec::new();
        let mut field = String::new();
        let mut state = State::FieldStart;
        let mut line = 1;
        let mut record_line = 1;
        let mut quote_line = 1;
        // Set once the current record holds anything beyond an empty first field
        let mut record_has_content = false;

        let mut chars = input.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\r' && state != State::Quoted && chars.peek() == Some(&'\n') {
                continue;
            }

            match state {
                State::Quoted => {
                    if c == quote {
                        state = State::QuoteInQuoted;
                    } else {
                        if c == '\n' {
                            line += 1;
                        }
                        field.push(c);
                    }
                    continue;
                }
                State::QuoteInQuoted if c == quote => {
                    field.push(quote);
                    state = State::Quoted;
                    continue;
                }
                _ => {}
            }

            if c == delimiter {
                fields.push(std::mem::take(&mut field));
                record_has_content = true;
                state = State::FieldStart;
            } else if c == '\n' {
                if record_has_content || !field.is_empty() || state == State::QuoteInQuoted {
                    fields.push(std::mem::take(&mut field));
                    records.push(TsvRecord {
                        line: record_line,
                        fields: std::mem::take(&mut fields),
                    });
                }
                line += 1;
                record_line = line;
                record_has_content = false;
                state = State::FieldStart;
            } else if c == quote && state == State::FieldStart {
                quote_line = line;
                record_has_content = true;
                state = State::Quoted;
            } else {
                field.push(c);
                state = State::Unquoted;
            }
        }

        match state {
            State::Quoted => {
                return Err(ImporterError::parse(format!(
                    "unterminated quoted field starting on line {}",
                    quote_line
                )));
            }
            _ => {
                if record_has_content || !field.is_empty() {
                    fields.push(field);
                    records.push(TsvRecord {
                        line: record_line,
                        fields,
                    });
                }
            }
        }

        trace!("Tokenized {} records over {} lines", records.len(), line);
        Ok(records)
    }
}
