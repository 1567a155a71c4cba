// Live PostgreSQL executor backed by tokio-postgres
use crate::config::ConnectionConfig;
use crate::data_importer::importer::SqlExecutor;
use crate::error::{ImporterError, Result};
use crate::types::Cell;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{AsyncMessage, Client, NoTls, Statement};
use tracing::{debug, error, info};

/// Executor holding one PostgreSQL connection for the whole run
pub struct PostgresExecutor {
    client: Client,
    notices: UnboundedReceiver<String>,
    statements: HashMap<String, Statement>,
    driver: JoinHandle<()>,
}

impl PostgresExecutor {
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        info!("Connecting to PostgreSQL at {}", config);
        Self::connect_with(config.to_pg_config()).await
    }

    /// Connect using a `postgresql://` URL or key/value connection string
    pub async fn connect_url(url: &str) -> Result<Self> {
        let config = url.parse::<tokio_postgres::Config>()?;
        Self::connect_with(config).await
    }

    pub async fn connect_with(config: tokio_postgres::Config) -> Result<Self> {
        let (client, mut connection) = config.connect(NoTls).await?;
        let (tx, rx) = mpsc::unbounded_channel();

        // The connection only makes progress while polled; notices are
        // forwarded as they arrive
        let driver = tokio::spawn(async move {
            loop {
                match std::future::poll_fn(|cx| connection.poll_message(cx)).await {
                    Some(Ok(AsyncMessage::Notice(notice))) => {
                        let _ = tx.send(format!("{}: {}", notice.severity(), notice.message()));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("PostgreSQL connection error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        });

        debug!("PostgreSQL connection established");
        Ok(Self {
            client,
            notices: rx,
            statements: HashMap::new(),
            driver,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn prepared(&mut self, sql: &str) -> Result<Statement> {
        if let Some(statement) = self.statements.get(sql) {
            return Ok(statement.clone());
        }
        let statement = self.client.prepare(sql).await?;
        debug!("Prepared statement with parameter types {:?}", statement.params());
        self.statements.insert(sql.to_string(), statement.clone());
        Ok(statement)
    }
}

impl Drop for PostgresExecutor {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

impl SqlExecutor for PostgresExecutor {
    async fn batch_execute(&mut self, script: &str) -> Result<()> {
        self.client.batch_execute(script).await?;
        Ok(())
    }

    async fn execute(&mut self, statement: &str) -> Result<u64> {
        Ok(self.client.execute(statement, &[]).await?)
    }

    async fn execute_prepared(&mut self, statement: &str, params: &[&Cell]) -> Result<u64> {
        let prepared = self.prepared(statement).await?;
        if prepared.params().len() != params.len() {
            return Err(ImporterError::schema(format!(
                "statement expects {} parameters but {} were given",
                prepared.params().len(),
                params.len()
            )));
        }

        let bound = params
            .iter()
            .zip(prepared.params())
            .map(|(cell, ty)| bind_cell(cell, ty))
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<&(dyn ToSql + Sync)> = bound.iter().map(|p| p.as_ref()).collect();

        Ok(self.client.execute(&prepared, &refs).await?)
    }

    fn take_notices(&mut self) -> Vec<String> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            notices.push(notice);
        }
        notices
    }
}

/// Convert a cell into a parameter of the type the server expects.
///
/// Missing cells bind as typed NULLs.
pub fn bind_cell(cell: &Cell, ty: &Type) -> Result<Box<dyn ToSql + Sync>> {
    let mismatch = || {
        ImporterError::schema(format!("cannot bind {:?} as PostgreSQL type {}", cell, ty))
    };

    if *ty == Type::INT2 {
        let value = cell_to_i64(cell).map_err(|_| mismatch())?;
        let value = value
            .map(i16::try_from)
            .transpose()
            .map_err(|_| mismatch())?;
        Ok(Box::new(value))
    } else if *ty == Type::INT4 {
        let value = cell_to_i64(cell).map_err(|_| mismatch())?;
        let value = value
            .map(i32::try_from)
            .transpose()
            .map_err(|_| mismatch())?;
        Ok(Box::new(value))
    } else if *ty == Type::INT8 {
        Ok(Box::new(cell_to_i64(cell).map_err(|_| mismatch())?))
    } else if *ty == Type::FLOAT4 {
        let value = cell_to_f64(cell).map_err(|_| mismatch())?;
        Ok(Box::new(value.map(|v| v as f32)))
    } else if *ty == Type::FLOAT8 {
        Ok(Box::new(cell_to_f64(cell).map_err(|_| mismatch())?))
    } else if [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME].contains(ty) {
        let value = match cell {
            Cell::Missing => None,
            other => Some(other.to_string()),
        };
        Ok(Box::new(value))
    } else if *ty == Type::TEXT_ARRAY || *ty == Type::VARCHAR_ARRAY {
        let value = match cell {
            Cell::Missing => None,
            Cell::List(tokens) => Some(tokens.clone()),
            other => Some(vec![other.to_string()]),
        };
        Ok(Box::new(value))
    } else if *ty == Type::DATE {
        let value = match cell {
            Cell::Missing => None,
            Cell::Text(text) => Some(parse_date(text).ok_or_else(mismatch)?),
            _ => return Err(mismatch()),
        };
        Ok(Box::new(value))
    } else if *ty == Type::TIMESTAMP {
        let value = match cell {
            Cell::Missing => None,
            Cell::Text(text) => Some(parse_timestamp(text).ok_or_else(mismatch)?),
            _ => return Err(mismatch()),
        };
        Ok(Box::new(value))
    } else {
        Err(mismatch())
    }
}

fn cell_to_i64(cell: &Cell) -> std::result::Result<Option<i64>, ()> {
    match cell {
        Cell::Missing => Ok(None),
        Cell::Int(v) => Ok(Some(*v)),
        Cell::Float(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Ok(Some(*v as i64)),
        Cell::Text(text) => text.trim().parse().map(Some).map_err(|_| ()),
        _ => Err(()),
    }
}

fn cell_to_f64(cell: &Cell) -> std::result::Result<Option<f64>, ()> {
    match cell {
        Cell::Missing => Ok(None),
        Cell::Int(v) => Ok(Some(*v as f64)),
        Cell::Float(v) => Ok(Some(*v)),
        Cell::Text(text) => text.trim().parse().map(Some).map_err(|_| ()),
        _ => Err(()),
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| parse_date(text).and_then(|d| d.and_hms_opt(0, 0, 0)))
}
