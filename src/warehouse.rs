// src/warehouse.rs
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

use crate::http::ClientError;

// --- Schema ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
    Required,
    Nullable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSchema {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub mode: FieldMode,
}

impl FieldSchema {
    pub const fn required(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            mode: FieldMode::Required,
        }
    }

    pub const fn nullable(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            mode: FieldMode::Nullable,
        }
    }
}

/// A row struct whose serialized fields match `schema()` one to one.
pub trait TableRow: Serialize {
    fn schema() -> Vec<FieldSchema>;
}

pub type JsonRow = Map<String, Value>;

// --- Errors ---

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Row encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Row {index} does not serialize to a JSON object")]
    NotAnObject { index: usize },

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("File I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    #[error("Warehouse request failed: {0}")]
    Client(#[from] ClientError),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Load job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },
}

pub(crate) fn io_context<S: Into<String>>(source: std::io::Error, context: S) -> SinkError {
    SinkError::Io {
        source,
        context: context.into(),
    }
}

// --- Sink ---

/// Destination table: `{project}.{dataset}.{table}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(project: &str, dataset: &str, table: &str) -> Self {
        Self {
            project: project.to_string(),
            dataset: dataset.to_string(),
            table: table.to_string(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// Full-table replace: the table ends up holding exactly `rows`, or the call
/// fails and the previous contents are untouched. Performs no coercion.
#[async_trait]
pub trait WarehouseSink: Send + Sync {
    async fn replace_table(
        &self,
        table: &TableRef,
        schema: &[FieldSchema],
        rows: Vec<JsonRow>,
    ) -> Result<u64, SinkError>;
}

pub fn encode_rows<T: TableRow>(rows: &[T]) -> Result<Vec<JsonRow>, SinkError> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| match serde_json::to_value(row)? {
            Value::Object(map) => Ok(map),
            _ => Err(SinkError::NotAnObject { index }),
        })
        .collect()
}

/// Encodes typed rows and hands them to the sink. Empty row sets are not
/// loaded, so a failed upstream fetch never truncates a table to nothing.
pub async fn load_table<T: TableRow>(
    sink: &dyn WarehouseSink,
    table: &TableRef,
    rows: &[T],
) -> Result<u64, SinkError> {
    if rows.is_empty() {
        warn!("No rows for {}; skipping load.", table);
        return Ok(0);
    }
    let schema = T::schema();
    let encoded = encode_rows(rows)?;
    info!("Loading {} rows into {}...", encoded.len(), table);
    let written = sink.replace_table(table, &schema, encoded).await?;
    info!("Load complete: {} ({} rows written)", table, written);
    Ok(written)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records each replace in memory, keyed by table id.
    #[derive(Default)]
    pub struct MemorySink {
        pub tables: Mutex<HashMap<String, (Vec<FieldSchema>, Vec<JsonRow>)>>,
    }

    impl MemorySink {
        pub fn rows(&self, table: &str) -> Vec<JsonRow> {
            self.tables
                .lock()
                .unwrap()
                .iter()
                .find(|(id, _)| id.ends_with(table))
                .map(|(_, (_, rows))| rows.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl WarehouseSink for MemorySink {
        async fn replace_table(
            &self,
            table: &TableRef,
            schema: &[FieldSchema],
            rows: Vec<JsonRow>,
        ) -> Result<u64, SinkError> {
            let count = rows.len() as u64;
            self.tables
                .lock()
                .unwrap()
                .insert(table.to_string(), (schema.to_vec(), rows));
            Ok(count)
        }
    }
}
