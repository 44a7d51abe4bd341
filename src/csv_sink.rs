// src/csv_sink.rs
use async_trait::async_trait;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::warehouse::{io_context, FieldSchema, JsonRow, SinkError, TableRef, WarehouseSink};

/// Writes each table to `{dir}/{table}.csv`. The file is written under a
/// temporary name and renamed over the previous one.
#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn table_path(&self, table: &TableRef) -> PathBuf {
        self.dir.join(format!("{}.csv", table.table))
    }

    fn write_file(path: &Path, schema: &[FieldSchema], rows: &[JsonRow]) -> Result<(), SinkError> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(schema.iter().map(|f| f.name))?;
        for row in rows {
            writer.write_record(schema.iter().map(|f| cell(row.get(f.name))))?;
        }
        writer
            .flush()
            .map_err(|e| io_context(e, format!("Failed to flush {}", path.display())))?;
        Ok(())
    }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[async_trait]
impl WarehouseSink for CsvSink {
    async fn replace_table(
        &self,
        table: &TableRef,
        schema: &[FieldSchema],
        rows: Vec<JsonRow>,
    ) -> Result<u64, SinkError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            io_context(e, format!("Failed to create output dir {}", self.dir.display()))
        })?;

        let target = self.table_path(table);
        let temp = self.dir.join(format!(".{}.csv.tmp", table.table));
        debug!("Writing {} rows to {}", rows.len(), temp.display());

        if let Err(e) = Self::write_file(&temp, schema, &rows) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }
        fs::rename(&temp, &target).map_err(|e| {
            io_context(
                e,
                format!("Failed to move {} to {}", temp.display(), target.display()),
            )
        })?;

        info!("Wrote {} ({} rows)", target.display(), rows.len());
        Ok(rows.len() as u64)
    }
}
