// 📤 Summary Sinks
// Where the ordered monthly summary batch lands: CSV export and the store

use crate::aggregate::MonthlySummaryRecord;
use crate::db;
use anyhow::{Context, Result};
use rusqlite::Connection;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

// ============================================================================
// SINK TRAIT
// ============================================================================

/// SummarySink - accepts one full, internally consistent replacement set per
/// aggregation run. Never receives a partial batch.
pub trait SummarySink {
    fn write(&mut self, records: &[MonthlySummaryRecord]) -> Result<()>;

    /// Human-readable name for progress output.
    fn name(&self) -> String;
}

// ============================================================================
// CSV EXPORT SINK
// ============================================================================

/// Writes `StockCode,InvoiceYearMonth,Country,total_quantity,
/// avg_price_monthly` with year-month as zero-padded `YYYY-MM`.
pub struct CsvExportSink {
    path: PathBuf,
}

impl CsvExportSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        CsvExportSink {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SummarySink for CsvExportSink {
    fn write(&mut self, records: &[MonthlySummaryRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create export directory {}", parent.display())
                })?;
            }
        }

        let file = fs::File::create(&self.path)
            .with_context(|| format!("Failed to create export file {}", self.path.display()))?;
        write_records(file, records)
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}

fn write_records<W: io::Write>(writer: W, records: &[MonthlySummaryRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)
            .context("Failed to serialize summary record")?;
    }
    wtr.flush().context("Failed to flush summary export")?;
    Ok(())
}

// ============================================================================
// SQLITE SINK
// ============================================================================

/// Full-replace write into the store's summary table.
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    pub fn new(conn: Connection) -> Self {
        SqliteSink { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }
}

impl SummarySink for SqliteSink {
    fn write(&mut self, records: &[MonthlySummaryRecord]) -> Result<()> {
        db::replace_monthly_summaries(&mut self.conn, records)?;
        Ok(())
    }

    fn name(&self) -> String {
        "sku_monthly_country table".to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================
