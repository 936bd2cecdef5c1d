// 📥 Transaction Sources
// Supplies raw transaction batches to the cleaning stage

use anyhow::{Context, Result};
use csv::StringRecord;
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

// ============================================================================
// RAW TRANSACTION
// ============================================================================

/// RawTransaction - one row as it arrives from a source, before cleaning.
///
/// Every field is optional: retail exports routinely carry empty cells,
/// unparseable numbers and missing customer ids. An empty or unparseable
/// value deserializes to `None` and is the Cleaner's problem, not a read
/// error. A row missing a *column* entirely is a shape error and fails the
/// whole read.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct RawTransaction {
    #[serde(rename = "InvoiceNo", deserialize_with = "trim_to_option")]
    pub invoice_no: Option<String>,

    #[serde(rename = "StockCode", deserialize_with = "trim_to_option")]
    pub stock_code: Option<String>,

    #[serde(rename = "Description", deserialize_with = "trim_to_option")]
    pub description: Option<String>,

    #[serde(rename = "Quantity", deserialize_with = "trim_and_parse_i64")]
    pub quantity: Option<i64>,

    /// Kept as the raw string; parsing into a calendar value happens in the
    /// Cleaner so that an unparseable date drops one row instead of failing
    /// the import.
    #[serde(rename = "InvoiceDate", deserialize_with = "trim_to_option")]
    pub invoice_date: Option<String>,

    #[serde(rename = "UnitPrice", deserialize_with = "trim_and_parse_f64")]
    pub unit_price: Option<f64>,

    #[serde(rename = "CustomerID", deserialize_with = "trim_to_option")]
    pub customer_id: Option<String>,

    #[serde(rename = "Country", deserialize_with = "trim_to_option")]
    pub country: Option<String>,
}

fn trim_to_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = String::deserialize(deserializer)?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

fn trim_and_parse_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = String::deserialize(deserializer)?;
    Ok(s.trim().parse::<i64>().ok())
}

fn trim_and_parse_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = String::deserialize(deserializer)?;
    Ok(s.trim().parse::<f64>().ok())
}

// ============================================================================
// SOURCE TRAIT
// ============================================================================

/// TransactionSource - where raw rows come from.
///
/// The core pipeline only requires that a source can be fully materialized
/// before cleaning begins. Whether that is a flat file, a query result or an
/// in-memory fixture is the source's business.
pub trait TransactionSource {
    /// Materialize the full batch of raw transactions.
    fn fetch(&self) -> Result<Vec<RawTransaction>>;

    /// Human-readable name for progress output.
    fn name(&self) -> String;
}

// ============================================================================
// CSV SOURCE
// ============================================================================

/// Reads the raw retail export (InvoiceNo, StockCode, Description, Quantity,
/// InvoiceDate, UnitPrice, CustomerID, Country).
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        CsvSource {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl TransactionSource for CsvSource {
    fn fetch(&self) -> Result<Vec<RawTransaction>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open CSV file {}", self.path.display()))?;
        parse_reader(file)
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}

/// Parse raw rows out of any reader.
///
/// The historical export is ISO-8859-1, so rows are read as bytes and
/// converted lossily instead of assuming valid UTF-8.
fn parse_reader<R: io::Read>(reader: R) -> Result<Vec<RawTransaction>> {
    let mut rdr = csv::Reader::from_reader(reader);

    let headers = StringRecord::from_byte_record_lossy(
        rdr.byte_headers().context("Failed to read CSV header")?.clone(),
    );

    let mut transactions = Vec::new();
    for (line, record) in rdr.byte_records().enumerate() {
        let record = StringRecord::from_byte_record_lossy(
            record.with_context(|| format!("Failed to read CSV record at line {}", line + 2))?,
        );
        let raw: RawTransaction = record
            .deserialize(Some(&headers))
            .with_context(|| format!("Malformed row shape at line {}", line + 2))?;
        transactions.push(raw);
    }

    Ok(transactions)
}

// ============================================================================
// TESTS
// ============================================================================
