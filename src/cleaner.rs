// 🧹 Cleaner
// Validates and normalizes raw transaction batches before aggregation

use crate::source::RawTransaction;
use chrono::{NaiveDate, NaiveDateTime};

// ============================================================================
// CLEANED TRANSACTION
// ============================================================================

/// CleanedTransaction - a row that survived cleaning.
///
/// Invariants: invoice number, product code and country are non-empty,
/// quantity > 0, unit price > 0, timestamp parsed. Everything downstream
/// trusts this contract instead of re-validating.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedTransaction {
    pub invoice_no: String,
    pub stock_code: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub invoice_date: NaiveDateTime,
    pub unit_price: f64,
    pub customer_id: Option<String>,
    pub country: String,
}

// ============================================================================
// CLEANER
// ============================================================================

/// Accepted timestamp formats. The historical export writes US-style
/// `12/1/2010 8:26`; ISO forms are accepted for re-imports of our own data.
const DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d"];

pub struct Cleaner;

impl Cleaner {
    pub fn new() -> Self {
        Cleaner
    }

    /// Clean a raw batch.
    ///
    /// Rows are dropped when a critical field (invoice number, product code,
    /// quantity, unit price, timestamp, country) is missing or unparseable,
    /// or when quantity or unit price is non-positive (returns and invalid
    /// entries). Dropped rows are not errors; callers that want a drop count
    /// compare input and output lengths.
    pub fn clean(&self, transactions: Vec<RawTransaction>) -> Vec<CleanedTransaction> {
        transactions
            .into_iter()
            .filter_map(|raw| self.clean_one(raw))
            .collect()
    }

    fn clean_one(&self, raw: RawTransaction) -> Option<CleanedTransaction> {
        let invoice_no = non_empty(raw.invoice_no)?;
        let stock_code = canonical_stock_code(&non_empty(raw.stock_code)?);
        let country = non_empty(raw.country)?;

        let quantity = raw.quantity?;
        let unit_price = raw.unit_price?;
        if quantity <= 0 || unit_price <= 0.0 || !unit_price.is_finite() {
            return None;
        }

        let invoice_date = parse_invoice_date(raw.invoice_date?.trim())?;

        Some(CleanedTransaction {
            invoice_no,
            stock_code,
            description: non_empty(raw.description),
            quantity,
            invoice_date,
            unit_price,
            customer_id: non_empty(raw.customer_id),
            country,
        })
    }
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// NORMALIZATION HELPERS
// ============================================================================

fn non_empty(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Canonical product code: trimmed, uppercased, and with the float artifact
/// `.0` stripped from digit-only codes so that `85123` and `85123.0` compare
/// equal (mixed text/numeric code columns stringify both ways).
pub fn canonical_stock_code(code: &str) -> String {
    let upper = code.trim().to_uppercase();
    if let Some(stripped) = upper.strip_suffix(".0") {
        if !stripped.is_empty() && stripped.bytes().all(|b| b.is_ascii_digit()) {
            return stripped.to_string();
        }
    }
    upper
}

/// Parse an invoice timestamp, trying datetime formats first and date-only
/// forms at midnight second. Unparseable values return None and the row is
/// dropped, never defaulted.
pub fn parse_invoice_date(value: &str) -> Option<NaiveDateTime> {
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

// ============================================================================
// TESTS
// ============================================================================
