// 📊 Monthly Aggregation
// Groups cleaned transactions into (product, month, country) summaries

use crate::cleaner::CleanedTransaction;
use chrono::{Datelike, NaiveDateTime};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// YEAR-MONTH BUCKET
// ============================================================================

/// Calendar month bucket: (year, month), day and time discarded.
///
/// The key stays typed everywhere inside the pipeline; the zero-padded
/// `YYYY-MM` string form exists only at output boundaries (CSV columns,
/// store rows). `Ord` is chronological by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        YearMonth { year, month }
    }

    /// Truncate a timestamp to its calendar month.
    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        YearMonth {
            year: dt.year(),
            month: dt.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseYearMonthError(String);

impl fmt::Display for ParseYearMonthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid year-month '{}', expected YYYY-MM", self.0)
    }
}

impl std::error::Error for ParseYearMonthError {}

impl FromStr for YearMonth {
    type Err = ParseYearMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split_once('-')
            .and_then(|(year, month)| {
                let year: i32 = year.parse().ok()?;
                let month: u32 = month.parse().ok()?;
                (1..=12).contains(&month).then_some(YearMonth { year, month })
            })
            .ok_or_else(|| ParseYearMonthError(s.to_string()))
    }
}

// ============================================================================
// SUMMARY RECORD
// ============================================================================

/// One output row: unique per (product code, year-month, country), immutable
/// after the run that created it. Serde names match the exported CSV columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummaryRecord {
    #[serde(rename = "StockCode")]
    pub stock_code: String,

    #[serde(rename = "InvoiceYearMonth")]
    pub year_month: YearMonth,

    #[serde(rename = "Country")]
    pub country: String,

    pub total_quantity: i64,

    /// Revenue-weighted: total revenue / total quantity, not a mean of unit
    /// prices.
    #[serde(rename = "avg_price_monthly")]
    pub avg_price: f64,
}

// ============================================================================
// ERRORS
// ============================================================================

/// Raised only when a supposedly-cleaned record is structurally broken:
/// empty product code or country, non-finite price. The aggregator trusts
/// the Cleaner's contract for everything else.
#[derive(Debug, Clone)]
pub struct InvalidInputError {
    pub index: usize,
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for InvalidInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid cleaned transaction at index {}: {}: {}",
            self.index, self.field, self.message
        )
    }
}

impl std::error::Error for InvalidInputError {}

// ============================================================================
// MONTHLY AGGREGATOR
// ============================================================================

/// Grouping key. Field order gives the required output order: product code,
/// then country, then month.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    stock_code: String,
    country: String,
    year_month: YearMonth,
}

#[derive(Debug, Default)]
struct GroupTotals {
    quantity: i64,
    revenue: f64,
}

pub struct MonthlyAggregator;

impl MonthlyAggregator {
    pub fn new() -> Self {
        MonthlyAggregator
    }

    /// Aggregate a cleaned batch into ordered monthly summaries.
    ///
    /// Single synchronous pass: every transaction lands in exactly one
    /// group, revenue accumulates in input order (reproducible float sums),
    /// and the BTreeMap key order is already the required output order.
    /// Stateless between calls; each run is a full replacement of whatever
    /// the sink held before.
    pub fn aggregate(
        &self,
        transactions: &[CleanedTransaction],
    ) -> Result<Vec<MonthlySummaryRecord>, InvalidInputError> {
        let mut groups: BTreeMap<GroupKey, GroupTotals> = BTreeMap::new();

        for (index, tx) in transactions.iter().enumerate() {
            validate_shape(index, tx)?;

            let key = GroupKey {
                stock_code: tx.stock_code.clone(),
                country: tx.country.clone(),
                year_month: YearMonth::from_datetime(&tx.invoice_date),
            };

            let totals = groups.entry(key).or_default();
            totals.quantity += tx.quantity;
            totals.revenue += tx.quantity as f64 * tx.unit_price;
        }

        let records = groups
            .into_iter()
            // A group can net to a non-positive quantity only when rows
            // bypassed the Cleaner; such groups produce no summary row.
            .filter(|(_, totals)| totals.quantity > 0)
            .map(|(key, totals)| MonthlySummaryRecord {
                stock_code: key.stock_code,
                year_month: key.year_month,
                country: key.country,
                total_quantity: totals.quantity,
                avg_price: totals.revenue / totals.quantity as f64,
            })
            .collect();

        Ok(records)
    }
}

impl Default for MonthlyAggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_shape(index: usize, tx: &CleanedTransaction) -> Result<(), InvalidInputError> {
    if tx.stock_code.trim().is_empty() {
        return Err(InvalidInputError {
            index,
            field: "stock_code",
            message: "empty product code".to_string(),
        });
    }
    if tx.country.trim().is_empty() {
        return Err(InvalidInputError {
            index,
            field: "country",
            message: "empty country".to_string(),
        });
    }
    if !tx.unit_price.is_finite() {
        return Err(InvalidInputError {
            index,
            field: "unit_price",
            message: format!("non-finite unit price {}", tx.unit_price),
        });
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
