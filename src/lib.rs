// Retail ETL - Core Library
// Exposes all modules for use in the CLI and tests

pub mod aggregate;
pub mod cleaner;
pub mod db;
pub mod sink;
pub mod source;

// Re-export commonly used types
pub use aggregate::{InvalidInputError, MonthlyAggregator, MonthlySummaryRecord, YearMonth};
pub use cleaner::{CleanedTransaction, Cleaner};
pub use db::{
    get_country_stats, get_monthly_summaries, insert_transactions, load_transactions,
    replace_monthly_summaries, setup_database, verify_summary_count, verify_transaction_count,
    CountryStat, InsertStats,
};
pub use sink::{CsvExportSink, SqliteSink, SummarySink};
pub use source::{CsvSource, RawTransaction, TransactionSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
