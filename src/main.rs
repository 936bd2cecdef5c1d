use anyhow::Result;
use rusqlite::Connection;
use std::env;
use std::fs;
use std::path::Path;

use retail_etl::{
    get_country_stats, insert_transactions, load_transactions, setup_database,
    verify_summary_count, verify_transaction_count, Cleaner, CsvExportSink, CsvSource,
    MonthlyAggregator, SqliteSink, SummarySink, TransactionSource,
};

const DEFAULT_CSV: &str = "data/ecommerce-data.csv";
const DEFAULT_DB: &str = "data/ecommerce.db";
const DEFAULT_EXPORT: &str = "data/sku_monthly_country.csv";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("import") => run_import(
            args.get(2).map(String::as_str).unwrap_or(DEFAULT_CSV),
            args.get(3).map(String::as_str).unwrap_or(DEFAULT_DB),
        ),
        Some("aggregate") => run_aggregate(
            args.get(2).map(String::as_str).unwrap_or(DEFAULT_DB),
            args.get(3).map(String::as_str).unwrap_or(DEFAULT_EXPORT),
        ),
        Some("report") => run_report(args.get(2).map(String::as_str).unwrap_or(DEFAULT_DB)),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("retail-etl {}", retail_etl::VERSION);
    println!();
    println!("Usage:");
    println!("  retail-etl import    [csv_path] [db_path]   Clean a raw export into the store");
    println!("  retail-etl aggregate [db_path] [csv_out]    Build monthly SKU/country summaries");
    println!("  retail-etl report    [db_path]              Per-country statistics");
    println!();
    println!("Defaults: {} / {} / {}", DEFAULT_CSV, DEFAULT_DB, DEFAULT_EXPORT);
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn run_import(csv_path: &str, db_path: &str) -> Result<()> {
    println!("🗄️  Import: raw CSV → cleaned transactions → SQLite + WAL");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load raw rows
    let source = CsvSource::new(csv_path);
    println!("\n📂 Loading {}...", source.name());
    let raw = source.fetch()?;
    let raw_count = raw.len();
    println!("✓ Loaded {} raw rows", raw_count);

    // 2. Clean
    println!("\n🧹 Cleaning...");
    let cleaned = Cleaner::new().clean(raw);
    println!(
        "✓ {} rows survived cleaning ({} dropped)",
        cleaned.len(),
        raw_count - cleaned.len()
    );

    // 3. Setup database
    println!("\n🔧 Setting up database...");
    ensure_parent_dir(db_path)?;
    let conn = Connection::open(db_path)?;
    setup_database(&conn)?;
    println!("✓ Database initialized with WAL mode");

    // 4. Insert transactions
    println!("\n💾 Inserting transactions...");
    let stats = insert_transactions(&conn, &cleaned)?;
    println!("✓ Inserted: {} transactions", stats.inserted);
    println!("✓ Skipped duplicates: {}", stats.duplicates);

    // 5. Verify count
    println!("\n🔍 Verifying database...");
    let count = verify_transaction_count(&conn)?;
    println!("✓ Store contains {} transactions", count);

    Ok(())
}

fn run_aggregate(db_path: &str, export_path: &str) -> Result<()> {
    println!("📊 Aggregate: monthly totals and weighted prices per SKU and country");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load the cleaned batch
    println!("\n📂 Loading cleaned transactions from {}...", db_path);
    let conn = Connection::open(db_path)?;
    setup_database(&conn)?;
    let transactions = load_transactions(&conn)?;
    println!("✓ Loaded {} transactions", transactions.len());

    // 2. Aggregate
    println!("\n📊 Aggregating...");
    let records = MonthlyAggregator::new().aggregate(&transactions)?;
    println!("✓ {} monthly summary rows", records.len());

    for record in records.iter().take(5) {
        println!(
            "  {} {} {} qty={} avg={:.2}",
            record.stock_code,
            record.year_month,
            record.country,
            record.total_quantity,
            record.avg_price
        );
    }
    if records.len() > 5 {
        println!("  ...");
    }

    // 3. Replace the summary table
    println!("\n💾 Writing summary table...");
    let mut store_sink = SqliteSink::new(conn);
    store_sink.write(&records)?;
    let stored = verify_summary_count(store_sink.connection())?;
    println!("✓ {} holds {} rows", store_sink.name(), stored);

    // 4. Export CSV
    let mut export_sink = CsvExportSink::new(export_path);
    export_sink.write(&records)?;
    println!("✓ Exported to {}", export_sink.name());

    Ok(())
}

fn run_report(db_path: &str) -> Result<()> {
    println!("🔍 Report: per-country statistics");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = Connection::open(db_path)?;
    setup_database(&conn)?;

    let stats = get_country_stats(&conn)?;
    if stats.is_empty() {
        println!("\nStore is empty. Run: retail-etl import");
        return Ok(());
    }

    println!(
        "\n{:<24} {:>10} {:>12} {:>14}  {}",
        "Country", "Rows", "Units", "Revenue", "Date range"
    );
    for stat in &stats {
        println!(
            "{:<24} {:>10} {:>12} {:>14.2}  {}",
            stat.country,
            stat.transaction_count,
            stat.total_units,
            stat.total_revenue,
            stat.date_range
        );
    }

    let count = verify_transaction_count(&conn)?;
    println!("\n✓ {} transactions across {} countries", count, stats.len());

    Ok(())
}
