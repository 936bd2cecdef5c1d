// 🗄️ SQLite Store
// Cleaned transactions and monthly summaries, one batch read/write per call

use crate::aggregate::{MonthlySummaryRecord, YearMonth};
use crate::cleaner::CleanedTransaction;
use anyhow::Result;
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};

/// Timestamp layout inside the store. Lexicographic order matches
/// chronological order, so the column sorts and indexes correctly as TEXT.
const STORE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Cleaned transactions (idempotent insert via idempotency_hash)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            idempotency_hash TEXT UNIQUE NOT NULL,
            invoice_no TEXT NOT NULL,
            stock_code TEXT NOT NULL,
            description TEXT,
            quantity INTEGER NOT NULL,
            invoice_date TEXT NOT NULL,
            unit_price REAL NOT NULL,
            customer_id TEXT,
            country TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Monthly summaries (fully replaced on every aggregation run)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sku_monthly_country (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            stock_code TEXT NOT NULL,
            year_month TEXT NOT NULL,
            country TEXT NOT NULL,
            total_quantity INTEGER NOT NULL,
            avg_price REAL NOT NULL,
            UNIQUE(stock_code, year_month, country)
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tx_stock_code ON transactions(stock_code)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tx_invoice_date ON transactions(invoice_date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tx_country ON transactions(country)",
        [],
    )?;

    Ok(())
}

/// Hash over the row's business identity. Re-importing the same export skips
/// rows that are already in the store.
fn idempotency_hash(tx: &CleanedTransaction) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{}|{}|{}|{}|{}|{}",
        tx.invoice_no,
        tx.stock_code,
        tx.quantity,
        tx.invoice_date.format(STORE_DATETIME_FORMAT),
        tx.unit_price,
        tx.country,
    ));
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertStats {
    pub inserted: usize,
    pub duplicates: usize,
}

pub fn insert_transactions(
    conn: &Connection,
    transactions: &[CleanedTransaction],
) -> Result<InsertStats> {
    let mut stats = InsertStats {
        inserted: 0,
        duplicates: 0,
    };

    let mut stmt = conn.prepare(
        "INSERT INTO transactions (
            idempotency_hash, invoice_no, stock_code, description,
            quantity, invoice_date, unit_price, customer_id, country
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;

    for tx in transactions {
        let result = stmt.execute(params![
            idempotency_hash(tx),
            tx.invoice_no,
            tx.stock_code,
            tx.description,
            tx.quantity,
            tx.invoice_date.format(STORE_DATETIME_FORMAT).to_string(),
            tx.unit_price,
            tx.customer_id,
            tx.country,
        ]);

        match result {
            Ok(_) => stats.inserted += 1,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                stats.duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(stats)
}

pub fn load_transactions(conn: &Connection) -> Result<Vec<CleanedTransaction>> {
    let mut stmt = conn.prepare(
        "SELECT invoice_no, stock_code, description, quantity,
                invoice_date, unit_price, customer_id, country
         FROM transactions
         ORDER BY id",
    )?;

    let transactions = stmt
        .query_map([], |row| {
            let invoice_date_str: String = row.get(4)?;
            let invoice_date =
                chrono::NaiveDateTime::parse_from_str(&invoice_date_str, STORE_DATETIME_FORMAT)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?;

            Ok(CleanedTransaction {
                invoice_no: row.get(0)?,
                stock_code: row.get(1)?,
                description: row.get(2)?,
                quantity: row.get(3)?,
                invoice_date,
                unit_price: row.get(5)?,
                customer_id: row.get(6)?,
                country: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transactions)
}

/// Replace the whole summary table with this run's output, atomically.
/// There are no partial updates: the store holds either the previous
/// complete set or the new complete set.
pub fn replace_monthly_summaries(
    conn: &mut Connection,
    records: &[MonthlySummaryRecord],
) -> Result<usize> {
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM sku_monthly_country", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO sku_monthly_country (
                stock_code, year_month, country, total_quantity, avg_price
            ) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for record in records {
            stmt.execute(params![
                record.stock_code,
                record.year_month.to_string(),
                record.country,
                record.total_quantity,
                record.avg_price,
            ])?;
        }
    }

    tx.commit()?;
    Ok(records.len())
}

pub fn get_monthly_summaries(conn: &Connection) -> Result<Vec<MonthlySummaryRecord>> {
    let mut stmt = conn.prepare(
        "SELECT stock_code, year_month, country, total_quantity, avg_price
         FROM sku_monthly_country
         ORDER BY stock_code, country, year_month",
    )?;

    let records = stmt
        .query_map([], |row| {
            let year_month_str: String = row.get(1)?;
            let year_month: YearMonth = year_month_str
                .parse()
                .map_err(|_| rusqlite::Error::InvalidQuery)?;

            Ok(MonthlySummaryRecord {
                stock_code: row.get(0)?,
                year_month,
                country: row.get(2)?,
                total_quantity: row.get(3)?,
                avg_price: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

pub fn verify_transaction_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
    Ok(count)
}

pub fn verify_summary_count(conn: &Connection) -> Result<i64> {
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM sku_monthly_country", [], |row| row.get(0))?;
    Ok(count)
}

/// Per-country statistics for console reporting
#[derive(Debug, Clone)]
pub struct CountryStat {
    pub country: String,
    pub transaction_count: i64,
    pub total_units: i64,
    pub total_revenue: f64,
    pub date_range: String,
}

pub fn get_country_stats(conn: &Connection) -> Result<Vec<CountryStat>> {
    let mut stmt = conn.prepare(
        "SELECT
            country,
            COUNT(*) as count,
            SUM(quantity) as units,
            SUM(quantity * unit_price) as revenue,
            MIN(invoice_date) || ' - ' || MAX(invoice_date) as date_range
         FROM transactions
         GROUP BY country
         ORDER BY country",
    )?;

    let stats = stmt
        .query_map([], |row| {
            Ok(CountryStat {
                country: row.get(0)?,
                transaction_count: row.get(1)?,
                total_units: row.get(2)?,
                total_revenue: row.get(3)?,
                date_range: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn create_test_transaction(
        invoice_no: &str,
        stock_code: &str,
        quantity: i64,
        unit_price: f64,
        country: &str,
    ) -> CleanedTransaction {
        CleanedTransaction {
            invoice_no: invoice_no.to_string(),
            stock_code: stock_code.to_string(),
            description: Some("WHITE HANGING HEART T-LIGHT HOLDER".to_string()),
            quantity,
            invoice_date: NaiveDate::from_ymd_opt(2010, 12, 1)
                .unwrap()
                .and_hms_opt(8, 26, 0)
                .unwrap(),
            unit_price,
            customer_id: Some("17850".to_string()),
            country: country.to_string(),
        }
    }

    fn summary(stock_code: &str, year: i32, month: u32, country: &str) -> MonthlySummaryRecord {
        MonthlySummaryRecord {
            stock_code: stock_code.to_string(),
            year_month: YearMonth::new(year, month),
            country: country.to_string(),
            total_quantity: 15,
            avg_price: 2.5,
        }
    }

    #[test]
    fn test_idempotency_import_twice() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let transactions = vec![
            create_test_transaction("536365", "85123A", 6, 2.55, "United Kingdom"),
            create_test_transaction("536365", "71053", 6, 3.39, "United Kingdom"),
            create_test_transaction("536367", "84879", 32, 1.69, "France"),
        ];

        let first = insert_transactions(&conn, &transactions).unwrap();
        assert_eq!(first.inserted, 3);
        assert_eq!(first.duplicates, 0);
        assert_eq!(verify_transaction_count(&conn).unwrap(), 3);

        let second = insert_transactions(&conn, &transactions).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 3);
        assert_eq!(verify_transaction_count(&conn).unwrap(), 3);
    }

    #[test]
    fn test_transactions_round_trip() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let mut no_description = create_test_transaction("536368", "22960", 3, 4.25, "Norway");
        no_description.description = None;
        no_description.customer_id = None;

        let transactions = vec![
            create_test_transaction("536365", "85123A", 6, 2.55, "United Kingdom"),
            no_description,
        ];

        insert_transactions(&conn, &transactions).unwrap();
        let loaded = load_transactions(&conn).unwrap();

        assert_eq!(loaded, transactions);
    }

    #[test]
    fn test_replace_monthly_summaries_is_full_replace() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let first_run = vec![
            summary("85123A", 2011, 1, "United Kingdom"),
            summary("85123A", 2011, 2, "United Kingdom"),
        ];
        replace_monthly_summaries(&mut conn, &first_run).unwrap();
        assert_eq!(verify_summary_count(&conn).unwrap(), 2);

        let second_run = vec![summary("71053", 2011, 3, "France")];
        replace_monthly_summaries(&mut conn, &second_run).unwrap();
        assert_eq!(verify_summary_count(&conn).unwrap(), 1);

        let stored = get_monthly_summaries(&conn).unwrap();
        assert_eq!(stored, second_run);
    }

    #[test]
    fn test_summaries_read_back_ordered() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        // Insert out of order; the read is ordered by (product, country, month)
        let records = vec![
            summary("B", 2011, 1, "UK"),
            summary("A", 2011, 2, "UK"),
            summary("A", 2010, 12, "UK"),
            summary("A", 2011, 1, "France"),
        ];
        replace_monthly_summaries(&mut conn, &records).unwrap();

        let stored = get_monthly_summaries(&conn).unwrap();
        let keys: Vec<(String, String, YearMonth)> = stored
            .iter()
            .map(|r| (r.stock_code.clone(), r.country.clone(), r.year_month))
            .collect();

        assert_eq!(
            keys,
            vec![
                ("A".to_string(), "France".to_string(), YearMonth::new(2011, 1)),
                ("A".to_string(), "UK".to_string(), YearMonth::new(2010, 12)),
                ("A".to_string(), "UK".to_string(), YearMonth::new(2011, 2)),
                ("B".to_string(), "UK".to_string(), YearMonth::new(2011, 1)),
            ]
        );
    }

    #[test]
    fn test_country_stats() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        insert_transactions(
            &conn,
            &[
                create_test_transaction("536365", "85123A", 6, 2.50, "United Kingdom"),
                create_test_transaction("536366", "71053", 4, 1.25, "United Kingdom"),
                create_test_transaction("536367", "84879", 32, 1.69, "France"),
            ],
        )
        .unwrap();

        let stats = get_country_stats(&conn).unwrap();
        assert_eq!(stats.len(), 2);

        assert_eq!(stats[0].country, "France");
        assert_eq!(stats[0].transaction_count, 1);
        assert_eq!(stats[0].total_units, 32);

        assert_eq!(stats[1].country, "United Kingdom");
        assert_eq!(stats[1].transaction_count, 2);
        assert_eq!(stats[1].total_units, 10);
        assert!((stats[1].total_revenue - (6.0 * 2.50 + 4.0 * 1.25)).abs() < 1e-9);
        assert!(stats[1].date_range.contains("2010-12-01"));
    }
}
