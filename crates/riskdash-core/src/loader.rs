// crates/riskdash-core/src/loader.rs

use std::fs;
use std::io::Cursor;
use std::path::Path;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::{info, warn};

use crate::error::{DashboardError, Result};

/// Partition column present in every risk dump.
pub const PERIOD_COLUMN: &str = "which_month";

/// Canonical column names of the normalised frames.
pub mod columns {
    pub const DAY: &str = "day";

    pub const DISBURSED: &str = "disbursed";
    pub const REFUND: &str = "refund";
    pub const RECEIVABLE: &str = "receivable";
    pub const REPAID: &str = "repaid";
    pub const NET_DUE: &str = "net_due";
    pub const NET_LOSS: &str = "net_loss";
    pub const FIRST_MISSED_DATE: &str = "first_missed_date";
    pub const MISSED_DAYS: &str = "missed_days";
    pub const LOAN_STATUS: &str = "loan_status";

    pub const ORDER_ID: &str = "order_id";

    pub const USER_ID: &str = "user_id";
    pub const VERIFICATION_STATUS: &str = "verification_status";

    pub const MERCHANT: &str = "merchant_name";
    pub const AMOUNT: &str = "amount";

    pub const INSTALLMENT_STATUS: &str = "inst_status";
}

use columns::*;

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Read a whole CSV file with a header row. The schema is inferred over every
/// row so late-appearing decimals do not break integer columns.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let content = fs::read(path).map_err(|source| DashboardError::ReadDataset {
        path: path.to_path_buf(),
        source,
    })?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(Cursor::new(content))
        .finish()?;

    Ok(df)
}

/// Keep only the rows that belong to the reporting period.
pub fn filter_period(df: DataFrame, period: &str) -> Result<DataFrame> {
    let filtered = df
        .lazy()
        .filter(
            col(PERIOD_COLUMN)
                .cast(DataType::String)
                .eq(lit(period)),
        )
        .collect()?;
    Ok(filtered)
}

/// Parse `source` into a day-of-month column named `target`.
///
/// Empty cells leave the day null; the row stays in the frame so period-wide
/// counts still see it. Any other value that does not parse aborts the load.
pub fn with_day_of_month(df: &DataFrame, source: &str, target: &str) -> Result<DataFrame> {
    let raw = df.column(source)?.cast(&DataType::String)?;

    let mut days: Vec<Option<i64>> = Vec::with_capacity(df.height());
    for (row, value) in raw.str()?.into_iter().enumerate() {
        let day = match value.map(str::trim) {
            None | Some("") => None,
            Some(text) => {
                let day = parse_day_of_month(text).ok_or_else(|| DashboardError::DateParse {
                    column: source.to_string(),
                    row,
                    value: text.to_string(),
                })?;
                Some(i64::from(day))
            }
        };
        days.push(day);
    }

    let undated = days.iter().filter(|day| day.is_none()).count();
    if undated > 0 {
        warn!(column = source, undated, "Rows without a date are left out of daily figures");
    }

    let mut output = df.clone();
    output.with_column(Series::new(target.into(), days))?;
    Ok(output)
}

/// Day of month of a timestamp string, using the local wall-clock day when the
/// value carries an offset.
pub fn parse_day_of_month(text: &str) -> Option<u32> {
    let text = text.strip_suffix(" UTC").unwrap_or(text);

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.day());
    }
    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(text, format) {
            return Some(parsed.day());
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.day());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(text, format) {
            return Some(parsed.day());
        }
    }
    None
}

fn load_dataset(path: &Path, period: &str, date_column: &str) -> Result<DataFrame> {
    let raw = read_csv(path)?;
    let total = raw.height();
    let current = filter_period(raw, period)?;
    let with_day = with_day_of_month(&current, date_column, DAY)?;
    info!(
        path = %path.display(),
        total,
        in_period = with_day.height(),
        "Loaded dataset"
    );
    Ok(with_day)
}

fn money(name: &str) -> Expr {
    col(name).cast(DataType::Float64)
}

fn text(name: &str) -> Expr {
    col(name).cast(DataType::String)
}

/// Loan book: one row per disbursed loan, with the derived `net_loss`.
pub fn load_loans(path: &Path, period: &str) -> Result<DataFrame> {
    let loans = load_dataset(path, period, "created_datetime_dubai")?
        .lazy()
        .select([
            col(DAY),
            money("order_amount").alias(DISBURSED),
            money("settlement_refund_amount").alias(REFUND),
            money("net_due_amount").alias(RECEIVABLE),
            money("paytabs_processed_amount").alias(REPAID),
            money("net_due_amount_newww").alias(NET_DUE),
            text("first_missed_date").alias(FIRST_MISSED_DATE),
            money("n_missed_days").alias(MISSED_DAYS),
            text("order_status").alias(LOAN_STATUS),
        ])
        .with_column(
            when(
                col(FIRST_MISSED_DATE)
                    .is_not_null()
                    .and(col(MISSED_DAYS).gt_eq(lit(1.0))),
            )
            .then(col(NET_DUE))
            .otherwise(lit(0.0))
            .alias(NET_LOSS),
        )
        .collect()?;
    Ok(loans)
}

pub fn load_installments(path: &Path, period: &str) -> Result<DataFrame> {
    let installments = load_dataset(path, period, "Order Date (UTC Time)")?
        .lazy()
        .select([col(DAY), col("order_id").alias(ORDER_ID)])
        .collect()?;
    Ok(installments)
}

/// Verification attempts. Rows without a status belong to no category and are
/// left out so the per-day status mix is complete.
pub fn load_verifications(path: &Path, period: &str) -> Result<DataFrame> {
    let verifications = load_dataset(path, period, "attempted_at")?
        .lazy()
        .select([
            col(DAY),
            col("user_id").alias(USER_ID),
            text("verification_status").alias(VERIFICATION_STATUS),
        ])
        .filter(col(VERIFICATION_STATUS).is_not_null())
        .collect()?;
    Ok(verifications)
}

pub fn load_orders(path: &Path, period: &str) -> Result<DataFrame> {
    let orders = load_dataset(path, period, "created_at")?
        .lazy()
        .select([
            col(DAY),
            text("merchant_name").alias(MERCHANT),
            money("aed_amount").alias(AMOUNT),
        ])
        .collect()?;
    Ok(orders)
}

pub fn load_missed(path: &Path, period: &str) -> Result<DataFrame> {
    let missed = load_dataset(path, period, "order_date")?
        .lazy()
        .select([
            col(DAY),
            col("order_id").alias(ORDER_ID),
            text("inst_status").alias(INSTALLMENT_STATUS),
        ])
        .collect()?;
    Ok(missed)
}
