use polars::prelude::*;
use serde::Serialize;

use crate::aggregate::{
    ACTIVE_LOANS, ACTIVE_PAYMENTS, AOV, DELINQUENT_LOANS, GMV, PERCENTAGE_LOAN_DISBURSED,
    PERCENTAGE_OF_USERS, REFUND_AMOUNT, TOTAL_LOAN_DISBURSED, TOTAL_RECEIVABLE, TOTAL_REPAYMENT,
    USERS,
};
use crate::error::Result;
use crate::loader::columns::{DAY, MERCHANT, VERIFICATION_STATUS};

pub const PENDING: &str = "pending";
pub const REJECTED: &str = "rejected";
pub const VERIFIED: &str = "verified";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyLoanRow {
    pub day: i64,
    pub disbursed: f64,
    pub refund: f64,
    pub receivable: f64,
    pub repaid: f64,
    pub share_of_disbursed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyValue {
    pub day: i64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusShare {
    pub day: i64,
    pub status: String,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantValue {
    pub merchant: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantDailyValue {
    pub merchant: String,
    pub day: i64,
    pub value: f64,
}

/// Headline loan figures shown in the summary boxes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoanKpis {
    pub total_disbursed: f64,
    pub refund: f64,
    pub receivable: f64,
    pub repaid: f64,
    pub delinquent_loans: i64,
    pub active_loans: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationCounts {
    pub pending: i64,
    pub rejected: i64,
    pub verified: i64,
}

/// Round half to even to zero decimals. Applying it twice changes nothing.
pub fn round_amount(value: f64) -> f64 {
    value.round_ties_even()
}

/// `part / whole * 100` as a float column, `0` wherever `whole` is zero.
pub fn percentage(part: Expr, whole: Expr) -> Expr {
    let whole = whole.cast(DataType::Float64);
    when(whole.clone().eq(lit(0.0)))
        .then(lit(0.0))
        .otherwise(part.cast(DataType::Float64) / whole * lit(100.0))
}

/// Zero-decimal rendering with comma thousands separators: `1234567.4` becomes
/// `1,234,567`.
pub fn format_thousands(value: f64) -> String {
    let rounded = round_amount(value);
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

pub fn format_count(value: i64) -> String {
    format_thousands(value as f64)
}

fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

fn i64_values(df: &DataFrame, name: &str) -> Result<Vec<i64>> {
    let column = df.column(name)?.cast(&DataType::Int64)?;
    Ok(column
        .i64()?
        .into_iter()
        .map(|value| value.unwrap_or(0))
        .collect())
}

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)?.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

// Sums over an all-null day are zero.
fn amount(values: &[Option<f64>], idx: usize) -> f64 {
    values[idx].unwrap_or(0.0)
}

pub fn daily_loan_rows(summary: &DataFrame) -> Result<Vec<DailyLoanRow>> {
    let days = i64_values(summary, DAY)?;
    let disbursed = f64_values(summary, TOTAL_LOAN_DISBURSED)?;
    let refund = f64_values(summary, REFUND_AMOUNT)?;
    let receivable = f64_values(summary, TOTAL_RECEIVABLE)?;
    let repaid = f64_values(summary, TOTAL_REPAYMENT)?;
    let share = f64_values(summary, PERCENTAGE_LOAN_DISBURSED)?;

    Ok((0..days.len())
        .map(|idx| DailyLoanRow {
            day: days[idx],
            disbursed: amount(&disbursed, idx),
            refund: amount(&refund, idx),
            receivable: amount(&receivable, idx),
            repaid: amount(&repaid, idx),
            share_of_disbursed: amount(&share, idx),
        })
        .collect())
}

/// Daily rows for `column`, optionally rounded for display. Days without a
/// value are left out.
pub fn daily_values(df: &DataFrame, column: &str, rounded: bool) -> Result<Vec<DailyValue>> {
    let days = i64_values(df, DAY)?;
    let values = f64_values(df, column)?;
    Ok(days
        .into_iter()
        .zip(values)
        .filter_map(|(day, value)| {
            let value = value?;
            Some(DailyValue {
                day,
                value: if rounded { round_amount(value) } else { value },
            })
        })
        .collect())
}

pub fn active_payment_rows(active: &DataFrame) -> Result<Vec<DailyValue>> {
    daily_values(active, ACTIVE_PAYMENTS, false)
}

pub fn status_shares(mix: &DataFrame) -> Result<Vec<StatusShare>> {
    let days = i64_values(mix, DAY)?;
    let statuses = string_values(mix, VERIFICATION_STATUS)?;
    let percentages = f64_values(mix, PERCENTAGE_OF_USERS)?;
    Ok(days
        .into_iter()
        .zip(statuses)
        .zip(percentages)
        .filter_map(|((day, status), percentage)| {
            Some(StatusShare {
                day,
                status: status?,
                percentage: percentage?,
            })
        })
        .collect())
}

pub fn merchant_values(df: &DataFrame, column: &str) -> Result<Vec<MerchantValue>> {
    let merchants = string_values(df, MERCHANT)?;
    let values = f64_values(df, column)?;
    Ok(merchants
        .into_iter()
        .zip(values)
        .filter_map(|(merchant, value)| {
            Some(MerchantValue {
                merchant: merchant?,
                value: round_amount(value?),
            })
        })
        .collect())
}

pub fn merchant_aov_rows(df: &DataFrame) -> Result<Vec<MerchantValue>> {
    merchant_values(df, AOV)
}

pub fn merchant_gmv_rows(df: &DataFrame) -> Result<Vec<MerchantValue>> {
    merchant_values(df, GMV)
}

pub fn merchant_daily_values(df: &DataFrame, column: &str) -> Result<Vec<MerchantDailyValue>> {
    let merchants = string_values(df, MERCHANT)?;
    let days = i64_values(df, DAY)?;
    let values = f64_values(df, column)?;
    Ok(merchants
        .into_iter()
        .zip(days)
        .zip(values)
        .filter_map(|((merchant, day), value)| {
            Some(MerchantDailyValue {
                merchant: merchant?,
                day,
                value: round_amount(value?),
            })
        })
        .collect())
}

pub fn loan_kpis(daily: &[DailyLoanRow], counts: &DataFrame) -> Result<LoanKpis> {
    let delinquent = i64_values(counts, DELINQUENT_LOANS)?;
    let active = i64_values(counts, ACTIVE_LOANS)?;

    Ok(LoanKpis {
        total_disbursed: daily.iter().map(|row| row.disbursed).sum(),
        refund: daily.iter().map(|row| row.refund).sum(),
        receivable: daily.iter().map(|row| row.receivable).sum(),
        repaid: daily.iter().map(|row| row.repaid).sum(),
        delinquent_loans: delinquent.first().copied().unwrap_or(0),
        active_loans: active.first().copied().unwrap_or(0),
    })
}

pub fn verification_counts(totals: &DataFrame) -> Result<VerificationCounts> {
    let statuses = string_values(totals, VERIFICATION_STATUS)?;
    let users = i64_values(totals, USERS)?;

    let mut counts = VerificationCounts::default();
    for (status, count) in statuses.iter().zip(users) {
        match status.as_deref().unwrap_or_default() {
            PENDING => counts.pending += count,
            REJECTED => counts.rejected += count,
            VERIFIED => counts.verified += count,
            _ => {}
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_are_grouped() {
        assert_eq!(format_thousands(0.0), "0");
        assert_eq!(format_thousands(999.4), "999");
        assert_eq!(format_thousands(1000.0), "1,000");
        assert_eq!(format_thousands(1234567.4), "1,234,567");
        assert_eq!(format_thousands(-98765.0), "-98,765");
        assert_eq!(format_count(12), "12");
    }

    #[test]
    fn rounding_is_half_even_and_idempotent() {
        assert_eq!(round_amount(2.5), 2.0);
        assert_eq!(round_amount(3.5), 4.0);
        assert_eq!(round_amount(-1.6), -2.0);
        for value in [0.49, 10.5, 123.456, -7.5, 1e9 + 0.5] {
            let once = round_amount(value);
            assert_eq!(round_amount(once), once);
        }
    }

    #[test]
    fn percentage_of_nothing_is_zero() -> Result<()> {
        let df = df!(
            "part" => &[1i64, 5, 0],
            "whole" => &[4u32, 0, 0],
        )?;

        let shares = df
            .lazy()
            .select([percentage(col("part"), col("whole")).alias("share")])
            .collect()?;
        let shares: Vec<Option<f64>> = shares.column("share")?.f64()?.into_iter().collect();
        assert_eq!(shares, vec![Some(25.0), Some(0.0), Some(0.0)]);
        Ok(())
    }

    #[test]
    fn rows_without_a_value_are_skipped() -> Result<()> {
        let daily = df!(
            DAY => &[1i64, 2, 3],
            AOV => &[Some(120.4), None, Some(99.5)],
        )?;
        assert_eq!(
            daily_values(&daily, AOV, true)?,
            vec![
                DailyValue { day: 1, value: 120.0 },
                DailyValue { day: 3, value: 100.0 },
            ]
        );

        let merchants = df!(
            MERCHANT => &[Some("Alpha Store"), Some("Zeta Mart"), None],
            AOV => &[None, Some(42.0), Some(7.0)],
        )?;
        assert_eq!(
            merchant_aov_rows(&merchants)?,
            vec![MerchantValue {
                merchant: "Zeta Mart".to_string(),
                value: 42.0,
            }]
        );
        Ok(())
    }

    #[test]
    fn verification_counts_pick_known_statuses() -> Result<()> {
        let totals = df!(
            VERIFICATION_STATUS => &["pending", "rejected", "unknown", "verified"],
            USERS => &[3u32, 1, 9, 6],
        )?;

        let counts = verification_counts(&totals)?;
        assert_eq!(
            counts,
            VerificationCounts {
                pending: 3,
                rejected: 1,
                verified: 6,
            }
        );
        Ok(())
    }
}
