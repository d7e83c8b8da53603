use polars::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::loader::columns::*;
use crate::metrics::percentage;

pub const TOTAL_LOAN_DISBURSED: &str = "total_loan_disbursed";
pub const REFUND_AMOUNT: &str = "refund_amount";
pub const TOTAL_RECEIVABLE: &str = "total_receivable";
pub const TOTAL_REPAYMENT: &str = "total_repayment";
pub const PERCENTAGE_LOAN_DISBURSED: &str = "percentage_loan_disbursed";

pub const ACTIVE_PAYMENTS: &str = "active_payments";

pub const USERS: &str = "users";
pub const TOTAL_USERS: &str = "total_users";
pub const PERCENTAGE_OF_USERS: &str = "percentage_of_users";

pub const AOV: &str = "aov";
pub const GMV: &str = "gmv";

pub const MISSED_COUNT: &str = "missed_count";
pub const INSTALLMENT_COUNT: &str = "count";

pub const DELINQUENT_LOANS: &str = "delinquent_loans";
pub const ACTIVE_LOANS: &str = "active_loans";

const MISSED: &str = "MISSED";
const ACTIVE: &str = "ACTIVE";

/// Rows that carry a day. Undated rows only count toward period-wide figures.
fn dated(df: &DataFrame) -> LazyFrame {
    df.clone().lazy().filter(col(DAY).is_not_null())
}

/// Daily disbursed, refunded, receivable and repaid totals, with each day's
/// share of the period's disbursement.
pub fn daily_loan_summary(loans: &DataFrame) -> Result<DataFrame> {
    let summary = dated(loans)
        .group_by([col(DAY)])
        .agg([
            col(DISBURSED).sum().alias(TOTAL_LOAN_DISBURSED),
            col(REFUND).sum().alias(REFUND_AMOUNT),
            col(RECEIVABLE).sum().alias(TOTAL_RECEIVABLE),
            col(REPAID).sum().alias(TOTAL_REPAYMENT),
        ])
        .with_column(
            percentage(col(TOTAL_LOAN_DISBURSED), col(TOTAL_LOAN_DISBURSED).sum())
                .alias(PERCENTAGE_LOAN_DISBURSED),
        )
        .sort([DAY], SortMultipleOptions::default())
        .collect()?;
    debug!(days = summary.height(), "Aggregated daily loan summary");
    Ok(summary)
}

/// Delinquent and active loan counts over the whole period, as a one-row frame.
pub fn loan_portfolio_counts(loans: &DataFrame) -> Result<DataFrame> {
    let counts = loans
        .clone()
        .lazy()
        .select([
            col(FIRST_MISSED_DATE)
                .is_not_null()
                .and(col(NET_LOSS).gt(lit(0.0)))
                .cast(DataType::Int64)
                .sum()
                .alias(DELINQUENT_LOANS),
            col(LOAN_STATUS)
                .eq(lit(ACTIVE))
                .cast(DataType::Int64)
                .sum()
                .alias(ACTIVE_LOANS),
        ])
        .collect()?;
    Ok(counts)
}

pub fn daily_active_payments(installments: &DataFrame) -> Result<DataFrame> {
    let active = dated(installments)
        .group_by([col(DAY)])
        .agg([col(ORDER_ID).count().alias(ACTIVE_PAYMENTS)])
        .sort([DAY], SortMultipleOptions::default())
        .collect()?;
    debug!(days = active.height(), "Aggregated active payments");
    Ok(active)
}

pub fn verification_totals(verifications: &DataFrame) -> Result<DataFrame> {
    let totals = verifications
        .clone()
        .lazy()
        .group_by([col(VERIFICATION_STATUS)])
        .agg([col(USER_ID).count().alias(USERS)])
        .sort([VERIFICATION_STATUS], SortMultipleOptions::default())
        .collect()?;
    Ok(totals)
}

/// Share of each verification status among the day's attempts, in percent.
pub fn verification_mix_by_day(verifications: &DataFrame) -> Result<DataFrame> {
    let per_status = dated(verifications)
        .group_by([col(DAY), col(VERIFICATION_STATUS)])
        .agg([col(USER_ID).count().alias(USERS)]);

    let per_day = dated(verifications)
        .group_by([col(DAY)])
        .agg([col(USER_ID).count().alias(TOTAL_USERS)]);

    let mix = per_status
        .join(
            per_day,
            [col(DAY)],
            [col(DAY)],
            JoinArgs::new(JoinType::Inner),
        )
        .with_column(percentage(col(USERS), col(TOTAL_USERS)).alias(PERCENTAGE_OF_USERS))
        .select([col(DAY), col(VERIFICATION_STATUS), col(PERCENTAGE_OF_USERS)])
        .sort([DAY, VERIFICATION_STATUS], SortMultipleOptions::default())
        .collect()?;
    debug!(rows = mix.height(), "Aggregated verification mix");
    Ok(mix)
}

pub fn daily_average_order_value(orders: &DataFrame) -> Result<DataFrame> {
    let aov = dated(orders)
        .group_by([col(DAY)])
        .agg([col(AMOUNT).mean().alias(AOV)])
        .sort([DAY], SortMultipleOptions::default())
        .collect()?;
    Ok(aov)
}

pub fn merchant_average_order_value(orders: &DataFrame) -> Result<DataFrame> {
    merchant_aggregate(orders, col(AMOUNT).mean().alias(AOV))
}

pub fn merchant_gross_value(orders: &DataFrame) -> Result<DataFrame> {
    merchant_aggregate(orders, col(AMOUNT).sum().alias(GMV))
}

pub fn merchant_daily_average_order_value(orders: &DataFrame) -> Result<DataFrame> {
    merchant_daily_aggregate(orders, col(AMOUNT).mean().alias(AOV))
}

pub fn merchant_daily_gross_value(orders: &DataFrame) -> Result<DataFrame> {
    merchant_daily_aggregate(orders, col(AMOUNT).sum().alias(GMV))
}

fn merchant_aggregate(orders: &DataFrame, aggregation: Expr) -> Result<DataFrame> {
    let frame = orders
        .clone()
        .lazy()
        .group_by([col(MERCHANT)])
        .agg([aggregation])
        .sort([MERCHANT], SortMultipleOptions::default())
        .collect()?;
    debug!(merchants = frame.height(), "Aggregated merchant values");
    Ok(frame)
}

fn merchant_daily_aggregate(orders: &DataFrame, aggregation: Expr) -> Result<DataFrame> {
    let frame = dated(orders)
        .group_by([col(MERCHANT), col(DAY)])
        .agg([aggregation])
        .sort([MERCHANT, DAY], SortMultipleOptions::default())
        .collect()?;
    Ok(frame)
}

/// Missed installments per day and their share of the day's installments.
pub fn daily_missed_installments(missed: &DataFrame) -> Result<DataFrame> {
    let grouped = dated(missed)
        .group_by([col(DAY)])
        .agg([
            col(INSTALLMENT_STATUS)
                .eq(lit(MISSED))
                .cast(DataType::Int64)
                .sum()
                .alias(MISSED_COUNT),
            col(ORDER_ID).count().alias(INSTALLMENT_COUNT),
        ])
        .with_column(
            percentage(col(MISSED_COUNT), col(INSTALLMENT_COUNT)).alias(PERCENTAGE_OF_USERS),
        )
        .sort([DAY], SortMultipleOptions::default())
        .collect()?;
    debug!(days = grouped.height(), "Aggregated missed installments");
    Ok(grouped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loans() -> DataFrame {
        df!(
            DAY => &[1i64, 1, 2, 3],
            DISBURSED => &[100.0f64, 200.0, 300.0, 400.0],
            REFUND => &[0.0f64, 10.0, 0.0, 5.0],
            RECEIVABLE => &[110.0f64, 220.0, 330.0, 440.0],
            REPAID => &[50.0f64, 0.0, 100.0, 0.0],
            FIRST_MISSED_DATE => &[None, Some("2024-05-20"), None, Some("2024-05-25")],
            NET_LOSS => &[0.0f64, 220.0, 0.0, 0.0],
            LOAN_STATUS => &["ACTIVE", "ACTIVE", "CLOSED", "ACTIVE"],
        )
        .expect("loan frame")
    }

    #[test]
    fn daily_summary_sums_per_day() -> Result<()> {
        let summary = daily_loan_summary(&loans())?;

        let days: Vec<Option<i64>> = summary.column(DAY)?.i64()?.into_iter().collect();
        assert_eq!(days, vec![Some(1), Some(2), Some(3)]);

        let totals: Vec<Option<f64>> = summary
            .column(TOTAL_LOAN_DISBURSED)?
            .f64()?
            .into_iter()
            .collect();
        assert_eq!(totals, vec![Some(300.0), Some(300.0), Some(400.0)]);

        let share = summary.column(PERCENTAGE_LOAN_DISBURSED)?.f64()?;
        assert!((share.get(0).unwrap_or_default() - 30.0).abs() < 1e-9);
        assert!((share.get(2).unwrap_or_default() - 40.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn portfolio_counts_delinquent_and_active() -> Result<()> {
        let counts = loan_portfolio_counts(&loans())?;
        assert_eq!(counts.column(DELINQUENT_LOANS)?.i64()?.get(0), Some(1));
        assert_eq!(counts.column(ACTIVE_LOANS)?.i64()?.get(0), Some(3));
        Ok(())
    }

    #[test]
    fn undated_loans_count_toward_the_portfolio_only() -> Result<()> {
        let loans = df!(
            DAY => &[Some(1i64), None],
            DISBURSED => &[100.0f64, 300.0],
            REFUND => &[0.0f64, 0.0],
            RECEIVABLE => &[105.0f64, 315.0],
            REPAID => &[0.0f64, 0.0],
            FIRST_MISSED_DATE => &[None, Some("2024-06-20")],
            NET_LOSS => &[0.0f64, 315.0],
            LOAN_STATUS => &["ACTIVE", "ACTIVE"],
        )?;

        let counts = loan_portfolio_counts(&loans)?;
        assert_eq!(counts.column(DELINQUENT_LOANS)?.i64()?.get(0), Some(1));
        assert_eq!(counts.column(ACTIVE_LOANS)?.i64()?.get(0), Some(2));

        let summary = daily_loan_summary(&loans)?;
        assert_eq!(summary.height(), 1);
        assert_eq!(summary.column(TOTAL_LOAN_DISBURSED)?.f64()?.get(0), Some(100.0));
        assert_eq!(summary.column(PERCENTAGE_LOAN_DISBURSED)?.f64()?.get(0), Some(100.0));
        Ok(())
    }

    #[test]
    fn undated_verifications_stay_in_the_totals() -> Result<()> {
        let verifications = df!(
            DAY => &[Some(1i64), Some(1), None],
            USER_ID => &["u1", "u2", "u3"],
            VERIFICATION_STATUS => &["verified", "pending", "verified"],
        )?;

        let totals = verification_totals(&verifications)?;
        let users: Vec<Option<u32>> = totals
            .column(USERS)?
            .cast(&DataType::UInt32)?
            .u32()?
            .into_iter()
            .collect();
        assert_eq!(users, vec![Some(1), Some(2)]);

        let mix = verification_mix_by_day(&verifications)?;
        let pct: Vec<Option<f64>> = mix.column(PERCENTAGE_OF_USERS)?.f64()?.into_iter().collect();
        assert_eq!(pct, vec![Some(50.0), Some(50.0)]);
        Ok(())
    }

    #[test]
    fn zero_disbursement_gives_a_zero_share() -> Result<()> {
        let loans = df!(
            DAY => &[Some(4i64), Some(5)],
            DISBURSED => &[0.0f64, 0.0],
            REFUND => &[0.0f64, 0.0],
            RECEIVABLE => &[0.0f64, 0.0],
            REPAID => &[0.0f64, 0.0],
        )?;

        let summary = daily_loan_summary(&loans)?;
        let share: Vec<Option<f64>> = summary
            .column(PERCENTAGE_LOAN_DISBURSED)?
            .f64()?
            .into_iter()
            .collect();
        assert_eq!(share, vec![Some(0.0), Some(0.0)]);
        Ok(())
    }

    #[test]
    fn day_without_order_ids_has_a_zero_missed_share() -> Result<()> {
        let missed = df!(
            DAY => &[Some(6i64), Some(6)],
            ORDER_ID => &[None::<&str>, None],
            INSTALLMENT_STATUS => &["MISSED", "PAID"],
        )?;

        let grouped = daily_missed_installments(&missed)?;
        assert_eq!(grouped.column(PERCENTAGE_OF_USERS)?.f64()?.get(0), Some(0.0));
        Ok(())
    }

    #[test]
    fn missed_share_counts_only_missed_status() -> Result<()> {
        let missed = df!(
            DAY => &[4i64, 4, 4, 4, 5],
            ORDER_ID => &["a", "b", "c", "d", "e"],
            INSTALLMENT_STATUS => &["MISSED", "PAID", "MISSED", "PAID", "PAID"],
        )?;

        let grouped = daily_missed_installments(&missed)?;
        let pct = grouped.column(PERCENTAGE_OF_USERS)?.f64()?;
        assert_eq!(pct.get(0), Some(50.0));
        assert_eq!(pct.get(1), Some(0.0));
        Ok(())
    }
}
