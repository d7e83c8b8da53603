// crates/riskdash-core/src/report.rs

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::aggregate;
use crate::charts::{self, Figure};
use crate::config::DashboardConfig;
use crate::error::Result;
use crate::html::{self, Section};
use crate::loader;
use crate::metrics::{
    self, DailyLoanRow, DailyValue, LoanKpis, MerchantDailyValue, MerchantValue, StatusShare,
    VerificationCounts,
};

pub const PAGE_TITLE: &str = "Risk Dashboard";

/// Every table and scalar the page shows, for one reporting period.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub period: String,
    pub loan_kpis: LoanKpis,
    pub verification_counts: VerificationCounts,
    pub daily_loans: Vec<DailyLoanRow>,
    pub active_payments: Vec<DailyValue>,
    pub verification_mix: Vec<StatusShare>,
    pub daily_aov: Vec<DailyValue>,
    pub merchant_aov: Vec<MerchantValue>,
    pub merchant_gmv: Vec<MerchantValue>,
    pub merchant_daily_aov: Vec<MerchantDailyValue>,
    pub merchant_daily_gmv: Vec<MerchantDailyValue>,
    pub missed_installments: Vec<DailyValue>,
}

impl DashboardData {
    /// Run the whole load, aggregate and derive pipeline from the configured
    /// dumps. Any failure aborts the build.
    pub fn build(config: &DashboardConfig) -> Result<Self> {
        let period = config.period.as_str();

        let loans = loader::load_loans(&config.loans_path(), period)?;
        let installments = loader::load_installments(&config.installments_path(), period)?;
        let verifications = loader::load_verifications(&config.verifications_path(), period)?;
        let orders = loader::load_orders(&config.orders_path(), period)?;
        let missed = loader::load_missed(&config.missed_path(), period)?;

        let daily_loans = metrics::daily_loan_rows(&aggregate::daily_loan_summary(&loans)?)?;
        let loan_kpis =
            metrics::loan_kpis(&daily_loans, &aggregate::loan_portfolio_counts(&loans)?)?;

        let verification_counts =
            metrics::verification_counts(&aggregate::verification_totals(&verifications)?)?;
        let verification_mix =
            metrics::status_shares(&aggregate::verification_mix_by_day(&verifications)?)?;

        let active_payments =
            metrics::active_payment_rows(&aggregate::daily_active_payments(&installments)?)?;

        let daily_aov = metrics::daily_values(
            &aggregate::daily_average_order_value(&orders)?,
            aggregate::AOV,
            true,
        )?;
        let merchant_aov =
            metrics::merchant_aov_rows(&aggregate::merchant_average_order_value(&orders)?)?;
        let merchant_gmv = metrics::merchant_gmv_rows(&aggregate::merchant_gross_value(&orders)?)?;
        let merchant_daily_aov = metrics::merchant_daily_values(
            &aggregate::merchant_daily_average_order_value(&orders)?,
            aggregate::AOV,
        )?;
        let merchant_daily_gmv = metrics::merchant_daily_values(
            &aggregate::merchant_daily_gross_value(&orders)?,
            aggregate::GMV,
        )?;

        let missed_installments = metrics::daily_values(
            &aggregate::daily_missed_installments(&missed)?,
            aggregate::PERCENTAGE_OF_USERS,
            false,
        )?;

        info!(
            period,
            days = daily_loans.len(),
            merchants = merchant_aov.len(),
            "Built dashboard data"
        );

        Ok(Self {
            period: config.period.clone(),
            loan_kpis,
            verification_counts,
            daily_loans,
            active_payments,
            verification_mix,
            daily_aov,
            merchant_aov,
            merchant_gmv,
            merchant_daily_aov,
            merchant_daily_gmv,
            missed_installments,
        })
    }

    pub fn merchant_colors(&self) -> BTreeMap<String, String> {
        charts::merchant_colors(self.merchant_aov.iter().map(|row| row.merchant.as_str()))
    }
}

/// Built data plus the ten chart documents, ready to render.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub data: DashboardData,
    pub currency: String,
    pub charts: Vec<Figure>,
}

impl Dashboard {
    pub fn build(config: &DashboardConfig) -> Result<Self> {
        let data = DashboardData::build(config)?;
        Ok(Self::from_data(data, &config.currency))
    }

    pub fn from_data(data: DashboardData, currency: &str) -> Self {
        let colors = data.merchant_colors();
        let charts = vec![
            charts::loans_disbursed_per_day(&data.daily_loans),
            charts::repayments_per_day(&data.daily_loans),
            charts::verification_status_per_day(&data.verification_mix),
            charts::active_payments_per_day(&data.active_payments),
            charts::average_order_value_per_day(&data.daily_aov),
            charts::average_order_value_by_merchant(&data.merchant_aov, &colors, currency),
            charts::average_order_value_by_merchant_daily(&data.merchant_daily_aov, &colors),
            charts::gross_value_by_merchant(&data.merchant_gmv, &colors, currency),
            charts::gross_value_by_merchant_daily(&data.merchant_daily_gmv, &colors),
            charts::missed_installments_per_day(&data.missed_installments),
        ];

        Self {
            data,
            currency: currency.to_string(),
            charts,
        }
    }

    /// The single-page dashboard: loan boxes, the loan charts, verification
    /// boxes, then the remaining charts.
    pub fn render_page(&self) -> Result<String> {
        let mut sections = Vec::with_capacity(self.charts.len() + 2);
        sections.push(Section::Html(html::loan_summary_boxes(
            &self.data.loan_kpis,
            &self.currency,
        )));
        for (idx, chart) in self.charts.iter().enumerate() {
            if idx == 2 {
                sections.push(Section::Html(html::verification_boxes(
                    &self.data.verification_counts,
                )));
            }
            sections.push(Section::Chart(chart));
        }
        html::render_page(PAGE_TITLE, &sections)
    }
}
