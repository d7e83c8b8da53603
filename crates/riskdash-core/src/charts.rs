//! plotly.js figure documents for the dashboard.
//!
//! Each builder maps one aggregated table to one figure with fixed styling.
//! Value labels are pre-formatted here so the page needs no plotly text
//! templates.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};

use crate::metrics::{
    format_thousands, round_amount, DailyLoanRow, DailyValue, MerchantDailyValue, MerchantValue,
    StatusShare, PENDING, REJECTED, VERIFIED,
};

/// plotly's default qualitative colour sequence.
pub const QUALITATIVE_PALETTE: [&str; 10] = [
    "#636EFA", "#EF553B", "#00CC96", "#AB63FA", "#FFA15A", "#19D3F3", "#FF6692", "#B6E880",
    "#FF97FF", "#FECB52",
];

pub const PRIMARY_LINE_COLOR: &str = "#636efa";

const MARKER_SIZE: u32 = 8;
const LABEL_POSITION: &str = "top right";
const MERCHANT_FONT_SIZE: u32 = 14;
const MERCHANT_LINE_HEIGHT: u32 = 500;
const BAR_WIDTH: u32 = 1400;
const BAR_HEIGHT: u32 = 400;
const BAR_LABEL_SIZE: u32 = 19;

#[derive(Debug, Clone, Serialize)]
pub struct Figure {
    #[serde(skip)]
    pub id: String,
    pub data: Vec<Trace>,
    pub layout: Layout,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub x: Vec<Value>,
    pub y: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub text: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub textposition: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub textfont: Option<Font>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<Line>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Layout {
    pub title: Title,
    pub xaxis: Axis,
    pub yaxis: Axis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<Font>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Title {
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Axis {
    pub title: Title,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickmode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dtick: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Line {
    pub shape: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Marker {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Font {
    pub size: u32,
}

impl Figure {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn titled(text: &str) -> Title {
    Title {
        text: text.to_string(),
    }
}

fn day_axis(text: &str) -> Axis {
    Axis {
        title: titled(text),
        tickmode: Some("linear"),
        dtick: Some(1),
        range: None,
    }
}

fn value_axis(text: &str) -> Axis {
    Axis {
        title: titled(text),
        ..Axis::default()
    }
}

fn whole(value: f64) -> String {
    format!("{:.0}", round_amount(value))
}

fn percent(value: f64) -> String {
    format!("{:.0}%", round_amount(value))
}

/// Spline line with markers and a label above each point.
fn spline(name: Option<String>, points: &[(i64, f64)], labels: Vec<String>, color: Option<String>) -> Trace {
    Trace {
        kind: "scatter",
        name,
        x: points.iter().map(|(day, _)| json!(day)).collect(),
        y: points.iter().map(|(_, value)| *value).collect(),
        mode: Some("lines+markers+text"),
        text: labels,
        textposition: Some(LABEL_POSITION),
        line: Some(Line {
            shape: "spline",
            color,
        }),
        marker: Some(Marker {
            size: Some(MARKER_SIZE),
            color: None,
        }),
        ..Trace::default()
    }
}

fn daily_line(id: &str, title: &str, x_title: &str, y_title: &str, rows: &[DailyValue]) -> Figure {
    let points: Vec<(i64, f64)> = rows.iter().map(|row| (row.day, row.value)).collect();
    let labels = rows.iter().map(|row| whole(row.value)).collect();
    Figure {
        id: id.to_string(),
        data: vec![spline(
            None,
            &points,
            labels,
            Some(PRIMARY_LINE_COLOR.to_string()),
        )],
        layout: Layout {
            title: titled(title),
            xaxis: day_axis(x_title),
            yaxis: value_axis(y_title),
            ..Layout::default()
        },
    }
}

/// Colour per merchant, assigned in merchant-name order from the qualitative
/// palette and cycling once it runs out.
pub fn merchant_colors<'a, I>(merchants: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut names: Vec<&str> = merchants.into_iter().collect();
    names.sort_unstable();
    names.dedup();
    names
        .into_iter()
        .zip(QUALITATIVE_PALETTE.iter().cycle())
        .map(|(name, color)| (name.to_string(), color.to_string()))
        .collect()
}

pub fn verification_color(status: &str) -> Option<&'static str> {
    match status {
        VERIFIED => Some("green"),
        PENDING => Some("#fff033"),
        REJECTED => Some("red"),
        _ => None,
    }
}

pub fn loans_disbursed_per_day(rows: &[DailyLoanRow]) -> Figure {
    let daily: Vec<DailyValue> = rows
        .iter()
        .map(|row| DailyValue {
            day: row.day,
            value: row.disbursed,
        })
        .collect();
    daily_line(
        "loans-disbursed",
        "Total Loans Disbursed per Day",
        "Day of Month",
        "Total Loans",
        &daily,
    )
}

pub fn repayments_per_day(rows: &[DailyLoanRow]) -> Figure {
    let receivable: Vec<(i64, f64)> = rows.iter().map(|row| (row.day, row.receivable)).collect();
    let repaid: Vec<(i64, f64)> = rows.iter().map(|row| (row.day, row.repaid)).collect();
    Figure {
        id: "repayments".to_string(),
        data: vec![
            spline(
                Some("Receivable".to_string()),
                &receivable,
                rows.iter().map(|row| whole(row.receivable)).collect(),
                Some(QUALITATIVE_PALETTE[1].to_string()),
            ),
            spline(
                Some("Repaid".to_string()),
                &repaid,
                rows.iter().map(|row| whole(row.repaid)).collect(),
                Some(QUALITATIVE_PALETTE[2].to_string()),
            ),
        ],
        layout: Layout {
            title: titled("Repayments vs Receivables per Day"),
            xaxis: day_axis("Day of Month"),
            yaxis: value_axis("Amount"),
            ..Layout::default()
        },
    }
}

pub fn verification_status_per_day(shares: &[StatusShare]) -> Figure {
    let mut by_status: BTreeMap<&str, Vec<&StatusShare>> = BTreeMap::new();
    for share in shares {
        by_status.entry(share.status.as_str()).or_default().push(share);
    }

    let data = by_status
        .into_iter()
        .map(|(status, rows)| {
            let points: Vec<(i64, f64)> = rows.iter().map(|row| (row.day, row.percentage)).collect();
            let labels = rows.iter().map(|row| percent(row.percentage)).collect();
            spline(
                Some(status.to_string()),
                &points,
                labels,
                verification_color(status).map(str::to_string),
            )
        })
        .collect();

    Figure {
        id: "verifications".to_string(),
        data,
        layout: Layout {
            title: titled("Verification Status per Day"),
            xaxis: day_axis("Day of Attempted Verification"),
            yaxis: value_axis("% of Users"),
            ..Layout::default()
        },
    }
}

pub fn active_payments_per_day(rows: &[DailyValue]) -> Figure {
    daily_line(
        "active-payments",
        "Active Payments per Day",
        "Day of Month",
        "Active Payments",
        rows,
    )
}

pub fn average_order_value_per_day(rows: &[DailyValue]) -> Figure {
    daily_line(
        "aov",
        "Average Order Value per day",
        "Day of created date",
        "Average Order Value",
        rows,
    )
}

/// One bar per merchant with `1,234 QAR` labels inside the bars. The y axis
/// leaves headroom of one mean above the tallest bar.
fn merchant_bars(
    id: &str,
    title: &str,
    y_title: &str,
    rows: &[MerchantValue],
    colors: &BTreeMap<String, String>,
    currency: &str,
) -> Figure {
    let data = rows
        .iter()
        .map(|row| Trace {
            kind: "bar",
            name: Some(row.merchant.clone()),
            x: vec![json!(row.merchant)],
            y: vec![row.value],
            text: vec![format!("{} {}", format_thousands(row.value), currency)],
            textposition: Some("inside"),
            textfont: Some(Font {
                size: BAR_LABEL_SIZE,
            }),
            marker: Some(Marker {
                size: None,
                color: colors.get(&row.merchant).cloned(),
            }),
            ..Trace::default()
        })
        .collect();

    let range = if rows.is_empty() {
        None
    } else {
        let max = rows.iter().map(|row| row.value).fold(f64::MIN, f64::max);
        let mean = rows.iter().map(|row| row.value).sum::<f64>() / rows.len() as f64;
        Some([0.0, max + mean])
    };

    Figure {
        id: id.to_string(),
        data,
        layout: Layout {
            title: titled(title),
            xaxis: value_axis("Merchant"),
            yaxis: Axis {
                range,
                ..value_axis(y_title)
            },
            width: Some(BAR_WIDTH),
            height: Some(BAR_HEIGHT),
            font: None,
        },
    }
}

fn merchant_lines(
    id: &str,
    title: &str,
    y_title: &str,
    rows: &[MerchantDailyValue],
    colors: &BTreeMap<String, String>,
) -> Figure {
    let mut by_merchant: BTreeMap<&str, Vec<(i64, f64)>> = BTreeMap::new();
    for row in rows {
        by_merchant
            .entry(row.merchant.as_str())
            .or_default()
            .push((row.day, row.value));
    }

    let data = by_merchant
        .into_iter()
        .map(|(merchant, points)| {
            let labels = points.iter().map(|(_, value)| whole(*value)).collect();
            spline(
                Some(merchant.to_string()),
                &points,
                labels,
                colors.get(merchant).cloned(),
            )
        })
        .collect();

    Figure {
        id: id.to_string(),
        data,
        layout: Layout {
            title: titled(title),
            xaxis: Axis {
                dtick: None,
                ..day_axis("Day")
            },
            yaxis: value_axis(y_title),
            width: None,
            height: Some(MERCHANT_LINE_HEIGHT),
            font: Some(Font {
                size: MERCHANT_FONT_SIZE,
            }),
        },
    }
}

pub fn average_order_value_by_merchant(
    rows: &[MerchantValue],
    colors: &BTreeMap<String, String>,
    currency: &str,
) -> Figure {
    merchant_bars(
        "merchant-aov",
        "Average Order Value by Merchant",
        "Average Order Value",
        rows,
        colors,
        currency,
    )
}

pub fn average_order_value_by_merchant_daily(
    rows: &[MerchantDailyValue],
    colors: &BTreeMap<String, String>,
) -> Figure {
    merchant_lines(
        "merchant-aov-daily",
        "AOV by Merchant daily",
        "Average Order Value",
        rows,
        colors,
    )
}

pub fn gross_value_by_merchant(
    rows: &[MerchantValue],
    colors: &BTreeMap<String, String>,
    currency: &str,
) -> Figure {
    merchant_bars("merchant-gmv", "GMV by Merchant", "GMV", rows, colors, currency)
}

pub fn gross_value_by_merchant_daily(
    rows: &[MerchantDailyValue],
    colors: &BTreeMap<String, String>,
) -> Figure {
    merchant_lines(
        "merchant-gmv-daily",
        "GMV by Merchant daily",
        "GMV",
        rows,
        colors,
    )
}

pub fn missed_installments_per_day(rows: &[DailyValue]) -> Figure {
    let points: Vec<(i64, f64)> = rows.iter().map(|row| (row.day, row.value)).collect();
    let labels = rows.iter().map(|row| percent(row.value)).collect();
    Figure {
        id: "missed".to_string(),
        data: vec![spline(None, &points, labels, None)],
        layout: Layout {
            title: titled("Missed Installments per Day"),
            xaxis: day_axis("Day of Order Date"),
            yaxis: value_axis("% of Users"),
            width: None,
            height: Some(MERCHANT_LINE_HEIGHT),
            font: Some(Font {
                size: MERCHANT_FONT_SIZE,
            }),
        },
    }
}
