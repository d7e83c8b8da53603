use std::fmt::Write;

use crate::charts::Figure;
use crate::error::Result;
use crate::metrics::{format_count, format_thousands, LoanKpis, VerificationCounts};

pub const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

const STYLE: &str = r#"
        body {
            font-family: "Source Sans Pro", sans-serif;
            margin: 0 auto;
            padding: 24px;
            max-width: 1500px;
        }
        .summary-container {
            display: flex;
            flex-wrap: wrap;
            gap: 20px;
        }
        .summary-box {
            background: #f4f4f4;
            border-radius: 8px;
            padding: 20px;
            text-align: center;
            width: calc(25% - 20px);
            box-shadow: 0 2px 4px rgba(0, 0, 0, 0.1);
            box-sizing: border-box;
        }
        .summary-box h3 {
            margin: 10px 0;
            font-size: 1.5em;
            color: #333;
        }
        .verification-container {
            display: flex;
            flex-wrap: wrap;
            gap: 20px;
            margin-top: 20px;
        }
        .verification-box {
            background: #f4f4f4;
            border-radius: 8px;
            padding: 20px;
            text-align: center;
            width: calc(29% - 20px);
        }
        .verification-pending {
            background-color: #FFF898;
        }
        .verification-rejected {
            background-color: #ffe5e5;
        }
        .verification-verified {
            background-color: #e5ffe5;
        }
        .verification-box h4 {
            margin: 0;
            font-size: 1em;
            color: #555;
        }
        .verification-box h3 {
            font-size: 2em;
            margin: 0;
        }
        .chart {
            width: 100%;
            margin-top: 24px;
        }
"#;

/// Escape text for HTML element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// JSON is embedded in a `<script>` element, where a literal `</` would end it.
fn script_safe(json: &str) -> String {
    json.replace("</", "<\\/")
}

fn summary_box(out: &mut String, label: &str, value: &str) {
    let _ = write!(
        out,
        "\n        <div class=\"summary-box\">\n            <p>{}</p>\n            <h3>{}</h3>\n        </div>",
        escape(label),
        escape(value)
    );
}

pub fn loan_summary_boxes(kpis: &LoanKpis, currency: &str) -> String {
    let money = |value: f64| format!("{} {}", format_thousands(value), currency);

    let mut out = String::from("<div class=\"summary-container\">");
    summary_box(&mut out, "Total Loans Disbursed", &money(kpis.total_disbursed));
    summary_box(&mut out, "Refund Amount", &money(kpis.refund));
    summary_box(&mut out, "Total Receivable Amount", &money(kpis.receivable));
    summary_box(&mut out, "Total Paid Amount", &money(kpis.repaid));
    summary_box(
        &mut out,
        "Loan Delinquency Rate",
        &format_count(kpis.delinquent_loans),
    );
    summary_box(
        &mut out,
        "Number of Active Loans",
        &format_count(kpis.active_loans),
    );
    out.push_str("\n    </div>");
    out
}

pub fn verification_boxes(counts: &VerificationCounts) -> String {
    let mut out = String::from("<div class=\"verification-container\">");
    for (class, label, count) in [
        ("pending", "PENDING", counts.pending),
        ("rejected", "REJECTED", counts.rejected),
        ("verified", "VERIFIED", counts.verified),
    ] {
        let _ = write!(
            out,
            "\n        <div class=\"verification-box verification-{class}\">\n            <h4>{label}</h4>\n            <h3>{}</h3>\n        </div>",
            format_count(count)
        );
    }
    out.push_str("\n    </div>");
    out
}

/// Page sections in display order.
pub enum Section<'a> {
    Html(String),
    Chart(&'a Figure),
}

pub fn render_page(title: &str, sections: &[Section<'_>]) -> Result<String> {
    let mut body = String::new();
    let mut scripts = String::new();

    for section in sections {
        match section {
            Section::Html(html) => {
                let _ = write!(body, "\n    {html}");
            }
            Section::Chart(figure) => {
                let id = escape(&figure.id);
                let data = script_safe(&serde_json::to_string(&figure.data)?);
                let layout = script_safe(&serde_json::to_string(&figure.layout)?);
                let _ = write!(body, "\n    <div id=\"{id}\" class=\"chart\"></div>");
                let _ = write!(
                    scripts,
                    "\n        Plotly.newPlot(\"{id}\", {data}, {layout}, {{\"responsive\": true}});"
                );
            }
        }
    }

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <script src="{PLOTLY_CDN}"></script>
    <style>{STYLE}    </style>
</head>
<body>{body}
    <script>{scripts}
    </script>
</body>
</html>
"#,
        title = escape(title),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::{Layout, Trace};

    #[test]
    fn loan_boxes_show_currency_and_counts() {
        let kpis = LoanKpis {
            total_disbursed: 1_250_000.4,
            refund: 0.0,
            receivable: 990.0,
            repaid: 12_345.0,
            delinquent_loans: 1_204,
            active_loans: 7,
        };

        let html = loan_summary_boxes(&kpis, "QAR");
        assert!(html.contains("<h3>1,250,000 QAR</h3>"));
        assert!(html.contains("<h3>0 QAR</h3>"));
        assert!(html.contains("<h3>12,345 QAR</h3>"));
        assert!(html.contains("<p>Loan Delinquency Rate</p>\n            <h3>1,204</h3>"));
        assert!(html.contains("<h3>7</h3>"));
        assert_eq!(html.matches("summary-box").count(), 6);
    }

    #[test]
    fn verification_boxes_are_ordered() {
        let html = verification_boxes(&VerificationCounts {
            pending: 2,
            rejected: 1_500,
            verified: 40,
        });
        let pending = html.find("PENDING").expect("pending");
        let rejected = html.find("REJECTED").expect("rejected");
        let verified = html.find("VERIFIED").expect("verified");
        assert!(pending < rejected && rejected < verified);
        assert!(html.contains("<h3>1,500</h3>"));
    }

    #[test]
    fn script_payload_cannot_close_the_script_tag() -> Result<()> {
        let figure = Figure {
            id: "m".to_string(),
            data: vec![Trace {
                kind: "bar",
                name: Some("</script><b>".to_string()),
                ..Trace::default()
            }],
            layout: Layout::default(),
        };

        let page = render_page("Risk <Dashboard>", &[Section::Chart(&figure)])?;
        assert!(!page.contains("</script><b>"));
        assert!(page.contains("<\\/script><b>"));
        assert!(page.contains("<title>Risk &lt;Dashboard&gt;</title>"));
        assert!(page.contains("Plotly.newPlot(\"m\""));
        Ok(())
    }
}
