mod server;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Table};
use riskdash_core::metrics::{format_count, format_thousands};
use riskdash_core::{Dashboard, DashboardConfig, DashboardData};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Loan risk dashboard builder and server", long_about = None)]
struct Cli {
    /// Optional TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the dashboard page and write it to disk
    Render(RenderArgs),
    /// Serve the dashboard over HTTP, rebuilding it on every page load
    Serve(ServeArgs),
    /// Print the headline figures as a table
    Summary,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Where to write the HTML page
    #[arg(long, short, default_value = "dashboard.html")]
    output: PathBuf,
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Address to listen on; overrides the configured bind address
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let config = DashboardConfig::load(cli.config.as_deref())
        .context("failed to load dashboard configuration")?;

    match cli.command {
        Command::Render(args) => handle_render(&config, args),
        Command::Serve(args) => handle_serve(config, args).await,
        Command::Summary => handle_summary(&config),
    }
}

fn handle_render(config: &DashboardConfig, args: RenderArgs) -> Result<()> {
    let dashboard = Dashboard::build(config).context("failed to build dashboard")?;
    let page = dashboard.render_page()?;
    std::fs::write(&args.output, page)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!(output = %args.output.display(), charts = dashboard.charts.len(), "Dashboard written");
    Ok(())
}

async fn handle_serve(mut config: DashboardConfig, args: ServeArgs) -> Result<()> {
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    server::serve(config).await
}

fn handle_summary(config: &DashboardConfig) -> Result<()> {
    let data = DashboardData::build(config).context("failed to build dashboard data")?;
    println!("{}", summary_table(&data, &config.currency));
    Ok(())
}

fn summary_table(data: &DashboardData, currency: &str) -> Table {
    let kpis = &data.loan_kpis;
    let counts = &data.verification_counts;
    let money = |value: f64| format!("{} {}", format_thousands(value), currency);

    let rows = [
        ("Total Loans Disbursed", money(kpis.total_disbursed)),
        ("Refund Amount", money(kpis.refund)),
        ("Total Receivable Amount", money(kpis.receivable)),
        ("Total Paid Amount", money(kpis.repaid)),
        ("Loan Delinquency Rate", format_count(kpis.delinquent_loans)),
        ("Number of Active Loans", format_count(kpis.active_loans)),
        ("Verifications Pending", format_count(counts.pending)),
        ("Verifications Rejected", format_count(counts.rejected)),
        ("Verifications Verified", format_count(counts.verified)),
    ];

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec![format!("Metric ({})", data.period), "Value".to_string()]);
    for (label, value) in rows {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
