use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use tracing::{info, warn};

mod error;
mod loader;
mod metrics;
mod models;
mod report;

use metrics::Strategy;
use report::OutputFormat;

#[derive(Parser)]
#[command(name = "active-user-metrics")]
#[command(about = "Rolling daily, weekly and monthly active users from an activity log", long_about = None)]
#[command(version)]
struct Cli {
    /// Activity CSV with `active_date_timestamp` and `user_id` columns
    #[arg(long, env = "ACTIVE_USERS_INPUT", default_value = "user_data.csv")]
    input: PathBuf,

    /// Where to write the metrics table
    #[arg(long, env = "ACTIVE_USERS_OUTPUT", default_value = "dau_wau_mau.csv")]
    out: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Insert placeholder rows for calendar days with no activity
    #[arg(long, default_value_t = false)]
    fill_missing_dates: bool,

    #[arg(long, value_enum, default_value_t = Strategy::Indexed)]
    strategy: Strategy,

    /// Dates left out of the report as known outliers
    #[arg(
        long = "exclude-date",
        env = "ACTIVE_USERS_EXCLUDE_DATES",
        value_delimiter = ',',
        default_value = "2022-09-30"
    )]
    exclude_dates: Vec<NaiveDate>,

    /// Report every date, ignoring --exclude-date
    #[arg(long, default_value_t = false)]
    no_exclude: bool,

    /// Rows of the final table printed to stdout
    #[arg(long, default_value_t = 5)]
    preview: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "active_user_metrics=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let excluded_dates = if cli.no_exclude {
        Vec::new()
    } else {
        cli.exclude_dates
    };

    let records = loader::read_activity(&cli.input)
        .with_context(|| format!("failed to load {}", cli.input.display()))?;
    let series = loader::prepare(records, cli.fill_missing_dates);
    let rows = metrics::compute_report(&series, cli.strategy);
    let rows = report::finalize(rows, &excluded_dates);

    if rows.is_empty() {
        warn!("no reportable dates; the input spans fewer than 31 days or is empty");
    }

    print!("{}", report::render_preview(&rows, cli.preview));

    report::write_metrics(&cli.out, &rows, cli.format)?;
    info!(
        rows = rows.len(),
        out = %cli.out.display(),
        excluded = excluded_dates.len(),
        "metrics written"
    );

    Ok(())
}
