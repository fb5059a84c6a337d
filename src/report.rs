use std::fmt::Write;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;

use crate::models::MetricsRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

/// Drops known outlier dates and orders the table newest first.
pub fn finalize(mut rows: Vec<MetricsRow>, excluded_dates: &[NaiveDate]) -> Vec<MetricsRow> {
    rows.retain(|row| !excluded_dates.contains(&row.date));
    rows.sort_by(|a, b| b.date.cmp(&a.date));
    rows
}

pub fn render_preview(rows: &[MetricsRow], limit: usize) -> String {
    let mut output = String::new();

    if rows.is_empty() {
        let _ = writeln!(output, "No dates to report.");
        return output;
    }

    let _ = writeln!(output, "{:<10}  {:>8}  {:>8}  {:>8}", "date", "dau", "wau", "mau");
    for row in rows.iter().take(limit) {
        let _ = writeln!(
            output,
            "{:<10}  {:>8}  {:>8}  {:>8}",
            row.date, row.dau, row.wau, row.mau
        );
    }
    if rows.len() > limit {
        let _ = writeln!(output, "... {} more rows", rows.len() - limit);
    }

    output
}

pub fn write_metrics(path: &Path, rows: &[MetricsRow], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_path(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            // Header is written explicitly so an empty table still has one.
            writer.write_record(["date", "dau", "wau", "mau"])?;
            for row in rows {
                writer.write_record([
                    row.date.to_string(),
                    row.dau.to_string(),
                    row.wau.to_string(),
                    row.mau.to_string(),
                ])?;
            }
            writer.flush()?;
        }
        OutputFormat::Json => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, rows)
                .context("failed to serialize metrics as JSON")?;
            std::io::Write::flush(&mut writer)?;
        }
    }
    Ok(())
}
