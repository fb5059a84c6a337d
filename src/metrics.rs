use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::models::{ActivityRecord, MetricsRow, PreparedSeries};

pub const DAILY_WINDOW_DAYS: i64 = 1;
pub const WEEKLY_WINDOW_DAYS: i64 = 7;
pub const MONTHLY_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Strategy {
    /// Rescan every record for each date and window.
    Direct,
    /// Build a per-day user index once and union the days in each window.
    #[default]
    Indexed,
}

impl Strategy {
    pub fn compute(self, records: &[ActivityRecord]) -> Vec<MetricsRow> {
        match self {
            Strategy::Direct => compute_direct(records),
            Strategy::Indexed => compute_indexed(records),
        }
    }
}

/// Metrics for every reportable date of `series`. Windows are evaluated over
/// the full history so the first reported dates still see their warm-up days.
pub fn compute_report(series: &PreparedSeries, strategy: Strategy) -> Vec<MetricsRow> {
    let mut rows = strategy.compute(series.history());
    rows.retain(|row| series.is_reportable(row.date));
    debug!(?strategy, dates = rows.len(), "computed active user metrics");
    rows
}

fn window_start(date: NaiveDate, days: i64) -> NaiveDate {
    date - Duration::days(days - 1)
}

/// Reference implementation: one scan of the records per date and window.
pub fn compute_direct(records: &[ActivityRecord]) -> Vec<MetricsRow> {
    let dates: BTreeSet<NaiveDate> = records.iter().map(|record| record.date).collect();

    let distinct_in = |from: NaiveDate, to: NaiveDate| -> usize {
        records
            .iter()
            .filter(|record| record.date >= from && record.date <= to)
            .filter_map(|record| record.user_id.as_deref())
            .collect::<HashSet<&str>>()
            .len()
    };

    dates
        .into_iter()
        .map(|date| MetricsRow {
            date,
            dau: distinct_in(window_start(date, DAILY_WINDOW_DAYS), date),
            wau: distinct_in(window_start(date, WEEKLY_WINDOW_DAYS), date),
            mau: distinct_in(window_start(date, MONTHLY_WINDOW_DAYS), date),
        })
        .collect()
}

pub fn compute_indexed(records: &[ActivityRecord]) -> Vec<MetricsRow> {
    let mut users_by_date: HashMap<NaiveDate, HashSet<&str>> = HashMap::new();
    for record in records {
        if let Some(user_id) = record.user_id.as_deref() {
            users_by_date.entry(record.date).or_default().insert(user_id);
        }
    }

    let dates: BTreeSet<NaiveDate> = records.iter().map(|record| record.date).collect();

    dates
        .into_iter()
        .map(|date| MetricsRow {
            date,
            dau: users_by_date.get(&date).map_or(0, HashSet::len),
            wau: window_union(&users_by_date, date, WEEKLY_WINDOW_DAYS),
            mau: window_union(&users_by_date, date, MONTHLY_WINDOW_DAYS),
        })
        .collect()
}

fn window_union(
    users_by_date: &HashMap<NaiveDate, HashSet<&str>>,
    date: NaiveDate,
    days: i64,
) -> usize {
    let mut active: HashSet<&str> = HashSet::new();
    for offset in 0..days {
        if let Some(users) = users_by_date.get(&(date - Duration::days(offset))) {
            active.extend(users.iter().copied());
        }
    }
    active.len()
}
