use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use crate::error::LoadError;
use crate::models::{ActivityRecord, PreparedSeries};

pub const DATE_COLUMN: &str = "active_date_timestamp";
pub const USER_COLUMN: &str = "user_id";

/// Days of history a date needs behind it before it is reported.
pub const WARM_UP_DAYS: i64 = 30;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

#[derive(serde::Deserialize)]
struct CsvRow {
    active_date_timestamp: String,
    user_id: Option<String>,
}

pub fn read_activity(path: &Path) -> Result<Vec<ActivityRecord>, LoadError> {
    let file = File::open(path)?;
    let records = parse_activity(BufReader::new(file))?;
    info!(path = %path.display(), records = records.len(), "loaded activity records");
    Ok(records)
}

pub fn parse_activity<R: Read>(source: R) -> Result<Vec<ActivityRecord>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);
    let headers = reader.headers()?.clone();
    for column in [DATE_COLUMN, USER_COLUMN] {
        if !headers.iter().any(|header| header == column) {
            return Err(LoadError::MissingColumn(column));
        }
    }

    let mut records = Vec::new();
    for result in reader.records() {
        let raw = result?;
        let line = raw.position().map_or(0, |position| position.line());
        let row: CsvRow = raw.deserialize(Some(&headers))?;

        let date = parse_activity_date(&row.active_date_timestamp).ok_or_else(|| {
            LoadError::InvalidDate {
                line,
                value: row.active_date_timestamp.clone(),
            }
        })?;
        records.push(match row.user_id.filter(|id| !id.is_empty()) {
            Some(user_id) => ActivityRecord::new(date, user_id),
            None => ActivityRecord::placeholder(date),
        });
    }

    Ok(records)
}

/// Reduces a date or date-time string to its calendar date. Values with a
/// UTC offset keep the date as written in that offset.
pub fn parse_activity_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.date_naive());
    }
    if let Ok(parsed) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(parsed.date_naive());
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
                .map(|parsed| parsed.date())
        })
}

/// Left-joins the full `[min, max]` calendar onto `records`: every missing
/// date gets one placeholder, existing rows are kept as-is (duplicates
/// included). The result is ordered by date.
pub fn densify(records: Vec<ActivityRecord>) -> Vec<ActivityRecord> {
    let mut by_date: BTreeMap<NaiveDate, Vec<ActivityRecord>> = BTreeMap::new();
    for record in records {
        by_date.entry(record.date).or_default().push(record);
    }

    let (Some(&min_date), Some(&max_date)) = (by_date.keys().next(), by_date.keys().next_back())
    else {
        return Vec::new();
    };

    let mut dense = Vec::new();
    let mut inserted = 0usize;
    for date in min_date.iter_days().take_while(|date| *date <= max_date) {
        match by_date.remove(&date) {
            Some(group) => dense.extend(group),
            None => {
                dense.push(ActivityRecord::placeholder(date));
                inserted += 1;
            }
        }
    }

    debug!(%min_date, %max_date, inserted, "filled calendar gaps");
    dense
}

/// First reportable date: the earliest activity date plus the warm-up.
pub fn warm_up_start(records: &[ActivityRecord]) -> Option<NaiveDate> {
    records
        .iter()
        .map(|record| record.date)
        .min()
        .map(|min_date| min_date + Duration::days(WARM_UP_DAYS))
}

pub fn prepare(records: Vec<ActivityRecord>, fill_missing_dates: bool) -> PreparedSeries {
    let history = if fill_missing_dates {
        densify(records)
    } else {
        records
    };
    let start_date = warm_up_start(&history);

    let series = PreparedSeries::new(history, start_date);
    match series.start_date() {
        Some(start) => info!(
            records = series.history().len(),
            retained = series.retained().count(),
            %start,
            "prepared activity series"
        ),
        None => info!("no activity records to prepare"),
    }

    series
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_common_timestamp_shapes() {
        assert_eq!(parse_activity_date("2022-09-30"), Some(day(2022, 9, 30)));
        assert_eq!(parse_activity_date("2022-09-30 23:59:59"), Some(day(2022, 9, 30)));
        assert_eq!(parse_activity_date("2022-09-30T08:15:00.250"), Some(day(2022, 9, 30)));
        assert_eq!(parse_activity_date("2022/09/30"), Some(day(2022, 9, 30)));
        assert_eq!(parse_activity_date("09/30/2022 10:00"), Some(day(2022, 9, 30)));
        assert_eq!(parse_activity_date(" 2022-09-30 "), Some(day(2022, 9, 30)));
    }

    #[test]
    fn offset_timestamps_keep_their_local_date() {
        assert_eq!(
            parse_activity_date("2022-09-30T23:30:00-05:00"),
            Some(day(2022, 9, 30))
        );
        assert_eq!(
            parse_activity_date("2022-10-01T01:00:00+09:00"),
            Some(day(2022, 10, 1))
        );
    }

    #[test]
    fn rejects_garbage_dates() {
        assert_eq!(parse_activity_date("yesterday"), None);
        assert_eq!(parse_activity_date("2022-13-01"), None);
        assert_eq!(parse_activity_date(""), None);
    }

    #[test]
    fn reads_rows_and_treats_blank_ids_as_absent() {
        let data = "\
user_id,active_date_timestamp,platform
a,2021-01-01 10:00:00,ios
,2021-01-02 11:00:00,web
b , 2021-01-02,android
";
        let records = parse_activity(data.as_bytes()).unwrap();
        assert_eq!(
            records,
            vec![
                ActivityRecord::new(day(2021, 1, 1), "a"),
                ActivityRecord::placeholder(day(2021, 1, 2)),
                ActivityRecord::new(day(2021, 1, 2), "b"),
            ]
        );
    }

    #[test]
    fn malformed_date_fails_the_whole_load() {
        let data = "active_date_timestamp,user_id\n2021-01-01,a\nnot-a-date,b\n";
        match parse_activity(data.as_bytes()) {
            Err(LoadError::InvalidDate { line, value }) => {
                assert_eq!(line, 3);
                assert_eq!(value, "not-a-date");
            }
            other => panic!("expected InvalidDate, got {other:?}"),
        }
    }

    #[test]
    fn missing_column_is_reported() {
        let data = "active_date_timestamp,account\n2021-01-01,a\n";
        assert!(matches!(
            parse_activity(data.as_bytes()),
            Err(LoadError::MissingColumn(USER_COLUMN))
        ));
    }

    #[test]
    fn reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "active_date_timestamp,user_id").unwrap();
        writeln!(file, "2021-03-04T12:00:00,u1").unwrap();
        let records = read_activity(file.path()).unwrap();
        assert_eq!(records, vec![ActivityRecord::new(day(2021, 3, 4), "u1")]);
    }

    #[test]
    fn empty_file_yields_no_records() {
        let records = parse_activity("active_date_timestamp,user_id\n".as_bytes()).unwrap();
        assert!(records.is_empty());
        let series = prepare(records, true);
        assert!(series.history().is_empty());
        assert_eq!(series.start_date(), None);
        assert_eq!(series.retained().count(), 0);
    }

    #[test]
    fn densify_fills_gaps_and_keeps_duplicates() {
        let records = vec![
            ActivityRecord::new(day(2021, 1, 4), "a"),
            ActivityRecord::new(day(2021, 1, 1), "a"),
            ActivityRecord::new(day(2021, 1, 1), "a"),
        ];
        let dense = densify(records);
        assert_eq!(
            dense,
            vec![
                ActivityRecord::new(day(2021, 1, 1), "a"),
                ActivityRecord::new(day(2021, 1, 1), "a"),
                ActivityRecord::placeholder(day(2021, 1, 2)),
                ActivityRecord::placeholder(day(2021, 1, 3)),
                ActivityRecord::new(day(2021, 1, 4), "a"),
            ]
        );
    }

    #[test]
    fn densify_is_a_no_op_on_a_gap_free_calendar() {
        let records: Vec<ActivityRecord> = (1..=10)
            .map(|d| ActivityRecord::new(day(2021, 1, d), format!("u{d}")))
            .collect();
        let dense = densify(records.clone());
        assert_eq!(dense, records);
        assert_eq!(densify(dense.clone()), dense);
    }

    #[test]
    fn truncation_starts_thirty_days_after_the_first_date() {
        let records: Vec<ActivityRecord> = day(2021, 1, 1)
            .iter_days()
            .take(41)
            .map(|date| ActivityRecord::new(date, "a"))
            .collect();
        let series = prepare(records, false);

        assert_eq!(series.start_date(), Some(day(2021, 1, 31)));
        let retained: Vec<&ActivityRecord> = series.retained().collect();
        assert_eq!(retained.len(), 11);
        assert_eq!(retained.first().map(|r| r.date), Some(day(2021, 1, 31)));
        assert_eq!(retained.last().map(|r| r.date), Some(day(2021, 2, 10)));
        assert_eq!(series.history().len(), 41);
    }

    #[test]
    fn short_dataset_retains_nothing() {
        let records: Vec<ActivityRecord> = day(2021, 1, 1)
            .iter_days()
            .take(30)
            .map(|date| ActivityRecord::new(date, "a"))
            .collect();
        let series = prepare(records, true);
        assert_eq!(series.retained().count(), 0);
    }

    #[test]
    fn densified_series_truncates_from_the_filled_calendar() {
        let records = vec![
            ActivityRecord::new(day(2021, 1, 1), "a"),
            ActivityRecord::new(day(2021, 2, 15), "b"),
        ];
        let series = prepare(records, true);
        let retained: Vec<&ActivityRecord> = series.retained().collect();
        assert_eq!(series.history().len(), 46);
        assert_eq!(retained.len(), 16);
        assert_eq!(retained[0], &ActivityRecord::placeholder(day(2021, 1, 31)));
    }
}
