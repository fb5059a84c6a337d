use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub date: NaiveDate,
    /// `None` for calendar placeholders and rows with a blank id.
    pub user_id: Option<String>,
}

impl ActivityRecord {
    pub fn new(date: NaiveDate, user_id: impl Into<String>) -> Self {
        Self {
            date,
            user_id: Some(user_id.into()),
        }
    }

    pub fn placeholder(date: NaiveDate) -> Self {
        Self {
            date,
            user_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsRow {
    pub date: NaiveDate,
    pub dau: usize,
    pub wau: usize,
    pub mau: usize,
}

/// Activity history after normalization (and optional densification),
/// together with the first date that has a full warm-up behind it.
///
/// The whole history is kept so rolling windows near the start of the
/// reported range can still look back into the warm-up period.
#[derive(Debug, Clone, Default)]
pub struct PreparedSeries {
    history: Vec<ActivityRecord>,
    start_date: Option<NaiveDate>,
}

impl PreparedSeries {
    pub fn new(history: Vec<ActivityRecord>, start_date: Option<NaiveDate>) -> Self {
        Self {
            history,
            start_date,
        }
    }

    pub fn history(&self) -> &[ActivityRecord] {
        &self.history
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    pub fn is_reportable(&self, date: NaiveDate) -> bool {
        self.start_date.is_some_and(|start| date >= start)
    }

    /// Records on or after the warm-up start, in history order.
    pub fn retained(&self) -> impl Iterator<Item = &ActivityRecord> {
        self.history
            .iter()
            .filter(|record| self.is_reportable(record.date))
    }
}
