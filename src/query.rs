use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use clap::ValueEnum;
use serde::Deserialize;

use crate::sessions::SessionSummary;

/// With no filters active, at least this many of the newest files are parsed even when
/// a smaller limit was requested, since some files may fail to parse.
const FAST_PATH_MIN_CANDIDATES: usize = 50;

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Mtime,
    Timestamp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filters, ordering and row limit applied to parsed summaries.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub cwd_filter: Option<String>,
    /// Inclusive lower bound, epoch milliseconds.
    pub since: Option<i64>,
    /// Exclusive upper bound, epoch milliseconds.
    pub before: Option<i64>,
    pub sort: SortKey,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl ListQuery {
    /// Whether any filter can drop rows after parsing.
    pub fn has_filters(&self) -> bool {
        self.cwd_filter().is_some() || self.since.is_some() || self.before.is_some()
    }

    /// How many of the newest files need parsing, or `None` for all of them.
    ///
    /// Only a newest-first mtime listing can be answered from the head of the pre-sorted
    /// file list; anything else may select files from anywhere in it.
    pub fn candidate_limit(&self) -> Option<usize> {
        let newest_first = self.sort == SortKey::Mtime && self.order == SortOrder::Desc;
        if self.has_filters() || !newest_first {
            return None;
        }
        self.limit.map(|limit| limit.max(FAST_PATH_MIN_CANDIDATES))
    }

    fn cwd_filter(&self) -> Option<&str> {
        self.cwd_filter.as_deref().filter(|s| !s.is_empty())
    }

    fn matches(&self, summary: &SessionSummary) -> bool {
        if let Some(needle) = self.cwd_filter()
            && !summary.cwd.as_deref().unwrap_or("").contains(needle)
        {
            return false;
        }
        if self.since.is_none() && self.before.is_none() {
            return true;
        }
        let t = effective_time(summary);
        if let Some(since) = self.since
            && t < since
        {
            return false;
        }
        if let Some(before) = self.before
            && t >= before
        {
            return false;
        }
        true
    }

    fn sort_time(&self, summary: &SessionSummary) -> i64 {
        match self.sort {
            SortKey::Mtime => summary.mtime as i64,
            SortKey::Timestamp => effective_time(summary),
        }
    }

    /// Filter, stable-sort, then truncate to the limit.
    pub fn apply(&self, summaries: Vec<SessionSummary>) -> Vec<SessionSummary> {
        let mut rows: Vec<SessionSummary> =
            summaries.into_iter().filter(|s| self.matches(s)).collect();

        rows.sort_by(|a, b| {
            let (ta, tb) = (self.sort_time(a), self.sort_time(b));
            match self.order {
                SortOrder::Asc => ta.cmp(&tb),
                SortOrder::Desc => tb.cmp(&ta),
            }
        });

        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

/// The session's own timestamp when it parses, otherwise the file mtime.
pub fn effective_time(summary: &SessionSummary) -> i64 {
    summary
        .timestamp
        .as_deref()
        .and_then(parse_date_input)
        .unwrap_or(summary.mtime as i64)
}

/// Parse a user or record supplied date into epoch milliseconds.
///
/// Accepts RFC 3339, RFC 2822, naive date-times (local time) and bare `YYYY-MM-DD`,
/// `YYYY-MM` or `YYYY` dates (UTC midnight at the start of that day, month or year).
/// Returns `None` for anything else.
pub fn parse_date_input(input: &str) -> Option<i64> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.timestamp_millis());
        }
    }
    parse_partial_date(s)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

fn parse_partial_date(s: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    let mut parts = s.split('-');
    let year = parts.next().filter(|y| y.len() == 4)?;
    let month = match parts.next() {
        Some(m) if m.len() == 2 => m,
        Some(_) => return None,
        None => "01",
    };
    let digits = year.bytes().chain(month.bytes()).all(|b| b.is_ascii_digit());
    if parts.next().is_some() || !digits {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}
