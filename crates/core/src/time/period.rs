use crate::domain::report::ReportFrequency;
use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive calendar window `[start, end]`.
///
/// Queries never compare against `end` directly; they use [`PeriodWindow::end_exclusive`]
/// so the database can range-scan `created_at` without truncating every row to a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> anyhow::Result<Self> {
        anyhow::ensure!(start <= end, "period start {start} is after end {end}");
        Ok(Self { start, end })
    }

    /// Number of calendar days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn end_exclusive(&self) -> NaiveDate {
        self.end + Duration::days(1)
    }

    /// Same length, ending the day before `start`.
    pub fn previous(&self) -> Self {
        let end = self.start - Duration::days(1);
        let start = end - Duration::days(self.days() - 1);
        Self { start, end }
    }

    /// `"01/07 - 31/07/2025"`
    pub fn range_label(&self) -> String {
        format!(
            "{} - {}",
            self.start.format("%d/%m"),
            self.end.format("%d/%m/%Y")
        )
    }

    /// Human phrase for the previous window of the same length.
    pub fn previous_phrase(&self) -> &'static str {
        match self.days() {
            6..=8 => "last week",
            28..=31 => "last month",
            88..=92 => "last quarter",
            _ => "the previous period",
        }
    }
}

pub fn resolve(frequency: ReportFrequency, as_of: NaiveDate) -> PeriodWindow {
    let start = match frequency {
        ReportFrequency::Weekly => as_of - Duration::days(6),
        ReportFrequency::Monthly => first_of_month(as_of),
        ReportFrequency::Quarterly => first_of_quarter(as_of),
    };
    PeriodWindow { start, end: as_of }
}

fn first_of_month(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

fn first_of_quarter(d: NaiveDate) -> NaiveDate {
    let quarter_month = ((d.month() - 1) / 3) * 3 + 1;
    NaiveDate::from_ymd_opt(d.year(), quarter_month, 1).unwrap_or(d)
}

/// Explicit `YYYY-MM-DD` wins; otherwise "today" in the business's fixed UTC offset.
pub fn resolve_as_of_date(
    as_of_date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
    tz_offset_hours: i32,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = as_of_date_arg {
        return NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid as_of_date {s:?}, expected YYYY-MM-DD"));
    }

    let offset = chrono::FixedOffset::east_opt(tz_offset_hours * 3600)
        .with_context(|| format!("invalid UTC offset {tz_offset_hours}h"))?;
    Ok(now_utc.with_timezone(&offset).date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn monthly_starts_on_first_of_month() {
        let w = resolve(ReportFrequency::Monthly, d(2025, 7, 31));
        assert_eq!(w.start, d(2025, 7, 1));
        assert_eq!(w.end, d(2025, 7, 31));
    }

    #[test]
    fn weekly_spans_seven_days() {
        let w = resolve(ReportFrequency::Weekly, d(2025, 3, 2));
        assert_eq!(w.days(), 7);
        assert_eq!(w.start, d(2025, 2, 24));
    }

    #[test]
    fn quarterly_start_month_is_quarter_boundary() {
        for month in 1..=12 {
            let w = resolve(ReportFrequency::Quarterly, d(2025, month, 15));
            assert!([1, 4, 7, 10].contains(&w.start.month()), "month {month}");
            assert_eq!(w.start.day(), 1);
            assert!(w.start <= w.end);
        }
        let w = resolve(ReportFrequency::Quarterly, d(2025, 8, 20));
        assert_eq!(w.start, d(2025, 7, 1));
    }

    #[test]
    fn previous_window_is_adjacent_and_same_length() {
        let w = resolve(ReportFrequency::Monthly, d(2025, 7, 31));
        let p = w.previous();
        assert_eq!(p.end, d(2025, 6, 30));
        assert_eq!(p.start, d(2025, 5, 31));
        assert_eq!(p.days(), w.days());
    }

    #[test]
    fn end_exclusive_is_next_day() {
        let w = PeriodWindow::new(d(2025, 12, 1), d(2025, 12, 31)).unwrap();
        assert_eq!(w.end_exclusive(), d(2026, 1, 1));
    }

    #[test]
    fn rejects_inverted_window() {
        assert!(PeriodWindow::new(d(2025, 2, 2), d(2025, 2, 1)).is_err());
    }

    #[test]
    fn range_label_formats_both_ends() {
        let w = resolve(ReportFrequency::Monthly, d(2025, 7, 31));
        assert_eq!(w.range_label(), "01/07 - 31/07/2025");
    }

    #[test]
    fn as_of_defaults_to_local_today() {
        // 23:30 UTC is already the next day at UTC+1.
        let now = Utc.with_ymd_and_hms(2025, 7, 31, 23, 30, 0).unwrap();
        assert_eq!(resolve_as_of_date(None, now, 1).unwrap(), d(2025, 8, 1));
        assert_eq!(resolve_as_of_date(None, now, 0).unwrap(), d(2025, 7, 31));
    }

    #[test]
    fn as_of_argument_wins() {
        let now = Utc.with_ymd_and_hms(2025, 7, 31, 12, 0, 0).unwrap();
        let got = resolve_as_of_date(Some("2024-01-15"), now, 1).unwrap();
        assert_eq!(got, d(2024, 1, 15));
        assert!(resolve_as_of_date(Some("15/01/2024"), now, 1).is_err());
    }
}
