//! The shop's local calendar.
//!
//! "Today" and "this month" are wall-clock notions; the store speaks UTC.
//! [`LocalCalendar`] turns an instant into the UTC window covering the
//! local day/month it falls in.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc,
};
use serde::{Serialize, Serializer};

use autoshop_core::{DomainError, DomainResult, TimeRange};

/// Calendar month, ordered chronologically. Serializes as `"YYYY-MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl core::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalCalendar {
    offset: FixedOffset,
}

impl Default for LocalCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl LocalCalendar {
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    /// Calendar at a fixed offset from UTC, in minutes (east positive).
    pub fn from_offset_minutes(minutes: i32) -> DomainResult<Self> {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| DomainError::invalid(format!("utc offset {minutes} minutes is out of range")))?;
        Ok(Self { offset })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    fn local(&self, ts: DateTime<Utc>) -> NaiveDateTime {
        ts.with_timezone(&self.offset).naive_local()
    }

    fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        let naive_utc = local - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        DateTime::from_naive_utc_and_offset(naive_utc, Utc)
    }

    fn midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        self.to_utc(date.and_time(NaiveTime::MIN))
    }

    /// `None` when the shifted instant falls outside chrono's range.
    fn checked_midnight(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        date.and_time(NaiveTime::MIN)
            .checked_sub_signed(Duration::seconds(i64::from(self.offset.local_minus_utc())))
            .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
    }

    pub fn month_of(&self, ts: DateTime<Utc>) -> YearMonth {
        let d = self.local(ts).date();
        YearMonth {
            year: d.year(),
            month: d.month(),
        }
    }

    /// The local day containing `now`.
    pub fn day(&self, now: DateTime<Utc>) -> TimeRange {
        let today = self.local(now).date();
        TimeRange {
            start: self.midnight(today),
            end: self.midnight(today + Duration::days(1)),
        }
    }

    /// The local month containing `now`.
    pub fn month(&self, now: DateTime<Utc>) -> TimeRange {
        let first = month_start(self.local(now).date());
        TimeRange {
            start: self.midnight(first),
            end: self.midnight(next_month_start(first)),
        }
    }

    /// The local month before the one containing `now`.
    pub fn previous_month(&self, now: DateTime<Utc>) -> TimeRange {
        let first = month_start(self.local(now).date());
        TimeRange {
            start: self.midnight(prev_month_start(first)),
            end: self.midnight(first),
        }
    }

    /// Local dates `from..=to`, both days included.
    pub fn dates(&self, from: NaiveDate, to: NaiveDate) -> DomainResult<TimeRange> {
        if to < from {
            return Err(DomainError::invalid("`from` must not be after `to`"));
        }
        let start = self.checked_midnight(from);
        let end = to.succ_opt().and_then(|next| self.checked_midnight(next));
        match (start, end) {
            (Some(start), Some(end)) => TimeRange::new(start, end),
            _ => Err(DomainError::invalid(format!(
                "dates {from}..={to} are outside the supported range"
            ))),
        }
    }

    /// From `now` minus `months` calendar months (local wall clock) to the end
    /// of the current month.
    pub fn trailing_months(&self, now: DateTime<Utc>, months: u32) -> TimeRange {
        let local = self.local(now);
        let start = local
            .checked_sub_months(Months::new(months))
            .unwrap_or_else(|| local - Duration::days(31 * i64::from(months)));
        TimeRange {
            start: self.to_utc(start),
            end: self.month(now).end,
        }
    }
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

fn next_month_start(first: NaiveDate) -> NaiveDate {
    month_start(first + Duration::days(32))
}

fn prev_month_start(first: NaiveDate) -> NaiveDate {
    month_start(first - Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn month_window_covers_whole_local_month() {
        let cal = LocalCalendar::utc();
        let r = cal.month(utc(2024, 2, 15, 10));
        assert_eq!(r.start, utc(2024, 2, 1, 0));
        assert_eq!(r.end, utc(2024, 3, 1, 0));
    }

    #[test]
    fn previous_month_wraps_year() {
        let cal = LocalCalendar::utc();
        let r = cal.previous_month(utc(2024, 1, 10, 0));
        assert_eq!(r.start, utc(2023, 12, 1, 0));
        assert_eq!(r.end, utc(2024, 1, 1, 0));
    }

    #[test]
    fn offset_shifts_day_boundaries() {
        // UTC-5: 03:00Z on the 2nd is still the 1st locally.
        let cal = LocalCalendar::from_offset_minutes(-300).unwrap();
        let r = cal.day(utc(2024, 3, 2, 3));
        assert_eq!(r.start, utc(2024, 3, 1, 5));
        assert_eq!(r.end, utc(2024, 3, 2, 5));
        assert_eq!(cal.month_of(utc(2024, 3, 1, 2)), YearMonth { year: 2024, month: 2 });
    }

    #[test]
    fn trailing_window_starts_twelve_months_back() {
        let cal = LocalCalendar::utc();
        let r = cal.trailing_months(utc(2024, 5, 20, 8), 12);
        assert_eq!(r.start, utc(2023, 5, 20, 8));
        assert_eq!(r.end, utc(2024, 6, 1, 0));
    }

    #[test]
    fn year_month_formats_with_padding() {
        assert_eq!(YearMonth { year: 2024, month: 3 }.to_string(), "2024-03");
    }

    #[test]
    fn date_range_includes_the_last_day() {
        let cal = LocalCalendar::from_offset_minutes(60).unwrap();
        let from = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 1, 12).unwrap();
        let r = cal.dates(from, to).unwrap();
        assert_eq!(r.start, utc(2024, 1, 9, 23));
        assert_eq!(r.end, utc(2024, 1, 12, 23));
        assert!(cal.dates(to, from).is_err());
    }

    #[test]
    fn extreme_dates_are_invalid_input() {
        let max = NaiveDate::MAX;
        assert!(matches!(
            LocalCalendar::utc().dates(max, max),
            Err(DomainError::InvalidInput(_))
        ));

        // East of UTC, local midnight on the first representable day is before it.
        let east = LocalCalendar::from_offset_minutes(60).unwrap();
        assert!(matches!(
            east.dates(NaiveDate::MIN, NaiveDate::MIN),
            Err(DomainError::InvalidInput(_))
        ));

        let west = LocalCalendar::from_offset_minutes(-60).unwrap();
        assert!(west.dates(NaiveDate::MIN, NaiveDate::MIN).is_ok());
        let last_full = max.pred_opt().unwrap();
        assert!(west.dates(last_full, last_full).is_ok());
        assert!(west.dates(last_full, max).is_err());
    }

    #[test]
    fn out_of_range_offset_is_rejected() {
        assert!(LocalCalendar::from_offset_minutes(24 * 60).is_err());
    }
}
