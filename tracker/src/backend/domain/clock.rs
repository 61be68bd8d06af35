//! Wall-clock access and conversion between instants and local calendar days.
//!
//! Every "which day does this belong to" decision goes through [`LocalZone`]
//! so that the local and remote stores, the slot board and the export agree
//! on where a day starts and ends.

use anyhow::{anyhow, Result};
use chrono::{
    DateTime, Duration, FixedOffset, Local, LocalResult, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Utc,
};
use shared::{CalendarDate, TimeOfDay};

/// Source of "now"
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The zone that defines local days and times of day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalZone {
    /// The operating system's zone, DST included
    System,
    Fixed(FixedOffset),
}

impl LocalZone {
    pub fn utc() -> Self {
        LocalZone::Fixed(Utc.fix())
    }

    /// Parse `Z`, `UTC`, `+HH:MM` or `-HH:MM`
    pub fn from_offset_str(raw: &str) -> Result<Self> {
        let text = raw.trim();
        if text.eq_ignore_ascii_case("z") || text.eq_ignore_ascii_case("utc") {
            return Ok(Self::utc());
        }
        let invalid = || anyhow!("invalid timezone offset '{}', expected +HH:MM", raw);
        let (sign, rest) = match text.chars().next() {
            Some('+') => (1, &text[1..]),
            Some('-') => (-1, &text[1..]),
            _ => return Err(invalid()),
        };
        let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
        let hours: i32 = hours.parse().map_err(|_| invalid())?;
        let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
        if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
            return Err(invalid());
        }
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(LocalZone::Fixed)
            .ok_or_else(invalid)
    }

    pub fn local_naive(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            LocalZone::System => instant.with_timezone(&Local).naive_local(),
            LocalZone::Fixed(offset) => instant.with_timezone(offset).naive_local(),
        }
    }

    pub fn date_of(&self, instant: DateTime<Utc>) -> CalendarDate {
        CalendarDate::from_naive(self.local_naive(instant).date())
    }

    pub fn time_of(&self, instant: DateTime<Utc>) -> TimeOfDay {
        TimeOfDay::from_naive(self.local_naive(instant).time())
    }

    /// Resolve a local wall-clock time to an instant
    pub fn instant(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        match self {
            LocalZone::System => resolve(&Local, naive),
            LocalZone::Fixed(offset) => resolve(offset, naive),
        }
    }

    pub fn at(&self, date: CalendarDate, time: TimeOfDay) -> DateTime<Utc> {
        self.instant(date.naive().and_time(time.to_naive()))
    }

    /// First and last millisecond of a local day, both inclusive
    pub fn day_bounds(&self, date: CalendarDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.instant(date.naive().and_time(NaiveTime::default()));
        let next = self.instant(date.add_days(1).naive().and_time(NaiveTime::default()));
        (start, next - Duration::milliseconds(1))
    }

    pub fn describe(&self) -> String {
        match self {
            LocalZone::System => "system local time".to_string(),
            LocalZone::Fixed(offset) => format!("UTC{}", offset),
        }
    }
}

fn resolve<Tz: TimeZone>(zone: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        // Skipped by a DST jump: use the first valid time after the gap
        LocalResult::None => zone
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> DateTime<Utc> {
        raw.parse().unwrap()
    }

    #[test]
    fn parses_offsets() {
        let zone = LocalZone::from_offset_str("+02:00").unwrap();
        assert_eq!(zone, LocalZone::Fixed(FixedOffset::east_opt(7200).unwrap()));
        let zone = LocalZone::from_offset_str("-05:30").unwrap();
        assert_eq!(zone, LocalZone::Fixed(FixedOffset::west_opt(5 * 3600 + 1800).unwrap()));
        assert_eq!(LocalZone::from_offset_str("Z").unwrap(), LocalZone::utc());
        assert!(LocalZone::from_offset_str("0200").is_err());
        assert!(LocalZone::from_offset_str("+02:75").is_err());
        assert!(LocalZone::from_offset_str("+999999:00").is_err());
        assert!(LocalZone::from_offset_str("+24:00").is_err());
        assert!(LocalZone::from_offset_str("+-3:00").is_err());
        assert!(LocalZone::from_offset_str("+23:59").is_ok());
    }

    #[test]
    fn day_bounds_follow_local_midnight() {
        let zone = LocalZone::from_offset_str("+02:00").unwrap();
        let date: CalendarDate = "2024-05-01".parse().unwrap();
        let (start, end) = zone.day_bounds(date);
        assert_eq!(start, ts("2024-04-30T22:00:00Z"));
        assert_eq!(end, ts("2024-05-01T21:59:59.999Z"));
    }

    #[test]
    fn local_date_and_time_of_instant() {
        let zone = LocalZone::from_offset_str("+02:00").unwrap();
        let instant = ts("2024-04-30T23:15:00Z");
        assert_eq!(zone.date_of(instant).to_string(), "2024-05-01");
        assert_eq!(zone.time_of(instant).to_string(), "01:15");
    }

    #[test]
    fn anchor_instant_on_a_day() {
        let zone = LocalZone::from_offset_str("+02:00").unwrap();
        let date: CalendarDate = "2024-05-01".parse().unwrap();
        let anchor = TimeOfDay::new(8, 0).unwrap();
        assert_eq!(zone.at(date, anchor), ts("2024-05-01T06:00:00Z"));
    }
}
