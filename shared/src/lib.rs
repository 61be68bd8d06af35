use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors raised while parsing or combining the calendar value types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("invalid calendar date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("invalid time of day '{0}', expected HH:MM")]
    InvalidTime(String),
    #[error("range start {from} is after range end {to}")]
    InvertedRange { from: CalendarDate, to: CalendarDate },
}

/// A local calendar day, serialized as `YYYY-MM-DD`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
    pub fn new(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn naive(&self) -> NaiveDate {
        self.0
    }

    /// Shift by a number of days, saturating at chrono's supported range
    pub fn add_days(&self, days: i64) -> Self {
        self.0
            .checked_add_signed(Duration::days(days))
            .map(Self)
            .unwrap_or(*self)
    }

    pub fn first_of_month(&self) -> Self {
        Self(self.0.with_day(1).unwrap_or(self.0))
    }
}

impl FromStr for CalendarDate {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() != 10 {
            return Err(ValueError::InvalidDate(s.to_string()));
        }
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map(Self)
            .map_err(|_| ValueError::InvalidDate(s.to_string()))
    }
}

impl TryFrom<String> for CalendarDate {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CalendarDate> for String {
    fn from(value: CalendarDate) -> Self {
        value.to_string()
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// A wall-clock time of day with minute precision, serialized as `HH:MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay { hour: 0, minute: 0 };

    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn from_naive(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn minutes_of_day(&self) -> u32 {
        self.hour as u32 * 60 + self.minute as u32
    }

    /// Absolute distance in minutes within the same day (no wrap over midnight)
    pub fn distance_minutes(&self, other: TimeOfDay) -> u32 {
        self.minutes_of_day().abs_diff(other.minutes_of_day())
    }

    pub fn to_naive(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, 0).unwrap_or_default()
    }
}

impl FromStr for TimeOfDay {
    type Err = ValueError;

    /// Accepts `HH:MM` and `HH:MM:SS` (seconds are dropped)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValueError::InvalidTime(s.to_string());
        let mut parts = s.trim().split(':');
        let hour = parts.next().ok_or_else(invalid)?;
        let minute = parts.next().ok_or_else(invalid)?;
        if let Some(seconds) = parts.next() {
            seconds.parse::<u8>().map_err(|_| invalid())?;
        }
        if parts.next().is_some() || hour.len() != 2 || minute.len() != 2 {
            return Err(invalid());
        }
        let hour = hour.parse::<u8>().map_err(|_| invalid())?;
        let minute = minute.parse::<u8>().map_err(|_| invalid())?;
        Self::new(hour, minute).ok_or_else(invalid)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Inclusive range of calendar days; a missing bound is open on that side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<CalendarDate>,
    pub to: Option<CalendarDate>,
}

impl DateRange {
    pub fn new(from: Option<CalendarDate>, to: Option<CalendarDate>) -> Result<Self, ValueError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(ValueError::InvertedRange { from, to });
            }
        }
        Ok(Self { from, to })
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Parse optional textual bounds; blank strings count as unbounded
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Self, ValueError> {
        fn bound(raw: Option<&str>) -> Result<Option<CalendarDate>, ValueError> {
            match raw.map(str::trim) {
                None | Some("") => Ok(None),
                Some(text) => text.parse().map(Some),
            }
        }
        Self::new(bound(from)?, bound(to)?)
    }

    pub fn contains(&self, date: CalendarDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

/// Quick range selections offered by the export form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePreset {
    All,
    #[serde(rename = "last_7_days")]
    Last7Days,
    MonthToDate,
}

impl RangePreset {
    pub fn range(&self, today: CalendarDate) -> DateRange {
        match self {
            RangePreset::All => DateRange::unbounded(),
            RangePreset::Last7Days => DateRange {
                from: Some(today.add_days(-6)),
                to: Some(today),
            },
            RangePreset::MonthToDate => DateRange {
                from: Some(today.first_of_month()),
                to: Some(today),
            },
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// A logged feeding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedingEntry {
    pub id: String,
    /// Absent on records written by early versions of the app
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub fed_at: DateTime<Utc>,
    pub amount_g: u32,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub fed_by: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub note: String,
    #[serde(default)]
    pub slot_time: Option<TimeOfDay>,
}

/// Feeding payload before the store assigns id and creation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeeding {
    pub fed_at: DateTime<Utc>,
    pub amount_g: u32,
    pub fed_by: String,
    pub note: String,
    pub slot_time: Option<TimeOfDay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToiletKind {
    #[serde(rename = "SHIT")]
    Shit,
    #[serde(rename = "PISS")]
    Piss,
}

impl ToiletKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToiletKind::Shit => "SHIT",
            ToiletKind::Piss => "PISS",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ToiletKind::Shit => "Shit",
            ToiletKind::Piss => "Piss",
        }
    }
}

impl FromStr for ToiletKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            kind if kind.eq_ignore_ascii_case("SHIT") => Ok(ToiletKind::Shit),
            kind if kind.eq_ignore_ascii_case("PISS") => Ok(ToiletKind::Piss),
            other => Err(other.to_string()),
        }
    }
}

/// A logged toilet event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToiletEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub event_at: DateTime<Utc>,
    pub kind: ToiletKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewToiletEvent {
    pub event_at: DateTime<Utc>,
    pub kind: ToiletKind,
}

/// A family diary note attached to a calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub entry_date: CalendarDate,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDiaryEntry {
    pub entry_date: CalendarDate,
    pub text: String,
    pub author: String,
}

/// Status lamp of a feeding slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Done,
    Future,
    Due,
    Overdue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotStatus {
    pub state: SlotState,
    pub label: String,
    pub detail: String,
}

/// One anchor of the slot board for a given day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotCard {
    pub anchor: TimeOfDay,
    pub status: SlotStatus,
    /// Id of the representative feeding, if the slot is done
    pub entry_id: Option<String>,
    pub can_mark_manually: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotBoard {
    pub date: CalendarDate,
    pub is_today: bool,
    pub slots: Vec<SlotCard>,
}

/// Everything shown for one selected day, rebuilt after every mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayOverview {
    pub date: CalendarDate,
    pub slot_board: SlotBoard,
    /// Newest first
    pub feedings: Vec<FeedingEntry>,
    /// Newest first
    pub toilet_events: Vec<ToiletEntry>,
    pub diary_entries: Vec<DiaryEntry>,
    pub suggested_amount_g: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryDay {
    pub date: CalendarDate,
    pub entries: Vec<DiaryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryTimeline {
    pub days: Vec<DiaryDay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageInfo {
    pub mode: StorageMode,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateFeedingRequest {
    /// Grams; validated as a finite positive number and rounded
    pub amount_g: f64,
    #[serde(default)]
    pub fed_by: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    /// Defaults to the current time
    #[serde(default)]
    pub fed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkSlotRequest {
    pub date: CalendarDate,
    pub slot_time: TimeOfDay,
    /// Falls back to the suggested amount for the day
    #[serde(default)]
    pub amount_g: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateToiletRequest {
    pub kind: String,
    #[serde(default)]
    pub event_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateDiaryRequest {
    #[serde(default)]
    pub entry_date: Option<String>,
    pub text: String,
    #[serde(default)]
    pub author: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub feeding: bool,
    #[serde(default)]
    pub toilet: bool,
    #[serde(default)]
    pub diary: bool,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportResponse {
    pub filename: String,
    pub csv_content: String,
    pub row_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
