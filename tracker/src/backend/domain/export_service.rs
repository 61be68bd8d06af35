//! Export service domain logic.
//!
//! Merges the selected collections into one CSV snapshot. Rows are filtered
//! by an inclusive range of local calendar days and ordered newest first.
//! The file starts with a UTF-8 byte order mark so spreadsheet tools pick the
//! right encoding, and every data cell is quoted.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use log::info;
use shared::{
    CalendarDate, DateRange, DiaryEntry, ExportRequest, ExportResponse, FeedingEntry, RangePreset,
    TimeOfDay, ToiletEntry,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::clock::{Clock, LocalZone};
use super::errors::ExportError;
use crate::backend::config::ExportConfig;
use crate::backend::storage::EntryStorage;

pub const BOM: &str = "\u{feff}";

pub const HEADER: [&str; 10] = [
    "section",
    "id",
    "event_date",
    "event_time",
    "actor_or_kind",
    "amount_g",
    "slot_time",
    "note",
    "text",
    "created_at",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Feeding,
    Toilet,
    Diary,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Feeding => "feeding",
            Section::Toilet => "toilet",
            Section::Diary => "diary",
        }
    }
}

/// One line of the export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub section: Section,
    pub id: String,
    pub event_date: CalendarDate,
    pub event_time: Option<TimeOfDay>,
    pub actor_or_kind: String,
    pub amount_g: Option<u32>,
    pub slot_time: Option<TimeOfDay>,
    pub note: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl ExportRow {
    fn feeding(entry: FeedingEntry, zone: &LocalZone) -> Self {
        Self {
            section: Section::Feeding,
            event_date: zone.date_of(entry.fed_at),
            event_time: Some(zone.time_of(entry.fed_at)),
            actor_or_kind: entry.fed_by,
            amount_g: Some(entry.amount_g),
            slot_time: entry.slot_time,
            note: entry.note,
            text: String::new(),
            created_at: entry.created_at,
            id: entry.id,
        }
    }

    fn toilet(entry: ToiletEntry, zone: &LocalZone) -> Self {
        Self {
            section: Section::Toilet,
            event_date: zone.date_of(entry.event_at),
            event_time: Some(zone.time_of(entry.event_at)),
            actor_or_kind: entry.kind.as_str().to_string(),
            amount_g: None,
            slot_time: None,
            note: String::new(),
            text: String::new(),
            created_at: entry.created_at,
            id: entry.id,
        }
    }

    fn diary(entry: DiaryEntry, zone: &LocalZone) -> Self {
        Self {
            section: Section::Diary,
            event_date: entry.entry_date,
            event_time: entry.created_at.map(|at| zone.time_of(at)),
            actor_or_kind: entry.author,
            amount_g: None,
            slot_time: None,
            note: String::new(),
            text: entry.text,
            created_at: entry.created_at,
            id: entry.id,
        }
    }

    /// Rows without a time sort as if at midnight
    fn sort_key(&self) -> (CalendarDate, TimeOfDay) {
        (self.event_date, self.event_time.unwrap_or(TimeOfDay::MIDNIGHT))
    }

    pub fn cells(&self) -> [String; 10] {
        let optional = |value: Option<String>| value.unwrap_or_default();
        [
            self.section.as_str().to_string(),
            self.id.clone(),
            self.event_date.to_string(),
            optional(self.event_time.map(|t| t.to_string())),
            self.actor_or_kind.clone(),
            optional(self.amount_g.map(|g| g.to_string())),
            optional(self.slot_time.map(|t| t.to_string())),
            self.note.clone(),
            self.text.clone(),
            optional(
                self.created_at
                    .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ),
        ]
    }
}

/// Export service that turns stored entries into CSV snapshots
#[derive(Clone)]
pub struct ExportService {
    feedings: Arc<dyn EntryStorage<FeedingEntry>>,
    toilet: Arc<dyn EntryStorage<ToiletEntry>>,
    diary: Arc<dyn EntryStorage<DiaryEntry>>,
    config: ExportConfig,
    zone: LocalZone,
    clock: Arc<dyn Clock>,
}

impl ExportService {
    pub fn new(
        feedings: Arc<dyn EntryStorage<FeedingEntry>>,
        toilet: Arc<dyn EntryStorage<ToiletEntry>>,
        diary: Arc<dyn EntryStorage<DiaryEntry>>,
        config: ExportConfig,
        zone: LocalZone,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            feedings,
            toilet,
            diary,
            config,
            zone,
            clock,
        }
    }

    pub fn today(&self) -> CalendarDate {
        self.zone.date_of(self.clock.now())
    }

    /// Replace the request's bounds with a preset relative to today
    pub fn apply_preset(&self, request: &mut ExportRequest, preset: RangePreset) {
        let range = preset.range(self.today());
        request.from = range.from.map(|d| d.to_string());
        request.to = range.to.map(|d| d.to_string());
    }

    /// Collect, filter and sort the rows for a request
    pub async fn build_rows(&self, request: &ExportRequest) -> Result<Vec<ExportRow>> {
        if !request.feeding && !request.toilet && !request.diary {
            return Err(ExportError::NothingSelected.into());
        }
        let range = DateRange::parse(request.from.as_deref(), request.to.as_deref())
            .map_err(ExportError::from)?;

        let mut rows = Vec::new();
        if request.feeding {
            let entries = self.feedings.list_all().await.context("Loading feedings")?;
            rows.extend(entries.into_iter().map(|e| ExportRow::feeding(e, &self.zone)));
        }
        if request.toilet {
            let entries = self.toilet.list_all().await.context("Loading toilet events")?;
            rows.extend(entries.into_iter().map(|e| ExportRow::toilet(e, &self.zone)));
        }
        if request.diary {
            let entries = self.diary.list_all().await.context("Loading diary entries")?;
            rows.extend(entries.into_iter().map(|e| ExportRow::diary(e, &self.zone)));
        }

        rows.retain(|row| range.contains(row.event_date));
        rows.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
        Ok(rows)
    }

    pub fn filename(&self, today: CalendarDate) -> String {
        format!("{}-{}.csv", self.config.basename, today)
    }

    pub async fn export(&self, request: &ExportRequest) -> Result<ExportResponse> {
        info!("📄 EXPORT: building CSV for {:?}", request);
        let rows = self.build_rows(request).await?;
        let csv_content = render_csv(&rows)?;
        let response = ExportResponse {
            filename: self.filename(self.today()),
            csv_content,
            row_count: rows.len(),
        };
        info!(
            "✅ EXPORT: {} rows ({} bytes) as {}",
            response.row_count,
            response.csv_content.len(),
            response.filename
        );
        Ok(response)
    }

    /// Write the export into `dir` (default: the configured output directory)
    pub async fn export_to_path(&self, request: &ExportRequest, dir: Option<&Path>) -> Result<PathBuf> {
        let response = self.export(request).await?;
        let dir = dir.unwrap_or(self.config.output_dir.as_path());
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create export directory {}", dir.display()))?;

        let file_path = dir.join(&response.filename);
        let temp_path = file_path.with_extension("tmp");
        fs::write(&temp_path, response.csv_content.as_bytes())
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        fs::rename(&temp_path, &file_path)
            .with_context(|| format!("Failed to move export into {}", file_path.display()))?;

        info!("✅ EXPORT: wrote {}", file_path.display());
        Ok(file_path)
    }
}

/// BOM, plain header, then fully quoted rows separated by `\n`
pub fn render_csv(rows: &[ExportRow]) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(row.cells())?;
    }
    let body = writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to finish CSV output: {}", e.error()))?;
    let body = String::from_utf8(body)?;

    let mut out = String::with_capacity(body.len() + 128);
    out.push_str(BOM);
    out.push_str(&HEADER.join(","));
    if !body.is_empty() {
        out.push('\n');
        out.push_str(body.strip_suffix('\n').unwrap_or(&body));
    }
    Ok(out)
}
