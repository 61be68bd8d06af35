//! Family diary: free-text notes attached to calendar days.

use anyhow::{Context, Result};
use log::info;
use shared::{CalendarDate, CreateDiaryRequest, DiaryDay, DiaryEntry, DiaryTimeline, NewDiaryEntry};
use std::sync::Arc;

use super::errors::ValidationError;
use crate::backend::storage::EntryStorage;

/// Most entries shown on the timeline
pub const TIMELINE_LIMIT: usize = 300;

#[derive(Clone)]
pub struct DiaryService {
    store: Arc<dyn EntryStorage<DiaryEntry>>,
}

impl DiaryService {
    pub fn new(store: Arc<dyn EntryStorage<DiaryEntry>>) -> Self {
        Self { store }
    }

    pub async fn record(&self, request: CreateDiaryRequest) -> Result<DiaryEntry> {
        let raw_date = request.entry_date.unwrap_or_default();
        if raw_date.trim().is_empty() {
            return Err(ValidationError::MissingDate.into());
        }
        let entry_date: CalendarDate = raw_date
            .trim()
            .parse()
            .map_err(ValidationError::InvalidValue)?;

        let text = request.text.trim().to_string();
        if text.is_empty() {
            return Err(ValidationError::EmptyDiaryText.into());
        }

        let draft = NewDiaryEntry {
            entry_date,
            text,
            author: request.author.unwrap_or_default().trim().to_string(),
        };
        let entry = self.store.create(draft).await?;
        info!("📔 DIARY: entry for {} ({})", entry.entry_date, entry.id);
        Ok(entry)
    }

    pub async fn list_for_date(&self, date: CalendarDate) -> Result<Vec<DiaryEntry>> {
        let mut entries = self
            .store
            .list_by_date(date)
            .await
            .with_context(|| format!("Loading diary entries for {}", date))?;
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    /// All entries grouped by day, newest day first
    pub async fn timeline(&self) -> Result<DiaryTimeline> {
        let entries = self.store.list_all().await.context("Loading diary entries")?;
        Ok(build_timeline(entries, TIMELINE_LIMIT))
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(id).await?;
        info!("📔 DIARY: deleted {}", id);
        Ok(())
    }
}

/// Sort by date then creation time, both descending, and group by date
pub fn build_timeline(mut entries: Vec<DiaryEntry>, limit: usize) -> DiaryTimeline {
    entries.sort_by(|a, b| {
        b.entry_date
            .cmp(&a.entry_date)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    entries.truncate(limit);

    let mut days: Vec<DiaryDay> = Vec::new();
    for entry in entries {
        match days.last_mut() {
            Some(day) if day.date == entry.entry_date => day.entries.push(entry),
            _ => days.push(DiaryDay {
                date: entry.entry_date,
                entries: vec![entry],
            }),
        }
    }
    DiaryTimeline { days }
}
