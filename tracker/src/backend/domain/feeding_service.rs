//! Feeding service domain logic.
//!
//! Validates new feedings, tags them with their slot anchor and builds the
//! slot board for a day.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use shared::{
    CalendarDate, CreateFeedingRequest, FeedingEntry, MarkSlotRequest, NewFeeding, SlotBoard,
};
use std::sync::Arc;

use super::clock::{Clock, LocalZone};
use super::errors::ValidationError;
use super::slot_schedule::SlotSchedule;
use crate::backend::storage::EntryStorage;

/// Amount offered when nothing was fed yet on the day
pub const DEFAULT_AMOUNT_G: u32 = 180;
pub const MANUAL_FED_BY: &str = "Manual";
pub const MANUAL_NOTE: &str = "Marked as fed manually";

#[derive(Clone)]
pub struct FeedingService {
    store: Arc<dyn EntryStorage<FeedingEntry>>,
    schedule: SlotSchedule,
    zone: LocalZone,
    clock: Arc<dyn Clock>,
}

impl FeedingService {
    pub fn new(
        store: Arc<dyn EntryStorage<FeedingEntry>>,
        schedule: SlotSchedule,
        zone: LocalZone,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            schedule,
            zone,
            clock,
        }
    }

    pub fn schedule(&self) -> &SlotSchedule {
        &self.schedule
    }

    /// Log a feeding, by default at the current time
    pub async fn record(&self, request: CreateFeedingRequest) -> Result<FeedingEntry> {
        let fed_at = request.fed_at.unwrap_or_else(|| self.clock.now());
        let slot = self.schedule.assign(self.zone.time_of(fed_at))?;
        let amount_g = validate_amount(request.amount_g)?;

        let draft = NewFeeding {
            fed_at,
            amount_g,
            fed_by: request.fed_by.unwrap_or_default().trim().to_string(),
            note: request.note.unwrap_or_default().trim().to_string(),
            slot_time: Some(slot),
        };

        let entry = self.store.create(draft).await?;
        info!("🍖 FEEDING: {} g at slot {} ({})", entry.amount_g, slot, entry.id);
        Ok(entry)
    }

    /// Confirm a past slot that has no feeding yet
    pub async fn mark_slot(&self, request: MarkSlotRequest) -> Result<FeedingEntry> {
        let slot = request.slot_time;
        if !self.schedule.contains(slot) {
            return Err(ValidationError::UnknownSlot(slot).into());
        }

        let now = self.clock.now();
        let today = self.zone.date_of(now);
        let anchor_instant = self.zone.at(request.date, slot);
        if request.date > today || (request.date == today && anchor_instant > now) {
            return Err(ValidationError::SlotNotMarkable(slot).into());
        }

        let entries = self.store.list_by_date(request.date).await?;
        if SlotSchedule::representatives(&entries).contains_key(&slot) {
            return Err(ValidationError::SlotNotMarkable(slot).into());
        }

        let amount_g = match request.amount_g {
            Some(amount) => validate_amount(amount)?,
            None => suggest_amount(&entries),
        };

        let draft = NewFeeding {
            fed_at: anchor_instant,
            amount_g,
            fed_by: MANUAL_FED_BY.to_string(),
            note: MANUAL_NOTE.to_string(),
            slot_time: Some(slot),
        };

        let entry = self.store.create(draft).await?;
        info!("🍖 FEEDING: slot {} on {} marked manually ({})", slot, request.date, entry.id);
        Ok(entry)
    }

    /// The day's feedings, newest first
    pub async fn list_for_date(&self, date: CalendarDate) -> Result<Vec<FeedingEntry>> {
        let mut entries = self
            .store
            .list_by_date(date)
            .await
            .with_context(|| format!("Loading feedings for {}", date))?;
        sort_newest_first(&mut entries, |e| e.fed_at);
        Ok(entries)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(id).await?;
        info!("🍖 FEEDING: deleted {}", id);
        Ok(())
    }

    pub async fn suggested_amount(&self, date: CalendarDate) -> Result<u32> {
        Ok(suggest_amount(&self.list_for_date(date).await?))
    }

    /// Slot board of `date` from already loaded feedings
    pub fn board_for(&self, date: CalendarDate, entries: &[FeedingEntry]) -> SlotBoard {
        self.schedule.board(date, entries, self.clock.now(), &self.zone)
    }

    pub async fn board(&self, date: CalendarDate) -> Result<SlotBoard> {
        let entries = self.list_for_date(date).await?;
        Ok(self.board_for(date, &entries))
    }
}

/// Accept finite positive gram amounts, rounded half up
pub fn validate_amount(amount_g: f64) -> Result<u32, ValidationError> {
    if !amount_g.is_finite() || amount_g <= 0.0 {
        return Err(ValidationError::InvalidAmount);
    }
    let rounded = (amount_g + 0.5).floor();
    if rounded < 1.0 || rounded > u32::MAX as f64 {
        return Err(ValidationError::InvalidAmount);
    }
    Ok(rounded as u32)
}

/// Amount of the latest positive feeding, else the default
pub fn suggest_amount(entries: &[FeedingEntry]) -> u32 {
    entries
        .iter()
        .filter(|e| e.amount_g > 0)
        .max_by_key(|e| e.fed_at)
        .map(|e| e.amount_g)
        .unwrap_or(DEFAULT_AMOUNT_G)
}

/// Stable sort, latest timestamp first
pub fn sort_newest_first<T>(entries: &mut [T], key: impl Fn(&T) -> DateTime<Utc>) {
    entries.sort_by(|a, b| key(b).cmp(&key(a)));
}
