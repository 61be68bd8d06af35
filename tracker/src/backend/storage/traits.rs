//! # Storage Traits
//!
//! The domain layer talks to one capability set, [`EntryStorage`], generic
//! over the kind of entry. The local key-value store and the remote tabular
//! store both implement it for every collection, so services never know which
//! backend is active.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::{
    CalendarDate, DiaryEntry, FeedingEntry, NewDiaryEntry, NewFeeding, NewToiletEvent,
    StorageInfo, ToiletEntry,
};
use std::sync::Arc;

/// The three persisted collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Feeding,
    Toilet,
    Diary,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Feeding => "feeding",
            Collection::Toilet => "toilet",
            Collection::Diary => "diary",
        }
    }

    /// Remote table name
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Feeding => "dog_feedings",
            Collection::Toilet => "dog_toilet_events",
            Collection::Diary => "family_diary_entries",
        }
    }

    /// Remote column that places a row on a day
    pub fn date_column(&self) -> &'static str {
        match self {
            Collection::Feeding => "fed_at",
            Collection::Toilet => "event_at",
            Collection::Diary => "entry_date",
        }
    }

    /// Remote column list
    pub fn select(&self) -> &'static str {
        match self {
            Collection::Feeding => "id,created_at,fed_at,amount_g,fed_by,note,slot_time",
            Collection::Toilet => "id,created_at,event_at,kind",
            Collection::Diary => "id,created_at,entry_date,text,author",
        }
    }

    /// Remote ordering for full listings
    pub fn order(&self) -> &'static str {
        match self {
            Collection::Feeding => "fed_at.desc",
            Collection::Toilet => "event_at.desc",
            Collection::Diary => "entry_date.desc,created_at.desc",
        }
    }
}

/// Where an entry sits in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryWhen {
    At(DateTime<Utc>),
    On(CalendarDate),
}

/// A persisted record of one collection
pub trait Entry: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Payload accepted by `create`
    type Draft: Serialize + Clone + Send + Sync + 'static;

    const COLLECTION: Collection;

    fn id(&self) -> &str;

    fn created_at(&self) -> Option<DateTime<Utc>>;

    fn when(&self) -> EntryWhen;

    fn from_draft(id: String, created_at: DateTime<Utc>, draft: Self::Draft) -> Self;

    /// Timestamp used to settle duplicate ids: `created_at`, else the event time
    fn recency(&self) -> Option<DateTime<Utc>> {
        self.created_at().or(match self.when() {
            EntryWhen::At(instant) => Some(instant),
            EntryWhen::On(_) => None,
        })
    }
}

impl Entry for FeedingEntry {
    type Draft = NewFeeding;
    const COLLECTION: Collection = Collection::Feeding;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn when(&self) -> EntryWhen {
        EntryWhen::At(self.fed_at)
    }

    fn from_draft(id: String, created_at: DateTime<Utc>, draft: NewFeeding) -> Self {
        FeedingEntry {
            id,
            created_at: Some(created_at),
            fed_at: draft.fed_at,
            amount_g: draft.amount_g,
            fed_by: draft.fed_by,
            note: draft.note,
            slot_time: draft.slot_time,
        }
    }
}

impl Entry for ToiletEntry {
    type Draft = NewToiletEvent;
    const COLLECTION: Collection = Collection::Toilet;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn when(&self) -> EntryWhen {
        EntryWhen::At(self.event_at)
    }

    fn from_draft(id: String, created_at: DateTime<Utc>, draft: NewToiletEvent) -> Self {
        ToiletEntry {
            id,
            created_at: Some(created_at),
            event_at: draft.event_at,
            kind: draft.kind,
        }
    }
}

impl Entry for DiaryEntry {
    type Draft = NewDiaryEntry;
    const COLLECTION: Collection = Collection::Diary;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn when(&self) -> EntryWhen {
        EntryWhen::On(self.entry_date)
    }

    fn from_draft(id: String, created_at: DateTime<Utc>, draft: NewDiaryEntry) -> Self {
        DiaryEntry {
            id,
            created_at: Some(created_at),
            entry_date: draft.entry_date,
            text: draft.text,
            author: draft.author,
        }
    }
}

/// Create, list and delete entries of one collection
#[async_trait]
pub trait EntryStorage<E: Entry>: Send + Sync {
    /// Entries belonging to the given local calendar day
    async fn list_by_date(&self, date: CalendarDate) -> Result<Vec<E>>;

    /// Every entry of the collection
    async fn list_all(&self) -> Result<Vec<E>>;

    /// Persist a new entry; the store assigns id and creation time
    async fn create(&self, draft: E::Draft) -> Result<E>;

    /// Remove an entry; unknown ids are not an error
    async fn delete(&self, id: &str) -> Result<()>;
}

/// One store per collection, all backed by the same adapter
#[derive(Clone)]
pub struct StoreSet {
    pub feedings: Arc<dyn EntryStorage<FeedingEntry>>,
    pub toilet: Arc<dyn EntryStorage<ToiletEntry>>,
    pub diary: Arc<dyn EntryStorage<DiaryEntry>>,
    pub info: StorageInfo,
}

impl StoreSet {
    /// Share a single adapter across all three collections
    pub fn from_adapter<S>(adapter: Arc<S>, info: StorageInfo) -> Self
    where
        S: EntryStorage<FeedingEntry>
            + EntryStorage<ToiletEntry>
            + EntryStorage<DiaryEntry>
            + 'static,
    {
        Self {
            feedings: adapter.clone(),
            toilet: adapter.clone(),
            diary: adapter,
            info,
        }
    }
}
