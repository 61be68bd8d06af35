//! Local store: each collection is one JSON array under one key of the
//! SQLite key-value table.

use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use serde_json::Value;
use shared::{CalendarDate, StorageInfo, StorageMode};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::connection::DbConnection;
use super::migration::{migrate_legacy_feedings, MigrationReport};
use crate::backend::config::StorageConfig;
use crate::backend::domain::clock::{Clock, LocalZone};
use crate::backend::storage::dedupe::dedupe_by_id;
use crate::backend::storage::error::StorageError;
use crate::backend::storage::record::StoredRecord;
use crate::backend::storage::traits::{Collection, Entry, EntryStorage, EntryWhen};

#[derive(Clone)]
pub struct LocalStore {
    db: DbConnection,
    keys: StorageConfig,
    zone: LocalZone,
    clock: Arc<dyn Clock>,
    /// Serializes read-modify-write cycles within this process
    write_lock: Arc<Mutex<()>>,
}

impl LocalStore {
    pub fn new(db: DbConnection, keys: StorageConfig, zone: LocalZone, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            keys,
            zone,
            clock,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn open(keys: StorageConfig, zone: LocalZone, clock: Arc<dyn Clock>) -> Result<Self> {
        let db = DbConnection::open(&keys.database_path).await?;
        info!("Opened local store at {}", keys.database_path.display());
        Ok(Self::new(db, keys, zone, clock))
    }

    pub fn info(&self) -> StorageInfo {
        StorageInfo {
            mode: StorageMode::Local,
            description: format!(
                "Local storage in {} (this device only)",
                self.keys.database_path.display()
            ),
        }
    }

    /// Run the legacy feeding key consolidation now instead of on first read
    pub async fn migrate_feedings(&self) -> Result<Option<MigrationReport>> {
        let _guard = self.write_lock.lock().await;
        migrate_legacy_feedings(&self.db, &self.keys).await
    }

    fn key_for(&self, collection: Collection) -> &str {
        match collection {
            Collection::Feeding => &self.keys.feeding_key,
            Collection::Toilet => &self.keys.toilet_key,
            Collection::Diary => &self.keys.diary_key,
        }
    }

    /// Read a collection, unreadable records included; the caller holds the
    /// write lock
    async fn load_records<E: Entry>(&self) -> Result<Vec<StoredRecord<E>>> {
        if E::COLLECTION == Collection::Feeding {
            migrate_legacy_feedings(&self.db, &self.keys).await?;
        }
        let key = self.key_for(E::COLLECTION);
        let raw = self.db.get_value(key).await?;
        Ok(dedupe_by_id(decode_records(key, raw.as_deref())))
    }

    async fn load<E: Entry>(&self) -> Result<Vec<E>> {
        let records = self.load_records::<E>().await?;
        Ok(records.into_iter().filter_map(StoredRecord::into_entry).collect())
    }

    async fn save<E: Entry>(&self, records: Vec<StoredRecord<E>>) -> Result<()> {
        let records = dedupe_by_id(records);
        let encoded = serde_json::to_string(&records).map_err(StorageError::from)?;
        self.db.put_value(self.key_for(E::COLLECTION), &encoded).await
    }

    fn on_date<E: Entry>(&self, entry: &E, date: CalendarDate) -> bool {
        match entry.when() {
            EntryWhen::At(instant) => {
                let (start, end) = self.zone.day_bounds(date);
                start <= instant && instant <= end
            }
            EntryWhen::On(entry_date) => entry_date == date,
        }
    }
}

/// Decode a stored JSON array, tolerating damage.
///
/// Anything that is not an array reads as empty; records that do not decode
/// are kept raw.
pub(super) fn decode_records<E: Entry>(key: &str, raw: Option<&str>) -> Vec<StoredRecord<E>> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let values: Vec<Value> = match serde_json::from_str(raw) {
        Ok(values) => values,
        Err(e) => {
            warn!("Ignoring malformed data under '{}': {}", key, e);
            return Vec::new();
        }
    };

    values
        .into_iter()
        .map(|value| StoredRecord::decode(value, key))
        .collect()
}

#[async_trait]
impl<E: Entry> EntryStorage<E> for LocalStore {
    async fn list_by_date(&self, date: CalendarDate) -> Result<Vec<E>> {
        let _guard = self.write_lock.lock().await;
        let entries = self.load::<E>().await?;
        Ok(entries.into_iter().filter(|e| self.on_date(e, date)).collect())
    }

    async fn list_all(&self) -> Result<Vec<E>> {
        let _guard = self.write_lock.lock().await;
        self.load::<E>().await
    }

    async fn create(&self, draft: E::Draft) -> Result<E> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load_records::<E>().await?;
        let entry = E::from_draft(Uuid::new_v4().to_string(), self.clock.now(), draft);
        records.push(StoredRecord::Entry(entry.clone()));
        self.save(records).await?;
        info!("Stored {} entry {}", E::COLLECTION.name(), entry.id());
        Ok(entry)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let records = self.load_records::<E>().await?;
        let before = records.len();
        let remaining: Vec<StoredRecord<E>> = records
            .into_iter()
            .filter(|record| record.id().as_deref() != Some(id))
            .collect();
        if remaining.len() == before {
            info!("No {} entry {} to delete", E::COLLECTION.name(), id);
            return Ok(());
        }
        self.save(remaining).await?;
        info!("Deleted {} entry {}", E::COLLECTION.name(), id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::domain::clock::FixedClock;
    use chrono::{DateTime, Utc};
    use shared::{
        DiaryEntry, FeedingEntry, NewDiaryEntry, NewFeeding, NewToiletEvent, ToiletEntry, ToiletKind,
    };
    use tempfile::TempDir;

    fn ts(raw: &str) -> DateTime<Utc> {
        raw.parse().unwrap()
    }

    async fn setup_test(zone: LocalZone) -> (TempDir, LocalStore) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let keys = StorageConfig {
            database_path: dir.path().join("charly.db"),
            ..StorageConfig::default()
        };
        let clock = Arc::new(FixedClock(ts("2024-05-01T12:00:00Z")));
        let store = LocalStore::open(keys, zone, clock).await.expect("Failed to open store");
        (dir, store)
    }

    fn new_feeding(fed_at: &str) -> NewFeeding {
        NewFeeding {
            fed_at: ts(fed_at),
            amount_g: 180,
            fed_by: "Benny".to_string(),
            note: String::new(),
            slot_time: None,
        }
    }

    #[tokio::test]
    async fn test_create_list_delete_round_trip() {
        let (_dir, store) = setup_test(LocalZone::utc()).await;

        let created: FeedingEntry = store.create(new_feeding("2024-05-01T08:05:00Z")).await.unwrap();
        assert!(!created.id.is_empty());
        assert_eq!(created.created_at, Some(ts("2024-05-01T12:00:00Z")));

        let date: CalendarDate = "2024-05-01".parse().unwrap();
        let listed: Vec<FeedingEntry> = store.list_by_date(date).await.unwrap();
        assert_eq!(listed, vec![created.clone()]);

        EntryStorage::<FeedingEntry>::delete(&store, &created.id).await.unwrap();
        let listed: Vec<FeedingEntry> = store.list_all().await.unwrap();
        assert!(listed.is_empty());

        // Unknown ids are a no-op
        EntryStorage::<FeedingEntry>::delete(&store, "missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_day_filter_uses_local_bounds_inclusively() {
        let zone = LocalZone::from_offset_str("+02:00").unwrap();
        let (_dir, store) = setup_test(zone).await;

        for at in [
            "2024-04-30T21:59:59.999Z",
            "2024-04-30T22:00:00Z",
            "2024-05-01T21:59:59.999Z",
            "2024-05-01T22:00:00Z",
        ] {
            let _: ToiletEntry = store
                .create(NewToiletEvent { event_at: ts(at), kind: ToiletKind::Shit })
                .await
                .unwrap();
        }

        let listed: Vec<ToiletEntry> = store.list_by_date("2024-05-01".parse().unwrap()).await.unwrap();
        let mut times: Vec<_> = listed.iter().map(|e| e.event_at).collect();
        times.sort();
        assert_eq!(times, vec![ts("2024-04-30T22:00:00Z"), ts("2024-05-01T21:59:59.999Z")]);
    }

    #[tokio::test]
    async fn test_diary_filters_by_entry_date() {
        let (_dir, store) = setup_test(LocalZone::utc()).await;
        for date in ["2024-05-01", "2024-05-02"] {
            let _: DiaryEntry = store
                .create(NewDiaryEntry {
                    entry_date: date.parse().unwrap(),
                    text: format!("note for {}", date),
                    author: "Anna".to_string(),
                })
                .await
                .unwrap();
        }
        let listed: Vec<DiaryEntry> = store.list_by_date("2024-05-02".parse().unwrap()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].text, "note for 2024-05-02");
    }

    #[tokio::test]
    async fn test_malformed_json_reads_as_empty() {
        let (_dir, store) = setup_test(LocalZone::utc()).await;
        store.db.put_value("dog-toilet-v1", "{not json").await.unwrap();
        let listed: Vec<ToiletEntry> = store.list_all().await.unwrap();
        assert!(listed.is_empty());

        // A fresh write replaces the damaged value
        let _: ToiletEntry = store
            .create(NewToiletEvent { event_at: ts("2024-05-01T08:00:00Z"), kind: ToiletKind::Piss })
            .await
            .unwrap();
        let listed: Vec<ToiletEntry> = store.list_all().await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_records_skipped_and_duplicates_collapsed() {
        let (_dir, store) = setup_test(LocalZone::utc()).await;
        let raw = r#"[
            {"id":"a","event_at":"2024-05-01T08:00:00Z","kind":"PISS"},
            {"id":"b","event_at":"2024-05-01T09:00:00Z","kind":"SOMETHING"},
            {"id":"a","created_at":"2024-05-01T10:00:00Z","event_at":"2024-05-01T08:00:00Z","kind":"SHIT"}
        ]"#;
        store.db.put_value("dog-toilet-v1", raw).await.unwrap();

        let listed: Vec<ToiletEntry> = store.list_all().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].kind, ToiletKind::Shit);
    }

    #[tokio::test]
    async fn test_unreadable_records_survive_unrelated_writes() {
        let (_dir, store) = setup_test(LocalZone::utc()).await;
        let raw = r#"[
            {"id":"keep","event_at":"2024-05-01T08:00:00Z","kind":"PISS"},
            {"id":"odd","event_at":"2024-05-01T09:00:00Z","kind":"Piss","extra":true}
        ]"#;
        store.db.put_value("dog-toilet-v1", raw).await.unwrap();

        let created: ToiletEntry = store
            .create(NewToiletEvent { event_at: ts("2024-05-01T10:00:00Z"), kind: ToiletKind::Shit })
            .await
            .unwrap();
        EntryStorage::<ToiletEntry>::delete(&store, "keep").await.unwrap();

        let stored = store.db.get_value("dog-toilet-v1").await.unwrap().unwrap();
        let values: Vec<Value> = serde_json::from_str(&stored).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(
            values[0],
            serde_json::json!({"id":"odd","event_at":"2024-05-01T09:00:00Z","kind":"Piss","extra":true})
        );
        assert_eq!(values[1]["id"], created.id.as_str());

        let listed: Vec<ToiletEntry> = store.list_all().await.unwrap();
        assert_eq!(listed, vec![created]);

        // Unreadable records can still be removed by id
        EntryStorage::<ToiletEntry>::delete(&store, "odd").await.unwrap();
        let stored = store.db.get_value("dog-toilet-v1").await.unwrap().unwrap();
        assert!(!stored.contains("odd"));
    }

    #[tokio::test]
    async fn test_legacy_records_without_created_at_and_null_text() {
        let (_dir, store) = setup_test(LocalZone::utc()).await;
        let raw = r#"[{"id":"a","fed_at":"2024-05-01T08:00:00Z","amount_g":150,"fed_by":null,"note":null}]"#;
        store.db.put_value("dog-feedings-v1", raw).await.unwrap();

        let listed: Vec<FeedingEntry> = store.list_all().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].fed_by, "");
        assert_eq!(listed[0].slot_time, None);
        assert_eq!(listed[0].created_at, None);
    }

    #[tokio::test]
    async fn test_info_reports_local_mode() {
        let (_dir, store) = setup_test(LocalZone::utc()).await;
        assert_eq!(store.info().mode, StorageMode::Local);
        let listed: Vec<FeedingEntry> = store.list_all().await.unwrap();
        assert!(listed.is_empty());
    }
}
