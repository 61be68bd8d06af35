//! One-time consolidation of older feeding keys.
//!
//! Earlier versions of the app stored feedings under other keys sharing the
//! `dog-feedings-v` prefix. On first access the canonical key and every such
//! legacy key (sorted by name) are merged, de-duplicated and written back to
//! the canonical key together with the marker. Legacy keys stay untouched, so
//! the merge can be repeated without losing anything.

use anyhow::Result;
use log::info;
use shared::FeedingEntry;

use super::connection::DbConnection;
use super::local_store::decode_records;
use crate::backend::config::StorageConfig;
use crate::backend::storage::dedupe::dedupe_by_id;
use crate::backend::storage::error::StorageError;
use crate::backend::storage::record::StoredRecord;

const MIGRATED: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub legacy_keys: Vec<String>,
    pub merged_entries: usize,
}

/// Merge legacy feeding keys into the canonical key unless already done.
///
/// Returns `None` when the marker was already set.
pub async fn migrate_legacy_feedings(
    db: &DbConnection,
    keys: &StorageConfig,
) -> Result<Option<MigrationReport>> {
    if db.get_value(&keys.migration_marker_key).await?.as_deref() == Some(MIGRATED) {
        return Ok(None);
    }

    let legacy_keys: Vec<String> = db
        .list_keys()
        .await?
        .into_iter()
        .filter(|key| {
            key.starts_with(&keys.legacy_feeding_prefix)
                && *key != keys.feeding_key
                && *key != keys.migration_marker_key
        })
        .collect();

    let mut merged: Vec<StoredRecord<FeedingEntry>> = Vec::new();
    for key in std::iter::once(&keys.feeding_key).chain(legacy_keys.iter()) {
        let raw = db.get_value(key).await?;
        merged.extend(decode_records::<FeedingEntry>(key, raw.as_deref()));
    }
    let merged = dedupe_by_id(merged);

    let encoded = serde_json::to_string(&merged).map_err(StorageError::from)?;
    db.put_values(&[
        (keys.feeding_key.as_str(), encoded.as_str()),
        (keys.migration_marker_key.as_str(), MIGRATED),
    ])
    .await?;

    info!(
        "Consolidated {} feeding entries from {} legacy key(s)",
        merged.len(),
        legacy_keys.len()
    );

    Ok(Some(MigrationReport {
        legacy_keys,
        merged_entries: merged.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup_test() -> (TempDir, DbConnection, StorageConfig) {
        let dir = TempDir::new().unwrap();
        let keys = StorageConfig {
            database_path: dir.path().join("charly.db"),
            ..StorageConfig::default()
        };
        let db = DbConnection::open(&keys.database_path).await.unwrap();
        (dir, db, keys)
    }

    fn record(id: &str, created_at: &str, amount_g: u32) -> String {
        format!(
            r#"{{"id":"{}","created_at":"{}","fed_at":"2024-05-01T08:00:00Z","amount_g":{},"fed_by":"Benny","note":""}}"#,
            id, created_at, amount_g
        )
    }

    async fn canonical(db: &DbConnection, keys: &StorageConfig) -> Vec<FeedingEntry> {
        let raw = db.get_value(&keys.feeding_key).await.unwrap();
        decode_records(&keys.feeding_key, raw.as_deref())
            .into_iter()
            .filter_map(StoredRecord::into_entry)
            .collect()
    }

    #[tokio::test]
    async fn test_merges_legacy_keys_losslessly() {
        let (_dir, db, keys) = setup_test().await;
        db.put_value(
            "dog-feedings-v1",
            &format!("[{}]", record("a", "2024-05-01T08:00:00Z", 100)),
        )
        .await
        .unwrap();
        db.put_value(
            "dog-feedings-v0",
            &format!(
                "[{},{}]",
                record("a", "2024-05-01T09:00:00Z", 120),
                record("b", "2024-05-01T08:00:00Z", 150)
            ),
        )
        .await
        .unwrap();
        db.put_value("dog-toilet-v1", "[]").await.unwrap();

        let report = migrate_legacy_feedings(&db, &keys).await.unwrap().unwrap();
        assert_eq!(report.legacy_keys, vec!["dog-feedings-v0"]);
        assert_eq!(report.merged_entries, 2);

        let merged = canonical(&db, &keys).await;
        let ids: Vec<_> = merged.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(merged[0].amount_g, 120);

        // Legacy data is left in place
        assert!(db.get_value("dog-feedings-v0").await.unwrap().is_some());
        assert_eq!(
            db.get_value(&keys.migration_marker_key).await.unwrap().as_deref(),
            Some("1")
        );
    }

    #[tokio::test]
    async fn test_migration_is_idempotent() {
        let (_dir, db, keys) = setup_test().await;
        db.put_value(
            "dog-feedings-v0",
            &format!("[{}]", record("a", "2024-05-01T08:00:00Z", 100)),
        )
        .await
        .unwrap();

        assert!(migrate_legacy_feedings(&db, &keys).await.unwrap().is_some());
        let first = canonical(&db, &keys).await;

        assert!(migrate_legacy_feedings(&db, &keys).await.unwrap().is_none());
        assert_eq!(canonical(&db, &keys).await, first);

        // Re-running after the marker is cleared yields the same content
        db.delete_value(&keys.migration_marker_key).await.unwrap();
        assert!(migrate_legacy_feedings(&db, &keys).await.unwrap().is_some());
        assert_eq!(canonical(&db, &keys).await, first);
    }

    #[tokio::test]
    async fn test_unreadable_records_are_carried_over() {
        let (_dir, db, keys) = setup_test().await;
        let odd = r#"{"id":"a","fed_at":"2024-05-01T08:00:00Z","amount_g":180.5}"#;
        db.put_value("dog-feedings-v1", &format!("[{}]", odd)).await.unwrap();
        db.put_value(
            "dog-feedings-v0",
            &format!("[{{\"id\":\"z\",\"amount_g\":\"lots\"}},{}]", record("b", "2024-05-01T08:00:00Z", 150)),
        )
        .await
        .unwrap();

        let report = migrate_legacy_feedings(&db, &keys).await.unwrap().unwrap();
        assert_eq!(report.merged_entries, 3);

        let raw = db.get_value(&keys.feeding_key).await.unwrap().unwrap();
        let values: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
        let ids: Vec<_> = values.iter().map(|v| v["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "z", "b"]);
        assert_eq!(values[0], serde_json::from_str::<serde_json::Value>(odd).unwrap());
        assert_eq!(canonical(&db, &keys).await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_store_sets_marker() {
        let (_dir, db, keys) = setup_test().await;
        let report = migrate_legacy_feedings(&db, &keys).await.unwrap().unwrap();
        assert_eq!(report.merged_entries, 0);
        assert!(canonical(&db, &keys).await.is_empty());
    }
}
