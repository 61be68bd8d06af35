//! Toilet event logging.

use anyhow::{Context, Result};
use log::info;
use shared::{CalendarDate, CreateToiletRequest, NewToiletEvent, ToiletEntry, ToiletKind};
use std::sync::Arc;

use super::clock::Clock;
use super::errors::ValidationError;
use super::feeding_service::sort_newest_first;
use crate::backend::storage::EntryStorage;

#[derive(Clone)]
pub struct ToiletService {
    store: Arc<dyn EntryStorage<ToiletEntry>>,
    clock: Arc<dyn Clock>,
}

impl ToiletService {
    pub fn new(store: Arc<dyn EntryStorage<ToiletEntry>>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn record(&self, request: CreateToiletRequest) -> Result<ToiletEntry> {
        let kind: ToiletKind = request
            .kind
            .parse()
            .map_err(ValidationError::InvalidToiletKind)?;
        let draft = NewToiletEvent {
            event_at: request.event_at.unwrap_or_else(|| self.clock.now()),
            kind,
        };

        let entry = self.store.create(draft).await?;
        info!("🚽 TOILET: {} at {} ({})", kind.as_str(), entry.event_at, entry.id);
        Ok(entry)
    }

    /// The day's events, newest first
    pub async fn list_for_date(&self, date: CalendarDate) -> Result<Vec<ToiletEntry>> {
        let mut entries = self
            .store
            .list_by_date(date)
            .await
            .with_context(|| format!("Loading toilet events for {}", date))?;
        sort_newest_first(&mut entries, |e| e.event_at);
        Ok(entries)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(id).await?;
        info!("🚽 TOILET: deleted {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::config::StorageConfig;
    use crate::backend::domain::clock::{FixedClock, LocalZone};
    use crate::backend::storage::LocalStore;
    use chrono::{DateTime, Utc};
    use tempfile::TempDir;

    fn ts(raw: &str) -> DateTime<Utc> {
        raw.parse().unwrap()
    }

    async fn setup_test() -> (TempDir, ToiletService) {
        let dir = TempDir::new().unwrap();
        let keys = StorageConfig {
            database_path: dir.path().join("charly.db"),
            ..StorageConfig::default()
        };
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(ts("2024-05-01T09:30:00Z")));
        let store = LocalStore::open(keys, LocalZone::utc(), clock.clone()).await.unwrap();
        (dir, ToiletService::new(Arc::new(store), clock))
    }

    #[tokio::test]
    async fn test_record_defaults_to_now() {
        let (_dir, service) = setup_test().await;
        let entry = service
            .record(CreateToiletRequest { kind: "piss".to_string(), event_at: None })
            .await
            .unwrap();
        assert_eq!(entry.kind, ToiletKind::Piss);
        assert_eq!(entry.event_at, ts("2024-05-01T09:30:00Z"));
    }

    #[tokio::test]
    async fn test_unknown_kind_is_rejected() {
        let (_dir, service) = setup_test().await;
        let err = service
            .record(CreateToiletRequest { kind: "POOP".to_string(), event_at: None })
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ValidationError>(),
            Some(ValidationError::InvalidToiletKind(kind)) if kind == "POOP"
        ));
        let date = "2024-05-01".parse().unwrap();
        assert!(service.list_for_date(date).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_newest_first_then_delete() {
        let (_dir, service) = setup_test().await;
        for at in ["2024-05-01T07:00:00Z", "2024-05-01T18:00:00Z"] {
            service
                .record(CreateToiletRequest { kind: "SHIT".to_string(), event_at: Some(ts(at)) })
                .await
                .unwrap();
        }
        let date = "2024-05-01".parse().unwrap();
        let listed = service.list_for_date(date).await.unwrap();
        assert_eq!(listed[0].event_at, ts("2024-05-01T18:00:00Z"));

        service.delete(&listed[0].id).await.unwrap();
        let listed = service.list_for_date(date).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].event_at, ts("2024-05-01T07:00:00Z"));
    }
}
