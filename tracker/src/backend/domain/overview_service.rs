use anyhow::Result;
use chrono::{DateTime, Utc};
use shared::{CalendarDate, DayOverview};
use std::sync::Arc;

use super::clock::{Clock, LocalZone};
use super::diary_service::DiaryService;
use super::feeding_service::{suggest_amount, FeedingService};
use super::toilet_service::ToiletService;

/// Assembles everything shown for one selected day
#[derive(Clone)]
pub struct OverviewService {
    feeding_service: FeedingService,
    toilet_service: ToiletService,
    diary_service: DiaryService,
    zone: LocalZone,
    clock: Arc<dyn Clock>,
}

impl OverviewService {
    pub fn new(
        feeding_service: FeedingService,
        toilet_service: ToiletService,
        diary_service: DiaryService,
        zone: LocalZone,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            feeding_service,
            toilet_service,
            diary_service,
            zone,
            clock,
        }
    }

    /// Today in the configured local zone
    pub fn today(&self) -> CalendarDate {
        self.zone.date_of(self.clock.now())
    }

    /// Local calendar day of an instant
    pub fn date_of(&self, instant: DateTime<Utc>) -> CalendarDate {
        self.zone.date_of(instant)
    }

    /// The given day, or today when absent
    pub fn resolve_date(&self, date: Option<CalendarDate>) -> CalendarDate {
        date.unwrap_or_else(|| self.today())
    }

    pub async fn overview(&self, date: CalendarDate) -> Result<DayOverview> {
        let (feedings, toilet_events, diary_entries) = tokio::try_join!(
            self.feeding_service.list_for_date(date),
            self.toilet_service.list_for_date(date),
            self.diary_service.list_for_date(date),
        )?;

        Ok(DayOverview {
            date,
            slot_board: self.feeding_service.board_for(date, &feedings),
            suggested_amount_g: suggest_amount(&feedings),
            feedings,
            toilet_events,
            diary_entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::config::StorageConfig;
    use crate::backend::domain::clock::FixedClock;
    use crate::backend::domain::feeding_service::DEFAULT_AMOUNT_G;
    use crate::backend::domain::slot_schedule::{AssignmentPolicy, SlotSchedule};
    use crate::backend::storage::LocalStore;
    use shared::{CreateDiaryRequest, CreateFeedingRequest, CreateToiletRequest, SlotState};
    use tempfile::TempDir;

    fn ts(raw: &str) -> DateTime<Utc> {
        raw.parse().unwrap()
    }

    async fn setup_test() -> (TempDir, OverviewService) {
        let dir = TempDir::new().unwrap();
        let keys = StorageConfig {
            database_path: dir.path().join("charly.db"),
            ..StorageConfig::default()
        };
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(ts("2024-05-01T12:30:00Z")));
        let zone = LocalZone::utc();
        let store = Arc::new(LocalStore::open(keys, zone, clock.clone()).await.unwrap());
        let schedule = SlotSchedule::new(
            ["08:00", "12:00", "16:00", "20:00"].iter().map(|t| t.parse().unwrap()).collect(),
            120,
            90,
            AssignmentPolicy::Strict,
            60,
        );
        let service = OverviewService::new(
            FeedingService::new(store.clone(), schedule, zone, clock.clone()),
            ToiletService::new(store.clone(), clock.clone()),
            DiaryService::new(store),
            zone,
            clock,
        );
        (dir, service)
    }

    #[tokio::test]
    async fn test_empty_day() {
        let (_dir, service) = setup_test().await;
        let overview = service.overview(service.today()).await.unwrap();
        assert!(overview.slot_board.is_today);
        assert_eq!(overview.suggested_amount_g, DEFAULT_AMOUNT_G);
        assert_eq!(overview.slot_board.slots[0].status.state, SlotState::Overdue);
        assert_eq!(overview.slot_board.slots[1].status.state, SlotState::Due);
    }

    #[tokio::test]
    async fn test_overview_collects_all_collections() {
        let (_dir, service) = setup_test().await;
        service
            .feeding_service
            .record(CreateFeedingRequest {
                amount_g: 200.0,
                fed_by: Some("Benny".to_string()),
                note: None,
                fed_at: None,
            })
            .await
            .unwrap();
        service
            .toilet_service
            .record(CreateToiletRequest { kind: "SHIT".to_string(), event_at: None })
            .await
            .unwrap();
        service
            .diary_service
            .record(CreateDiaryRequest {
                entry_date: Some("2024-05-01".to_string()),
                text: "vet visit".to_string(),
                author: None,
            })
            .await
            .unwrap();

        let overview = service.overview(service.resolve_date(None)).await.unwrap();
        assert_eq!(overview.feedings.len(), 1);
        assert_eq!(overview.toilet_events.len(), 1);
        assert_eq!(overview.diary_entries.len(), 1);
        assert_eq!(overview.suggested_amount_g, 200);
        assert_eq!(overview.slot_board.slots[1].status.state, SlotState::Done);

        let yesterday = service.overview(service.today().add_days(-1)).await.unwrap();
        assert!(yesterday.feedings.is_empty());
        assert!(!yesterday.slot_board.is_today);
    }
}
