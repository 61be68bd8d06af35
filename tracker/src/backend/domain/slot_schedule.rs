//! Feeding slot schedule.
//!
//! A day has a fixed, ordered set of anchors (default 08:00, 12:00, 16:00,
//! 20:00). This module decides which anchor a feeding belongs to and what
//! lamp each anchor shows on the slot board:
//!
//! - **done**: a feeding is tagged with the anchor
//! - **future**: today, and the anchor is more than half a window away
//! - **due**: today, from half a window before the anchor until `late_after`
//!   minutes after it
//! - **overdue**: today and later than that, or any other day without a feeding

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{CalendarDate, FeedingEntry, SlotBoard, SlotCard, SlotState, SlotStatus, TimeOfDay};
use std::collections::HashMap;

use super::clock::LocalZone;
use super::errors::ValidationError;
use crate::backend::config::ScheduleConfig;

/// How a new feeding's timestamp is mapped to an anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentPolicy {
    /// Reject feedings further than the tolerance from every anchor
    Strict,
    /// Always take the closest anchor
    Nearest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotSchedule {
    anchors: Vec<TimeOfDay>,
    window_minutes: u32,
    late_after_minutes: u32,
    assignment: AssignmentPolicy,
    tolerance_minutes: u32,
}

impl SlotSchedule {
    pub fn new(
        anchors: Vec<TimeOfDay>,
        window_minutes: u32,
        late_after_minutes: u32,
        assignment: AssignmentPolicy,
        tolerance_minutes: u32,
    ) -> Self {
        Self {
            anchors,
            window_minutes,
            late_after_minutes,
            assignment,
            tolerance_minutes,
        }
    }

    pub fn from_config(config: &ScheduleConfig) -> Self {
        Self::new(
            config.anchors.clone(),
            config.window_minutes,
            config.late_after_minutes,
            config.assignment,
            config.assignment_tolerance_minutes,
        )
    }

    pub fn anchors(&self) -> &[TimeOfDay] {
        &self.anchors
    }

    pub fn contains(&self, anchor: TimeOfDay) -> bool {
        self.anchors.contains(&anchor)
    }

    /// Classify one anchor of one day.
    ///
    /// `now` must be `None` for any day other than today; the slot then only
    /// reports whether it was fed.
    pub fn classify(
        &self,
        anchor_instant: DateTime<Utc>,
        entry: Option<&FeedingEntry>,
        now: Option<DateTime<Utc>>,
        zone: &LocalZone,
    ) -> SlotStatus {
        if let Some(entry) = entry {
            return status(
                SlotState::Done,
                "Done",
                format!("Fed at {} ({} g)", zone.time_of(entry.fed_at), entry.amount_g),
            );
        }

        let Some(now) = now else {
            return status(SlotState::Overdue, "Not fed", "No entry".to_string());
        };

        let diff_minutes = round_half_up((now - anchor_instant).num_milliseconds() as f64 / 60_000.0);
        if (diff_minutes as f64) < -(self.window_minutes as f64) / 2.0 {
            status(
                SlotState::Future,
                "Not yet due",
                format!("Scheduled for {}", zone.time_of(anchor_instant)),
            )
        } else if diff_minutes <= self.late_after_minutes as i64 {
            status(SlotState::Due, "Due", "Please feed soon".to_string())
        } else {
            status(SlotState::Overdue, "Overdue", "No entry".to_string())
        }
    }

    /// Closest anchor and its distance in minutes; earlier anchors win ties.
    /// `None` only for an empty schedule.
    pub fn nearest_anchor(&self, time: TimeOfDay) -> Option<(TimeOfDay, u32)> {
        let mut best: Option<(TimeOfDay, u32)> = None;
        for anchor in &self.anchors {
            let distance = anchor.distance_minutes(time);
            if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                best = Some((*anchor, distance));
            }
        }
        best
    }

    pub fn nearest_anchor_within_tolerance(&self, time: TimeOfDay) -> Option<TimeOfDay> {
        self.nearest_anchor(time)
            .filter(|(_, distance)| *distance <= self.tolerance_minutes)
            .map(|(anchor, _)| anchor)
    }

    /// Pick the anchor for a new feeding according to the configured policy
    pub fn assign(&self, time: TimeOfDay) -> Result<TimeOfDay, ValidationError> {
        let assigned = match self.assignment {
            AssignmentPolicy::Strict => self.nearest_anchor_within_tolerance(time),
            AssignmentPolicy::Nearest => self.nearest_anchor(time).map(|(anchor, _)| anchor),
        };
        assigned.ok_or_else(|| ValidationError::OutsideSlotWindow {
            tolerance_minutes: self.tolerance_minutes,
            anchors: self
                .anchors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Latest feeding per anchor; entries without a slot are ignored
    pub fn representatives(entries: &[FeedingEntry]) -> HashMap<TimeOfDay, &FeedingEntry> {
        let mut by_slot: HashMap<TimeOfDay, &FeedingEntry> = HashMap::new();
        for entry in entries {
            let Some(slot) = entry.slot_time else { continue };
            match by_slot.get(&slot) {
                Some(current) if entry.fed_at <= current.fed_at => {}
                _ => {
                    by_slot.insert(slot, entry);
                }
            }
        }
        by_slot
    }

    /// Build the slot board of `date` from that day's feedings
    pub fn board(
        &self,
        date: CalendarDate,
        entries: &[FeedingEntry],
        now: DateTime<Utc>,
        zone: &LocalZone,
    ) -> SlotBoard {
        let today = zone.date_of(now);
        let is_today = date == today;
        let representatives = Self::representatives(entries);

        let slots = self
            .anchors
            .iter()
            .map(|anchor| {
                let anchor_instant = zone.at(date, *anchor);
                let entry = representatives.get(anchor).copied();
                let status = self.classify(anchor_instant, entry, is_today.then_some(now), zone);
                let can_mark_manually =
                    entry.is_none() && date <= today && (!is_today || anchor_instant <= now);
                SlotCard {
                    anchor: *anchor,
                    status,
                    entry_id: entry.map(|e| e.id.clone()),
                    can_mark_manually,
                }
            })
            .collect();

        SlotBoard {
            date,
            is_today,
            slots,
        }
    }
}

fn status(state: SlotState, label: &str, detail: String) -> SlotStatus {
    SlotStatus {
        state,
        label: label.to_string(),
        detail,
    }
}

/// Rounds halves towards positive infinity
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t(raw: &str) -> TimeOfDay {
        raw.parse().unwrap()
    }

    fn ts(raw: &str) -> DateTime<Utc> {
        raw.parse().unwrap()
    }

    fn schedule(policy: AssignmentPolicy) -> SlotSchedule {
        SlotSchedule::new(
            vec![t("08:00"), t("12:00"), t("16:00"), t("20:00")],
            120,
            90,
            policy,
            60,
        )
    }

    fn feeding(id: &str, fed_at: &str, slot: Option<&str>) -> FeedingEntry {
        FeedingEntry {
            id: id.to_string(),
            created_at: Some(ts(fed_at)),
            fed_at: ts(fed_at),
            amount_g: 180,
            fed_by: "Benny".to_string(),
            note: String::new(),
            slot_time: slot.map(t),
        }
    }

    fn state_at(offset: Duration) -> SlotState {
        let zone = LocalZone::utc();
        let anchor = ts("2024-05-01T08:00:00Z");
        schedule(AssignmentPolicy::Strict)
            .classify(anchor, None, Some(anchor + offset), &zone)
            .state
    }

    #[test]
    fn classification_boundaries_without_entry() {
        assert_eq!(state_at(Duration::minutes(-61)), SlotState::Future);
        assert_eq!(state_at(Duration::minutes(-60)), SlotState::Due);
        assert_eq!(state_at(Duration::zero()), SlotState::Due);
        assert_eq!(state_at(Duration::minutes(90)), SlotState::Due);
        assert_eq!(state_at(Duration::minutes(91)), SlotState::Overdue);
    }

    #[test]
    fn minute_difference_rounds_half_up() {
        assert_eq!(state_at(Duration::seconds(-(60 * 60 + 30))), SlotState::Due);
        assert_eq!(state_at(Duration::seconds(-(60 * 60 + 31))), SlotState::Future);
        assert_eq!(state_at(Duration::seconds(90 * 60 + 29)), SlotState::Due);
        assert_eq!(state_at(Duration::seconds(90 * 60 + 30)), SlotState::Overdue);
    }

    #[test]
    fn entry_marks_slot_done() {
        let zone = LocalZone::utc();
        let entry = feeding("a", "2024-05-01T08:12:00Z", Some("08:00"));
        let status = schedule(AssignmentPolicy::Strict).classify(
            ts("2024-05-01T08:00:00Z"),
            Some(&entry),
            None,
            &zone,
        );
        assert_eq!(status.state, SlotState::Done);
        assert_eq!(status.detail, "Fed at 08:12 (180 g)");
    }

    #[test]
    fn without_now_an_empty_slot_is_not_fed() {
        let status = schedule(AssignmentPolicy::Strict).classify(
            ts("2024-05-01T08:00:00Z"),
            None,
            None,
            &LocalZone::utc(),
        );
        assert_eq!(status.state, SlotState::Overdue);
        assert_eq!(status.label, "Not fed");
    }

    #[test]
    fn nearest_anchor_prefers_smaller_distance() {
        let schedule = schedule(AssignmentPolicy::Nearest);
        assert_eq!(schedule.nearest_anchor(t("13:05")), Some((t("12:00"), 65)));
        assert_eq!(schedule.nearest_anchor(t("10:00")), Some((t("08:00"), 120)));
        assert_eq!(schedule.nearest_anchor(t("23:59")).map(|(a, _)| a), Some(t("20:00")));
    }

    #[test]
    fn strict_policy_rejects_outside_tolerance() {
        let strict = schedule(AssignmentPolicy::Strict);
        assert_eq!(strict.nearest_anchor_within_tolerance(t("12:59")), None);
        assert_eq!(strict.nearest_anchor_within_tolerance(t("13:00")), None);
        assert_eq!(strict.nearest_anchor_within_tolerance(t("11:00")), Some(t("12:00")));
        assert!(matches!(
            strict.assign(t("13:05")),
            Err(ValidationError::OutsideSlotWindow { .. })
        ));

        let nearest = schedule(AssignmentPolicy::Nearest);
        assert_eq!(nearest.assign(t("13:05")).unwrap(), t("12:00"));
    }

    #[test]
    fn latest_entry_represents_slot() {
        let entries = vec![
            feeding("early", "2024-05-01T07:50:00Z", Some("08:00")),
            feeding("late", "2024-05-01T08:20:00Z", Some("08:00")),
            feeding("untagged", "2024-05-01T09:00:00Z", None),
        ];
        let reps = SlotSchedule::representatives(&entries);
        assert_eq!(reps.len(), 1);
        assert_eq!(reps[&t("08:00")].id, "late");
    }

    #[test]
    fn board_for_today() {
        let zone = LocalZone::utc();
        let date: CalendarDate = "2024-05-01".parse().unwrap();
        let entries = vec![feeding("a", "2024-05-01T08:05:00Z", Some("08:00"))];
        let board = schedule(AssignmentPolicy::Strict).board(
            date,
            &entries,
            ts("2024-05-01T13:05:00Z"),
            &zone,
        );

        assert!(board.is_today);
        let states: Vec<_> = board.slots.iter().map(|s| s.status.state).collect();
        assert_eq!(
            states,
            vec![SlotState::Done, SlotState::Due, SlotState::Future, SlotState::Future]
        );
        let markable: Vec<_> = board.slots.iter().map(|s| s.can_mark_manually).collect();
        assert_eq!(markable, vec![false, true, false, false]);
        assert_eq!(board.slots[0].entry_id.as_deref(), Some("a"));
    }

    #[test]
    fn board_for_other_days_ignores_clock() {
        let zone = LocalZone::utc();
        let now = ts("2024-05-02T06:00:00Z");
        let schedule = schedule(AssignmentPolicy::Strict);

        let past = schedule.board("2024-05-01".parse().unwrap(), &[], now, &zone);
        assert!(past.slots.iter().all(|s| s.status.state == SlotState::Overdue));
        assert!(past.slots.iter().all(|s| s.can_mark_manually));

        let future = schedule.board("2024-05-03".parse().unwrap(), &[], now, &zone);
        assert!(future.slots.iter().all(|s| s.status.label == "Not fed"));
        assert!(future.slots.iter().all(|s| !s.can_mark_manually));
    }
}
