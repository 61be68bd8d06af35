//! # Domain Module
//!
//! Business rules of the tracker, independent of storage backend and
//! transport.
//!
//! ## Module Organization
//!
//! - **slot_schedule**: feeding anchors, slot classification and assignment
//! - **feeding_service**: logging feedings, manual slot confirmation, slot board
//! - **toilet_service**: logging toilet events
//! - **diary_service**: diary notes and the grouped timeline
//! - **overview_service**: the combined view of one day
//! - **export_service**: CSV snapshots across collections
//! - **clock**: current time and local calendar arithmetic
//! - **errors**: validation and export failures
//!
//! ## Business Rules
//!
//! - Feedings are tagged with the anchor they belong to; under the strict
//!   policy a feeding too far from every anchor is rejected
//! - Amounts are positive whole grams
//! - Entries are only ever created or deleted, never edited
//! - Input is validated before any store call

pub mod clock;
pub mod diary_service;
pub mod errors;
pub mod export_service;
pub mod feeding_service;
pub mod overview_service;
pub mod slot_schedule;
pub mod toilet_service;

pub use clock::{Clock, FixedClock, LocalZone, SystemClock};
pub use diary_service::DiaryService;
pub use errors::{ExportError, ValidationError};
pub use export_service::ExportService;
pub use feeding_service::FeedingService;
pub use overview_service::OverviewService;
pub use slot_schedule::{AssignmentPolicy, SlotSchedule};
pub use toilet_service::ToiletService;
