//! Tempo schedule engine.
//!
//! Meeting persistence behind the [`MeetingStore`] trait, conflict
//! detection, business-hours slot search, auto-rescheduling of displaced
//! meetings, and schedule analytics.

pub mod analytics;
pub mod conflict;
pub mod error;
pub mod memory;
pub mod reschedule;
pub mod slots;
pub mod sqlite;
pub mod store;

pub use analytics::{MeetingAnalytics, ScheduleInsight};
pub use conflict::ConflictDetector;
pub use error::StoreError;
pub use memory::InMemoryMeetingStore;
pub use reschedule::{AutoRescheduler, RescheduleReport, RescheduledMeeting, UnresolvedConflict};
pub use slots::{BusinessWindow, SlotQuery, SlotSearch, TimeSlotCandidate};
pub use sqlite::{Database, SqliteMeetingStore};
pub use store::MeetingStore;
