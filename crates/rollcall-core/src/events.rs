//! Change-notification payloads published after admissions, withdrawals,
//! and attendance transitions so observers (the live seat counter on the
//! event page) stay consistent.
//!
//! The core publishes these through the `Notifier` capability; transports
//! live in `rollcall-notify`.

use crate::id::{CategoryId, EventId, RegistrationId, SlotId, VolunteerId};
use crate::time::{Timestamp, now_utc};
use serde::{Deserialize, Serialize};

/// Topic names used on the notification bus.
pub mod topics {
    pub const OCCUPANCY: &str = "events.occupancy";
    pub const ATTENDANCE: &str = "events.attendance";
}

/// Occupancy of one category after a reservation or release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryOccupancy {
    pub slot_id: SlotId,
    pub category_id: CategoryId,
    pub current_occupants: u32,
}

/// Published whenever a seat is taken or released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyChanged {
    pub event_id: EventId,
    /// Event-wide occupant count after the change.
    pub occupant_count: usize,
    /// +1 for an admission, -1 for a withdrawal.
    pub delta: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryOccupancy>,
    pub timestamp: Timestamp,
}

impl OccupancyChanged {
    pub fn admitted(event_id: impl Into<EventId>, occupant_count: usize) -> Self {
        Self {
            event_id: event_id.into(),
            occupant_count,
            delta: 1,
            category: None,
            timestamp: now_utc(),
        }
    }

    pub fn withdrawn(event_id: impl Into<EventId>, occupant_count: usize) -> Self {
        Self {
            event_id: event_id.into(),
            occupant_count,
            delta: -1,
            category: None,
            timestamp: now_utc(),
        }
    }

    pub fn with_category(mut self, category: CategoryOccupancy) -> Self {
        self.category = Some(category);
        self
    }
}

/// Published on check-in and check-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceChanged {
    pub event_id: EventId,
    pub registration_id: RegistrationId,
    pub volunteer_id: VolunteerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_time: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_time: Option<Timestamp>,
    pub timestamp: Timestamp,
}

impl AttendanceChanged {
    pub fn checked_in(
        event_id: impl Into<EventId>,
        registration_id: impl Into<RegistrationId>,
        volunteer_id: impl Into<VolunteerId>,
        in_time: Timestamp,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            registration_id: registration_id.into(),
            volunteer_id: volunteer_id.into(),
            in_time: Some(in_time),
            out_time: None,
            timestamp: now_utc(),
        }
    }

    pub fn checked_out(
        event_id: impl Into<EventId>,
        registration_id: impl Into<RegistrationId>,
        volunteer_id: impl Into<VolunteerId>,
        out_time: Timestamp,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            registration_id: registration_id.into(),
            volunteer_id: volunteer_id.into(),
            in_time: None,
            out_time: Some(out_time),
            timestamp: now_utc(),
        }
    }
}
