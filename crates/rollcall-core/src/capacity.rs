//! Capacity model for an event: seat mode, occupants, and the optional
//! nested time-slot/category structure with its own sub-capacities.
//!
//! This module is pure data plus validation. All occupancy mutation happens
//! through the storage layer's conditional writes; nothing here touches
//! counters directly.

use crate::error::{CoreError, Result};
use crate::id::{CategoryId, EventId, SlotId, UserId, VolunteerId};
use crate::time::WallTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Seating mode of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum CapacityMode {
    /// No seat limit; occupants are recorded for bookkeeping only.
    Unlimited,
    /// Hard seat limit enforced by the allocator.
    Fixed {
        #[serde(rename = "maxSeats")]
        max_seats: u32,
    },
}

impl CapacityMode {
    pub fn max_seats(&self) -> Option<u32> {
        match self {
            Self::Unlimited => None,
            Self::Fixed { max_seats } => Some(*max_seats),
        }
    }
}

/// A named sub-capacity bucket nested inside a time slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// `None` means unlimited.
    pub max_occupants: Option<u32>,
    #[serde(default)]
    pub current_occupants: u32,
}

impl Category {
    pub fn new(id: impl Into<CategoryId>, name: impl Into<String>, max_occupants: Option<u32>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            max_occupants,
            current_occupants: 0,
        }
    }

    /// Whether another occupant fits under `max_occupants`.
    pub fn has_capacity(&self) -> bool {
        match self.max_occupants {
            None => true,
            Some(max) => self.current_occupants < max,
        }
    }
}

/// A time window within an event carrying its own categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: SlotId,
    pub name: String,
    pub start_time: WallTime,
    pub end_time: WallTime,
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl TimeSlot {
    /// Half-open interval overlap on `[start_time, end_time)`.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }

    pub fn category(&self, category_id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == category_id)
    }
}

/// A volunteer's chosen slot/category pair, required iff the event has time
/// slots enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSelection {
    pub slot_id: SlotId,
    pub category_id: CategoryId,
}

/// Capacity fields of an event.
///
/// The rest of the event (title, description, schedule, media) is owned by
/// the external event catalog; this document is the only part the sign-up
/// core reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCapacity {
    pub event_id: EventId,
    #[serde(flatten)]
    pub mode: CapacityMode,
    #[serde(default)]
    pub occupants: BTreeSet<VolunteerId>,
    #[serde(default)]
    pub time_slots_enabled: bool,
    #[serde(default)]
    pub time_slots: Vec<TimeSlot>,
    #[serde(default)]
    pub banned_volunteers: BTreeSet<VolunteerId>,
    #[serde(default)]
    pub removed_volunteers: BTreeSet<VolunteerId>,
    /// Organizing team allowed to run check-in/check-out.
    #[serde(default)]
    pub organizers: BTreeSet<UserId>,
    /// Primary creator; the only user who may mark attendance on other
    /// organizers' own registrations.
    pub created_by: UserId,
}

impl EventCapacity {
    pub fn new(event_id: impl Into<EventId>, mode: CapacityMode, created_by: impl Into<UserId>) -> Self {
        let created_by = created_by.into();
        let mut organizers = BTreeSet::new();
        organizers.insert(created_by.clone());
        Self {
            event_id: event_id.into(),
            mode,
            occupants: BTreeSet::new(),
            time_slots_enabled: false,
            time_slots: Vec::new(),
            banned_volunteers: BTreeSet::new(),
            removed_volunteers: BTreeSet::new(),
            organizers,
            created_by,
        }
    }

    pub fn with_time_slots(mut self, time_slots: Vec<TimeSlot>) -> Self {
        self.time_slots_enabled = !time_slots.is_empty();
        self.time_slots = time_slots;
        self
    }

    pub fn occupant_count(&self) -> usize {
        self.occupants.len()
    }

    pub fn is_occupant(&self, volunteer_id: &str) -> bool {
        self.occupants.contains(volunteer_id)
    }

    pub fn is_banned(&self, volunteer_id: &str) -> bool {
        self.banned_volunteers.contains(volunteer_id)
    }

    pub fn is_organizer(&self, user_id: &str) -> bool {
        self.created_by == user_id || self.organizers.contains(user_id)
    }

    /// Whether the event-wide gate has room for one more occupant.
    pub fn has_seat_capacity(&self) -> bool {
        match self.mode {
            CapacityMode::Unlimited => true,
            CapacityMode::Fixed { max_seats } => self.occupants.len() < max_seats as usize,
        }
    }

    pub fn slot(&self, slot_id: &str) -> Option<&TimeSlot> {
        self.time_slots.iter().find(|s| s.id == slot_id)
    }

    pub fn category(&self, slot_id: &str, category_id: &str) -> Option<&Category> {
        self.slot(slot_id).and_then(|s| s.category(category_id))
    }

    /// Validates the structural invariants of the capacity document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCapacity` on: zero `maxSeats`, more occupants than
    /// seats, slot ranges that are empty or overlap, duplicate slot ids,
    /// duplicate category names within one slot, or a category counter
    /// above its bound.
    pub fn validate(&self) -> Result<()> {
        if let CapacityMode::Fixed { max_seats } = self.mode {
            if max_seats == 0 {
                return Err(CoreError::invalid_capacity("maxSeats must be > 0"));
            }
            if self.occupants.len() > max_seats as usize {
                return Err(CoreError::invalid_capacity(format!(
                    "{} occupants exceed maxSeats {max_seats}",
                    self.occupants.len()
                )));
            }
        }

        if self.time_slots_enabled && self.time_slots.is_empty() {
            return Err(CoreError::invalid_capacity(
                "timeSlotsEnabled requires at least one time slot",
            ));
        }

        let mut slot_ids = BTreeSet::new();
        for slot in &self.time_slots {
            if !slot_ids.insert(slot.id.as_str()) {
                return Err(CoreError::invalid_capacity(format!(
                    "duplicate time slot id '{}'",
                    slot.id
                )));
            }
            if slot.start_time >= slot.end_time {
                return Err(CoreError::invalid_capacity(format!(
                    "time slot '{}' has empty range {}-{}",
                    slot.name, slot.start_time, slot.end_time
                )));
            }

            let mut names = BTreeSet::new();
            let mut cat_ids = BTreeSet::new();
            for category in &slot.categories {
                if !names.insert(category.name.as_str()) {
                    return Err(CoreError::invalid_capacity(format!(
                        "duplicate category name '{}' in slot '{}'",
                        category.name, slot.name
                    )));
                }
                if !cat_ids.insert(category.id.as_str()) {
                    return Err(CoreError::invalid_capacity(format!(
                        "duplicate category id '{}' in slot '{}'",
                        category.id, slot.name
                    )));
                }
                if let Some(max) = category.max_occupants {
                    if category.current_occupants > max {
                        return Err(CoreError::invalid_capacity(format!(
                            "category '{}' holds {} occupants over its limit {max}",
                            category.name, category.current_occupants
                        )));
                    }
                }
            }
        }

        for (i, a) in self.time_slots.iter().enumerate() {
            for b in &self.time_slots[i + 1..] {
                if a.overlaps(b) {
                    return Err(CoreError::invalid_capacity(format!(
                        "time slots '{}' and '{}' overlap",
                        a.name, b.name
                    )));
                }
            }
        }

        Ok(())
    }
}
