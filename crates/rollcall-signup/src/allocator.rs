//! Admission gates over the storage layer's conditional writes.
//!
//! The allocator is the only component that touches occupancy counters.
//! Each gate is one compare-and-swap against the store; the N+1-th
//! concurrent reservation against an N-seat event observes rejection, never
//! an over-admit. Releases are idempotent and safe to retry; reservations
//! are not blindly retryable; the membership outcome tells a retrying
//! caller whether it already holds the seat.

use std::sync::Arc;

use crate::error::SignupError;
use rollcall_core::SlotSelection;
use rollcall_storage::types::{CategoryReservation, SeatReservation};
use rollcall_storage::{EventStore, StorageError};

#[derive(Clone)]
pub struct CapacityAllocator {
    events: Arc<dyn EventStore>,
}

impl CapacityAllocator {
    pub fn new(events: Arc<dyn EventStore>) -> Self {
        Self { events }
    }

    /// Attempts to take one event-wide seat.
    ///
    /// Returns the occupant count after a successful reservation.
    ///
    /// # Errors
    ///
    /// `Banned`, `AlreadyRegistered` (the volunteer already holds a seat),
    /// `NoSeatsAvailable`, or `EventNotFound`.
    pub async fn try_reserve_seat(
        &self,
        event_id: &str,
        volunteer_id: &str,
    ) -> Result<usize, SignupError> {
        let capacity = self
            .events
            .get_capacity(event_id)
            .await?
            .ok_or_else(|| SignupError::EventNotFound(event_id.to_string()))?;
        if capacity.is_banned(volunteer_id) {
            return Err(SignupError::banned(event_id, volunteer_id));
        }

        match self
            .events
            .try_add_occupant(event_id, volunteer_id)
            .await
            .map_err(|e| Self::map_missing_event(e, event_id))?
        {
            SeatReservation::Reserved { occupant_count } => Ok(occupant_count),
            SeatReservation::AlreadyHeld => {
                Err(SignupError::already_registered(event_id, volunteer_id))
            }
            SeatReservation::Full => Err(SignupError::no_seats(event_id)),
        }
    }

    /// Releases an event-wide seat. Idempotent; never underflows.
    pub async fn release_seat(
        &self,
        event_id: &str,
        volunteer_id: &str,
    ) -> Result<(), SignupError> {
        self.events.remove_occupant(event_id, volunteer_id).await?;
        Ok(())
    }

    /// Attempts to take one slot in a category.
    ///
    /// Returns the category's occupant count after a successful
    /// reservation. This gate is independent of the event-wide gate;
    /// callers resolve it first and compensate on a later seat failure.
    pub async fn try_reserve_category_slot(
        &self,
        event_id: &str,
        selection: &SlotSelection,
    ) -> Result<u32, SignupError> {
        match self
            .events
            .try_add_category_occupant(event_id, &selection.slot_id, &selection.category_id)
            .await
            .map_err(|e| Self::map_missing_event(e, event_id))?
        {
            CategoryReservation::Reserved { current_occupants } => Ok(current_occupants),
            CategoryReservation::Full => Err(SignupError::category_full(
                &selection.slot_id,
                &selection.category_id,
            )),
            CategoryReservation::SlotOrCategoryNotFound => Err(
                SignupError::slot_or_category_not_found(&selection.slot_id, &selection.category_id),
            ),
        }
    }

    /// Releases a category slot. Idempotent; never underflows.
    pub async fn release_category_slot(
        &self,
        event_id: &str,
        selection: &SlotSelection,
    ) -> Result<(), SignupError> {
        self.events
            .release_category_occupant(event_id, &selection.slot_id, &selection.category_id)
            .await?;
        Ok(())
    }

    fn map_missing_event(error: StorageError, event_id: &str) -> SignupError {
        if error.is_not_found() {
            SignupError::EventNotFound(event_id.to_string())
        } else {
            SignupError::Storage(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::{CapacityMode, Category, EventCapacity, TimeSlot};
    use rollcall_db_memory::InMemoryEventStore;

    async fn allocator_with(capacity: EventCapacity) -> CapacityAllocator {
        let store = Arc::new(InMemoryEventStore::new());
        store.put_capacity(capacity).await.unwrap();
        CapacityAllocator::new(store)
    }

    fn fixed(event_id: &str, max_seats: u32) -> EventCapacity {
        EventCapacity::new(event_id, CapacityMode::Fixed { max_seats }, "org-1")
    }

    #[tokio::test]
    async fn test_seat_gate_ordering_of_rejections() {
        let allocator = allocator_with(fixed("e1", 1)).await;

        assert_eq!(allocator.try_reserve_seat("e1", "v1").await.unwrap(), 1);

        // A duplicate reports AlreadyRegistered even though the event is
        // also full.
        let err = allocator.try_reserve_seat("e1", "v1").await.unwrap_err();
        assert!(matches!(err, SignupError::AlreadyRegistered { .. }));

        let err = allocator.try_reserve_seat("e1", "v2").await.unwrap_err();
        assert!(matches!(err, SignupError::NoSeatsAvailable { .. }));
    }

    #[tokio::test]
    async fn test_banned_volunteer_is_rejected_with_seats_free() {
        let mut capacity = fixed("e1", 5);
        capacity.banned_volunteers.insert("v1".into());
        let allocator = allocator_with(capacity).await;

        let err = allocator.try_reserve_seat("e1", "v1").await.unwrap_err();
        assert!(matches!(err, SignupError::Banned { .. }));
    }

    #[tokio::test]
    async fn test_unlimited_event_admits_and_records() {
        let allocator =
            allocator_with(EventCapacity::new("e1", CapacityMode::Unlimited, "org-1")).await;
        for i in 0..20 {
            let count = allocator
                .try_reserve_seat("e1", &format!("v{i}"))
                .await
                .unwrap();
            assert_eq!(count, i + 1);
        }
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let allocator = allocator_with(fixed("e1", 1)).await;
        allocator.try_reserve_seat("e1", "v1").await.unwrap();
        allocator.release_seat("e1", "v1").await.unwrap();
        allocator.release_seat("e1", "v1").await.unwrap();
        assert_eq!(allocator.try_reserve_seat("e1", "v2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_category_gate() {
        let capacity = EventCapacity::new("e1", CapacityMode::Unlimited, "org-1").with_time_slots(
            vec![TimeSlot {
                id: "morning".into(),
                name: "Morning".into(),
                start_time: "08:00".parse().unwrap(),
                end_time: "12:00".parse().unwrap(),
                categories: vec![Category::new("team-a", "TeamA", Some(1))],
            }],
        );
        let allocator = allocator_with(capacity).await;
        let selection = SlotSelection {
            slot_id: "morning".into(),
            category_id: "team-a".into(),
        };

        assert_eq!(
            allocator
                .try_reserve_category_slot("e1", &selection)
                .await
                .unwrap(),
            1
        );
        let err = allocator
            .try_reserve_category_slot("e1", &selection)
            .await
            .unwrap_err();
        assert!(matches!(err, SignupError::CategoryFull { .. }));

        let missing = SlotSelection {
            slot_id: "morning".into(),
            category_id: "team-z".into(),
        };
        let err = allocator
            .try_reserve_category_slot("e1", &missing)
            .await
            .unwrap_err();
        assert!(matches!(err, SignupError::SlotOrCategoryNotFound { .. }));

        allocator
            .release_category_slot("e1", &selection)
            .await
            .unwrap();
        assert_eq!(
            allocator
                .try_reserve_category_slot("e1", &selection)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_unknown_event() {
        let store = Arc::new(InMemoryEventStore::new());
        let allocator = CapacityAllocator::new(store);
        let err = allocator.try_reserve_seat("ghost", "v1").await.unwrap_err();
        assert!(matches!(err, SignupError::EventNotFound(_)));
    }
}
