use async_trait::async_trait;
use papaya::{Compute, HashMap as PapayaHashMap, Operation};

use rollcall_core::EventCapacity;
use rollcall_storage::types::{CategoryReservation, SeatReservation};
use rollcall_storage::{EventStore, StorageError};

/// In-memory event capacity store.
///
/// The whole capacity document is the compare-and-swap unit: `compute`
/// re-runs its closure until the swap lands, so the occupancy checks and
/// the insertion they guard are one atomic step, matching the conditional
/// document update a database backend would issue.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    data: PapayaHashMap<String, EventCapacity>,
}

enum SeatAbort {
    MissingEvent,
    Full,
    AlreadyHeld,
}

enum CategoryAbort {
    MissingEvent,
    MissingCategory,
    Full,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self {
            data: PapayaHashMap::new(),
        }
    }

    /// Number of stored capacity documents, for diagnostics.
    pub fn len(&self) -> usize {
        self.data.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone-and-replace helper for the small ban/removed set mutations.
    ///
    /// `mutate` returns `false` to signal a no-op (the swap is skipped).
    fn update_sets<F>(&self, event_id: &str, mutate: F) -> Option<bool>
    where
        F: Fn(&mut EventCapacity) -> bool,
    {
        let guard = self.data.pin();
        let result = guard.compute(event_id.to_string(), |entry| match entry {
            None => Operation::Abort(None),
            Some((_, capacity)) => {
                let mut next = capacity.clone();
                if mutate(&mut next) {
                    Operation::Insert(next)
                } else {
                    Operation::Abort(Some(()))
                }
            }
        });
        match result {
            Compute::Updated { .. } => Some(true),
            Compute::Aborted(Some(())) => Some(false),
            _ => None,
        }
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn put_capacity(&self, capacity: EventCapacity) -> Result<(), StorageError> {
        capacity
            .validate()
            .map_err(|e| StorageError::invalid_record(e.to_string()))?;
        let guard = self.data.pin();
        guard.insert(capacity.event_id.clone(), capacity);
        Ok(())
    }

    async fn get_capacity(&self, event_id: &str) -> Result<Option<EventCapacity>, StorageError> {
        let guard = self.data.pin();
        Ok(guard.get(event_id).cloned())
    }

    async fn try_add_occupant(
        &self,
        event_id: &str,
        volunteer_id: &str,
    ) -> Result<SeatReservation, StorageError> {
        let guard = self.data.pin();
        let result = guard.compute(event_id.to_string(), |entry| match entry {
            None => Operation::Abort(SeatAbort::MissingEvent),
            Some((_, capacity)) => {
                // Membership first, so a racing duplicate reports
                // AlreadyHeld rather than Full.
                if capacity.is_occupant(volunteer_id) {
                    Operation::Abort(SeatAbort::AlreadyHeld)
                } else if !capacity.has_seat_capacity() {
                    Operation::Abort(SeatAbort::Full)
                } else {
                    let mut next = capacity.clone();
                    next.occupants.insert(volunteer_id.to_string());
                    Operation::Insert(next)
                }
            }
        });

        match result {
            Compute::Updated {
                new: (_, capacity), ..
            } => Ok(SeatReservation::Reserved {
                occupant_count: capacity.occupant_count(),
            }),
            Compute::Aborted(SeatAbort::MissingEvent) => {
                Err(StorageError::not_found("EventCapacity", event_id))
            }
            Compute::Aborted(SeatAbort::Full) => Ok(SeatReservation::Full),
            Compute::Aborted(SeatAbort::AlreadyHeld) => Ok(SeatReservation::AlreadyHeld),
            _ => Err(StorageError::internal("unexpected compute outcome")),
        }
    }

    async fn remove_occupant(
        &self,
        event_id: &str,
        volunteer_id: &str,
    ) -> Result<(), StorageError> {
        // Releasing against an unknown event or an absent occupant is a
        // no-op; withdraw must stay retry-safe.
        let _ = self.update_sets(event_id, |capacity| capacity.occupants.remove(volunteer_id));
        Ok(())
    }

    async fn try_add_category_occupant(
        &self,
        event_id: &str,
        slot_id: &str,
        category_id: &str,
    ) -> Result<CategoryReservation, StorageError> {
        let guard = self.data.pin();
        let result = guard.compute(event_id.to_string(), |entry| match entry {
            None => Operation::Abort(CategoryAbort::MissingEvent),
            Some((_, capacity)) => match capacity.category(slot_id, category_id) {
                None => Operation::Abort(CategoryAbort::MissingCategory),
                Some(category) if !category.has_capacity() => {
                    Operation::Abort(CategoryAbort::Full)
                }
                Some(_) => {
                    let mut next = capacity.clone();
                    for slot in &mut next.time_slots {
                        if slot.id == slot_id {
                            for category in &mut slot.categories {
                                if category.id == category_id {
                                    category.current_occupants += 1;
                                }
                            }
                        }
                    }
                    Operation::Insert(next)
                }
            },
        });

        match result {
            Compute::Updated {
                new: (_, capacity), ..
            } => {
                let current = capacity
                    .category(slot_id, category_id)
                    .map(|c| c.current_occupants)
                    .unwrap_or_default();
                Ok(CategoryReservation::Reserved {
                    current_occupants: current,
                })
            }
            Compute::Aborted(CategoryAbort::MissingEvent) => {
                Err(StorageError::not_found("EventCapacity", event_id))
            }
            Compute::Aborted(CategoryAbort::MissingCategory) => {
                Ok(CategoryReservation::SlotOrCategoryNotFound)
            }
            Compute::Aborted(CategoryAbort::Full) => Ok(CategoryReservation::Full),
            _ => Err(StorageError::internal("unexpected compute outcome")),
        }
    }

    async fn release_category_occupant(
        &self,
        event_id: &str,
        slot_id: &str,
        category_id: &str,
    ) -> Result<(), StorageError> {
        let _ = self.update_sets(event_id, |capacity| {
            let mut changed = false;
            for slot in &mut capacity.time_slots {
                if slot.id == slot_id {
                    for category in &mut slot.categories {
                        if category.id == category_id && category.current_occupants > 0 {
                            category.current_occupants -= 1;
                            changed = true;
                        }
                    }
                }
            }
            changed
        });
        Ok(())
    }

    async fn add_ban(&self, event_id: &str, volunteer_id: &str) -> Result<(), StorageError> {
        match self.update_sets(event_id, |capacity| {
            capacity.banned_volunteers.insert(volunteer_id.to_string())
        }) {
            None => Err(StorageError::not_found("EventCapacity", event_id)),
            Some(_) => Ok(()),
        }
    }

    async fn remove_ban(&self, event_id: &str, volunteer_id: &str) -> Result<(), StorageError> {
        let _ = self.update_sets(event_id, |capacity| {
            capacity.banned_volunteers.remove(volunteer_id)
        });
        Ok(())
    }

    async fn mark_removed(&self, event_id: &str, volunteer_id: &str) -> Result<(), StorageError> {
        match self.update_sets(event_id, |capacity| {
            capacity.removed_volunteers.insert(volunteer_id.to_string())
        }) {
            None => Err(StorageError::not_found("EventCapacity", event_id)),
            Some(_) => Ok(()),
        }
    }

    async fn clear_removed(&self, event_id: &str, volunteer_id: &str) -> Result<(), StorageError> {
        let _ = self.update_sets(event_id, |capacity| {
            capacity.removed_volunteers.remove(volunteer_id)
        });
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
