//! Storage traits for the Rollcall storage abstraction layer.
//!
//! Backends must be thread-safe (`Send + Sync`) and must implement every
//! method documented as a conditional write with genuine single-shot
//! atomicity (compare-and-swap on the document or row), because admission
//! control runs from independent concurrent request handlers across
//! multiple stateless instances. No in-process locking is assumed.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::{CategoryReservation, ExitConsume, SeatReservation, TimeField, TimeWrite};
use rollcall_core::{EntryCredential, EventCapacity, ExitCredential, Registration, Timestamp};

/// Storage for event capacity documents and their occupancy counters.
///
/// The occupants set and the category counters are the only shared mutable
/// state in the system; they may be mutated only through the conditional
/// writes below, never through a read-modify-save of the whole document.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Inserts or replaces an event's capacity document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidRecord` if the document fails
    /// validation.
    async fn put_capacity(&self, capacity: EventCapacity) -> Result<(), StorageError>;

    /// Reads an event's capacity document. `None` if unknown.
    async fn get_capacity(&self, event_id: &str) -> Result<Option<EventCapacity>, StorageError>;

    /// Atomically adds `volunteer_id` to the occupants set iff the
    /// event-wide gate has room and the volunteer does not already hold a
    /// seat.
    ///
    /// This is the admission gate: the membership and capacity checks and
    /// the insertion are one conditional write. Two requests racing on the
    /// last seat must never both observe `Reserved`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown event; capacity
    /// decisions come back as [`SeatReservation`], never as errors.
    async fn try_add_occupant(
        &self,
        event_id: &str,
        volunteer_id: &str,
    ) -> Result<SeatReservation, StorageError>;

    /// Removes a volunteer from the occupants set. Idempotent: removing an
    /// absent occupant is a no-op, never an underflow.
    async fn remove_occupant(&self, event_id: &str, volunteer_id: &str)
    -> Result<(), StorageError>;

    /// Atomically increments a category's occupant counter iff it is below
    /// its bound. Same conditional-write discipline as
    /// [`try_add_occupant`](Self::try_add_occupant).
    async fn try_add_category_occupant(
        &self,
        event_id: &str,
        slot_id: &str,
        category_id: &str,
    ) -> Result<CategoryReservation, StorageError>;

    /// Decrements a category's occupant counter, floored at zero.
    /// Idempotent.
    async fn release_category_occupant(
        &self,
        event_id: &str,
        slot_id: &str,
        category_id: &str,
    ) -> Result<(), StorageError>;

    /// Adds a volunteer to the ban list.
    async fn add_ban(&self, event_id: &str, volunteer_id: &str) -> Result<(), StorageError>;

    /// Removes a volunteer from the ban list. Idempotent.
    async fn remove_ban(&self, event_id: &str, volunteer_id: &str) -> Result<(), StorageError>;

    /// Records that an organizer removed this volunteer. Removal is
    /// reversible: re-registration clears it again.
    async fn mark_removed(&self, event_id: &str, volunteer_id: &str) -> Result<(), StorageError>;

    /// Clears the removed marker for a volunteer. Idempotent.
    async fn clear_removed(&self, event_id: &str, volunteer_id: &str) -> Result<(), StorageError>;

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Storage for registrations.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Creates a registration.
    ///
    /// Uniqueness of the (event, volunteer) pair is enforced here,
    /// atomically: of two concurrent inserts for the same pair exactly one
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` when the pair already has an
    /// active registration.
    async fn insert(&self, registration: Registration) -> Result<(), StorageError>;

    /// Reads a registration by id. `None` if unknown.
    async fn get(&self, registration_id: &str) -> Result<Option<Registration>, StorageError>;

    /// Finds the active registration for an (event, volunteer) pair.
    async fn find_by_event_and_volunteer(
        &self,
        event_id: &str,
        volunteer_id: &str,
    ) -> Result<Option<Registration>, StorageError>;

    /// Lists all registrations of one event.
    async fn list_by_event(&self, event_id: &str) -> Result<Vec<Registration>, StorageError>;

    /// Atomically sets `in_time` iff it is unset.
    ///
    /// The attendance state machine is built on this write: whichever of
    /// two concurrent check-ins wins the conditional write performs the
    /// transition, the other observes `AlreadySet`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown registration.
    async fn try_set_in_time(
        &self,
        registration_id: &str,
        at: Timestamp,
    ) -> Result<TimeWrite, StorageError>;

    /// Atomically sets `out_time` iff it is unset. Same contract as
    /// [`try_set_in_time`](Self::try_set_in_time).
    async fn try_set_out_time(
        &self,
        registration_id: &str,
        at: Timestamp,
    ) -> Result<TimeWrite, StorageError>;

    /// Overwrites one attendance timestamp unconditionally (organizer data
    /// correction). `None` clears the field. Returns the updated
    /// registration.
    async fn overwrite_time(
        &self,
        registration_id: &str,
        field: TimeField,
        value: Option<Timestamp>,
    ) -> Result<Registration, StorageError>;

    /// Replaces both credential references. Returns the updated
    /// registration.
    async fn set_credential_refs(
        &self,
        registration_id: &str,
        entry_ref: Option<String>,
        exit_ref: Option<String>,
    ) -> Result<Registration, StorageError>;

    /// Deletes a registration, returning it if it existed. Idempotent.
    async fn delete(&self, registration_id: &str) -> Result<Option<Registration>, StorageError>;
}

/// Storage for the single-use entry/exit credentials.
///
/// Consume operations must be atomic: a token presented twice concurrently
/// is consumed exactly once, like an OAuth authorization code. Never log
/// token values.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Stores the entry credential for a registration (one per
    /// registration).
    async fn put_entry(&self, credential: EntryCredential) -> Result<(), StorageError>;

    /// Reads the live entry credential for a registration.
    async fn get_entry(&self, registration_id: &str)
    -> Result<Option<EntryCredential>, StorageError>;

    /// Atomically removes and returns the entry credential. Exactly one of
    /// two concurrent consumers receives `Some`.
    async fn consume_entry(
        &self,
        registration_id: &str,
    ) -> Result<Option<EntryCredential>, StorageError>;

    /// Stores a freshly minted exit credential.
    async fn put_exit(&self, credential: ExitCredential) -> Result<(), StorageError>;

    /// Reads an exit credential by token without consuming it (live or
    /// consumed). Used to authorize a scan before the token is burned.
    async fn get_exit(&self, token: &str) -> Result<Option<ExitCredential>, StorageError>;

    /// Finds the exit credential of a registration (live or consumed).
    async fn find_exit_by_registration(
        &self,
        registration_id: &str,
    ) -> Result<Option<ExitCredential>, StorageError>;

    /// Atomically marks an exit token consumed iff it is not already.
    ///
    /// The record is retained after consumption so a replayed scan can be
    /// answered idempotently; see [`ExitConsume`].
    async fn consume_exit(&self, token: &str) -> Result<ExitConsume, StorageError>;

    /// Removes every credential bound to a registration (withdrawal
    /// cleanup). Idempotent.
    async fn purge_for_registration(&self, registration_id: &str) -> Result<(), StorageError>;
}

// Ensure traits are object-safe by using them as trait objects
#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test that EventStore is object-safe
    fn _assert_event_store_object_safe(_: &dyn EventStore) {}

    // Compile-time test that RegistrationStore is object-safe
    fn _assert_registration_store_object_safe(_: &dyn RegistrationStore) {}

    // Compile-time test that CredentialStore is object-safe
    fn _assert_credential_store_object_safe(_: &dyn CredentialStore) {}
}
