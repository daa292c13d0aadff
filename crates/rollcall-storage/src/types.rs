//! Outcome types for the conditional writes backends must provide.
//!
//! Capacity decisions are values, not errors: the caller translates them
//! into its own taxonomy. An `Err` from the same methods always means an
//! infrastructure failure, never a full event.

use rollcall_core::{ExitCredential, Registration, Timestamp};

/// Result of the event-wide seat reservation conditional write.
///
/// The membership check happens before the capacity check inside the same
/// atomic step, so a racing duplicate reports `AlreadyHeld` rather than a
/// misleading `Full`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatReservation {
    /// The volunteer now holds a seat.
    Reserved {
        /// Event-wide occupant count after the write.
        occupant_count: usize,
    },
    /// The event-wide gate is at capacity.
    Full,
    /// The volunteer already holds a seat on this event.
    AlreadyHeld,
}

/// Result of the per-category reservation conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryReservation {
    /// The category accepted one more occupant.
    Reserved {
        /// Category occupant count after the write.
        current_occupants: u32,
    },
    /// The category is at its `maxOccupants` bound.
    Full,
    /// The slot or category id does not exist on this event.
    SlotOrCategoryNotFound,
}

/// Result of a set-timestamp-if-unset conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeWrite {
    /// The timestamp was recorded; the updated registration is returned.
    Set(Registration),
    /// The timestamp was already present; nothing was written.
    AlreadySet {
        existing: Timestamp,
        registration: Registration,
    },
}

/// Result of atomically consuming an exit token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitConsume {
    /// This call consumed the token.
    Consumed(ExitCredential),
    /// The token was consumed earlier; returned for idempotent replies.
    AlreadyConsumed(ExitCredential),
    /// No such token.
    Unknown,
}

/// Which attendance timestamp a manual correction targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeField {
    In,
    Out,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_reservation_variants() {
        let reserved = SeatReservation::Reserved { occupant_count: 5 };
        assert_ne!(reserved, SeatReservation::Full);
        assert_ne!(SeatReservation::Full, SeatReservation::AlreadyHeld);
    }

    #[test]
    fn test_exit_consume_carries_credential() {
        let cred = ExitCredential::issue("r1");
        match ExitConsume::Consumed(cred.clone()) {
            ExitConsume::Consumed(c) => assert_eq!(c.registration_id, "r1"),
            _ => panic!("expected Consumed"),
        }
        assert_eq!(ExitConsume::Unknown, ExitConsume::Unknown);
    }
}
