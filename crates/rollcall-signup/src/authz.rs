//! Organizer authorization for attendance and event management calls.
//!
//! Identity itself is an external collaborator: the caller arrives with an
//! opaque user id the platform has already authenticated. This module only
//! answers whether that user may act on a given event.

use crate::error::SignupError;
use rollcall_core::EventCapacity;

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
}

impl Actor {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Requires the actor to be on the event's organizing team.
pub fn ensure_organizer(capacity: &EventCapacity, actor: &Actor) -> Result<(), SignupError> {
    if capacity.is_organizer(&actor.user_id) {
        Ok(())
    } else {
        Err(SignupError::unauthorized(&actor.user_id))
    }
}

/// Requires the actor to be allowed to mark attendance on a registration.
///
/// Any organizer may mark a volunteer-facing registration. When the
/// registration belongs to another member of the organizing team, only the
/// event's primary creator may mark it.
pub fn ensure_can_mark(
    capacity: &EventCapacity,
    actor: &Actor,
    subject_volunteer_id: &str,
) -> Result<(), SignupError> {
    ensure_organizer(capacity, actor)?;

    let subject_is_organizer = capacity.is_organizer(subject_volunteer_id);
    if subject_is_organizer
        && subject_volunteer_id != actor.user_id
        && capacity.created_by != actor.user_id
    {
        return Err(SignupError::unauthorized(&actor.user_id));
    }
    Ok(())
}

/// Requires the actor to be an organizer or the registration's own
/// volunteer (used for credential re-fetch).
pub fn ensure_organizer_or_self(
    capacity: &EventCapacity,
    actor: &Actor,
    volunteer_id: &str,
) -> Result<(), SignupError> {
    if actor.user_id == volunteer_id {
        return Ok(());
    }
    ensure_organizer(capacity, actor)
}
