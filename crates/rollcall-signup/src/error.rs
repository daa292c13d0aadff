use rollcall_core::CoreError;
use rollcall_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the sign-up core.
///
/// Admission and attendance failures are specific and actionable; callers
/// render them directly. None of them are retried automatically by the
/// core.
#[derive(Debug, Error)]
pub enum SignupError {
    #[error("Volunteer {volunteer_id} is already registered for event {event_id}")]
    AlreadyRegistered {
        event_id: String,
        volunteer_id: String,
    },

    #[error("Volunteer {volunteer_id} is banned from event {event_id}")]
    Banned {
        event_id: String,
        volunteer_id: String,
    },

    #[error("Event {event_id} has no seats available")]
    NoSeatsAvailable { event_id: String },

    #[error("Category {category_id} in slot {slot_id} is full")]
    CategoryFull {
        slot_id: String,
        category_id: String,
    },

    #[error("Slot/category {slot_id}/{category_id} does not exist on this event")]
    SlotOrCategoryNotFound {
        slot_id: String,
        category_id: String,
    },

    #[error("Event {event_id} uses time slots; a slot selection is required")]
    SlotSelectionRequired { event_id: String },

    #[error("Volunteer {volunteer_id} has no registration for event {event_id}")]
    NotRegistered {
        event_id: String,
        volunteer_id: String,
    },

    #[error("Registration not found: {0}")]
    RegistrationNotFound(String),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Credential is invalid or expired")]
    InvalidOrExpiredCredential,

    #[error("Registration {0} has not been checked in")]
    NotCheckedIn(String),

    #[error("User {user_id} is not authorized for this operation")]
    Unauthorized { user_id: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl SignupError {
    pub fn already_registered(event_id: impl Into<String>, volunteer_id: impl Into<String>) -> Self {
        Self::AlreadyRegistered {
            event_id: event_id.into(),
            volunteer_id: volunteer_id.into(),
        }
    }

    pub fn banned(event_id: impl Into<String>, volunteer_id: impl Into<String>) -> Self {
        Self::Banned {
            event_id: event_id.into(),
            volunteer_id: volunteer_id.into(),
        }
    }

    pub fn no_seats(event_id: impl Into<String>) -> Self {
        Self::NoSeatsAvailable {
            event_id: event_id.into(),
        }
    }

    pub fn category_full(slot_id: impl Into<String>, category_id: impl Into<String>) -> Self {
        Self::CategoryFull {
            slot_id: slot_id.into(),
            category_id: category_id.into(),
        }
    }

    pub fn slot_or_category_not_found(
        slot_id: impl Into<String>,
        category_id: impl Into<String>,
    ) -> Self {
        Self::SlotOrCategoryNotFound {
            slot_id: slot_id.into(),
            category_id: category_id.into(),
        }
    }

    pub fn not_registered(event_id: impl Into<String>, volunteer_id: impl Into<String>) -> Self {
        Self::NotRegistered {
            event_id: event_id.into(),
            volunteer_id: volunteer_id.into(),
        }
    }

    pub fn unauthorized(user_id: impl Into<String>) -> Self {
        Self::Unauthorized {
            user_id: user_id.into(),
        }
    }

    /// Capacity/conflict class: the request was well-formed but the state
    /// machine or a gate rejected it.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadyRegistered { .. }
                | Self::NoSeatsAvailable { .. }
                | Self::CategoryFull { .. }
                | Self::NotCheckedIn(_)
        )
    }

    /// Lookup class: the referenced entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SlotOrCategoryNotFound { .. }
                | Self::NotRegistered { .. }
                | Self::RegistrationNotFound(_)
                | Self::EventNotFound(_)
        )
    }
}

/// Convenience result type for sign-up operations
pub type Result<T> = std::result::Result<T, SignupError>;
