//! Storage abstraction for the Rollcall sign-up core.
//!
//! Defines the traits every backend must implement and the outcome types of
//! the conditional writes the concurrency model leans on. The in-memory
//! backend lives in `rollcall-db-memory`.

pub mod error;
pub mod traits;
pub mod types;

pub use error::StorageError;
pub use traits::{CredentialStore, EventStore, RegistrationStore};
pub use types::{CategoryReservation, ExitConsume, SeatReservation, TimeField, TimeWrite};
