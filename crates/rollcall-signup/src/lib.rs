//! The sign-up core: race-safe admission control, registration lifecycle,
//! single-use credentials, and the attendance state machine.
//!
//! Everything here runs from independent concurrent request handlers. The
//! only synchronization primitive used is the storage layer's conditional
//! writes; no in-process locks, so multiple stateless instances can share
//! one store.

pub mod allocator;
pub mod attendance;
pub mod authz;
pub mod credentials;
pub mod error;
pub mod registration;

pub use allocator::CapacityAllocator;
pub use attendance::{AttendanceService, CheckIn, CheckOut, Source};
pub use authz::Actor;
pub use credentials::CredentialService;
pub use error::SignupError;
pub use registration::{NewRegistration, OccupancySnapshot, RegistrationService};
