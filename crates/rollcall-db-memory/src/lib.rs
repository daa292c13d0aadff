//! In-memory storage backend for the Rollcall server.
//!
//! Built on `papaya`'s lock-free `HashMap`. Every conditional write the
//! storage contracts demand is implemented with `compute`, papaya's
//! retried compare-and-swap, so admission decisions stay linearizable per
//! key without any in-process locking.
//!
//! Intended for tests, local development, and single-node deployments; a
//! database-backed implementation would express the same conditional
//! writes as conditional UPDATE statements.

pub mod credentials;
pub mod events;
pub mod registrations;

pub use credentials::InMemoryCredentialStore;
pub use events::InMemoryEventStore;
pub use registrations::InMemoryRegistrationStore;

use std::sync::Arc;

/// The three stores of the in-memory backend, constructed together.
#[derive(Clone)]
pub struct MemoryBackend {
    pub events: Arc<InMemoryEventStore>,
    pub registrations: Arc<InMemoryRegistrationStore>,
    pub credentials: Arc<InMemoryCredentialStore>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            events: Arc::new(InMemoryEventStore::new()),
            registrations: Arc::new(InMemoryRegistrationStore::new()),
            credentials: Arc::new(InMemoryCredentialStore::new()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}
