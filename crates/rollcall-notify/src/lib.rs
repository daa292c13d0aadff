//! Change notification for the Rollcall sign-up core.
//!
//! The core depends on exactly one capability: `publish(topic, payload)`.
//! Everything transport-specific lives behind that trait, so the sign-up
//! logic never knows whether a delta lands on an in-process channel, a
//! webhook, or both.

pub mod broadcast;
pub mod error;
pub mod fanout;
pub mod types;
pub mod webhook;

pub use broadcast::BroadcastNotifier;
pub use error::NotifyError;
pub use fanout::FanoutNotifier;
pub use types::Notification;
pub use webhook::WebhookNotifier;

use async_trait::async_trait;
use serde_json::Value;

/// The publish capability the sign-up core is written against.
///
/// Implementations must be cheap to call from request handlers; slow
/// transports should buffer internally rather than block the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Publishes one payload on a topic.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError` when the transport rejects the message. Having
    /// no subscribers is not an error.
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), NotifyError>;
}
