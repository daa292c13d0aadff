use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::NotifyError;
use crate::Notifier;

/// Delivers every publish to several transports.
///
/// Delivery is best-effort per transport: a failing webhook does not stop
/// the in-process channel from seeing the delta. The first failure is
/// reported after all transports were attempted.
pub struct FanoutNotifier {
    targets: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(targets: Vec<Arc<dyn Notifier>>) -> Self {
        Self { targets }
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), NotifyError> {
        let mut first_error = None;
        for target in &self.targets {
            if let Err(e) = target.publish(topic, payload.clone()).await {
                tracing::warn!(topic, error = %e, "notification transport failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
