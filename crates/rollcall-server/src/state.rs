use std::sync::Arc;

use crate::config::AppConfig;
use rollcall_db_memory::MemoryBackend;
use rollcall_notify::{BroadcastNotifier, FanoutNotifier, Notifier, WebhookNotifier};
use rollcall_signup::{AttendanceService, CredentialService, RegistrationService};

/// Shared application state behind the router.
#[derive(Clone)]
pub struct AppState {
    pub registrations: Arc<RegistrationService>,
    pub attendance: Arc<AttendanceService>,
    /// In-process notification channel; subscribe for live occupancy and
    /// attendance deltas.
    pub broadcast: Arc<BroadcastNotifier>,
}

impl AppState {
    /// Wires the in-memory backend, the notification transports, and the
    /// sign-up services from configuration.
    pub fn from_config(cfg: &AppConfig) -> Self {
        let backend = MemoryBackend::new();
        let broadcast = BroadcastNotifier::new_shared();

        let notifier: Arc<dyn Notifier> = match &cfg.notify.webhook {
            Some(webhook) => {
                let mut hook = WebhookNotifier::new(&webhook.url);
                if let Some(secret) = &webhook.secret {
                    hook = hook.with_secret(secret);
                }
                Arc::new(FanoutNotifier::new(vec![
                    broadcast.clone() as Arc<dyn Notifier>,
                    Arc::new(hook) as Arc<dyn Notifier>,
                ]))
            }
            None => broadcast.clone() as Arc<dyn Notifier>,
        };

        let credentials = CredentialService::new(backend.credentials.clone());
        let registrations = Arc::new(RegistrationService::new(
            backend.events.clone(),
            backend.registrations.clone(),
            credentials.clone(),
            notifier.clone(),
        ));
        let attendance = Arc::new(AttendanceService::new(
            backend.events.clone(),
            backend.registrations.clone(),
            credentials,
            notifier,
        ));

        Self {
            registrations,
            attendance,
            broadcast,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_from_default_config() {
        let state = AppState::from_config(&AppConfig::default());
        assert_eq!(state.broadcast.subscriber_count(), 0);
    }
}
