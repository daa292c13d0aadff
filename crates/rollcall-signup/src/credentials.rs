//! Credential lifecycle: issue, rotate, consume.
//!
//! Two kinds, never both live for one registration. The entry credential
//! exists from registration until check-in; the exit credential from
//! check-in until check-out. Rotation happens inside the check-in
//! transition, not before and not after.

use std::sync::Arc;

use crate::error::SignupError;
use rollcall_core::{EntryCredential, ExitCredential, Registration};
use rollcall_storage::types::ExitConsume;
use rollcall_storage::CredentialStore;

#[derive(Clone)]
pub struct CredentialService {
    store: Arc<dyn CredentialStore>,
}

impl CredentialService {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Issues the entry credential for a fresh registration.
    pub async fn issue_entry(
        &self,
        registration: &Registration,
    ) -> Result<EntryCredential, SignupError> {
        let credential = EntryCredential::issue(
            &registration.id,
            &registration.event_id,
            &registration.volunteer_id,
        );
        self.store.put_entry(credential.clone()).await?;
        Ok(credential)
    }

    /// Atomically takes the entry credential; `None` when it was already
    /// consumed or never existed. This is the single-use gate of the entry
    /// scan.
    pub async fn consume_entry(
        &self,
        registration_id: &str,
    ) -> Result<Option<EntryCredential>, SignupError> {
        Ok(self.store.consume_entry(registration_id).await?)
    }

    /// Destroys the entry credential without caring whether it was still
    /// live. Cleanup is best-effort: a storage hiccup is logged and
    /// swallowed, because the attendance timestamp, not the credential
    /// row, is the source of truth.
    pub async fn retire_entry(&self, registration_id: &str) {
        if let Err(e) = self.store.consume_entry(registration_id).await {
            tracing::warn!(registration_id, error = %e, "entry credential cleanup failed");
        }
    }

    /// Mints and stores the exit credential at check-in.
    pub async fn issue_exit(&self, registration_id: &str) -> Result<ExitCredential, SignupError> {
        let credential = ExitCredential::issue(registration_id);
        self.store.put_exit(credential.clone()).await?;
        Ok(credential)
    }

    /// Looks an exit token up without consuming it.
    pub async fn get_exit(&self, token: &str) -> Result<Option<ExitCredential>, SignupError> {
        Ok(self.store.get_exit(token).await?)
    }

    /// Atomically consumes an exit token; see [`ExitConsume`].
    pub async fn consume_exit(&self, token: &str) -> Result<ExitConsume, SignupError> {
        Ok(self.store.consume_exit(token).await?)
    }

    /// The registration's exit credential iff it is still unconsumed.
    pub async fn live_exit(
        &self,
        registration_id: &str,
    ) -> Result<Option<ExitCredential>, SignupError> {
        let found = self.store.find_exit_by_registration(registration_id).await?;
        Ok(found.filter(|credential| !credential.is_consumed()))
    }

    /// Consumes the registration's live exit credential if any (manual
    /// check-out path). Best-effort, logged.
    pub async fn retire_exit(&self, registration_id: &str) {
        let found = match self.store.find_exit_by_registration(registration_id).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(registration_id, error = %e, "exit credential lookup failed");
                return;
            }
        };
        if let Some(credential) = found {
            if let Err(e) = self.store.consume_exit(&credential.token).await {
                tracing::warn!(registration_id, error = %e, "exit credential cleanup failed");
            }
        }
    }

    /// Removes every credential of a registration (withdrawal). Best-effort,
    /// logged: the registration deletion is the operation of record.
    pub async fn revoke_all(&self, registration_id: &str) {
        if let Err(e) = self.store.purge_for_registration(registration_id).await {
            tracing::warn!(registration_id, error = %e, "credential revocation failed");
        }
    }
}
