use async_trait::async_trait;
use papaya::{Compute, HashMap as PapayaHashMap, Operation};

use rollcall_core::{EntryCredential, ExitCredential, now_utc};
use rollcall_storage::types::ExitConsume;
use rollcall_storage::{CredentialStore, StorageError};

/// In-memory credential store.
///
/// Entry credentials are keyed by registration (at most one live each) and
/// consumed by atomic removal. Exit credentials are keyed by token and
/// consumed by a compare-and-swap on `consumed_at`, keeping the record
/// around so replayed scans can be answered idempotently.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    entries: PapayaHashMap<String, EntryCredential>,
    exits: PapayaHashMap<String, ExitCredential>,
    exit_by_registration: PapayaHashMap<String, String>,
}

enum ExitAbort {
    Missing,
    Already(ExitCredential),
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            entries: PapayaHashMap::new(),
            exits: PapayaHashMap::new(),
            exit_by_registration: PapayaHashMap::new(),
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn put_entry(&self, credential: EntryCredential) -> Result<(), StorageError> {
        let guard = self.entries.pin();
        guard.insert(credential.registration_id.clone(), credential);
        Ok(())
    }

    async fn get_entry(
        &self,
        registration_id: &str,
    ) -> Result<Option<EntryCredential>, StorageError> {
        let guard = self.entries.pin();
        Ok(guard.get(registration_id).cloned())
    }

    async fn consume_entry(
        &self,
        registration_id: &str,
    ) -> Result<Option<EntryCredential>, StorageError> {
        // remove is the atomic take: of two concurrent consumers exactly
        // one receives the credential.
        let guard = self.entries.pin();
        Ok(guard.remove(registration_id).cloned())
    }

    async fn put_exit(&self, credential: ExitCredential) -> Result<(), StorageError> {
        let registration_id = credential.registration_id.clone();
        let token = credential.token.clone();
        self.exits.pin().insert(token.clone(), credential);
        self.exit_by_registration
            .pin()
            .insert(registration_id, token);
        Ok(())
    }

    async fn get_exit(&self, token: &str) -> Result<Option<ExitCredential>, StorageError> {
        let guard = self.exits.pin();
        Ok(guard.get(token).cloned())
    }

    async fn find_exit_by_registration(
        &self,
        registration_id: &str,
    ) -> Result<Option<ExitCredential>, StorageError> {
        let index_guard = self.exit_by_registration.pin();
        let Some(token) = index_guard.get(registration_id) else {
            return Ok(None);
        };
        let guard = self.exits.pin();
        Ok(guard.get(token).cloned())
    }

    async fn consume_exit(&self, token: &str) -> Result<ExitConsume, StorageError> {
        let consumed_at = now_utc();
        let guard = self.exits.pin();
        let result = guard.compute(token.to_string(), |entry| match entry {
            None => Operation::Abort(ExitAbort::Missing),
            Some((_, credential)) if credential.is_consumed() => {
                Operation::Abort(ExitAbort::Already(credential.clone()))
            }
            Some((_, credential)) => {
                let mut next = credential.clone();
                next.consumed_at = Some(consumed_at);
                Operation::Insert(next)
            }
        });

        match result {
            Compute::Updated {
                new: (_, credential),
                ..
            } => Ok(ExitConsume::Consumed(credential.clone())),
            Compute::Aborted(ExitAbort::Already(credential)) => {
                Ok(ExitConsume::AlreadyConsumed(credential))
            }
            Compute::Aborted(ExitAbort::Missing) => Ok(ExitConsume::Unknown),
            _ => Err(StorageError::internal("unexpected compute outcome")),
        }
    }

    async fn purge_for_registration(&self, registration_id: &str) -> Result<(), StorageError> {
        self.entries.pin().remove(registration_id);
        let index_guard = self.exit_by_registration.pin();
        if let Some(token) = index_guard.remove(registration_id) {
            self.exits.pin().remove(token);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_entry_consume_is_single_use() {
        let store = InMemoryCredentialStore::new();
        store
            .put_entry(EntryCredential::issue("r1", "e1", "v1"))
            .await
            .unwrap();

        assert!(store.get_entry("r1").await.unwrap().is_some());
        let taken = store.consume_entry("r1").await.unwrap();
        assert!(taken.is_some());
        assert!(store.consume_entry("r1").await.unwrap().is_none());
        assert!(store.get_entry("r1").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_entry_consumers_one_wins() {
        let store = Arc::new(InMemoryCredentialStore::new());
        store
            .put_entry(EntryCredential::issue("r1", "e1", "v1"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(
                async move { store.consume_entry("r1").await },
            ));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_exit_consume_is_idempotent_after_first() {
        let store = InMemoryCredentialStore::new();
        let credential = ExitCredential::issue("r1");
        let token = credential.token.clone();
        store.put_exit(credential).await.unwrap();

        let first = store.consume_exit(&token).await.unwrap();
        let ExitConsume::Consumed(consumed) = first else {
            panic!("first consume must win");
        };
        assert!(consumed.is_consumed());

        let second = store.consume_exit(&token).await.unwrap();
        let ExitConsume::AlreadyConsumed(replayed) = second else {
            panic!("second consume must be a replay");
        };
        assert_eq!(replayed.consumed_at, consumed.consumed_at);

        assert_eq!(
            store.consume_exit("unknown-token").await.unwrap(),
            ExitConsume::Unknown
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_exit_consumers_one_wins() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let credential = ExitCredential::issue("r1");
        let token = credential.token.clone();
        store.put_exit(credential).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            let token = token.clone();
            handles.push(tokio::spawn(async move {
                store.consume_exit(&token).await.unwrap()
            }));
        }

        let mut fresh = 0;
        let mut replays = 0;
        for handle in handles {
            match handle.await.unwrap() {
                ExitConsume::Consumed(_) => fresh += 1,
                ExitConsume::AlreadyConsumed(_) => replays += 1,
                ExitConsume::Unknown => panic!("token must stay resolvable"),
            }
        }
        assert_eq!(fresh, 1);
        assert_eq!(replays, 9);
    }

    #[tokio::test]
    async fn test_purge_clears_both_kinds() {
        let store = InMemoryCredentialStore::new();
        store
            .put_entry(EntryCredential::issue("r1", "e1", "v1"))
            .await
            .unwrap();
        let credential = ExitCredential::issue("r1");
        let token = credential.token.clone();
        store.put_exit(credential).await.unwrap();

        store.purge_for_registration("r1").await.unwrap();
        assert!(store.get_entry("r1").await.unwrap().is_none());
        assert!(store.find_exit_by_registration("r1").await.unwrap().is_none());
        assert_eq!(store.consume_exit(&token).await.unwrap(), ExitConsume::Unknown);

        // Idempotent.
        store.purge_for_registration("r1").await.unwrap();
    }

    #[tokio::test]
    async fn test_find_exit_by_registration() {
        let store = InMemoryCredentialStore::new();
        assert!(store.find_exit_by_registration("r1").await.unwrap().is_none());

        let credential = ExitCredential::issue("r1");
        let token = credential.token.clone();
        store.put_exit(credential).await.unwrap();

        let found = store.find_exit_by_registration("r1").await.unwrap().unwrap();
        assert_eq!(found.token, token);
    }
}
