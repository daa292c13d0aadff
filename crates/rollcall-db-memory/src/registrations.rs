use async_trait::async_trait;
use papaya::{Compute, HashMap as PapayaHashMap, Operation};

use rollcall_core::{Registration, Timestamp};
use rollcall_storage::types::{TimeField, TimeWrite};
use rollcall_storage::{RegistrationStore, StorageError};

/// Key of the uniqueness index. Format: "event_id/volunteer_id".
pub(crate) fn pair_key(event_id: &str, volunteer_id: &str) -> String {
    format!("{event_id}/{volunteer_id}")
}

/// In-memory registration store.
///
/// Two maps: registrations by id, plus a pair index enforcing one active
/// registration per (event, volunteer). The pair index insert is the
/// atomic decision point for duplicate registration.
#[derive(Debug, Default)]
pub struct InMemoryRegistrationStore {
    by_id: PapayaHashMap<String, Registration>,
    pair_index: PapayaHashMap<String, String>,
}

enum TimeAbort {
    Missing,
    Already(Timestamp, Registration),
}

impl InMemoryRegistrationStore {
    pub fn new() -> Self {
        Self {
            by_id: PapayaHashMap::new(),
            pair_index: PapayaHashMap::new(),
        }
    }

    fn mutate(
        &self,
        registration_id: &str,
        apply: impl Fn(&mut Registration),
    ) -> Result<Registration, StorageError> {
        let guard = self.by_id.pin();
        let result = guard.compute(registration_id.to_string(), |entry| match entry {
            None => Operation::Abort(()),
            Some((_, registration)) => {
                let mut next = registration.clone();
                apply(&mut next);
                Operation::Insert(next)
            }
        });
        match result {
            Compute::Updated {
                new: (_, registration),
                ..
            } => Ok(registration.clone()),
            Compute::Aborted(()) => Err(StorageError::not_found("Registration", registration_id)),
            _ => Err(StorageError::internal("unexpected compute outcome")),
        }
    }

    fn try_set_time(
        &self,
        registration_id: &str,
        field: TimeField,
        at: Timestamp,
    ) -> Result<TimeWrite, StorageError> {
        let guard = self.by_id.pin();
        let result = guard.compute(registration_id.to_string(), |entry| match entry {
            None => Operation::Abort(TimeAbort::Missing),
            Some((_, registration)) => {
                let current = match field {
                    TimeField::In => registration.in_time,
                    TimeField::Out => registration.out_time,
                };
                if let Some(existing) = current {
                    Operation::Abort(TimeAbort::Already(existing, registration.clone()))
                } else {
                    let mut next = registration.clone();
                    match field {
                        TimeField::In => next.in_time = Some(at),
                        TimeField::Out => next.out_time = Some(at),
                    }
                    Operation::Insert(next)
                }
            }
        });

        match result {
            Compute::Updated {
                new: (_, registration),
                ..
            } => Ok(TimeWrite::Set(registration.clone())),
            Compute::Aborted(TimeAbort::Missing) => {
                Err(StorageError::not_found("Registration", registration_id))
            }
            Compute::Aborted(TimeAbort::Already(existing, registration)) => {
                Ok(TimeWrite::AlreadySet {
                    existing,
                    registration,
                })
            }
            _ => Err(StorageError::internal("unexpected compute outcome")),
        }
    }
}

#[async_trait]
impl RegistrationStore for InMemoryRegistrationStore {
    async fn insert(&self, registration: Registration) -> Result<(), StorageError> {
        let pair = pair_key(&registration.event_id, &registration.volunteer_id);
        let guard = self.pair_index.pin();
        let result = guard.compute(pair.clone(), |entry| match entry {
            None => Operation::Insert(registration.id.clone()),
            Some(_) => Operation::Abort(()),
        });
        match result {
            Compute::Inserted(..) => {
                self.by_id
                    .pin()
                    .insert(registration.id.clone(), registration);
                Ok(())
            }
            Compute::Aborted(()) => Err(StorageError::already_exists("Registration", pair)),
            _ => Err(StorageError::internal("unexpected compute outcome")),
        }
    }

    async fn get(&self, registration_id: &str) -> Result<Option<Registration>, StorageError> {
        let guard = self.by_id.pin();
        Ok(guard.get(registration_id).cloned())
    }

    async fn find_by_event_and_volunteer(
        &self,
        event_id: &str,
        volunteer_id: &str,
    ) -> Result<Option<Registration>, StorageError> {
        let pair = pair_key(event_id, volunteer_id);
        let index_guard = self.pair_index.pin();
        let Some(registration_id) = index_guard.get(&pair) else {
            return Ok(None);
        };
        let guard = self.by_id.pin();
        Ok(guard.get(registration_id).cloned())
    }

    async fn list_by_event(&self, event_id: &str) -> Result<Vec<Registration>, StorageError> {
        let guard = self.by_id.pin();
        let mut found: Vec<Registration> = guard
            .iter()
            .filter(|(_, registration)| registration.event_id == event_id)
            .map(|(_, registration)| registration.clone())
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn try_set_in_time(
        &self,
        registration_id: &str,
        at: Timestamp,
    ) -> Result<TimeWrite, StorageError> {
        self.try_set_time(registration_id, TimeField::In, at)
    }

    async fn try_set_out_time(
        &self,
        registration_id: &str,
        at: Timestamp,
    ) -> Result<TimeWrite, StorageError> {
        self.try_set_time(registration_id, TimeField::Out, at)
    }

    async fn overwrite_time(
        &self,
        registration_id: &str,
        field: TimeField,
        value: Option<Timestamp>,
    ) -> Result<Registration, StorageError> {
        self.mutate(registration_id, |registration| match field {
            TimeField::In => registration.in_time = value,
            TimeField::Out => registration.out_time = value,
        })
    }

    async fn set_credential_refs(
        &self,
        registration_id: &str,
        entry_ref: Option<String>,
        exit_ref: Option<String>,
    ) -> Result<Registration, StorageError> {
        self.mutate(registration_id, |registration| {
            registration.entry_credential_ref = entry_ref.clone();
            registration.exit_credential_ref = exit_ref.clone();
        })
    }

    async fn delete(&self, registration_id: &str) -> Result<Option<Registration>, StorageError> {
        let guard = self.by_id.pin();
        let Some(removed) = guard.remove(registration_id).cloned() else {
            return Ok(None);
        };
        let pair = pair_key(&removed.event_id, &removed.volunteer_id);
        self.pair_index.pin().remove(&pair);
        Ok(Some(removed))
    }
}
