//! Registration lifecycle: creation with two-level admission, withdrawal,
//! and the organizer-side ban/removal workflow.
//!
//! Creation is a small saga over the two admission gates. The category
//! gate is attempted and resolved first; a later seat failure compensates
//! it explicitly. No multi-object transaction is assumed of the store.

use std::sync::Arc;

use crate::allocator::CapacityAllocator;
use crate::authz::{self, Actor};
use crate::credentials::CredentialService;
use crate::error::SignupError;
use rollcall_core::events::topics;
use rollcall_core::{
    CategoryOccupancy, EntryPayload, EventCapacity, GroupMember, OccupancyChanged, Registration,
    SlotSelection,
};
use rollcall_notify::Notifier;
use rollcall_storage::{EventStore, RegistrationStore};

/// Result of a successful registration: the stored record plus the entry
/// credential payload the caller hands to the QR renderer.
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub registration: Registration,
    pub entry_credential: EntryPayload,
}

/// Read model behind the live seat counter.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancySnapshot {
    pub event_id: String,
    pub occupant_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_seats: Option<u32>,
    pub categories: Vec<CategoryOccupancy>,
}

#[derive(Clone)]
pub struct RegistrationService {
    events: Arc<dyn EventStore>,
    registrations: Arc<dyn RegistrationStore>,
    allocator: CapacityAllocator,
    credentials: CredentialService,
    notifier: Arc<dyn Notifier>,
}

impl RegistrationService {
    pub fn new(
        events: Arc<dyn EventStore>,
        registrations: Arc<dyn RegistrationStore>,
        credentials: CredentialService,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            allocator: CapacityAllocator::new(events.clone()),
            events,
            registrations,
            credentials,
            notifier,
        }
    }

    /// Registers a volunteer for an event.
    ///
    /// Order of checks: ban, duplicate, removed-marker cleanup, category
    /// gate (when time slots are enabled), event-wide seat gate, record
    /// creation with entry credential, occupancy notification. A failure
    /// after a partial reservation compensates everything taken so far.
    pub async fn register(
        &self,
        event_id: &str,
        volunteer_id: &str,
        group_members: Vec<GroupMember>,
        selected_slot: Option<SlotSelection>,
    ) -> Result<NewRegistration, SignupError> {
        let capacity = self.capacity(event_id).await?;

        if capacity.is_banned(volunteer_id) {
            return Err(SignupError::banned(event_id, volunteer_id));
        }

        if self
            .registrations
            .find_by_event_and_volunteer(event_id, volunteer_id)
            .await?
            .is_some()
        {
            return Err(SignupError::already_registered(event_id, volunteer_id));
        }

        // Removal is reversible: a removed volunteer registering again
        // simply sheds the marker.
        if capacity.removed_volunteers.contains(volunteer_id) {
            self.events.clear_removed(event_id, volunteer_id).await?;
        }

        let selection = self
            .reserve_category(&capacity, event_id, selected_slot)
            .await?;

        let occupant_count = match self.allocator.try_reserve_seat(event_id, volunteer_id).await {
            Ok(count) => count,
            Err(e) => {
                self.compensate_category(event_id, selection.as_ref()).await;
                return Err(e);
            }
        };

        let mut registration = Registration::new(event_id, volunteer_id)
            .with_group_members(group_members)
            .with_selected_slot(selection.clone());

        let entry = match self.credentials.issue_entry(&registration).await {
            Ok(entry) => entry,
            Err(e) => {
                self.compensate_seat(event_id, volunteer_id).await;
                self.compensate_category(event_id, selection.as_ref()).await;
                return Err(e);
            }
        };
        registration.entry_credential_ref = Some(entry.id.clone());

        if let Err(e) = self.registrations.insert(registration.clone()).await {
            // Lost a race on the uniqueness index: undo both gates and the
            // freshly issued credential.
            self.credentials.revoke_all(&registration.id).await;
            self.compensate_seat(event_id, volunteer_id).await;
            self.compensate_category(event_id, selection.as_ref()).await;
            return Err(if e.is_already_exists() {
                SignupError::already_registered(event_id, volunteer_id)
            } else {
                e.into()
            });
        }

        let mut change = OccupancyChanged::admitted(event_id, occupant_count);
        if let Some(selection) = &selection {
            if let Some(category) = self
                .events
                .get_capacity(event_id)
                .await
                .ok()
                .flatten()
                .and_then(|c| {
                    c.category(&selection.slot_id, &selection.category_id)
                        .cloned()
                })
            {
                change = change.with_category(CategoryOccupancy {
                    slot_id: selection.slot_id.clone(),
                    category_id: selection.category_id.clone(),
                    current_occupants: category.current_occupants,
                });
            }
        }
        self.publish_occupancy(change).await;

        tracing::info!(
            event_id,
            volunteer_id,
            registration_id = %registration.id,
            occupant_count,
            "volunteer registered"
        );

        Ok(NewRegistration {
            registration,
            entry_credential: entry.payload(),
        })
    }

    /// Withdraws a registration: revokes live credentials, releases the
    /// category slot and the seat, deletes the record, and publishes the
    /// occupancy delta. Safe to call before any check-in.
    pub async fn withdraw(&self, event_id: &str, volunteer_id: &str) -> Result<(), SignupError> {
        let registration = self
            .registrations
            .find_by_event_and_volunteer(event_id, volunteer_id)
            .await?
            .ok_or_else(|| SignupError::not_registered(event_id, volunteer_id))?;

        self.credentials.revoke_all(&registration.id).await;

        if let Some(selection) = &registration.selected_slot {
            self.allocator
                .release_category_slot(event_id, selection)
                .await?;
        }
        self.allocator.release_seat(event_id, volunteer_id).await?;
        self.registrations.delete(&registration.id).await?;

        let occupant_count = self
            .events
            .get_capacity(event_id)
            .await?
            .map(|c| c.occupant_count())
            .unwrap_or_default();
        self.publish_occupancy(OccupancyChanged::withdrawn(event_id, occupant_count))
            .await;

        tracing::info!(
            event_id,
            volunteer_id,
            registration_id = %registration.id,
            "registration withdrawn"
        );
        Ok(())
    }

    /// Withdraw on behalf of a caller: volunteers withdraw themselves,
    /// organizers may withdraw anyone.
    pub async fn withdraw_as(
        &self,
        event_id: &str,
        volunteer_id: &str,
        actor: &Actor,
    ) -> Result<(), SignupError> {
        if actor.user_id != volunteer_id {
            let capacity = self.capacity(event_id).await?;
            authz::ensure_organizer(&capacity, actor)?;
        }
        self.withdraw(event_id, volunteer_id).await
    }

    /// Whether the (event, volunteer) pair has an active registration.
    pub async fn is_registered(
        &self,
        event_id: &str,
        volunteer_id: &str,
    ) -> Result<bool, SignupError> {
        Ok(self
            .registrations
            .find_by_event_and_volunteer(event_id, volunteer_id)
            .await?
            .is_some())
    }

    pub async fn registration(&self, registration_id: &str) -> Result<Registration, SignupError> {
        self.registrations
            .get(registration_id)
            .await?
            .ok_or_else(|| SignupError::RegistrationNotFound(registration_id.to_string()))
    }

    /// All registrations of one event, for organizer dashboards.
    pub async fn list_for_event(
        &self,
        event_id: &str,
        actor: &Actor,
    ) -> Result<Vec<Registration>, SignupError> {
        let capacity = self.capacity(event_id).await?;
        authz::ensure_organizer(&capacity, actor)?;
        Ok(self.registrations.list_by_event(event_id).await?)
    }

    /// Occupancy snapshot for the live seat counter.
    pub async fn occupancy(&self, event_id: &str) -> Result<OccupancySnapshot, SignupError> {
        let capacity = self.capacity(event_id).await?;
        let categories = capacity
            .time_slots
            .iter()
            .flat_map(|slot| {
                slot.categories.iter().map(|category| CategoryOccupancy {
                    slot_id: slot.id.clone(),
                    category_id: category.id.clone(),
                    current_occupants: category.current_occupants,
                })
            })
            .collect();
        Ok(OccupancySnapshot {
            event_id: capacity.event_id.clone(),
            occupant_count: capacity.occupant_count(),
            max_seats: capacity.mode.max_seats(),
            categories,
        })
    }

    /// Creates or replaces an event's capacity document. On an existing
    /// document only its organizing team may write, and the occupancy
    /// state (occupants, per-category counters, removed markers) is
    /// carried over: organizers edit limits, never counters.
    pub async fn upsert_capacity(
        &self,
        mut capacity: EventCapacity,
        actor: &Actor,
    ) -> Result<(), SignupError> {
        if let Some(existing) = self.events.get_capacity(&capacity.event_id).await? {
            authz::ensure_organizer(&existing, actor)?;
            for slot in &mut capacity.time_slots {
                for category in &mut slot.categories {
                    if let Some(previous) = existing.category(&slot.id, &category.id) {
                        category.current_occupants = previous.current_occupants;
                    }
                }
            }
            capacity.occupants = existing.occupants;
            capacity.removed_volunteers = existing.removed_volunteers;
        }
        capacity.validate()?;
        self.events.put_capacity(capacity).await?;
        Ok(())
    }

    /// Bans a volunteer: a hard block on (re)registration. Does not touch
    /// a seat they already hold; use [`remove_volunteer`](Self::remove_volunteer)
    /// for that.
    pub async fn ban(
        &self,
        event_id: &str,
        volunteer_id: &str,
        actor: &Actor,
    ) -> Result<(), SignupError> {
        let capacity = self.capacity(event_id).await?;
        authz::ensure_organizer(&capacity, actor)?;
        self.events.add_ban(event_id, volunteer_id).await?;
        Ok(())
    }

    pub async fn unban(
        &self,
        event_id: &str,
        volunteer_id: &str,
        actor: &Actor,
    ) -> Result<(), SignupError> {
        let capacity = self.capacity(event_id).await?;
        authz::ensure_organizer(&capacity, actor)?;
        self.events.remove_ban(event_id, volunteer_id).await?;
        Ok(())
    }

    /// Organizer-side removal: withdraws the registration and marks the
    /// volunteer removed. Reversible: the volunteer may register again.
    pub async fn remove_volunteer(
        &self,
        event_id: &str,
        volunteer_id: &str,
        actor: &Actor,
    ) -> Result<(), SignupError> {
        let capacity = self.capacity(event_id).await?;
        authz::ensure_organizer(&capacity, actor)?;
        self.withdraw(event_id, volunteer_id).await?;
        self.events.mark_removed(event_id, volunteer_id).await?;
        Ok(())
    }

    async fn capacity(&self, event_id: &str) -> Result<EventCapacity, SignupError> {
        self.events
            .get_capacity(event_id)
            .await?
            .ok_or_else(|| SignupError::EventNotFound(event_id.to_string()))
    }

    /// Resolves and reserves the category gate, when applicable.
    async fn reserve_category(
        &self,
        capacity: &EventCapacity,
        event_id: &str,
        selected_slot: Option<SlotSelection>,
    ) -> Result<Option<SlotSelection>, SignupError> {
        if !capacity.time_slots_enabled {
            // The event-wide gate fully governs capacity; a stray selection
            // is not recorded.
            return Ok(None);
        }
        let selection = selected_slot.ok_or_else(|| SignupError::SlotSelectionRequired {
            event_id: event_id.to_string(),
        })?;
        if capacity
            .category(&selection.slot_id, &selection.category_id)
            .is_none()
        {
            return Err(SignupError::slot_or_category_not_found(
                &selection.slot_id,
                &selection.category_id,
            ));
        }
        self.allocator
            .try_reserve_category_slot(event_id, &selection)
            .await?;
        Ok(Some(selection))
    }

    async fn compensate_seat(&self, event_id: &str, volunteer_id: &str) {
        if let Err(e) = self.allocator.release_seat(event_id, volunteer_id).await {
            tracing::warn!(event_id, volunteer_id, error = %e, "seat compensation failed");
        }
    }

    async fn compensate_category(&self, event_id: &str, selection: Option<&SlotSelection>) {
        if let Some(selection) = selection {
            if let Err(e) = self
                .allocator
                .release_category_slot(event_id, selection)
                .await
            {
                tracing::warn!(event_id, error = %e, "category compensation failed");
            }
        }
    }

    async fn publish_occupancy(&self, change: OccupancyChanged) {
        match serde_json::to_value(&change) {
            Ok(payload) => {
                if let Err(e) = self.notifier.publish(topics::OCCUPANCY, payload).await {
                    tracing::warn!(event_id = %change.event_id, error = %e, "occupancy publish failed");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "occupancy payload serialization failed");
            }
        }
    }
}
