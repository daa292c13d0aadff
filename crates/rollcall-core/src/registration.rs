use crate::capacity::SlotSelection;
use crate::id::{EventId, RegistrationId, VolunteerId, generate_id};
use crate::time::{Timestamp, now_utc};
use serde::{Deserialize, Serialize};

/// Attendance lifecycle of one registration. Derived from the recorded
/// timestamps; never stored separately so the two cannot drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceState {
    Registered,
    CheckedIn,
    CheckedOut,
}

/// Companion brought along by the registering volunteer. Informational
/// only: group members do not consume seats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// One sign-up of one volunteer for one event. Uniqueness of the
/// (event, volunteer) pair is enforced at creation time by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: RegistrationId,
    pub event_id: EventId,
    pub volunteer_id: VolunteerId,
    #[serde(default)]
    pub group_members: Vec<GroupMember>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_slot: Option<SlotSelection>,
    /// Reference to the live entry credential; cleared at check-in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_credential_ref: Option<String>,
    /// Reference to the exit credential minted at check-in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_credential_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_time: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_time: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Registration {
    pub fn new(event_id: impl Into<EventId>, volunteer_id: impl Into<VolunteerId>) -> Self {
        Self {
            id: generate_id(),
            event_id: event_id.into(),
            volunteer_id: volunteer_id.into(),
            group_members: Vec::new(),
            selected_slot: None,
            entry_credential_ref: None,
            exit_credential_ref: None,
            in_time: None,
            out_time: None,
            created_at: now_utc(),
        }
    }

    pub fn with_group_members(mut self, group_members: Vec<GroupMember>) -> Self {
        self.group_members = group_members;
        self
    }

    pub fn with_selected_slot(mut self, selected_slot: Option<SlotSelection>) -> Self {
        self.selected_slot = selected_slot;
        self
    }

    /// True iff the volunteer was checked in.
    pub fn has_attended(&self) -> bool {
        self.in_time.is_some()
    }

    pub fn state(&self) -> AttendanceState {
        if self.out_time.is_some() {
            AttendanceState::CheckedOut
        } else if self.in_time.is_some() {
            AttendanceState::CheckedIn
        } else {
            AttendanceState::Registered
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registration_starts_registered() {
        let reg = Registration::new("e1", "v1");
        assert_eq!(reg.state(), AttendanceState::Registered);
        assert!(!reg.has_attended());
        assert!(reg.in_time.is_none());
        assert!(reg.out_time.is_none());
    }

    #[test]
    fn test_state_progression() {
        let mut reg = Registration::new("e1", "v1");
        reg.in_time = Some(now_utc());
        assert_eq!(reg.state(), AttendanceState::CheckedIn);
        assert!(reg.has_attended());

        reg.out_time = Some(now_utc());
        assert_eq!(reg.state(), AttendanceState::CheckedOut);
    }

    #[test]
    fn test_group_members_are_carried() {
        let reg = Registration::new("e1", "v1").with_group_members(vec![GroupMember {
            name: "Sam".into(),
            phone: None,
            email: Some("sam@example.org".into()),
        }]);
        assert_eq!(reg.group_members.len(), 1);
        assert_eq!(reg.group_members[0].name, "Sam");
    }

    #[test]
    fn test_serde_camel_case() {
        let reg = Registration::new("e1", "v1");
        let json = serde_json::to_string(&reg).unwrap();
        assert!(json.contains("\"eventId\":\"e1\""));
        assert!(json.contains("\"volunteerId\":\"v1\""));
        assert!(!json.contains("inTime"));
    }
}
