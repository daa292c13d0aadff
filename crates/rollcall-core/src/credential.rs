//! Entry and exit credentials: the two single-use tokens behind the QR
//! attendance handshake.
//!
//! The entry credential is issued at registration time and carries the
//! identifiers a scanner needs to resolve the registration. The exit
//! credential is minted at check-in and is a bare random token: a leaked
//! exit image cannot be replayed to impersonate a different registration
//! once consumed.

use crate::id::{EventId, RegistrationId, VolunteerId, generate_id};
use crate::time::{Timestamp, now_utc};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

/// JSON payload encoded into the entry QR image by the external renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPayload {
    pub registration_id: RegistrationId,
    pub event_id: EventId,
    pub volunteer_id: VolunteerId,
}

/// JSON payload encoded into the exit QR image. Deliberately opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitPayload {
    pub exit_token: String,
}

/// Single-use credential proving a fresh, unconsumed registration.
/// Destroyed at check-in, in the same logical step that mints the exit
/// credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryCredential {
    pub id: String,
    pub registration_id: RegistrationId,
    pub event_id: EventId,
    pub volunteer_id: VolunteerId,
    pub issued_at: Timestamp,
}

impl EntryCredential {
    pub fn issue(
        registration_id: impl Into<RegistrationId>,
        event_id: impl Into<EventId>,
        volunteer_id: impl Into<VolunteerId>,
    ) -> Self {
        Self {
            id: generate_id(),
            registration_id: registration_id.into(),
            event_id: event_id.into(),
            volunteer_id: volunteer_id.into(),
            issued_at: now_utc(),
        }
    }

    pub fn payload(&self) -> EntryPayload {
        EntryPayload {
            registration_id: self.registration_id.clone(),
            event_id: self.event_id.clone(),
            volunteer_id: self.volunteer_id.clone(),
        }
    }
}

/// Single-use credential issued at check-in and consumed at check-out.
///
/// Consumption is recorded rather than deleting the row so that a repeated
/// scan of the same token can answer idempotently with the prior result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitCredential {
    pub token: String,
    pub registration_id: RegistrationId,
    pub issued_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_at: Option<Timestamp>,
}

impl ExitCredential {
    pub fn issue(registration_id: impl Into<RegistrationId>) -> Self {
        Self {
            token: generate_exit_token(),
            registration_id: registration_id.into(),
            issued_at: now_utc(),
            consumed_at: None,
        }
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }

    pub fn payload(&self) -> ExitPayload {
        ExitPayload {
            exit_token: self.token.clone(),
        }
    }
}

/// Generates a fresh exit token.
///
/// 256 bits from the system CSPRNG, base64url without padding
/// (43 characters). No identifiers are embedded; the token is pure lookup
/// key.
#[must_use]
pub fn generate_exit_token() -> String {
    let mut bytes = [0u8; 32];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_token_shape() {
        let token = generate_exit_token();
        assert_eq!(token.len(), 43);
        assert!(!token.contains('='));
    }

    #[test]
    fn test_exit_tokens_are_unique() {
        let a = generate_exit_token();
        let b = generate_exit_token();
        assert_ne!(a, b);
    }

    #[test]
    fn test_entry_payload_embeds_identifiers() {
        let cred = EntryCredential::issue("r1", "e1", "v1");
        let payload = cred.payload();
        assert_eq!(payload.registration_id, "r1");
        assert_eq!(payload.event_id, "e1");
        assert_eq!(payload.volunteer_id, "v1");

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"registrationId\":\"r1\""));
        assert!(json.contains("\"eventId\":\"e1\""));
    }

    #[test]
    fn test_exit_payload_is_opaque() {
        let cred = ExitCredential::issue("r1");
        let json = serde_json::to_string(&cred.payload()).unwrap();
        // Only the token, no embedded identifiers.
        assert!(json.contains("exitToken"));
        assert!(!json.contains("r1"));
    }

    #[test]
    fn test_exit_credential_consumption_flag() {
        let mut cred = ExitCredential::issue("r1");
        assert!(!cred.is_consumed());
        cred.consumed_at = Some(now_utc());
        assert!(cred.is_consumed());
    }
}
