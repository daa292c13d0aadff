//! Attendance endpoints: scans, manual marking, timestamp corrections,
//! and exit-credential re-fetch.

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ApiError;
use crate::middleware::ActingUser;
use crate::state::AppState;
use rollcall_core::{EntryPayload, ExitPayload, Registration, Timestamp};
use rollcall_signup::{CheckIn, CheckOut};
use rollcall_storage::types::TimeField;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInResponse {
    pub registration_id: String,
    pub in_time: Timestamp,
    pub already_recorded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_credential: Option<ExitPayload>,
}

impl From<CheckIn> for CheckInResponse {
    fn from(outcome: CheckIn) -> Self {
        Self {
            registration_id: outcome.registration.id.clone(),
            in_time: outcome.in_time,
            already_recorded: outcome.already_recorded,
            exit_credential: outcome.exit_credential,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutResponse {
    pub registration_id: String,
    pub out_time: Timestamp,
    pub already_recorded: bool,
}

impl From<CheckOut> for CheckOutResponse {
    fn from(outcome: CheckOut) -> Self {
        Self {
            registration_id: outcome.registration.id.clone(),
            out_time: outcome.out_time,
            already_recorded: outcome.already_recorded,
        }
    }
}

/// Entry scan: the scanner decodes the entry QR into its JSON payload and
/// posts it here.
pub async fn scan_entry(
    State(state): State<AppState>,
    ActingUser(actor): ActingUser,
    Json(payload): Json<EntryPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.attendance.scan_entry(&payload, &actor).await?;
    Ok(Json(CheckInResponse::from(outcome)))
}

/// Exit scan: posts the opaque token decoded from the exit QR.
pub async fn scan_exit(
    State(state): State<AppState>,
    ActingUser(actor): ActingUser,
    Json(payload): Json<ExitPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .attendance
        .scan_exit(&payload.exit_token, &actor)
        .await?;
    Ok(Json(CheckOutResponse::from(outcome)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendanceRequest {
    pub has_attended: bool,
}

/// Organizer override of the attendance flag. Turning it on runs the real
/// check-in transition (credential rotation included).
pub async fn mark_attendance(
    State(state): State<AppState>,
    Path(registration_id): Path<String>,
    ActingUser(actor): ActingUser,
    Json(request): Json<MarkAttendanceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .attendance
        .set_has_attended(&registration_id, request.has_attended, &actor)
        .await?;
    Ok(Json(updated))
}

/// Manual check-out without a token (organizer path).
pub async fn check_out(
    State(state): State<AppState>,
    Path(registration_id): Path<String>,
    ActingUser(actor): ActingUser,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.attendance.check_out(&registration_id, &actor).await?;
    Ok(Json(CheckOutResponse::from(outcome)))
}

/// Re-fetch (or repair) the exit credential of a checked-in registration.
pub async fn exit_credential(
    State(state): State<AppState>,
    Path(registration_id): Path<String>,
    ActingUser(actor): ActingUser,
) -> Result<impl IntoResponse, ApiError> {
    let payload = state
        .attendance
        .exit_credential(&registration_id, &actor)
        .await?;
    Ok(Json(payload))
}

/// Distinguishes an absent field from an explicit null: absent leaves the
/// timestamp untouched, null clears it.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimeEditRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub in_time: Option<Option<Timestamp>>,
    #[serde(default, deserialize_with = "double_option")]
    pub out_time: Option<Option<Timestamp>>,
}

/// Direct timestamp correction. Pure data repair: never touches
/// credentials.
pub async fn edit_times(
    State(state): State<AppState>,
    Path(registration_id): Path<String>,
    ActingUser(actor): ActingUser,
    Json(request): Json<TimeEditRequest>,
) -> Result<Json<Registration>, ApiError> {
    if request.in_time.is_none() && request.out_time.is_none() {
        return Err(ApiError::bad_request(
            "at least one of inTime or outTime must be provided",
        ));
    }

    let mut updated = None;
    if let Some(value) = request.in_time {
        updated = Some(
            state
                .attendance
                .correct_time(&registration_id, TimeField::In, value, &actor)
                .await?,
        );
    }
    if let Some(value) = request.out_time {
        updated = Some(
            state
                .attendance
                .correct_time(&registration_id, TimeField::Out, value, &actor)
                .await?,
        );
    }

    // The guard above ensures at least one branch ran.
    match updated {
        Some(registration) => Ok(Json(registration)),
        None => Err(ApiError::bad_request("no fields to update")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_edit_absent_vs_null() {
        let parsed: TimeEditRequest = serde_json::from_str(r#"{}"#).unwrap();
        assert!(parsed.in_time.is_none());
        assert!(parsed.out_time.is_none());

        let parsed: TimeEditRequest = serde_json::from_str(r#"{"inTime": null}"#).unwrap();
        assert_eq!(parsed.in_time, Some(None));
        assert!(parsed.out_time.is_none());

        let parsed: TimeEditRequest =
            serde_json::from_str(r#"{"outTime": "2025-03-01T10:00:00Z"}"#).unwrap();
        assert!(parsed.out_time.unwrap().is_some());
    }
}
