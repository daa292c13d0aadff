//! Registration endpoints: sign up, check, withdraw.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::middleware::ActingUser;
use crate::state::AppState;
use rollcall_core::{EntryPayload, GroupMember, Registration, SlotSelection};

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub group_members: Vec<GroupMember>,
    #[serde(default)]
    pub selected_time_slot: Option<SlotSelection>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub registration: Registration,
    /// Payload the external QR renderer encodes into the entry image.
    pub entry_credential: EntryPayload,
}

/// Registers the acting user for an event.
pub async fn register(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    ActingUser(actor): ActingUser,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state
        .registrations
        .register(
            &event_id,
            &actor.user_id,
            request.group_members,
            request.selected_time_slot,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            registration: created.registration,
            entry_credential: created.entry_credential,
        }),
    ))
}

/// Boolean registration check for an (event, volunteer) pair.
pub async fn check_registration(
    State(state): State<AppState>,
    Path((event_id, volunteer_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let registered = state
        .registrations
        .is_registered(&event_id, &volunteer_id)
        .await?;
    Ok(Json(json!({ "registered": registered })))
}

/// Withdraws a registration. Volunteers withdraw themselves; organizers
/// may withdraw anyone.
pub async fn withdraw(
    State(state): State<AppState>,
    Path((event_id, volunteer_id)): Path<(String, String)>,
    ActingUser(actor): ActingUser,
) -> Result<impl IntoResponse, ApiError> {
    state
        .registrations
        .withdraw_as(&event_id, &volunteer_id, &actor)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
