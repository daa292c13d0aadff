//! Event-side endpoints: capacity upsert, occupancy snapshot, bans, and
//! organizer removal.

use std::collections::BTreeSet;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::middleware::ActingUser;
use crate::state::AppState;
use rollcall_core::{CapacityMode, EventCapacity, TimeSlot};

/// Capacity document as sent by the organizer UI. The event id comes from
/// the path; occupancy counters are never accepted from clients.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityRequest {
    #[serde(flatten)]
    pub mode: CapacityMode,
    #[serde(default)]
    pub time_slots_enabled: bool,
    #[serde(default)]
    pub time_slots: Vec<TimeSlot>,
    #[serde(default)]
    pub banned_volunteers: BTreeSet<String>,
    #[serde(default)]
    pub organizers: BTreeSet<String>,
    /// Defaults to the acting user on first creation.
    #[serde(default)]
    pub created_by: Option<String>,
}

pub async fn put_capacity(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    ActingUser(actor): ActingUser,
    Json(request): Json<CapacityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created_by = request.created_by.unwrap_or_else(|| actor.user_id.clone());
    let mut capacity = EventCapacity::new(event_id, request.mode, created_by);
    capacity.time_slots_enabled = request.time_slots_enabled || !request.time_slots.is_empty();
    capacity.time_slots = request.time_slots;
    capacity.banned_volunteers = request.banned_volunteers;
    capacity.organizers.extend(request.organizers);

    // Clients send zeroed counters; any live occupancy is preserved by the
    // service on replace.
    for slot in &mut capacity.time_slots {
        for category in &mut slot.categories {
            category.current_occupants = 0;
        }
    }

    state.registrations.upsert_capacity(capacity, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn occupancy(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.registrations.occupancy(&event_id).await?;
    Ok(Json(snapshot))
}

pub async fn list_registrations(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    ActingUser(actor): ActingUser,
) -> Result<impl IntoResponse, ApiError> {
    let listed = state.registrations.list_for_event(&event_id, &actor).await?;
    Ok(Json(listed))
}

pub async fn ban_volunteer(
    State(state): State<AppState>,
    Path((event_id, volunteer_id)): Path<(String, String)>,
    ActingUser(actor): ActingUser,
) -> Result<impl IntoResponse, ApiError> {
    state
        .registrations
        .ban(&event_id, &volunteer_id, &actor)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unban_volunteer(
    State(state): State<AppState>,
    Path((event_id, volunteer_id)): Path<(String, String)>,
    ActingUser(actor): ActingUser,
) -> Result<impl IntoResponse, ApiError> {
    state
        .registrations
        .unban(&event_id, &volunteer_id, &actor)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_volunteer(
    State(state): State<AppState>,
    Path((event_id, volunteer_id)): Path<(String, String)>,
    ActingUser(actor): ActingUser,
) -> Result<impl IntoResponse, ApiError> {
    state
        .registrations
        .remove_volunteer(&event_id, &volunteer_id, &actor)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
