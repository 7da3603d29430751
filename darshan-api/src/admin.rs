use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{NaiveTime, Utc};
use darshan_booking::{Booking, BookingStatus};
use darshan_catalog::{daily_slots, Temple};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct CreateTempleRequest {
    name: String,
    city: String,
    state: String,
    opening_time: NaiveTime,
    closing_time: NaiveTime,
    slot_duration_minutes: u32,
    slot_capacity: u32,
}

#[derive(Debug, Deserialize)]
struct UpdateTempleRequest {
    name: Option<String>,
    city: Option<String>,
    state: Option<String>,
    opening_time: Option<NaiveTime>,
    closing_time: Option<NaiveTime>,
    slot_duration_minutes: Option<u32>,
    slot_capacity: Option<u32>,
    is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ListBookingsQuery {
    limit: Option<i64>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/temples", post(create_temple))
        .route("/v1/admin/temples/{id}", put(update_temple))
        .route("/v1/admin/bookings", get(list_bookings))
        .route("/v1/admin/pilgrims", get(list_pilgrims))
        .route("/v1/admin/bookings/{id}/check-in", post(check_in_booking))
        .route("/v1/admin/bookings/{id}/complete", post(complete_booking))
        .route("/v1/admin/bookings/{id}/no-show", post(no_show_booking))
}

// ============================================================================
// Temple Configuration Handlers
// ============================================================================

/// POST /v1/admin/temples
async fn create_temple(
    State(state): State<AppState>,
    Json(req): Json<CreateTempleRequest>,
) -> Result<(StatusCode, Json<Temple>), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::ValidationError(
            "name must not be empty".to_string(),
        ));
    }

    let now = Utc::now();
    let temple = Temple {
        id: Uuid::new_v4(),
        name: req.name,
        city: req.city,
        state: req.state,
        opening_time: req.opening_time,
        closing_time: req.closing_time,
        slot_duration_minutes: req.slot_duration_minutes,
        slot_capacity: req.slot_capacity,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    // A schedule that derives no valid slots is rejected before it ever
    // reaches the store.
    daily_slots(&temple)?;

    state
        .temples
        .create_temple(&temple)
        .await
        .map_err(AppError::internal)?;

    info!("Temple created: {} ({})", temple.name, temple.id);
    Ok((StatusCode::CREATED, Json(temple)))
}

/// PUT /v1/admin/temples/:id — prospective configuration change. Capacity
/// reductions are validated against already-reserved future slots and
/// rejected outright if any would be overcommitted.
async fn update_temple(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTempleRequest>,
) -> Result<Json<Temple>, AppError> {
    let mut temple = state
        .temples
        .get_temple(id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::NotFoundError(format!("temple {id} not found")))?;

    if let Some(name) = req.name {
        temple.name = name;
    }
    if let Some(city) = req.city {
        temple.city = city;
    }
    if let Some(state_name) = req.state {
        temple.state = state_name;
    }
    if let Some(opening_time) = req.opening_time {
        temple.opening_time = opening_time;
    }
    if let Some(closing_time) = req.closing_time {
        temple.closing_time = closing_time;
    }
    if let Some(duration) = req.slot_duration_minutes {
        temple.slot_duration_minutes = duration;
    }
    if let Some(is_active) = req.is_active {
        temple.is_active = is_active;
    }

    let capacity_changed = match req.slot_capacity {
        Some(capacity) if capacity != temple.slot_capacity => {
            temple.slot_capacity = capacity;
            true
        }
        _ => false,
    };

    // The merged schedule must still derive valid slots.
    daily_slots(&temple)?;

    if capacity_changed {
        // Apply to the ledger first: if any future slot already holds more
        // reserved seats than the new capacity, the whole update is
        // rejected and the temple row stays untouched.
        state
            .ledger
            .apply_capacity(temple.id, Utc::now().date_naive(), temple.slot_capacity)
            .await?;
    }

    temple.updated_at = Utc::now();
    state
        .temples
        .update_temple(id, &temple)
        .await
        .map_err(AppError::internal)?;

    info!("Temple updated: {} ({})", temple.name, temple.id);
    Ok(Json(temple))
}

// ============================================================================
// Dashboard Handlers
// ============================================================================

/// GET /v1/admin/bookings
async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let bookings = state
        .bookings
        .list_all(limit)
        .await
        .map_err(AppError::internal)?;

    Ok(Json(bookings))
}

/// GET /v1/admin/pilgrims
async fn list_pilgrims(
    State(state): State<AppState>,
) -> Result<Json<Vec<darshan_shared::Pilgrim>>, AppError> {
    let pilgrims = state
        .pilgrims
        .list_pilgrims()
        .await
        .map_err(AppError::internal)?;

    Ok(Json(pilgrims))
}

// ============================================================================
// On-site Lifecycle Handlers
// ============================================================================

async fn check_in_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    transition_booking(&state, id, BookingStatus::Confirmed, BookingStatus::CheckedIn).await
}

async fn complete_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    transition_booking(&state, id, BookingStatus::CheckedIn, BookingStatus::Completed).await
}

async fn no_show_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    transition_booking(&state, id, BookingStatus::Confirmed, BookingStatus::NoShow).await
}

async fn transition_booking(
    state: &AppState,
    id: Uuid,
    from: BookingStatus,
    to: BookingStatus,
) -> Result<Json<Booking>, AppError> {
    let moved = state
        .bookings
        .transition(id, from, to, None)
        .await
        .map_err(AppError::internal)?;

    let booking = state
        .bookings
        .get_booking(id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::NotFoundError(format!("booking {id} not found")))?;

    if !moved {
        return Err(AppError::ConflictError(format!(
            "cannot move booking from {} to {}",
            booking.status.as_str(),
            to.as_str()
        )));
    }

    info!("Booking {} moved to {}", id, to.as_str());
    Ok(Json(booking))
}
