use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use darshan_booking::{BookingError, BookingRequest, CancelOutcome};
use darshan_shared::events::SlotOccupancyEvent;
use darshan_shared::{PriorityCategory, SlotKey};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    pilgrim_id: Uuid,
    temple_id: Uuid,
    date: NaiveDate,
    slot_start: NaiveTime,
    party_size: u32,
    priority_category: Option<PriorityCategory>,
}

#[derive(Debug, Serialize)]
struct CancelResponse {
    booking_id: Uuid,
    status: &'static str,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
}

async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<darshan_booking::BookingConfirmation>), AppError> {
    let slot = SlotKey::new(req.temple_id, req.date, req.slot_start);
    let booking_req = BookingRequest {
        pilgrim_id: req.pilgrim_id,
        temple_id: req.temple_id,
        date: req.date,
        slot_start: req.slot_start,
        party_size: req.party_size,
        priority_category: req.priority_category,
    };

    match state.orchestrator.book(booking_req).await {
        Ok(confirmation) => {
            state.metrics.bookings_confirmed.inc();
            publish_occupancy(&state, slot).await;
            info!("Booking confirmed: {}", confirmation.booking_id);
            Ok((StatusCode::CREATED, Json(confirmation)))
        }
        Err(BookingError::SlotFull) => {
            state.metrics.bookings_slot_full.inc();
            Err(AppError::SlotFull)
        }
        Err(e) => Err(e.into()),
    }
}

async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<darshan_booking::Booking>, AppError> {
    let booking = state
        .bookings
        .get_booking(id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::NotFoundError(format!("booking {id} not found")))?;

    Ok(Json(booking))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelResponse>, AppError> {
    // Reconstruct the slot before cancelling so the occupancy broadcast has
    // a key even though the row already changed.
    let slot = state
        .bookings
        .get_booking(id)
        .await
        .map_err(AppError::internal)?
        .map(|b| b.slot_key());

    match state.orchestrator.cancel(id).await? {
        CancelOutcome::Cancelled => {
            state.metrics.bookings_cancelled.inc();
            if let Some(slot) = slot {
                publish_occupancy(&state, slot).await;
            }
            Ok(Json(CancelResponse {
                booking_id: id,
                status: "CANCELLED",
            }))
        }
        CancelOutcome::AlreadyCancelled => Ok(Json(CancelResponse {
            booking_id: id,
            status: "ALREADY_CANCELLED",
        })),
    }
}

/// Push the slot's fresh occupancy to SSE subscribers and drop the cached
/// day snapshot. Best-effort on both counts: the ledger row is the truth.
pub async fn publish_occupancy(state: &AppState, slot: SlotKey) {
    if let Err(e) = state
        .redis
        .invalidate_day_availability(&slot.temple_id, slot.date)
        .await
    {
        warn!("Failed to invalidate availability cache for {}: {}", slot, e);
    }

    match state.ledger.occupancy(slot).await {
        Ok(Some(occupancy)) => {
            let event = SlotOccupancyEvent {
                temple_id: slot.temple_id,
                slot_date: slot.date,
                slot_start: slot.start,
                reserved_count: occupancy.reserved_count,
                capacity: occupancy.capacity,
                updated_at: Utc::now().timestamp(),
            };
            // No subscribers is fine; the send result only matters for them.
            let _ = state.sse_tx.send(event);
        }
        Ok(None) => {}
        Err(e) => warn!("Failed to read occupancy for {}: {}", slot, e),
    }
}
