use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use darshan_catalog::{daily_slots, Temple};
use darshan_shared::SlotKey;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct TempleSummary {
    id: Uuid,
    name: String,
    city: String,
    state: String,
    opening_time: NaiveTime,
    closing_time: NaiveTime,
    slot_duration_minutes: u32,
    slot_capacity: u32,
}

impl From<Temple> for TempleSummary {
    fn from(t: Temple) -> Self {
        Self {
            id: t.id,
            name: t.name,
            city: t.city,
            state: t.state,
            opening_time: t.opening_time,
            closing_time: t.closing_time,
            slot_duration_minutes: t.slot_duration_minutes,
            slot_capacity: t.slot_capacity,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SlotsQuery {
    date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize)]
struct SlotAvailability {
    start: NaiveTime,
    end: NaiveTime,
    capacity: u32,
    reserved: u32,
    available: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct DayAvailability {
    temple_id: Uuid,
    date: NaiveDate,
    slots: Vec<SlotAvailability>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/temples", get(list_temples))
        .route("/v1/temples/{id}/slots", get(list_slots))
        .route("/v1/temples/{id}/occupancy/stream", get(occupancy_stream))
}

async fn list_temples(
    State(state): State<AppState>,
) -> Result<Json<Vec<TempleSummary>>, AppError> {
    let temples = state
        .temples
        .list_temples()
        .await
        .map_err(AppError::internal)?;

    Ok(Json(
        temples
            .into_iter()
            .filter(|t| t.is_active)
            .map(TempleSummary::from)
            .collect(),
    ))
}

/// Derived slots for one day with occupancy overlaid from the ledger. The
/// response is cached in Redis for a few seconds: listings may lag in-flight
/// bookings, the reservation path never reads this.
async fn list_slots(
    State(state): State<AppState>,
    Path(temple_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<DayAvailability>, AppError> {
    match state.redis.get_day_availability(&temple_id, query.date).await {
        Ok(Some(cached)) => {
            if let Ok(day) = serde_json::from_str::<DayAvailability>(&cached) {
                return Ok(Json(day));
            }
        }
        Ok(None) => {}
        Err(e) => warn!("Availability cache read failed: {}", e),
    }

    let temple = state
        .temples
        .get_temple(temple_id)
        .await
        .map_err(AppError::internal)?
        .filter(|t| t.is_active)
        .ok_or_else(|| AppError::NotFoundError(format!("temple {temple_id} not found")))?;

    let mut slots = Vec::new();
    for descriptor in daily_slots(&temple)? {
        let key = SlotKey::new(temple.id, query.date, descriptor.start);
        let occupancy = state.ledger.occupancy(key).await?;
        let (reserved, capacity) = match occupancy {
            Some(occ) => (occ.reserved_count, occ.capacity),
            None => (0, descriptor.capacity),
        };
        slots.push(SlotAvailability {
            start: descriptor.start,
            end: descriptor.end,
            capacity,
            reserved,
            available: capacity.saturating_sub(reserved),
        });
    }

    let day = DayAvailability {
        temple_id: temple.id,
        date: query.date,
        slots,
    };

    match serde_json::to_string(&day) {
        Ok(payload) => {
            if let Err(e) = state
                .redis
                .set_day_availability(
                    &temple_id,
                    query.date,
                    &payload,
                    state.business_rules.slot_cache_seconds,
                )
                .await
            {
                warn!("Availability cache write failed: {}", e);
            }
        }
        Err(e) => warn!("Failed to serialize availability snapshot: {}", e),
    }

    Ok(Json(day))
}

/// Live occupancy feed for one temple, one SSE event per ledger change.
async fn occupancy_stream(
    State(state): State<AppState>,
    Path(temple_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.sse_tx.subscribe();

    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(move |result| {
        async move {
            match result {
                Ok(event) if event.temple_id == temple_id => Event::default()
                    .event("slot_occupancy")
                    .json_data(&event)
                    .ok()
                    .map(Ok),
                _ => None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
