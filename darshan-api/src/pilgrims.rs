use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use darshan_booking::Booking;
use darshan_shared::models::IdType;
use darshan_shared::{Masked, Pilgrim, PriorityCategory};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct PilgrimPayload {
    full_name: String,
    phone: String,
    email: Option<String>,
    id_type: IdType,
    id_number: String,
    age: Option<i32>,
    gender: Option<String>,
    priority_category: Option<PriorityCategory>,
    emergency_contact_name: Option<String>,
    emergency_contact_phone: Option<String>,
}

impl PilgrimPayload {
    fn validate(&self) -> Result<(), AppError> {
        if self.full_name.trim().is_empty() {
            return Err(AppError::ValidationError(
                "full_name must not be empty".to_string(),
            ));
        }
        if self.phone.trim().is_empty() {
            return Err(AppError::ValidationError(
                "phone must not be empty".to_string(),
            ));
        }
        if self.id_number.trim().is_empty() {
            return Err(AppError::ValidationError(
                "id_number must not be empty".to_string(),
            ));
        }
        if let Some(age) = self.age {
            if !(0..=120).contains(&age) {
                return Err(AppError::ValidationError("age is out of range".to_string()));
            }
        }
        Ok(())
    }

    fn into_pilgrim(self, id: Uuid, created_at: chrono::DateTime<Utc>) -> Pilgrim {
        Pilgrim {
            id,
            full_name: self.full_name,
            phone: Masked(self.phone),
            email: self.email,
            id_type: self.id_type,
            id_number: Masked(self.id_number),
            age: self.age,
            gender: self.gender,
            priority_category: self.priority_category.unwrap_or_default(),
            emergency_contact_name: self.emergency_contact_name,
            emergency_contact_phone: self.emergency_contact_phone.map(Masked),
            created_at,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/pilgrims", post(register_pilgrim))
        .route(
            "/v1/pilgrims/{id}",
            get(get_pilgrim).put(update_pilgrim).delete(delete_pilgrim),
        )
        .route("/v1/pilgrims/{id}/bookings", get(list_pilgrim_bookings))
}

async fn register_pilgrim(
    State(state): State<AppState>,
    Json(payload): Json<PilgrimPayload>,
) -> Result<(StatusCode, Json<Pilgrim>), AppError> {
    payload.validate()?;

    let pilgrim = payload.into_pilgrim(Uuid::new_v4(), Utc::now());
    state
        .pilgrims
        .create_pilgrim(&pilgrim)
        .await
        .map_err(AppError::internal)?;

    info!("Pilgrim registered: {}", pilgrim.id);
    Ok((StatusCode::CREATED, Json(pilgrim)))
}

async fn get_pilgrim(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Pilgrim>, AppError> {
    let pilgrim = state
        .pilgrims
        .get_pilgrim(id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::NotFoundError(format!("pilgrim {id} not found")))?;

    Ok(Json(pilgrim))
}

async fn update_pilgrim(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PilgrimPayload>,
) -> Result<Json<Pilgrim>, AppError> {
    payload.validate()?;

    let existing = state
        .pilgrims
        .get_pilgrim(id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::NotFoundError(format!("pilgrim {id} not found")))?;

    let updated = payload.into_pilgrim(id, existing.created_at);
    state
        .pilgrims
        .update_pilgrim(id, &updated)
        .await
        .map_err(AppError::internal)?;

    Ok(Json(updated))
}

async fn delete_pilgrim(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .pilgrims
        .get_pilgrim(id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::NotFoundError(format!("pilgrim {id} not found")))?;

    state
        .pilgrims
        .delete_pilgrim(id)
        .await
        .map_err(AppError::internal)?;

    Ok(StatusCode::NO_CONTENT)
}

async fn list_pilgrim_bookings(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = state
        .bookings
        .list_for_pilgrim(id)
        .await
        .map_err(AppError::internal)?;

    Ok(Json(bookings))
}
