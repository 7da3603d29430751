use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use crate::pii::Masked;

/// Published on `booking.confirmed` once a booking reaches CONFIRMED.
/// Consumed by the notification dispatcher, which owns its own retries.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingConfirmedEvent {
    pub booking_id: Uuid,
    pub ticket_number: String,
    pub pilgrim_id: Uuid,
    pub pilgrim_name: String,
    pub pilgrim_phone: Masked<String>,
    pub temple_id: Uuid,
    pub temple_name: String,
    pub slot_date: NaiveDate,
    pub slot_start: NaiveTime,
    pub party_size: u32,
    pub confirmed_at: i64,
}

/// Published on `booking.cancelled` when seats go back to the ledger.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub temple_id: Uuid,
    pub slot_date: NaiveDate,
    pub slot_start: NaiveTime,
    pub party_size: u32,
    pub cancelled_at: i64,
}

/// Broadcast to SSE subscribers whenever a slot's occupancy changes.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SlotOccupancyEvent {
    pub temple_id: Uuid,
    pub slot_date: NaiveDate,
    pub slot_start: NaiveTime,
    pub reserved_count: u32,
    pub capacity: u32,
    pub updated_at: i64,
}
