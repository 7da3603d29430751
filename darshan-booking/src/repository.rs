use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Booking, BookingStatus};

/// Repository trait for booking data access.
///
/// `transition` is a compare-and-set on the status column: it succeeds only
/// if the row is still in `from`, which is what lets the orchestrator and
/// the reconciliation sweep race safely over the same PENDING rows.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn create_booking(
        &self,
        booking: &Booking,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn get_booking(
        &self,
        id: Uuid,
    ) -> Result<Option<Booking>, Box<dyn std::error::Error + Send + Sync>>;

    /// Atomically move `id` from `from` to `to`, stamping the ticket number
    /// when given. Returns false (with no change) if the row was not in
    /// `from` anymore.
    async fn transition(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        ticket_number: Option<&str>,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;

    async fn list_for_pilgrim(
        &self,
        pilgrim_id: Uuid,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>>;

    /// Newest-first listing for the admin dashboard.
    async fn list_all(
        &self,
        limit: i64,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>>;

    /// PENDING bookings created before `cutoff` — the sweep's work queue.
    async fn stale_pending(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>>;
}

/// In-memory booking store for tests and single-node deployments.
pub struct MemoryBookingStore {
    rows: Mutex<HashMap<Uuid, Booking>>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryBookingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingRepository for MemoryBookingStore {
    async fn create_booking(
        &self,
        booking: &Booking,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut rows = self.rows.lock().expect("booking store lock poisoned");
        if rows.contains_key(&booking.id) {
            return Err(format!("duplicate booking id {}", booking.id).into());
        }
        rows.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(
        &self,
        id: Uuid,
    ) -> Result<Option<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = self.rows.lock().expect("booking store lock poisoned");
        Ok(rows.get(&id).cloned())
    }

    async fn transition(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        ticket_number: Option<&str>,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let mut rows = self.rows.lock().expect("booking store lock poisoned");
        match rows.get_mut(&id) {
            Some(row) if row.status == from => {
                row.status = to;
                if let Some(ticket) = ticket_number {
                    row.ticket_number = Some(ticket.to_string());
                }
                row.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_for_pilgrim(
        &self,
        pilgrim_id: Uuid,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = self.rows.lock().expect("booking store lock poisoned");
        let mut bookings: Vec<Booking> = rows
            .values()
            .filter(|b| b.pilgrim_id == pilgrim_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn list_all(
        &self,
        limit: i64,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = self.rows.lock().expect("booking store lock poisoned");
        let mut bookings: Vec<Booking> = rows.values().cloned().collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bookings.truncate(limit.max(0) as usize);
        Ok(bookings)
    }

    async fn stale_pending(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = self.rows.lock().expect("booking store lock poisoned");
        Ok(rows
            .values()
            .filter(|b| b.status == BookingStatus::Pending && b.created_at < cutoff)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use darshan_shared::{PriorityCategory, SlotKey};

    fn booking() -> Booking {
        Booking::pending(
            Uuid::new_v4(),
            "Meera Nair".to_string(),
            SlotKey::new(
                Uuid::new_v4(),
                NaiveDate::from_ymd_opt(2026, 8, 10).unwrap(),
                NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            ),
            1,
            PriorityCategory::None,
            Uuid::new_v4(),
        )
    }

    #[tokio::test]
    async fn transition_is_a_compare_and_set() {
        let store = MemoryBookingStore::new();
        let b = booking();
        store.create_booking(&b).await.unwrap();

        // Wrong `from` leaves the row untouched.
        let moved = store
            .transition(
                b.id,
                BookingStatus::Confirmed,
                BookingStatus::CheckedIn,
                None,
            )
            .await
            .unwrap();
        assert!(!moved);
        assert_eq!(
            store.get_booking(b.id).await.unwrap().unwrap().status,
            BookingStatus::Pending
        );

        let moved = store
            .transition(
                b.id,
                BookingStatus::Pending,
                BookingStatus::Confirmed,
                Some("TKT-20260810-ZZZ999"),
            )
            .await
            .unwrap();
        assert!(moved);
        let row = store.get_booking(b.id).await.unwrap().unwrap();
        assert_eq!(row.status, BookingStatus::Confirmed);
        assert_eq!(row.ticket_number.as_deref(), Some("TKT-20260810-ZZZ999"));
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let store = MemoryBookingStore::new();
        let b = booking();
        store.create_booking(&b).await.unwrap();
        assert!(store.create_booking(&b).await.is_err());
    }
}
