use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use darshan_catalog::{schedule, Temple, TempleRepository};
use darshan_core::events::EventPublisher;
use darshan_core::repository::PilgrimRepository;
use darshan_ledger::{LedgerError, ReservationLedger, ReservationToken};
use darshan_shared::events::{BookingCancelledEvent, BookingConfirmedEvent};
use darshan_shared::{Pilgrim, PriorityCategory, SlotKey};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{Booking, BookingStatus};
use crate::repository::BookingRepository;
use crate::ticket;

pub const BOOKING_CONFIRMED_TOPIC: &str = "booking.confirmed";
pub const BOOKING_CANCELLED_TOPIC: &str = "booking.cancelled";

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Temple closed: {0}")]
    TempleClosed(String),

    #[error("Slot is fully booked")]
    SlotFull,

    #[error("Booking not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Tunables the orchestrator needs from configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorRules {
    pub booking_horizon_days: u32,
    pub max_party_size: u32,
    pub persist_retry_attempts: u32,
    pub persist_retry_backoff_ms: u64,
}

/// The inbound booking request, already shape-validated at the API boundary
/// but re-checked here: nothing touches the ledger on a malformed request.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub pilgrim_id: Uuid,
    pub temple_id: Uuid,
    pub date: NaiveDate,
    pub slot_start: NaiveTime,
    pub party_size: u32,
    pub priority_category: Option<PriorityCategory>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingConfirmation {
    pub booking_id: Uuid,
    pub ticket_number: String,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelOutcome {
    Cancelled,
    AlreadyCancelled,
}

/// Turns a booking request into a durable booking plus a ledger reservation,
/// as one all-or-nothing unit.
pub struct BookingOrchestrator {
    temples: Arc<dyn TempleRepository>,
    pilgrims: Arc<dyn PilgrimRepository>,
    bookings: Arc<dyn BookingRepository>,
    ledger: Arc<dyn ReservationLedger>,
    publisher: Arc<dyn EventPublisher>,
    rules: OrchestratorRules,
}

impl BookingOrchestrator {
    pub fn new(
        temples: Arc<dyn TempleRepository>,
        pilgrims: Arc<dyn PilgrimRepository>,
        bookings: Arc<dyn BookingRepository>,
        ledger: Arc<dyn ReservationLedger>,
        publisher: Arc<dyn EventPublisher>,
        rules: OrchestratorRules,
    ) -> Self {
        Self {
            temples,
            pilgrims,
            bookings,
            ledger,
            publisher,
            rules,
        }
    }

    /// The booking protocol: validate, reserve, persist PENDING, confirm
    /// with a ticket, publish. `SlotFull` leaves no trace; a persistence
    /// failure before the row exists releases the reservation; after the
    /// row exists, the reconciliation sweep is the only authority allowed
    /// to release it.
    pub async fn book(&self, req: BookingRequest) -> Result<BookingConfirmation, BookingError> {
        let (pilgrim, temple) = self.validate(&req).await?;

        let slot = schedule::slot_at(&temple, req.slot_start)
            .map_err(|e| BookingError::ServiceUnavailable(format!("temple schedule: {e}")))?
            .ok_or_else(|| {
                BookingError::TempleClosed(format!(
                    "no slot starts at {} (open {} to {})",
                    req.slot_start, temple.opening_time, temple.closing_time
                ))
            })?;

        let slot_key = SlotKey::new(temple.id, req.date, slot.start);
        let token = match self
            .ledger
            .reserve(slot_key, req.party_size, slot.capacity)
            .await
        {
            Ok(token) => token,
            Err(LedgerError::CapacityExceeded {
                requested,
                available,
            }) => {
                debug!(
                    "Slot {} full: requested {}, available {}",
                    slot_key, requested, available
                );
                return Err(BookingError::SlotFull);
            }
            Err(e) => return Err(BookingError::ServiceUnavailable(e.to_string())),
        };

        let booking = Booking::pending(
            pilgrim.id,
            pilgrim.full_name.clone(),
            slot_key,
            req.party_size,
            req.priority_category.unwrap_or_default(),
            token.id,
        );

        self.persist_pending(&booking, &token).await?;
        let ticket_number = self.confirm(&booking).await?;

        self.publish_confirmed(&booking, &ticket_number, &pilgrim, &temple)
            .await;

        info!(
            "Booking confirmed: {} ticket {} slot {}",
            booking.id, ticket_number, slot_key
        );

        Ok(BookingConfirmation {
            booking_id: booking.id,
            ticket_number,
            status: BookingStatus::Confirmed,
        })
    }

    /// Cancel from PENDING or CONFIRMED, returning the seats to the ledger.
    /// A second cancel is a no-op outcome, never a ledger mutation.
    pub async fn cancel(&self, booking_id: Uuid) -> Result<CancelOutcome, BookingError> {
        let booking = self
            .bookings
            .get_booking(booking_id)
            .await
            .map_err(|e| BookingError::ServiceUnavailable(e.to_string()))?
            .ok_or(BookingError::NotFound(booking_id))?;

        match booking.status {
            BookingStatus::Cancelled => Ok(CancelOutcome::AlreadyCancelled),
            BookingStatus::Pending | BookingStatus::Confirmed => {
                let moved = self
                    .bookings
                    .transition(booking_id, booking.status, BookingStatus::Cancelled, None)
                    .await
                    .map_err(|e| BookingError::ServiceUnavailable(e.to_string()))?;

                if !moved {
                    // Lost a race with the sweep or another caller; report
                    // what the row became.
                    let current = self
                        .bookings
                        .get_booking(booking_id)
                        .await
                        .map_err(|e| BookingError::ServiceUnavailable(e.to_string()))?
                        .ok_or(BookingError::NotFound(booking_id))?;
                    if current.status == BookingStatus::Cancelled {
                        return Ok(CancelOutcome::AlreadyCancelled);
                    }
                    return Err(BookingError::InvalidTransition {
                        from: current.status.as_str().to_string(),
                        to: BookingStatus::Cancelled.as_str().to_string(),
                    });
                }

                if let Some(token) = booking.reservation_token() {
                    self.release_quietly(&token).await;
                }

                self.publish_cancelled(&booking).await;
                Ok(CancelOutcome::Cancelled)
            }
            other => Err(BookingError::InvalidTransition {
                from: other.as_str().to_string(),
                to: BookingStatus::Cancelled.as_str().to_string(),
            }),
        }
    }

    async fn validate(&self, req: &BookingRequest) -> Result<(Pilgrim, Temple), BookingError> {
        if req.party_size < 1 {
            return Err(BookingError::InvalidRequest(
                "party_size must be at least 1".to_string(),
            ));
        }
        if req.party_size > self.rules.max_party_size {
            return Err(BookingError::InvalidRequest(format!(
                "party_size {} exceeds the limit of {}",
                req.party_size, self.rules.max_party_size
            )));
        }

        let now = Utc::now();
        let today = now.date_naive();
        if req.date < today {
            return Err(BookingError::InvalidRequest(
                "booking date is in the past".to_string(),
            ));
        }
        let horizon = today + chrono::Duration::days(self.rules.booking_horizon_days as i64);
        if req.date > horizon {
            return Err(BookingError::InvalidRequest(format!(
                "booking date is beyond the {}-day horizon",
                self.rules.booking_horizon_days
            )));
        }
        if req.date == today && req.slot_start <= now.time() {
            return Err(BookingError::InvalidRequest(
                "slot has already started".to_string(),
            ));
        }

        let pilgrim = self
            .pilgrims
            .get_pilgrim(req.pilgrim_id)
            .await
            .map_err(|e| BookingError::ServiceUnavailable(e.to_string()))?
            .ok_or_else(|| BookingError::InvalidRequest("unknown pilgrim".to_string()))?;

        let temple = self
            .temples
            .get_temple(req.temple_id)
            .await
            .map_err(|e| BookingError::ServiceUnavailable(e.to_string()))?
            .ok_or_else(|| BookingError::InvalidRequest("unknown temple".to_string()))?;

        if !temple.is_active {
            return Err(BookingError::TempleClosed(format!(
                "{} is not currently accepting bookings",
                temple.name
            )));
        }

        Ok((pilgrim, temple))
    }

    /// Persist the PENDING row with a bounded number of attempts. If the row never
    /// makes it to the store, the reservation is handed back so capacity is
    /// not lost to a failed request.
    async fn persist_pending(
        &self,
        booking: &Booking,
        token: &ReservationToken,
    ) -> Result<(), BookingError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.bookings.create_booking(booking).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.rules.persist_retry_attempts => {
                    warn!(
                        "Failed to persist booking {} (attempt {}): {}",
                        booking.id, attempt, e
                    );
                    sleep(Duration::from_millis(
                        self.rules.persist_retry_backoff_ms * u64::from(attempt),
                    ))
                    .await;
                }
                Err(e) => {
                    error!(
                        "Giving up persisting booking {} after {} attempts: {}",
                        booking.id, attempt, e
                    );
                    self.release_quietly(token).await;
                    return Err(BookingError::ServiceUnavailable(
                        "could not persist booking".to_string(),
                    ));
                }
            }
        }
    }

    /// PENDING -> CONFIRMED with a fresh ticket per attempt (the ticket
    /// column is unique; a collision shows up as a storage error and the
    /// next attempt regenerates). A `false` CAS means the sweep reclaimed
    /// the row first.
    async fn confirm(&self, booking: &Booking) -> Result<String, BookingError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let candidate = ticket::ticket_number(Utc::now().date_naive());
            match self
                .bookings
                .transition(
                    booking.id,
                    BookingStatus::Pending,
                    BookingStatus::Confirmed,
                    Some(&candidate),
                )
                .await
            {
                Ok(true) => return Ok(candidate),
                Ok(false) => {
                    warn!(
                        "Booking {} was reclaimed before confirmation",
                        booking.id
                    );
                    return Err(BookingError::ServiceUnavailable(
                        "booking expired before confirmation".to_string(),
                    ));
                }
                Err(e) if attempt < self.rules.persist_retry_attempts => {
                    warn!(
                        "Failed to confirm booking {} (attempt {}): {}",
                        booking.id, attempt, e
                    );
                    sleep(Duration::from_millis(
                        self.rules.persist_retry_backoff_ms * u64::from(attempt),
                    ))
                    .await;
                }
                Err(e) => {
                    // The PENDING row exists: only the sweep may release its
                    // reservation from here on.
                    error!(
                        "Giving up confirming booking {} after {} attempts: {}",
                        booking.id, attempt, e
                    );
                    return Err(BookingError::ServiceUnavailable(
                        "could not confirm booking".to_string(),
                    ));
                }
            }
        }
    }

    async fn release_quietly(&self, token: &ReservationToken) {
        match self.ledger.release(token).await {
            Ok(()) => {}
            // The sweep got there first; the single-use token rule makes
            // this harmless.
            Err(LedgerError::InvalidToken) => {
                debug!("Token {} already released", token.id);
            }
            Err(e) => {
                error!("Failed to release token {}: {}", token.id, e);
            }
        }
    }

    async fn publish_confirmed(
        &self,
        booking: &Booking,
        ticket_number: &str,
        pilgrim: &Pilgrim,
        temple: &Temple,
    ) {
        let event = BookingConfirmedEvent {
            booking_id: booking.id,
            ticket_number: ticket_number.to_string(),
            pilgrim_id: pilgrim.id,
            pilgrim_name: pilgrim.full_name.clone(),
            pilgrim_phone: pilgrim.phone.clone(),
            temple_id: temple.id,
            temple_name: temple.name.clone(),
            slot_date: booking.slot_date,
            slot_start: booking.slot_start,
            party_size: booking.party_size,
            confirmed_at: Utc::now().timestamp(),
        };
        self.publish(BOOKING_CONFIRMED_TOPIC, booking.id, &event).await;
    }

    async fn publish_cancelled(&self, booking: &Booking) {
        let event = BookingCancelledEvent {
            booking_id: booking.id,
            temple_id: booking.temple_id,
            slot_date: booking.slot_date,
            slot_start: booking.slot_start,
            party_size: booking.party_size,
            cancelled_at: Utc::now().timestamp(),
        };
        self.publish(BOOKING_CANCELLED_TOPIC, booking.id, &event).await;
    }

    /// Fire-and-forget: the notification dispatcher owns retries, and a
    /// publish failure must never unwind a reservation.
    async fn publish<E: serde::Serialize>(&self, topic: &str, key: Uuid, event: &E) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize event for {}: {}", topic, e);
                return;
            }
        };
        if let Err(e) = self.publisher.publish(topic, &key.to_string(), &payload).await {
            warn!("Failed to publish to {}: {}", topic, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryBookingStore;
    use async_trait::async_trait;
    use darshan_ledger::MemoryLedger;
    use darshan_shared::models::IdType;
    use darshan_shared::Masked;
    use std::sync::Mutex;

    struct FixedTemples {
        temple: Temple,
    }

    #[async_trait]
    impl TempleRepository for FixedTemples {
        async fn create_temple(
            &self,
            temple: &Temple,
        ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>> {
            Ok(temple.id)
        }

        async fn get_temple(
            &self,
            id: Uuid,
        ) -> Result<Option<Temple>, Box<dyn std::error::Error + Send + Sync>> {
            Ok((self.temple.id == id).then(|| self.temple.clone()))
        }

        async fn list_temples(
            &self,
        ) -> Result<Vec<Temple>, Box<dyn std::error::Error + Send + Sync>> {
            Ok(vec![self.temple.clone()])
        }

        async fn update_temple(
            &self,
            _id: Uuid,
            _temple: &Temple,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }
    }

    struct FixedPilgrims {
        pilgrim: Pilgrim,
    }

    #[async_trait]
    impl PilgrimRepository for FixedPilgrims {
        async fn create_pilgrim(
            &self,
            pilgrim: &Pilgrim,
        ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>> {
            Ok(pilgrim.id)
        }

        async fn get_pilgrim(
            &self,
            id: Uuid,
        ) -> Result<Option<Pilgrim>, Box<dyn std::error::Error + Send + Sync>> {
            Ok((self.pilgrim.id == id).then(|| self.pilgrim.clone()))
        }

        async fn list_pilgrims(
            &self,
        ) -> Result<Vec<Pilgrim>, Box<dyn std::error::Error + Send + Sync>> {
            Ok(vec![self.pilgrim.clone()])
        }

        async fn update_pilgrim(
            &self,
            _id: Uuid,
            _pilgrim: &Pilgrim,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }

        async fn delete_pilgrim(
            &self,
            _id: Uuid,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }
    }

    struct RecordingPublisher {
        topics: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingPublisher {
        fn new(fail: bool) -> Self {
            Self {
                topics: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(
            &self,
            topic: &str,
            _key: &str,
            _payload: &str,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            if self.fail {
                return Err("broker unreachable".into());
            }
            self.topics.lock().unwrap().push(topic.to_string());
            Ok(())
        }
    }

    /// A store whose writes always fail, for the rollback path.
    struct BrokenBookings;

    #[async_trait]
    impl BookingRepository for BrokenBookings {
        async fn create_booking(
            &self,
            _booking: &Booking,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Err("storage unavailable".into())
        }

        async fn get_booking(
            &self,
            _id: Uuid,
        ) -> Result<Option<Booking>, Box<dyn std::error::Error + Send + Sync>> {
            Ok(None)
        }

        async fn transition(
            &self,
            _id: Uuid,
            _from: BookingStatus,
            _to: BookingStatus,
            _ticket_number: Option<&str>,
        ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
            Err("storage unavailable".into())
        }

        async fn list_for_pilgrim(
            &self,
            _pilgrim_id: Uuid,
        ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>> {
            Ok(Vec::new())
        }

        async fn list_all(
            &self,
            _limit: i64,
        ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>> {
            Ok(Vec::new())
        }

        async fn stale_pending(
            &self,
            _cutoff: chrono::DateTime<Utc>,
        ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>> {
            Ok(Vec::new())
        }
    }

    fn temple(capacity: u32) -> Temple {
        let now = Utc::now();
        Temple {
            id: Uuid::new_v4(),
            name: "Siddhivinayak Temple".to_string(),
            city: "Mumbai".to_string(),
            state: "Maharashtra".to_string(),
            opening_time: chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            closing_time: chrono::NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            slot_duration_minutes: 60,
            slot_capacity: capacity,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn pilgrim() -> Pilgrim {
        Pilgrim {
            id: Uuid::new_v4(),
            full_name: "Asha Sharma".to_string(),
            phone: Masked("+91 98765 43210".to_string()),
            email: Some("asha@example.com".to_string()),
            id_type: IdType::Aadhaar,
            id_number: Masked("1234-5678-9012".to_string()),
            age: Some(34),
            gender: Some("female".to_string()),
            priority_category: PriorityCategory::None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            created_at: Utc::now(),
        }
    }

    fn rules() -> OrchestratorRules {
        OrchestratorRules {
            booking_horizon_days: 7,
            max_party_size: 5,
            persist_retry_attempts: 2,
            persist_retry_backoff_ms: 1,
        }
    }

    struct Fixture {
        orchestrator: BookingOrchestrator,
        ledger: Arc<MemoryLedger>,
        bookings: Arc<MemoryBookingStore>,
        publisher: Arc<RecordingPublisher>,
        temple: Temple,
        pilgrim: Pilgrim,
    }

    fn fixture_with(
        capacity: u32,
        bookings: Arc<dyn BookingRepository>,
        publisher: Arc<RecordingPublisher>,
        ledger: Arc<MemoryLedger>,
    ) -> (BookingOrchestrator, Temple, Pilgrim) {
        let temple = temple(capacity);
        let pilgrim = pilgrim();
        let orchestrator = BookingOrchestrator::new(
            Arc::new(FixedTemples {
                temple: temple.clone(),
            }),
            Arc::new(FixedPilgrims {
                pilgrim: pilgrim.clone(),
            }),
            bookings,
            ledger,
            publisher,
            rules(),
        );
        (orchestrator, temple, pilgrim)
    }

    fn fixture(capacity: u32) -> Fixture {
        let ledger = Arc::new(MemoryLedger::new());
        let bookings = Arc::new(MemoryBookingStore::new());
        let publisher = Arc::new(RecordingPublisher::new(false));
        let (orchestrator, temple, pilgrim) = fixture_with(
            capacity,
            bookings.clone(),
            publisher.clone(),
            ledger.clone(),
        );
        Fixture {
            orchestrator,
            ledger,
            bookings,
            publisher,
            temple,
            pilgrim,
        }
    }

    fn request(f: &Fixture, party_size: u32) -> BookingRequest {
        BookingRequest {
            pilgrim_id: f.pilgrim.id,
            temple_id: f.temple.id,
            date: Utc::now().date_naive() + chrono::Duration::days(1),
            slot_start: chrono::NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            party_size,
            priority_category: None,
        }
    }

    #[tokio::test]
    async fn booking_confirms_reserves_and_publishes() {
        let f = fixture(10);
        let confirmation = f.orchestrator.book(request(&f, 3)).await.unwrap();

        assert_eq!(confirmation.status, BookingStatus::Confirmed);
        assert!(confirmation.ticket_number.starts_with("TKT-"));

        let row = f
            .bookings
            .get_booking(confirmation.booking_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, BookingStatus::Confirmed);
        assert_eq!(row.pilgrim_name, "Asha Sharma");
        assert_eq!(
            row.ticket_number.as_deref(),
            Some(confirmation.ticket_number.as_str())
        );

        let key = row.slot_key();
        let occ = f.ledger.occupancy(key).await.unwrap().unwrap();
        assert_eq!(occ.reserved_count, 3);

        let topics = f.publisher.topics.lock().unwrap();
        assert_eq!(topics.as_slice(), [BOOKING_CONFIRMED_TOPIC.to_string()]);
    }

    #[tokio::test]
    async fn slot_full_creates_no_booking_row() {
        let f = fixture(2);
        f.orchestrator.book(request(&f, 2)).await.unwrap();

        let err = f.orchestrator.book(request(&f, 2)).await.unwrap_err();
        assert!(matches!(err, BookingError::SlotFull));

        assert_eq!(f.bookings.list_all(10).await.unwrap().len(), 1);
        let key = SlotKey::new(
            f.temple.id,
            request(&f, 1).date,
            request(&f, 1).slot_start,
        );
        assert_eq!(
            f.ledger.occupancy(key).await.unwrap().unwrap().reserved_count,
            2
        );
    }

    #[tokio::test]
    async fn concurrent_last_seat_race_admits_exactly_one() {
        let f = fixture(2);
        let orchestrator = Arc::new(f.orchestrator);

        let req_a = request_for(&f.pilgrim, &f.temple, 2);
        let req_b = request_for(&f.pilgrim, &f.temple, 2);

        let a = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.book(req_a).await })
        };
        let b = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.book(req_b).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let confirmed = results.iter().filter(|r| r.is_ok()).count();
        let full = results
            .iter()
            .filter(|r| matches!(r, Err(BookingError::SlotFull)))
            .count();
        assert_eq!(confirmed, 1);
        assert_eq!(full, 1);

        let key = SlotKey::new(
            f.temple.id,
            Utc::now().date_naive() + chrono::Duration::days(1),
            chrono::NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        );
        assert_eq!(
            f.ledger.occupancy(key).await.unwrap().unwrap().reserved_count,
            2
        );
    }

    fn request_for(pilgrim: &Pilgrim, temple: &Temple, party_size: u32) -> BookingRequest {
        BookingRequest {
            pilgrim_id: pilgrim.id,
            temple_id: temple.id,
            date: Utc::now().date_naive() + chrono::Duration::days(1),
            slot_start: chrono::NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            party_size,
            priority_category: None,
        }
    }

    #[tokio::test]
    async fn party_size_bounds_are_enforced_before_the_ledger() {
        let f = fixture(10);

        let mut req = request(&f, 0);
        assert!(matches!(
            f.orchestrator.book(req.clone()).await.unwrap_err(),
            BookingError::InvalidRequest(_)
        ));

        req.party_size = 6;
        assert!(matches!(
            f.orchestrator.book(req).await.unwrap_err(),
            BookingError::InvalidRequest(_)
        ));

        // Nothing was materialized in the ledger.
        let key = SlotKey::new(
            f.temple.id,
            Utc::now().date_naive() + chrono::Duration::days(1),
            chrono::NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        );
        assert!(f.ledger.occupancy(key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dates_outside_the_horizon_are_rejected() {
        let f = fixture(10);

        let mut req = request(&f, 1);
        req.date = Utc::now().date_naive() - chrono::Duration::days(1);
        assert!(matches!(
            f.orchestrator.book(req.clone()).await.unwrap_err(),
            BookingError::InvalidRequest(_)
        ));

        req.date = Utc::now().date_naive() + chrono::Duration::days(8);
        assert!(matches!(
            f.orchestrator.book(req).await.unwrap_err(),
            BookingError::InvalidRequest(_)
        ));
    }

    #[tokio::test]
    async fn off_schedule_start_time_is_temple_closed() {
        let f = fixture(10);
        let mut req = request(&f, 1);
        req.slot_start = chrono::NaiveTime::from_hms_opt(6, 30, 0).unwrap();
        assert!(matches!(
            f.orchestrator.book(req).await.unwrap_err(),
            BookingError::TempleClosed(_)
        ));
    }

    #[tokio::test]
    async fn inactive_temple_is_temple_closed() {
        let ledger = Arc::new(MemoryLedger::new());
        let bookings = Arc::new(MemoryBookingStore::new());
        let publisher = Arc::new(RecordingPublisher::new(false));
        let mut t = temple(10);
        t.is_active = false;
        let p = pilgrim();
        let orchestrator = BookingOrchestrator::new(
            Arc::new(FixedTemples { temple: t.clone() }),
            Arc::new(FixedPilgrims { pilgrim: p.clone() }),
            bookings,
            ledger,
            publisher,
            rules(),
        );
        let err = orchestrator.book(request_for(&p, &t, 1)).await.unwrap_err();
        assert!(matches!(err, BookingError::TempleClosed(_)));
    }

    #[tokio::test]
    async fn unknown_pilgrim_and_temple_are_invalid_requests() {
        let f = fixture(10);

        let mut req = request(&f, 1);
        req.pilgrim_id = Uuid::new_v4();
        assert!(matches!(
            f.orchestrator.book(req).await.unwrap_err(),
            BookingError::InvalidRequest(_)
        ));

        let mut req = request(&f, 1);
        req.temple_id = Uuid::new_v4();
        assert!(matches!(
            f.orchestrator.book(req).await.unwrap_err(),
            BookingError::InvalidRequest(_)
        ));
    }

    #[tokio::test]
    async fn notification_failure_never_unwinds_the_reservation() {
        let ledger = Arc::new(MemoryLedger::new());
        let bookings = Arc::new(MemoryBookingStore::new());
        let publisher = Arc::new(RecordingPublisher::new(true));
        let (orchestrator, temple, pilgrim) = fixture_with(
            10,
            bookings.clone(),
            publisher.clone(),
            ledger.clone(),
        );

        let confirmation = orchestrator
            .book(request_for(&pilgrim, &temple, 2))
            .await
            .unwrap();
        assert_eq!(confirmation.status, BookingStatus::Confirmed);

        let row = bookings
            .get_booking(confirmation.booking_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            ledger
                .occupancy(row.slot_key())
                .await
                .unwrap()
                .unwrap()
                .reserved_count,
            2
        );
    }

    #[tokio::test]
    async fn persist_failure_releases_the_reservation() {
        let ledger = Arc::new(MemoryLedger::new());
        let publisher = Arc::new(RecordingPublisher::new(false));
        let (orchestrator, temple, pilgrim) =
            fixture_with(10, Arc::new(BrokenBookings), publisher, ledger.clone());

        let err = orchestrator
            .book(request_for(&pilgrim, &temple, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::ServiceUnavailable(_)));

        let key = SlotKey::new(
            temple.id,
            Utc::now().date_naive() + chrono::Duration::days(1),
            chrono::NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        );
        // The entry was materialized by the reservation and emptied by the
        // rollback.
        assert_eq!(
            ledger.occupancy(key).await.unwrap().unwrap().reserved_count,
            0
        );
    }

    #[tokio::test]
    async fn cancel_round_trip_restores_capacity() {
        let f = fixture(5);
        let confirmation = f.orchestrator.book(request(&f, 3)).await.unwrap();
        let key = SlotKey::new(
            f.temple.id,
            Utc::now().date_naive() + chrono::Duration::days(1),
            chrono::NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        );
        assert_eq!(
            f.ledger.occupancy(key).await.unwrap().unwrap().reserved_count,
            3
        );

        let outcome = f.orchestrator.cancel(confirmation.booking_id).await.unwrap();
        assert_eq!(outcome, CancelOutcome::Cancelled);
        assert_eq!(
            f.ledger.occupancy(key).await.unwrap().unwrap().reserved_count,
            0
        );

        let row = f
            .bookings
            .get_booking(confirmation.booking_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn second_cancel_is_a_no_op_outcome() {
        let f = fixture(5);
        let confirmation = f.orchestrator.book(request(&f, 2)).await.unwrap();

        assert_eq!(
            f.orchestrator.cancel(confirmation.booking_id).await.unwrap(),
            CancelOutcome::Cancelled
        );
        assert_eq!(
            f.orchestrator.cancel(confirmation.booking_id).await.unwrap(),
            CancelOutcome::AlreadyCancelled
        );

        // The double cancel credited the ledger exactly once.
        let key = SlotKey::new(
            f.temple.id,
            Utc::now().date_naive() + chrono::Duration::days(1),
            chrono::NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        );
        assert_eq!(
            f.ledger.occupancy(key).await.unwrap().unwrap().reserved_count,
            0
        );
    }

    #[tokio::test]
    async fn cancel_of_unknown_booking_is_not_found() {
        let f = fixture(5);
        let err = f.orchestrator.cancel(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, BookingError::NotFound(_)));
    }

    #[tokio::test]
    async fn cancel_after_check_in_is_an_invalid_transition() {
        let f = fixture(5);
        let confirmation = f.orchestrator.book(request(&f, 1)).await.unwrap();

        f.bookings
            .transition(
                confirmation.booking_id,
                BookingStatus::Confirmed,
                BookingStatus::CheckedIn,
                None,
            )
            .await
            .unwrap();

        let err = f
            .orchestrator
            .cancel(confirmation.booking_id)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidTransition { .. }));
    }
}
