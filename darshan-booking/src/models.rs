use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use darshan_ledger::ReservationToken;
use darshan_shared::{PriorityCategory, SlotKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::orchestrator::BookingError;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    CheckedIn,
    Completed,
    NoShow,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::CheckedIn => "CHECKED_IN",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::NoShow => "NO_SHOW",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(BookingStatus::Pending),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            "CHECKED_IN" => Some(BookingStatus::CheckedIn),
            "COMPLETED" => Some(BookingStatus::Completed),
            "NO_SHOW" => Some(BookingStatus::NoShow),
            _ => None,
        }
    }

    /// Legal lifecycle edges. Everything else is an invalid transition.
    pub fn can_transition(&self, to: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, to),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Confirmed, CheckedIn)
                | (Confirmed, NoShow)
                | (CheckedIn, Completed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Cancelled | BookingStatus::Completed | BookingStatus::NoShow
        )
    }
}

/// A darshan booking: one party, one slot, one ledger reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub pilgrim_id: Uuid,
    /// Denormalized for dashboards and tickets; the pilgrim record stays
    /// authoritative.
    pub pilgrim_name: String,
    pub temple_id: Uuid,
    pub slot_date: NaiveDate,
    pub slot_start: NaiveTime,
    pub party_size: u32,
    pub priority_category: PriorityCategory,
    pub status: BookingStatus,
    pub ticket_number: Option<String>,
    pub token_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// A new booking enters the lifecycle as PENDING, and only after the
    /// ledger reservation it references has already succeeded.
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        pilgrim_id: Uuid,
        pilgrim_name: String,
        slot: SlotKey,
        party_size: u32,
        priority_category: PriorityCategory,
        token_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            pilgrim_id,
            pilgrim_name,
            temple_id: slot.temple_id,
            slot_date: slot.date,
            slot_start: slot.start,
            party_size,
            priority_category,
            status: BookingStatus::Pending,
            ticket_number: None,
            token_id: Some(token_id),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn slot_key(&self) -> SlotKey {
        SlotKey::new(self.temple_id, self.slot_date, self.slot_start)
    }

    /// Reconstruct the ledger token this booking holds, if any.
    pub fn reservation_token(&self) -> Option<ReservationToken> {
        self.token_id.map(|id| ReservationToken {
            id,
            slot: self.slot_key(),
            party_size: self.party_size,
        })
    }

    fn transition(&mut self, to: BookingStatus) -> Result<(), BookingError> {
        if !self.status.can_transition(to) {
            return Err(BookingError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Transition: PENDING -> CONFIRMED, stamping the ticket.
    pub fn confirm(&mut self, ticket_number: String) -> Result<(), BookingError> {
        self.transition(BookingStatus::Confirmed)?;
        self.ticket_number = Some(ticket_number);
        Ok(())
    }

    /// Transition: PENDING|CONFIRMED -> CANCELLED.
    pub fn cancel(&mut self) -> Result<(), BookingError> {
        self.transition(BookingStatus::Cancelled)
    }

    /// Transition: CONFIRMED -> CHECKED_IN (gate scan).
    pub fn check_in(&mut self) -> Result<(), BookingError> {
        self.transition(BookingStatus::CheckedIn)
    }

    /// Transition: CHECKED_IN -> COMPLETED.
    pub fn complete(&mut self) -> Result<(), BookingError> {
        self.transition(BookingStatus::Completed)
    }

    /// Transition: CONFIRMED -> NO_SHOW (slot window passed unused).
    pub fn no_show(&mut self) -> Result<(), BookingError> {
        self.transition(BookingStatus::NoShow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn booking() -> Booking {
        Booking::pending(
            Uuid::new_v4(),
            "Asha Sharma".to_string(),
            SlotKey::new(
                Uuid::new_v4(),
                NaiveDate::from_ymd_opt(2026, 8, 10).unwrap(),
                NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            ),
            2,
            PriorityCategory::None,
            Uuid::new_v4(),
        )
    }

    #[test]
    fn full_lifecycle() {
        let mut b = booking();
        assert_eq!(b.status, BookingStatus::Pending);

        b.confirm("TKT-20260810-A1B2C3".to_string()).unwrap();
        assert_eq!(b.status, BookingStatus::Confirmed);
        assert!(b.ticket_number.is_some());

        b.check_in().unwrap();
        b.complete().unwrap();
        assert_eq!(b.status, BookingStatus::Completed);
        assert!(b.status.is_terminal());
    }

    #[test]
    fn cancel_is_valid_from_pending_and_confirmed_only() {
        let mut b = booking();
        b.cancel().unwrap();
        assert_eq!(b.status, BookingStatus::Cancelled);

        let mut b = booking();
        b.confirm("TKT-20260810-XYZ123".to_string()).unwrap();
        b.cancel().unwrap();

        let mut b = booking();
        b.confirm("TKT-20260810-XYZ124".to_string()).unwrap();
        b.check_in().unwrap();
        assert!(b.cancel().is_err());
    }

    #[test]
    fn cannot_skip_confirmation() {
        let mut b = booking();
        let err = b.check_in().unwrap_err();
        assert!(matches!(err, BookingError::InvalidTransition { .. }));
    }

    #[test]
    fn no_show_requires_confirmed() {
        let mut b = booking();
        assert!(b.no_show().is_err());
        b.confirm("TKT-20260810-QWE456".to_string()).unwrap();
        b.no_show().unwrap();
        assert!(b.status.is_terminal());
    }

    #[test]
    fn token_round_trips_through_the_booking_row() {
        let b = booking();
        let token = b.reservation_token().unwrap();
        assert_eq!(token.slot, b.slot_key());
        assert_eq!(token.party_size, 2);
    }
}
