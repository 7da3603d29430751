pub mod memory;

pub use memory::MemoryLedger;

use async_trait::async_trait;
use chrono::NaiveDate;
use darshan_shared::SlotKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque handle returned by a successful reservation. Required to release
/// that reservation, exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationToken {
    pub id: Uuid,
    pub slot: SlotKey,
    pub party_size: u32,
}

/// Read-only occupancy snapshot for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotOccupancy {
    pub reserved_count: u32,
    pub capacity: u32,
}

impl SlotOccupancy {
    pub fn available(&self) -> u32 {
        self.capacity.saturating_sub(self.reserved_count)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Slot capacity exceeded: requested {requested}, available {available}")]
    CapacityExceeded { requested: u32, available: u32 },

    #[error("Reservation token not found or already released")]
    InvalidToken,

    #[error("Capacity {requested} is below the reserved count {reserved}")]
    CapacityBelowReserved { requested: u32, reserved: u32 },

    #[error("Ledger storage error: {0}")]
    Storage(String),
}

/// The single source of truth for per-slot occupancy.
///
/// Implementations must serialize `reserve`/`release` per SlotKey: two
/// concurrent reservations that would jointly overflow capacity must not
/// both succeed, and booking different slots must never contend.
#[async_trait]
pub trait ReservationLedger: Send + Sync {
    /// Atomically check `reserved_count + party_size <= capacity` and
    /// increment. Seeds the ledger entry from the catalog `capacity` on
    /// first touch; an existing entry keeps its own capacity.
    async fn reserve(
        &self,
        slot: SlotKey,
        party_size: u32,
        capacity: u32,
    ) -> Result<ReservationToken, LedgerError>;

    /// Return a token's seats to the slot. Tokens are single-use: a second
    /// release of the same token fails with `InvalidToken` and does not
    /// double-credit capacity.
    async fn release(&self, token: &ReservationToken) -> Result<(), LedgerError>;

    /// Occupancy snapshot; `None` for slots never touched by a reservation.
    /// Linearizable with respect to reserve/release on the same slot.
    async fn occupancy(&self, slot: SlotKey) -> Result<Option<SlotOccupancy>, LedgerError>;

    /// Prospective capacity change for all materialized slots of a temple
    /// from `from_date` on. Rejected with `CapacityBelowReserved` (and no
    /// partial effect) if any such slot already holds more reserved seats
    /// than the new capacity.
    async fn apply_capacity(
        &self,
        temple_id: Uuid,
        from_date: NaiveDate,
        capacity: u32,
    ) -> Result<(), LedgerError>;
}
