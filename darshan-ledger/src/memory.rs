use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use darshan_shared::SlotKey;
use uuid::Uuid;

use crate::{LedgerError, ReservationLedger, ReservationToken, SlotOccupancy};

struct SlotEntry {
    reserved: u32,
    capacity: u32,
    // Outstanding token id -> party size. Removal on release makes tokens
    // single-use.
    tokens: HashMap<Uuid, u32>,
}

/// In-memory reservation ledger.
///
/// The outer map lock is held only to locate or create an entry; all
/// occupancy arithmetic happens under the entry's own lock, so contention
/// stays within a single SlotKey and reservations for different slots never
/// block each other.
pub struct MemoryLedger {
    slots: Mutex<HashMap<SlotKey, Arc<Mutex<SlotEntry>>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, slot: SlotKey, capacity: u32) -> Arc<Mutex<SlotEntry>> {
        let mut slots = self.slots.lock().expect("ledger map lock poisoned");
        slots
            .entry(slot)
            .or_insert_with(|| {
                Arc::new(Mutex::new(SlotEntry {
                    reserved: 0,
                    capacity,
                    tokens: HashMap::new(),
                }))
            })
            .clone()
    }

    fn existing_entry(&self, slot: &SlotKey) -> Option<Arc<Mutex<SlotEntry>>> {
        let slots = self.slots.lock().expect("ledger map lock poisoned");
        slots.get(slot).cloned()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReservationLedger for MemoryLedger {
    async fn reserve(
        &self,
        slot: SlotKey,
        party_size: u32,
        capacity: u32,
    ) -> Result<ReservationToken, LedgerError> {
        let entry = self.entry(slot, capacity);
        let mut entry = entry.lock().expect("slot entry lock poisoned");

        let available = entry.capacity.saturating_sub(entry.reserved);
        if party_size > available {
            return Err(LedgerError::CapacityExceeded {
                requested: party_size,
                available,
            });
        }

        let token = ReservationToken {
            id: Uuid::new_v4(),
            slot,
            party_size,
        };
        entry.reserved += party_size;
        entry.tokens.insert(token.id, party_size);

        Ok(token)
    }

    async fn release(&self, token: &ReservationToken) -> Result<(), LedgerError> {
        let entry = self
            .existing_entry(&token.slot)
            .ok_or(LedgerError::InvalidToken)?;
        let mut entry = entry.lock().expect("slot entry lock poisoned");

        let party_size = entry
            .tokens
            .remove(&token.id)
            .ok_or(LedgerError::InvalidToken)?;
        entry.reserved = entry.reserved.saturating_sub(party_size);

        Ok(())
    }

    async fn occupancy(&self, slot: SlotKey) -> Result<Option<SlotOccupancy>, LedgerError> {
        Ok(self.existing_entry(&slot).map(|entry| {
            let entry = entry.lock().expect("slot entry lock poisoned");
            SlotOccupancy {
                reserved_count: entry.reserved,
                capacity: entry.capacity,
            }
        }))
    }

    async fn apply_capacity(
        &self,
        temple_id: Uuid,
        from_date: NaiveDate,
        capacity: u32,
    ) -> Result<(), LedgerError> {
        // Hold the map lock for the whole pass so no new entries appear, and
        // lock every affected entry before mutating any: the change is
        // all-or-nothing.
        let slots = self.slots.lock().expect("ledger map lock poisoned");
        let affected: Vec<Arc<Mutex<SlotEntry>>> = slots
            .iter()
            .filter(|(key, _)| key.temple_id == temple_id && key.date >= from_date)
            .map(|(_, entry)| entry.clone())
            .collect();

        let mut guards: Vec<_> = affected
            .iter()
            .map(|entry| entry.lock().expect("slot entry lock poisoned"))
            .collect();

        if let Some(max_reserved) = guards.iter().map(|g| g.reserved).max() {
            if max_reserved > capacity {
                return Err(LedgerError::CapacityBelowReserved {
                    requested: capacity,
                    reserved: max_reserved,
                });
            }
        }

        for guard in guards.iter_mut() {
            guard.capacity = capacity;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn slot() -> SlotKey {
        SlotKey::new(
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2026, 8, 10).unwrap(),
            NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn reserve_and_release_round_trip() {
        let ledger = MemoryLedger::new();
        let key = slot();

        let token = ledger.reserve(key, 3, 10).await.unwrap();
        let occ = ledger.occupancy(key).await.unwrap().unwrap();
        assert_eq!(occ.reserved_count, 3);
        assert_eq!(occ.capacity, 10);

        ledger.release(&token).await.unwrap();
        let occ = ledger.occupancy(key).await.unwrap().unwrap();
        assert_eq!(occ.reserved_count, 0);
    }

    #[tokio::test]
    async fn reserve_fails_without_partial_effect_when_full() {
        let ledger = MemoryLedger::new();
        let key = slot();

        ledger.reserve(key, 2, 2).await.unwrap();
        let err = ledger.reserve(key, 1, 2).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::CapacityExceeded {
                requested: 1,
                available: 0
            }
        ));

        let occ = ledger.occupancy(key).await.unwrap().unwrap();
        assert_eq!(occ.reserved_count, 2);
    }

    #[tokio::test]
    async fn party_larger_than_remaining_capacity_is_rejected() {
        let ledger = MemoryLedger::new();
        let key = slot();

        ledger.reserve(key, 3, 5).await.unwrap();
        let err = ledger.reserve(key, 4, 5).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::CapacityExceeded {
                requested: 4,
                available: 2
            }
        ));
    }

    #[tokio::test]
    async fn double_release_is_invalid_and_credits_once() {
        let ledger = MemoryLedger::new();
        let key = slot();

        let token = ledger.reserve(key, 2, 5).await.unwrap();
        ledger.reserve(key, 1, 5).await.unwrap();

        ledger.release(&token).await.unwrap();
        let err = ledger.release(&token).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidToken));

        let occ = ledger.occupancy(key).await.unwrap().unwrap();
        assert_eq!(occ.reserved_count, 1);
    }

    #[tokio::test]
    async fn unknown_slot_has_no_occupancy() {
        let ledger = MemoryLedger::new();
        assert!(ledger.occupancy(slot()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn first_touch_seeds_capacity_and_later_calls_keep_it() {
        let ledger = MemoryLedger::new();
        let key = slot();

        ledger.reserve(key, 1, 10).await.unwrap();
        // A later caller passing stale catalog capacity does not resize the
        // materialized entry.
        ledger.reserve(key, 1, 99).await.unwrap();
        let occ = ledger.occupancy(key).await.unwrap().unwrap();
        assert_eq!(occ.capacity, 10);
    }

    #[tokio::test]
    async fn no_lost_updates_under_concurrency() {
        let ledger = Arc::new(MemoryLedger::new());
        let key = slot();
        let capacity = 5u32;
        let attempts = 40usize;

        let mut handles = Vec::new();
        for _ in 0..attempts {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.reserve(key, 1, capacity).await
            }));
        }

        let mut successes = 0;
        let mut failures = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(LedgerError::CapacityExceeded { .. }) => failures += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(successes, capacity as usize);
        assert_eq!(failures, attempts - capacity as usize);

        let occ = ledger.occupancy(key).await.unwrap().unwrap();
        assert_eq!(occ.reserved_count, capacity);
    }

    #[tokio::test]
    async fn concurrent_party_of_two_on_capacity_two_admits_exactly_one() {
        let ledger = Arc::new(MemoryLedger::new());
        let key = slot();

        let a = {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.reserve(key, 2, 2).await })
        };
        let b = {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.reserve(key, 2, 2).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let ok = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(ok, 1);

        let occ = ledger.occupancy(key).await.unwrap().unwrap();
        assert_eq!(occ.reserved_count, 2);
    }

    #[tokio::test]
    async fn capacity_invariant_holds_under_mixed_traffic() {
        let ledger = Arc::new(MemoryLedger::new());
        let key = slot();
        let capacity = 8u32;

        let mut handles = Vec::new();
        for i in 0..60usize {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                match ledger.reserve(key, 1 + (i % 3) as u32, capacity).await {
                    Ok(token) if i % 2 == 0 => {
                        ledger.release(&token).await.unwrap();
                    }
                    _ => {}
                }
                let occ = ledger.occupancy(key).await.unwrap().unwrap();
                assert!(occ.reserved_count <= occ.capacity);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn apply_capacity_is_prospective_and_all_or_nothing() {
        let ledger = MemoryLedger::new();
        let temple_id = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();
        let morning = SlotKey::new(temple_id, date, NaiveTime::from_hms_opt(6, 0, 0).unwrap());
        let evening = SlotKey::new(temple_id, date, NaiveTime::from_hms_opt(18, 0, 0).unwrap());

        ledger.reserve(morning, 4, 10).await.unwrap();
        ledger.reserve(evening, 1, 10).await.unwrap();

        // 4 seats already reserved in the morning slot: shrinking below that
        // is rejected, and the evening slot keeps its old capacity too.
        let err = ledger.apply_capacity(temple_id, date, 3).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::CapacityBelowReserved {
                requested: 3,
                reserved: 4
            }
        ));
        assert_eq!(ledger.occupancy(evening).await.unwrap().unwrap().capacity, 10);

        ledger.apply_capacity(temple_id, date, 5).await.unwrap();
        assert_eq!(ledger.occupancy(morning).await.unwrap().unwrap().capacity, 5);
        assert_eq!(ledger.occupancy(evening).await.unwrap().unwrap().capacity, 5);
    }

    #[tokio::test]
    async fn apply_capacity_ignores_other_temples_and_past_dates() {
        let ledger = MemoryLedger::new();
        let temple_id = Uuid::new_v4();
        let other_temple = Uuid::new_v4();
        let past = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let future = NaiveDate::from_ymd_opt(2026, 8, 20).unwrap();
        let start = NaiveTime::from_hms_opt(6, 0, 0).unwrap();

        let past_key = SlotKey::new(temple_id, past, start);
        let other_key = SlotKey::new(other_temple, future, start);

        ledger.reserve(past_key, 9, 10).await.unwrap();
        ledger.reserve(other_key, 9, 10).await.unwrap();

        // Neither row is in scope, so even a tiny capacity succeeds.
        ledger
            .apply_capacity(temple_id, NaiveDate::from_ymd_opt(2026, 8, 10).unwrap(), 1)
            .await
            .unwrap();
        assert_eq!(ledger.occupancy(past_key).await.unwrap().unwrap().capacity, 10);
        assert_eq!(ledger.occupancy(other_key).await.unwrap().unwrap().capacity, 10);
    }
}
