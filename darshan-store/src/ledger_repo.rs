use async_trait::async_trait;
use chrono::NaiveDate;
use darshan_ledger::{LedgerError, ReservationLedger, ReservationToken, SlotOccupancy};
use darshan_shared::SlotKey;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

/// Postgres-backed reservation ledger: one `slot_ledger` row per SlotKey,
/// one `reservation_tokens` row per outstanding reservation.
///
/// The guarded UPDATE takes the row lock for exactly one SlotKey, so
/// concurrent reservations on the same slot serialize on that row and
/// reservations on different slots never contend — the per-slot discipline
/// the in-memory ledger implements with per-entry mutexes.
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage_err(e: sqlx::Error) -> LedgerError {
    LedgerError::Storage(e.to_string())
}

#[async_trait]
impl ReservationLedger for PgLedger {
    async fn reserve(
        &self,
        slot: SlotKey,
        party_size: u32,
        capacity: u32,
    ) -> Result<ReservationToken, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        // Materialize the ledger row on first touch, seeded from the catalog
        // capacity. Concurrent first touches collapse into DO NOTHING.
        sqlx::query(
            r#"
            INSERT INTO slot_ledger (temple_id, slot_date, slot_start, capacity, reserved_count)
            VALUES ($1, $2, $3, $4, 0)
            ON CONFLICT (temple_id, slot_date, slot_start) DO NOTHING
            "#,
        )
        .bind(slot.temple_id)
        .bind(slot.date)
        .bind(slot.start)
        .bind(capacity as i32)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        // The atomic check-and-increment. No row back means the guard failed:
        // the remaining seats cannot take this party.
        let updated = sqlx::query(
            r#"
            UPDATE slot_ledger
            SET reserved_count = reserved_count + $4, updated_at = NOW()
            WHERE temple_id = $1 AND slot_date = $2 AND slot_start = $3
              AND reserved_count + $4 <= capacity
            RETURNING reserved_count, capacity
            "#,
        )
        .bind(slot.temple_id)
        .bind(slot.date)
        .bind(slot.start)
        .bind(party_size as i32)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_err)?;

        let Some(_row) = updated else {
            let occupancy = sqlx::query(
                r#"
                SELECT reserved_count, capacity FROM slot_ledger
                WHERE temple_id = $1 AND slot_date = $2 AND slot_start = $3
                "#,
            )
            .bind(slot.temple_id)
            .bind(slot.date)
            .bind(slot.start)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_err)?;

            let reserved: i32 = occupancy.get("reserved_count");
            let cap: i32 = occupancy.get("capacity");
            return Err(LedgerError::CapacityExceeded {
                requested: party_size,
                available: (cap - reserved).max(0) as u32,
            });
        };

        let token = ReservationToken {
            id: Uuid::new_v4(),
            slot,
            party_size,
        };

        sqlx::query(
            r#"
            INSERT INTO reservation_tokens (id, temple_id, slot_date, slot_start, party_size)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(token.id)
        .bind(slot.temple_id)
        .bind(slot.date)
        .bind(slot.start)
        .bind(party_size as i32)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;

        debug!("Reserved {} seats on {}", party_size, slot);
        Ok(token)
    }

    async fn release(&self, token: &ReservationToken) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        // Deleting the token row is what makes release single-use: the
        // second caller finds nothing and gets InvalidToken, never a second
        // credit.
        let deleted = sqlx::query(
            r#"
            DELETE FROM reservation_tokens WHERE id = $1
            RETURNING temple_id, slot_date, slot_start, party_size
            "#,
        )
        .bind(token.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_err)?;

        let Some(row) = deleted else {
            return Err(LedgerError::InvalidToken);
        };

        let temple_id: Uuid = row.get("temple_id");
        let slot_date: NaiveDate = row.get("slot_date");
        let slot_start: chrono::NaiveTime = row.get("slot_start");
        let party_size: i32 = row.get("party_size");

        sqlx::query(
            r#"
            UPDATE slot_ledger
            SET reserved_count = reserved_count - $4, updated_at = NOW()
            WHERE temple_id = $1 AND slot_date = $2 AND slot_start = $3
            "#,
        )
        .bind(temple_id)
        .bind(slot_date)
        .bind(slot_start)
        .bind(party_size)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;

        debug!("Released {} seats on {}", party_size, token.slot);
        Ok(())
    }

    async fn occupancy(&self, slot: SlotKey) -> Result<Option<SlotOccupancy>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT reserved_count, capacity FROM slot_ledger
            WHERE temple_id = $1 AND slot_date = $2 AND slot_start = $3
            "#,
        )
        .bind(slot.temple_id)
        .bind(slot.date)
        .bind(slot.start)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.map(|row| {
            let reserved: i32 = row.get("reserved_count");
            let cap: i32 = row.get("capacity");
            SlotOccupancy {
                reserved_count: reserved.max(0) as u32,
                capacity: cap.max(0) as u32,
            }
        }))
    }

    async fn apply_capacity(
        &self,
        temple_id: Uuid,
        from_date: NaiveDate,
        capacity: u32,
    ) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        // Lock every affected row before deciding: the change is
        // all-or-nothing and no reservation may slip in between the check
        // and the update.
        let rows = sqlx::query(
            r#"
            SELECT reserved_count FROM slot_ledger
            WHERE temple_id = $1 AND slot_date >= $2
            FOR UPDATE
            "#,
        )
        .bind(temple_id)
        .bind(from_date)
        .fetch_all(&mut *tx)
        .await
        .map_err(storage_err)?;

        let max_reserved = rows
            .iter()
            .map(|row| row.get::<i32, _>("reserved_count"))
            .max()
            .unwrap_or(0);

        if max_reserved > capacity as i32 {
            return Err(LedgerError::CapacityBelowReserved {
                requested: capacity,
                reserved: max_reserved.max(0) as u32,
            });
        }

        sqlx::query(
            r#"
            UPDATE slot_ledger
            SET capacity = $3, updated_at = NOW()
            WHERE temple_id = $1 AND slot_date >= $2
            "#,
        )
        .bind(temple_id)
        .bind(from_date)
        .bind(capacity as i32)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }
}
