use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use darshan_booking::{Booking, BookingRepository, BookingStatus};
use darshan_shared::PriorityCategory;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    pilgrim_id: Uuid,
    pilgrim_name: String,
    temple_id: Uuid,
    slot_date: NaiveDate,
    slot_start: NaiveTime,
    party_size: i32,
    priority_category: String,
    status: String,
    ticket_number: Option<String>,
    token_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = Box<dyn std::error::Error + Send + Sync>;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            pilgrim_id: row.pilgrim_id,
            pilgrim_name: row.pilgrim_name,
            temple_id: row.temple_id,
            slot_date: row.slot_date,
            slot_start: row.slot_start,
            party_size: row.party_size.max(0) as u32,
            priority_category: PriorityCategory::parse(&row.priority_category)
                .ok_or_else(|| format!("unknown priority_category: {}", row.priority_category))?,
            status: BookingStatus::parse(&row.status)
                .ok_or_else(|| format!("unknown booking status: {}", row.status))?,
            ticket_number: row.ticket_number,
            token_id: row.token_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const BOOKING_COLUMNS: &str = "id, pilgrim_id, pilgrim_name, temple_id, slot_date, slot_start, \
     party_size, priority_category, status, ticket_number, token_id, created_at, updated_at";

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn create_booking(
        &self,
        booking: &Booking,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, pilgrim_id, pilgrim_name, temple_id, slot_date, slot_start, party_size, priority_category, status, ticket_number, token_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(booking.id)
        .bind(booking.pilgrim_id)
        .bind(&booking.pilgrim_name)
        .bind(booking.temple_id)
        .bind(booking.slot_date)
        .bind(booking.slot_start)
        .bind(booking.party_size as i32)
        .bind(booking.priority_category.as_str())
        .bind(booking.status.as_str())
        .bind(&booking.ticket_number)
        .bind(booking.token_id)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_booking(
        &self,
        id: Uuid,
    ) -> Result<Option<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Booking::try_from).transpose()
    }

    async fn transition(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        ticket_number: Option<&str>,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        // Compare-and-set on the status column: the WHERE clause arbitrates
        // races between the orchestrator, user cancellation and the sweep.
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $1, ticket_number = COALESCE($2, ticket_number), updated_at = NOW()
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(to.as_str())
        .bind(ticket_number)
        .bind(id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_for_pilgrim(
        &self,
        pilgrim_id: Uuid,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE pilgrim_id = $1 ORDER BY created_at DESC"
        ))
        .bind(pilgrim_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn list_all(
        &self,
        limit: i64,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn stale_pending(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = 'PENDING' AND created_at < $1"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Booking::try_from).collect()
    }
}
