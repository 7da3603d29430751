use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use darshan_catalog::{Temple, TempleRepository};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgTempleRepository {
    pool: PgPool,
}

impl PgTempleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
struct TempleRow {
    id: Uuid,
    name: String,
    city: String,
    state: String,
    opening_time: NaiveTime,
    closing_time: NaiveTime,
    slot_duration_minutes: i32,
    slot_capacity: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TempleRow> for Temple {
    fn from(row: TempleRow) -> Self {
        Temple {
            id: row.id,
            name: row.name,
            city: row.city,
            state: row.state,
            opening_time: row.opening_time,
            closing_time: row.closing_time,
            slot_duration_minutes: row.slot_duration_minutes.max(0) as u32,
            slot_capacity: row.slot_capacity.max(0) as u32,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const TEMPLE_COLUMNS: &str = "id, name, city, state, opening_time, closing_time, \
     slot_duration_minutes, slot_capacity, is_active, created_at, updated_at";

#[async_trait]
impl TempleRepository for PgTempleRepository {
    async fn create_temple(
        &self,
        temple: &Temple,
    ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            r#"
            INSERT INTO temples (id, name, city, state, opening_time, closing_time, slot_duration_minutes, slot_capacity, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(temple.id)
        .bind(&temple.name)
        .bind(&temple.city)
        .bind(&temple.state)
        .bind(temple.opening_time)
        .bind(temple.closing_time)
        .bind(temple.slot_duration_minutes as i32)
        .bind(temple.slot_capacity as i32)
        .bind(temple.is_active)
        .execute(&self.pool)
        .await?;

        Ok(temple.id)
    }

    async fn get_temple(
        &self,
        id: Uuid,
    ) -> Result<Option<Temple>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query_as::<_, TempleRow>(&format!(
            "SELECT {TEMPLE_COLUMNS} FROM temples WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Temple::from))
    }

    async fn list_temples(
        &self,
    ) -> Result<Vec<Temple>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = sqlx::query_as::<_, TempleRow>(&format!(
            "SELECT {TEMPLE_COLUMNS} FROM temples ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Temple::from).collect())
    }

    async fn update_temple(
        &self,
        id: Uuid,
        temple: &Temple,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            r#"
            UPDATE temples
            SET name = $1, city = $2, state = $3, opening_time = $4, closing_time = $5,
                slot_duration_minutes = $6, slot_capacity = $7, is_active = $8, updated_at = NOW()
            WHERE id = $9
            "#,
        )
        .bind(&temple.name)
        .bind(&temple.city)
        .bind(&temple.state)
        .bind(temple.opening_time)
        .bind(temple.closing_time)
        .bind(temple.slot_duration_minutes as i32)
        .bind(temple.slot_capacity as i32)
        .bind(temple.is_active)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
