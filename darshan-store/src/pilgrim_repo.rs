use async_trait::async_trait;
use chrono::{DateTime, Utc};
use darshan_core::repository::PilgrimRepository;
use darshan_shared::models::IdType;
use darshan_shared::{Masked, Pilgrim, PriorityCategory};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgPilgrimRepository {
    pool: PgPool,
}

impl PgPilgrimRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
struct PilgrimRow {
    id: Uuid,
    full_name: String,
    phone: String,
    email: Option<String>,
    id_type: String,
    id_number: String,
    age: Option<i32>,
    gender: Option<String>,
    priority_category: String,
    emergency_contact_name: Option<String>,
    emergency_contact_phone: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PilgrimRow> for Pilgrim {
    type Error = Box<dyn std::error::Error + Send + Sync>;

    fn try_from(row: PilgrimRow) -> Result<Self, Self::Error> {
        Ok(Pilgrim {
            id: row.id,
            full_name: row.full_name,
            phone: Masked(row.phone),
            email: row.email,
            id_type: IdType::parse(&row.id_type)
                .ok_or_else(|| format!("unknown id_type: {}", row.id_type))?,
            id_number: Masked(row.id_number),
            age: row.age,
            gender: row.gender,
            priority_category: PriorityCategory::parse(&row.priority_category)
                .ok_or_else(|| format!("unknown priority_category: {}", row.priority_category))?,
            emergency_contact_name: row.emergency_contact_name,
            emergency_contact_phone: row.emergency_contact_phone.map(Masked),
            created_at: row.created_at,
        })
    }
}

const PILGRIM_COLUMNS: &str = "id, full_name, phone, email, id_type, id_number, age, gender, \
     priority_category, emergency_contact_name, emergency_contact_phone, created_at";

#[async_trait]
impl PilgrimRepository for PgPilgrimRepository {
    async fn create_pilgrim(
        &self,
        pilgrim: &Pilgrim,
    ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            r#"
            INSERT INTO pilgrims (id, full_name, phone, email, id_type, id_number, age, gender, priority_category, emergency_contact_name, emergency_contact_phone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(pilgrim.id)
        .bind(&pilgrim.full_name)
        .bind(pilgrim.phone.inner())
        .bind(&pilgrim.email)
        .bind(pilgrim.id_type.as_str())
        .bind(pilgrim.id_number.inner())
        .bind(pilgrim.age)
        .bind(&pilgrim.gender)
        .bind(pilgrim.priority_category.as_str())
        .bind(&pilgrim.emergency_contact_name)
        .bind(pilgrim.emergency_contact_phone.as_ref().map(|p| p.inner().clone()))
        .execute(&self.pool)
        .await?;

        Ok(pilgrim.id)
    }

    async fn get_pilgrim(
        &self,
        id: Uuid,
    ) -> Result<Option<Pilgrim>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query_as::<_, PilgrimRow>(&format!(
            "SELECT {PILGRIM_COLUMNS} FROM pilgrims WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Pilgrim::try_from).transpose()
    }

    async fn list_pilgrims(
        &self,
    ) -> Result<Vec<Pilgrim>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = sqlx::query_as::<_, PilgrimRow>(&format!(
            "SELECT {PILGRIM_COLUMNS} FROM pilgrims ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Pilgrim::try_from).collect()
    }

    async fn update_pilgrim(
        &self,
        id: Uuid,
        pilgrim: &Pilgrim,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            r#"
            UPDATE pilgrims
            SET full_name = $1, phone = $2, email = $3, id_type = $4, id_number = $5,
                age = $6, gender = $7, priority_category = $8,
                emergency_contact_name = $9, emergency_contact_phone = $10
            WHERE id = $11
            "#,
        )
        .bind(&pilgrim.full_name)
        .bind(pilgrim.phone.inner())
        .bind(&pilgrim.email)
        .bind(pilgrim.id_type.as_str())
        .bind(pilgrim.id_number.inner())
        .bind(pilgrim.age)
        .bind(&pilgrim.gender)
        .bind(pilgrim.priority_category.as_str())
        .bind(&pilgrim.emergency_contact_name)
        .bind(pilgrim.emergency_contact_phone.as_ref().map(|p| p.inner().clone()))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_pilgrim(
        &self,
        id: Uuid,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query("DELETE FROM pilgrims WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
