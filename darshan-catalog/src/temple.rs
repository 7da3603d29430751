use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Temple configuration. Immutable during a booking transaction; mutated
/// only through the admin interface, and capacity changes apply
/// prospectively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Temple {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub state: String,
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
    pub slot_duration_minutes: u32,
    pub slot_capacity: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Repository trait for temple configuration access
#[async_trait]
pub trait TempleRepository: Send + Sync {
    async fn create_temple(
        &self,
        temple: &Temple,
    ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>>;

    async fn get_temple(
        &self,
        id: Uuid,
    ) -> Result<Option<Temple>, Box<dyn std::error::Error + Send + Sync>>;

    async fn list_temples(
        &self,
    ) -> Result<Vec<Temple>, Box<dyn std::error::Error + Send + Sync>>;

    async fn update_temple(
        &self,
        id: Uuid,
        temple: &Temple,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
