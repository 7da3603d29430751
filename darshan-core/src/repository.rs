use async_trait::async_trait;
use darshan_shared::Pilgrim;
use uuid::Uuid;

/// Repository trait for pilgrim registry access
#[async_trait]
pub trait PilgrimRepository: Send + Sync {
    async fn create_pilgrim(
        &self,
        pilgrim: &Pilgrim,
    ) -> Result<Uuid, Box<dyn std::error::Error + Send + Sync>>;

    async fn get_pilgrim(
        &self,
        id: Uuid,
    ) -> Result<Option<Pilgrim>, Box<dyn std::error::Error + Send + Sync>>;

    async fn list_pilgrims(
        &self,
    ) -> Result<Vec<Pilgrim>, Box<dyn std::error::Error + Send + Sync>>;

    async fn update_pilgrim(
        &self,
        id: Uuid,
        pilgrim: &Pilgrim,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn delete_pilgrim(
        &self,
        id: Uuid,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
