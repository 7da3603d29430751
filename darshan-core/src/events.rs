use async_trait::async_trait;

/// Seam between the booking flow and the message bus. The Kafka-backed
/// implementation lives in darshan-store; tests substitute a recorder.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
