use chrono::NaiveDate;
use redis::{AsyncCommands, RedisResult};
use uuid::Uuid;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Cached day-availability snapshot for the public slots listing. This
    /// is the eventually-consistent read path; the slot_ledger row stays
    /// authoritative.
    pub async fn get_day_availability(
        &self,
        temple_id: &Uuid,
        date: NaiveDate,
    ) -> RedisResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("avail:{}:{}", temple_id, date);
        conn.get(key).await
    }

    pub async fn set_day_availability(
        &self,
        temple_id: &Uuid,
        date: NaiveDate,
        payload: &str,
        ttl_seconds: u64,
    ) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("avail:{}:{}", temple_id, date);
        conn.set_ex(key, payload, ttl_seconds).await
    }

    /// Drop the snapshot after a booking or cancellation so the next read
    /// re-seeds from the ledger.
    pub async fn invalidate_day_availability(
        &self,
        temple_id: &Uuid,
        date: NaiveDate,
    ) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("avail:{}:{}", temple_id, date);
        conn.del(key).await
    }

    pub async fn check_rate_limit(
        &self,
        key: &str,
        limit: i64,
        window_seconds: i64,
    ) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}
