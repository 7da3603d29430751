use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres, Row};
use std::time::Duration;
use tracing::info;
use serde_json::Value;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Overlay configured business rule defaults with rows from the
    /// `business_rules` table, so operators can tune timeouts and limits
    /// without a redeploy.
    pub async fn fetch_business_rules(
        &self,
        defaults: crate::app_config::BusinessRules,
    ) -> Result<crate::app_config::BusinessRules, sqlx::Error> {
        let rows = sqlx::query("SELECT rule_key, rule_value FROM business_rules")
            .fetch_all(&self.pool)
            .await?;

        let mut rules = defaults;

        for row in rows {
            let rule_key: String = row.get("rule_key");
            let val: Value = row.get("rule_value");

            // Expected format: {"value": <number>}
            if let Some(v) = val.get("value") {
                match rule_key.as_str() {
                    "booking_horizon_days" => {
                        if let Some(u) = Value::as_u64(v) {
                            rules.booking_horizon_days = u as u32;
                        }
                    }
                    "max_party_size" => {
                        if let Some(u) = Value::as_u64(v) {
                            rules.max_party_size = u as u32;
                        }
                    }
                    "pending_timeout_seconds" => {
                        if let Some(u) = Value::as_u64(v) {
                            rules.pending_timeout_seconds = u;
                        }
                    }
                    "sweep_interval_seconds" => {
                        if let Some(u) = Value::as_u64(v) {
                            rules.sweep_interval_seconds = u;
                        }
                    }
                    "persist_retry_attempts" => {
                        if let Some(u) = Value::as_u64(v) {
                            rules.persist_retry_attempts = u as u32;
                        }
                    }
                    "persist_retry_backoff_ms" => {
                        if let Some(u) = Value::as_u64(v) {
                            rules.persist_retry_backoff_ms = u;
                        }
                    }
                    "slot_cache_seconds" => {
                        if let Some(u) = Value::as_u64(v) {
                            rules.slot_cache_seconds = u;
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(rules)
    }
}
