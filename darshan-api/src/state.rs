use std::sync::Arc;

use darshan_booking::{BookingOrchestrator, BookingRepository};
use darshan_catalog::TempleRepository;
use darshan_core::repository::PilgrimRepository;
use darshan_ledger::ReservationLedger;
use darshan_shared::events::SlotOccupancyEvent;
use darshan_store::{app_config::BusinessRules, DbClient, RedisClient};
use tokio::sync::broadcast;

use crate::metrics::Metrics;
use crate::middleware::resiliency::ResiliencyState;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbClient>,
    pub redis: Arc<RedisClient>,
    pub temples: Arc<dyn TempleRepository>,
    pub pilgrims: Arc<dyn PilgrimRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub ledger: Arc<dyn ReservationLedger>,
    pub orchestrator: Arc<BookingOrchestrator>,
    pub sse_tx: broadcast::Sender<SlotOccupancyEvent>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
    pub resiliency: Arc<ResiliencyState>,
    pub metrics: Arc<Metrics>,
}
