pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod events;
pub mod ledger_repo;
pub mod pilgrim_repo;
pub mod redis_repo;
pub mod temple_repo;

pub use booking_repo::PgBookingRepository;
pub use database::DbClient;
pub use events::EventProducer;
pub use ledger_repo::PgLedger;
pub use pilgrim_repo::PgPilgrimRepository;
pub use redis_repo::RedisClient;
pub use temple_repo::PgTempleRepository;
