use std::net::SocketAddr;
use std::sync::Arc;

use darshan_api::{app, state::{AppState, AuthConfig}};
use darshan_api::metrics::Metrics;
use darshan_api::middleware::resiliency::ResiliencyState;
use darshan_booking::{BookingOrchestrator, OrchestratorRules, ReconciliationSweep};
use darshan_store::{
    DbClient, EventProducer, PgBookingRepository, PgLedger, PgPilgrimRepository,
    PgTempleRepository, RedisClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "darshan_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = darshan_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Darshan API on port {}", config.server.port);

    // Postgres Connection
    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");
    let db = Arc::new(db);

    // Business rules: configured defaults overlaid with operator overrides.
    let business_rules = match db.fetch_business_rules(config.business_rules.clone()).await {
        Ok(rules) => rules,
        Err(e) => {
            tracing::warn!("Could not load business rule overrides, using defaults: {}", e);
            config.business_rules.clone()
        }
    };

    // Redis Connection
    let redis = Arc::new(
        RedisClient::new(&config.redis.url)
            .await
            .expect("Failed to connect to Redis"),
    );

    // Kafka Connection
    let kafka = Arc::new(EventProducer::new(&config.kafka.brokers).expect("Failed to create Kafka producer"));

    // Repositories and the ledger, all Postgres-backed.
    let temples = Arc::new(PgTempleRepository::new(db.pool.clone()));
    let pilgrims = Arc::new(PgPilgrimRepository::new(db.pool.clone()));
    let bookings = Arc::new(PgBookingRepository::new(db.pool.clone()));
    let ledger = Arc::new(PgLedger::new(db.pool.clone()));

    let orchestrator = Arc::new(BookingOrchestrator::new(
        temples.clone(),
        pilgrims.clone(),
        bookings.clone(),
        ledger.clone(),
        kafka.clone(),
        OrchestratorRules {
            booking_horizon_days: business_rules.booking_horizon_days,
            max_party_size: business_rules.max_party_size,
            persist_retry_attempts: business_rules.persist_retry_attempts,
            persist_retry_backoff_ms: business_rules.persist_retry_backoff_ms,
        },
    ));

    // Reconciliation sweep: reclaims stale PENDING holds forever.
    let sweep = ReconciliationSweep::new(
        bookings.clone(),
        ledger.clone(),
        business_rules.pending_timeout_seconds,
    );
    tokio::spawn(sweep.run(business_rules.sweep_interval_seconds));

    // Notification dispatcher.
    tokio::spawn(darshan_api::worker::start_notification_worker(
        config.kafka.brokers.clone(),
        "darshan-notifications".to_string(),
    ));

    // SSE Broadcast Channel
    let (sse_tx, _) = tokio::sync::broadcast::channel(100);

    let app_state = AppState {
        db,
        redis,
        temples,
        pilgrims,
        bookings,
        ledger,
        orchestrator,
        sse_tx,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        business_rules,
        resiliency: Arc::new(ResiliencyState::new()),
        metrics: Arc::new(Metrics::new()),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
