use axum::{extract::State, routing::get, Router};
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

use crate::state::AppState;

pub struct Metrics {
    registry: Registry,
    pub bookings_confirmed: IntCounter,
    pub bookings_slot_full: IntCounter,
    pub bookings_cancelled: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let bookings_confirmed = IntCounter::new(
            "darshan_bookings_confirmed_total",
            "Bookings that reached CONFIRMED",
        )
        .expect("metric definition");
        let bookings_slot_full = IntCounter::new(
            "darshan_bookings_slot_full_total",
            "Booking attempts rejected because the slot was full",
        )
        .expect("metric definition");
        let bookings_cancelled = IntCounter::new(
            "darshan_bookings_cancelled_total",
            "Bookings cancelled by pilgrims",
        )
        .expect("metric definition");

        registry
            .register(Box::new(bookings_confirmed.clone()))
            .expect("metric registration");
        registry
            .register(Box::new(bookings_slot_full.clone()))
            .expect("metric registration");
        registry
            .register(Box::new(bookings_cancelled.clone()))
            .expect("metric registration");

        Self {
            registry,
            bookings_confirmed,
            bookings_slot_full,
            bookings_cancelled,
        }
    }

    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/metrics", get(render_metrics))
}

async fn render_metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_the_rendered_text() {
        let metrics = Metrics::new();
        metrics.bookings_confirmed.inc();
        metrics.bookings_slot_full.inc();
        metrics.bookings_slot_full.inc();

        let rendered = metrics.render();
        assert!(rendered.contains("darshan_bookings_confirmed_total 1"));
        assert!(rendered.contains("darshan_bookings_slot_full_total 2"));
    }
}
