use std::sync::Arc;

use chrono::Utc;
use darshan_ledger::{LedgerError, ReservationLedger};
use tracing::{debug, error, info, warn};

use crate::models::BookingStatus;
use crate::repository::BookingRepository;

/// Periodic reconciliation pass that reclaims capacity from PENDING
/// bookings that never reached a terminal state within the timeout
/// ("phantom holds" left behind by crashed or abandoned requests).
///
/// Idempotent and safe next to live traffic: the status compare-and-set
/// decides ownership of each row, so a request confirming concurrently
/// simply wins and the sweep moves on.
pub struct ReconciliationSweep {
    bookings: Arc<dyn BookingRepository>,
    ledger: Arc<dyn ReservationLedger>,
    pending_timeout: chrono::Duration,
}

impl ReconciliationSweep {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        ledger: Arc<dyn ReservationLedger>,
        pending_timeout_seconds: u64,
    ) -> Self {
        Self {
            bookings,
            ledger,
            pending_timeout: chrono::Duration::seconds(pending_timeout_seconds as i64),
        }
    }

    /// One pass. Returns the number of stale holds reclaimed.
    pub async fn run_once(&self) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        let cutoff = Utc::now() - self.pending_timeout;
        let stale = self.bookings.stale_pending(cutoff).await?;
        let mut reclaimed = 0;

        for booking in stale {
            // Claim the row first: once it is CANCELLED no other path will
            // touch its token, and a concurrent confirmation makes the CAS
            // return false.
            match self
                .bookings
                .transition(
                    booking.id,
                    BookingStatus::Pending,
                    BookingStatus::Cancelled,
                    None,
                )
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    debug!("Booking {} moved on before the sweep", booking.id);
                    continue;
                }
                Err(e) => {
                    warn!("Sweep could not transition booking {}: {}", booking.id, e);
                    continue;
                }
            }

            if let Some(token) = booking.reservation_token() {
                match self.ledger.release(&token).await {
                    Ok(()) => {}
                    Err(LedgerError::InvalidToken) => {
                        debug!("Token {} was already released", token.id);
                    }
                    Err(e) => {
                        error!(
                            "Sweep failed to release token {} for booking {}: {}",
                            token.id, booking.id, e
                        );
                    }
                }
            }

            info!(
                "Sweep cancelled stale pending booking {} (slot {})",
                booking.id,
                booking.slot_key()
            );
            reclaimed += 1;
        }

        Ok(reclaimed)
    }

    /// Run forever on a fixed interval. A failed pass is logged and retried
    /// on the next tick.
    pub async fn run(self, interval_seconds: u64) {
        let mut ticker = tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));
        info!(
            "Reconciliation sweep started (every {}s, timeout {}s)",
            interval_seconds,
            self.pending_timeout.num_seconds()
        );
        loop {
            ticker.tick().await;
            match self.run_once().await {
                Ok(0) => {}
                Ok(n) => info!("Reconciliation sweep reclaimed {} stale holds", n),
                Err(e) => error!("Reconciliation sweep pass failed: {}", e),
            }
        }
    }
}
