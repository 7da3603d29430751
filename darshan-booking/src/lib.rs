pub mod models;
pub mod orchestrator;
pub mod repository;
pub mod sweep;
pub mod ticket;

pub use models::{Booking, BookingStatus};
pub use orchestrator::{
    BookingConfirmation, BookingError, BookingOrchestrator, BookingRequest, CancelOutcome,
    OrchestratorRules,
};
pub use repository::{BookingRepository, MemoryBookingStore};
pub use sweep::ReconciliationSweep;
