pub mod events;
pub mod repository;

pub use events::EventPublisher;
pub use repository::PilgrimRepository;
