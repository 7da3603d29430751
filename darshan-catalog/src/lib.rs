pub mod schedule;
pub mod temple;

pub use schedule::{daily_slots, CatalogError, SlotDescriptor};
pub use temple::{Temple, TempleRepository};
