pub mod events;
pub mod models;
pub mod pii;

pub use models::{Pilgrim, PriorityCategory, SlotKey};
pub use pii::Masked;
