// Common types shared across the application

pub mod entity_ids;
pub mod id;

pub use entity_ids::*;
pub use id::{Id, V4, V7};
