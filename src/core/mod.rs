//! Core data models and traits

mod provider;
mod usage_snapshot;

pub use provider::*;
pub use usage_snapshot::*;
