//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod history;
pub mod images;
pub mod preferences;
pub mod snapshot;
pub mod telemetry;
