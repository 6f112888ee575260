//! Domain layer: catalog snapshots and the pure puzzle algorithms.

pub mod characters;
pub mod error;
pub mod media;
pub mod poster;
pub mod preferences;
pub mod redaction;
pub mod selection;
pub mod types;
