//! PeerHive Core
//!
//! Types shared by the zone classifier and the HTTP service.
//!
//! This crate provides:
//! - The fixed [`Zone`] enumeration and its class-index mapping
//! - [`Prediction`] and [`ZoneProbabilities`], the wire shape of a prediction
//! - Error types and result handling

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Prediction, Zone, ZoneProbabilities};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{Prediction, Zone, ZoneProbabilities};
}
