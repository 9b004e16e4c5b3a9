//! PeerHive Classifier
//!
//! Maps free text to an emotional zone with a fine-tuned DistilBERT
//! sequence-classification model running on Candle.
//!
//! The model is loaded once at start-up into a [`ModelState`]. A failed load
//! does not abort the process; it leaves the state in [`ModelState::Failed`]
//! so the HTTP layer can keep answering with "model not loaded".

pub mod classifier;
pub mod distilbert;
pub mod loader;
pub mod model_config;
pub mod state;

pub use classifier::ZoneClassifier;
pub use distilbert::{logits_to_prediction, DistilBertZoneClassifier};
pub use model_config::{DeviceSpec, InferenceConfig, ModelConfig, ModelSource};
pub use state::ModelState;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::ZoneClassifier;
    pub use crate::distilbert::DistilBertZoneClassifier;
    pub use crate::model_config::{DeviceSpec, InferenceConfig, ModelConfig, ModelSource};
    pub use crate::state::ModelState;
    pub use peerhive_core::{Prediction, Zone, ZoneProbabilities};
}
