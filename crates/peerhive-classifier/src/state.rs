//! Start-up model state

use crate::classifier::ZoneClassifier;
use crate::distilbert::DistilBertZoneClassifier;
use crate::loader;
use crate::model_config::ModelConfig;
use peerhive_core::{Error, Result};
use std::fmt;
use std::sync::Arc;

/// Outcome of loading the model at start-up, fixed for the process lifetime
#[derive(Clone)]
pub enum ModelState {
    /// Model is ready to serve predictions
    Loaded(Arc<dyn ZoneClassifier>),

    /// Model could not be loaded; every prediction is refused
    Failed { reason: String },
}

impl ModelState {
    /// Load the configured model.
    ///
    /// Never fails: a load error is logged and recorded as [`ModelState::Failed`].
    pub async fn initialize(config: &ModelConfig) -> Self {
        tracing::info!("Loading zone model '{}' from {}", config.name, config.source);

        let load_config = config.clone();
        let loaded =
            tokio::task::spawn_blocking(move || DistilBertZoneClassifier::load(&load_config))
                .await
                .map_err(|e| Error::internal(format!("Model loading task failed: {}", e)))
                .and_then(|result| result);

        match loaded {
            Ok(classifier) => {
                tracing::info!(
                    "Model '{}' loaded successfully on {}",
                    classifier.name(),
                    loader::device_label(classifier.device())
                );
                Self::loaded(classifier)
            }
            Err(e) => {
                tracing::error!("Error loading model: {}", e);
                tracing::error!(
                    "Make sure the fine-tuned model files (config.json, weights as {}, \
                     tokenizer.json or vocab.txt) are in '{}'",
                    loader::WEIGHT_FILES.join(" or "),
                    config.source
                );
                Self::failed(e.to_string())
            }
        }
    }

    /// Wrap an already constructed classifier
    pub fn loaded(classifier: impl ZoneClassifier + 'static) -> Self {
        Self::Loaded(Arc::new(classifier))
    }

    /// Record a load failure
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// The classifier, or [`Error::ModelUnavailable`] if start-up failed
    pub fn classifier(&self) -> Result<Arc<dyn ZoneClassifier>> {
        match self {
            Self::Loaded(classifier) => Ok(Arc::clone(classifier)),
            Self::Failed { reason } => Err(Error::model_unavailable(reason.clone())),
        }
    }
}

impl fmt::Debug for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded(classifier) => f.debug_tuple("Loaded").field(&classifier.name()).finish(),
            Self::Failed { reason } => f.debug_struct("Failed").field("reason", reason).finish(),
        }
    }
}
