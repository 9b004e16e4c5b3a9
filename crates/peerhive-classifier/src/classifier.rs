//! Classifier trait

use async_trait::async_trait;
use peerhive_core::{Prediction, Result};

/// Anything that can turn text into a zone prediction.
///
/// Implementations are shared read-only across concurrent requests.
#[async_trait]
pub trait ZoneClassifier: Send + Sync {
    /// Classify the given text
    async fn classify(&self, text: &str) -> Result<Prediction>;

    /// Get the classifier name
    fn name(&self) -> &str;
}
