//! DistilBERT sequence classifier for emotional zones

use crate::classifier::ZoneClassifier;
use crate::loader;
use crate::model_config::ModelConfig;
use async_trait::async_trait;
use candle_core::{Device, IndexOp, Tensor, D};
use candle_nn::{Linear, Module};
use candle_transformers::models::distilbert::{Config as DistilBertConfig, DistilBertModel};
use peerhive_core::{Error, Prediction, Result, Zone};
use std::sync::Arc;
use std::time::Instant;
use tokenizers::Tokenizer;

/// Fine-tuned `DistilBertForSequenceClassification` with a three-zone head.
///
/// Cloning is cheap; clones share the loaded weights.
#[derive(Clone)]
pub struct DistilBertZoneClassifier {
    inner: Arc<DistilBertZoneModel>,
}

struct DistilBertZoneModel {
    name: String,
    tokenizer: Tokenizer,
    model: DistilBertModel,
    pre_classifier: Linear,
    classifier: Linear,
    device: Device,
}

impl DistilBertZoneClassifier {
    /// Load tokenizer and weights. Blocking; call from a blocking context.
    pub fn load(config: &ModelConfig) -> Result<Self> {
        config.validate()?;

        let model_path = loader::resolve_model_path(&config.source)?;
        let tokenizer = loader::load_tokenizer(&model_path, config.inference.max_length)?;

        let config_path = model_path.join("config.json");
        let config_json: serde_json::Value = loader::parse_json_config(&config_path)?;

        let hidden_size = config_json
            .get("dim")
            .or_else(|| config_json.get("hidden_size"))
            .and_then(|v| v.as_u64())
            .unwrap_or(768) as usize;

        let distilbert_config: DistilBertConfig = serde_json::from_value(config_json)
            .map_err(|e| Error::classifier(format!("Failed to parse config: {}", e)))?;

        let device = loader::select_device(config.inference.device)?;
        let vb = loader::load_var_builder(&model_path, &device)?;

        let model = DistilBertModel::load(vb.pp("distilbert"), &distilbert_config).map_err(|e| {
            Error::classifier(format!("Failed to load DistilBERT model: {}", e))
        })?;
        let pre_classifier = loader::load_linear(&vb, hidden_size, hidden_size, "pre_classifier")?;
        let classifier = loader::load_linear(&vb, hidden_size, Zone::COUNT, "classifier")?;

        tracing::info!(
            "Loaded DistilBERT zone classifier '{}' from {} on {} (hidden_size={}, max_length={})",
            config.name,
            model_path.display(),
            loader::device_label(&device),
            hidden_size,
            config.inference.max_length
        );

        Ok(Self {
            inner: Arc::new(DistilBertZoneModel {
                name: config.name.clone(),
                tokenizer,
                model,
                pre_classifier,
                classifier,
                device,
            }),
        })
    }

    /// Device the model was placed on
    pub fn device(&self) -> &Device {
        &self.inner.device
    }

    /// Run one forward pass on the calling thread
    pub fn predict_blocking(&self, text: &str) -> Result<Prediction> {
        self.inner.predict(text)
    }
}

impl DistilBertZoneModel {
    fn predict(&self, text: &str) -> Result<Prediction> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::classifier(format!("Tokenization failed: {}", e)))?;

        let input_ids = Tensor::new(encoding.get_ids(), &self.device)
            .map_err(|e| Error::classifier(format!("Failed to create input tensor: {}", e)))?
            .unsqueeze(0)
            .map_err(|e| Error::classifier(format!("Failed to unsqueeze: {}", e)))?;

        // candle's DistilBERT fills positions where the mask is 1, so padding is marked 1
        let padding_mask: Vec<u8> = encoding
            .get_attention_mask()
            .iter()
            .map(|&x| u8::from(x == 0))
            .collect();
        let padding_mask = Tensor::new(padding_mask.as_slice(), &self.device)
            .map_err(|e| Error::classifier(format!("Failed to create attention mask: {}", e)))?
            .unsqueeze(0)
            .map_err(|e| Error::classifier(format!("Failed to unsqueeze: {}", e)))?;

        let hidden_states = self
            .model
            .forward(&input_ids, &padding_mask)
            .map_err(|e| Error::classifier(format!("Model forward pass failed: {}", e)))?;

        let cls_embedding = hidden_states
            .i((.., 0, ..))
            .map_err(|e| Error::classifier(format!("Failed to get CLS token: {}", e)))?;

        let pooled_output = self
            .pre_classifier
            .forward(&cls_embedding)
            .map_err(|e| Error::classifier(format!("Pre-classifier failed: {}", e)))?
            .relu()
            .map_err(|e| Error::classifier(format!("ReLU failed: {}", e)))?;

        let logits = self
            .classifier
            .forward(&pooled_output)
            .map_err(|e| Error::classifier(format!("Classification head failed: {}", e)))?;

        logits_to_prediction(&logits)
    }
}

#[async_trait]
impl ZoneClassifier for DistilBertZoneClassifier {
    async fn classify(&self, text: &str) -> Result<Prediction> {
        let start = Instant::now();
        let inner = Arc::clone(&self.inner);
        let text = text.to_owned();

        let prediction = tokio::task::spawn_blocking(move || inner.predict(&text))
            .await
            .map_err(|e| Error::internal(format!("Inference task failed: {}", e)))??;

        tracing::debug!(
            zone = %prediction.predicted_zone,
            latency_us = start.elapsed().as_micros() as u64,
            "Classified text"
        );

        Ok(prediction)
    }

    fn name(&self) -> &str {
        &self.inner.name
    }
}

/// Softmax over the last dimension of a `(3,)` or `(1, 3)` logits tensor,
/// then argmax into a [`Prediction`].
pub fn logits_to_prediction(logits: &Tensor) -> Result<Prediction> {
    let probs = candle_nn::ops::softmax(logits, D::Minus1)
        .map_err(|e| Error::classifier(format!("Softmax failed: {}", e)))?;

    let probs = if probs.rank() == 2 {
        probs
            .squeeze(0)
            .map_err(|e| Error::classifier(format!("Squeeze failed: {}", e)))?
    } else {
        probs
    };

    let probs_vec: Vec<f32> = probs
        .to_dtype(candle_core::DType::F32)
        .and_then(|t| t.to_vec1())
        .map_err(|e| Error::classifier(format!("Failed to convert to vec: {}", e)))?;

    Prediction::from_probabilities(&probs_vec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_config::ModelSource;
    use proptest::prelude::*;

    #[test]
    fn test_logits_to_prediction() {
        let logits = Tensor::new(&[[0.1f32, 2.5, -1.0]], &Device::Cpu).unwrap();
        let prediction = logits_to_prediction(&logits).unwrap();

        assert_eq!(prediction.predicted_zone, Zone::Stressed);
        assert!(prediction.probabilities.stressed > prediction.probabilities.calm);
        assert!(prediction.probabilities.calm > prediction.probabilities.overwhelmed);
        assert!((prediction.probabilities.sum() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_uniform_logits() {
        let logits = Tensor::new(&[4.0f32, 4.0, 4.0], &Device::Cpu).unwrap();
        let prediction = logits_to_prediction(&logits).unwrap();

        assert_eq!(prediction.predicted_zone, Zone::Calm);
        for (_, prob) in prediction.probabilities.iter() {
            assert!((prob - 1.0 / 3.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_wrong_label_count() {
        let logits = Tensor::new(&[[0.3f32, 0.7]], &Device::Cpu).unwrap();
        assert!(logits_to_prediction(&logits).is_err());
    }

    #[test]
    fn test_load_fails_without_model_dir() {
        let config = ModelConfig::local("./no/such/model");
        let err = DistilBertZoneClassifier::load(&config).err().unwrap();
        assert!(matches!(err, Error::Classifier(_)));
    }

    #[test]
    fn test_load_fails_without_config_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("vocab.txt"), "[PAD]\n[UNK]\n[CLS]\n[SEP]\n").unwrap();

        let config = ModelConfig {
            source: ModelSource::Local {
                path: dir.path().to_path_buf(),
            },
            ..Default::default()
        };
        let err = DistilBertZoneClassifier::load(&config).err().unwrap();
        assert!(err.to_string().contains("config.json"), "{}", err);
    }

    proptest! {
        #[test]
        fn prop_softmax_is_distribution(
            logits in proptest::collection::vec(-30.0f32..30.0, 3)
        ) {
            let tensor = Tensor::new(logits.as_slice(), &Device::Cpu).unwrap();
            let prediction = logits_to_prediction(&tensor).unwrap();

            for (_, prob) in prediction.probabilities.iter() {
                prop_assert!((0.0..=1.0).contains(&prob));
            }
            prop_assert!((prediction.probabilities.sum() - 1.0).abs() < 1e-4);

            let best = prediction.probabilities.get(prediction.predicted_zone);
            for (_, prob) in prediction.probabilities.iter() {
                prop_assert!(best >= prob);
            }
        }
    }
}
