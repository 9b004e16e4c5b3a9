//! Model artifact loading helpers
//!
//! Resolves the model directory, picks a compute device and builds the
//! tokenizer and weight loader that the DistilBERT classifier needs.

use crate::model_config::{DeviceSpec, ModelSource};
use candle_core::{DType, Device};
use candle_nn::{Linear, VarBuilder};
use peerhive_core::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

/// Resolve the directory holding `config.json`, weights and tokenizer files
pub fn resolve_model_path(source: &ModelSource) -> Result<PathBuf> {
    match source {
        ModelSource::Local { path } => {
            if !path.is_dir() {
                return Err(Error::classifier(format!(
                    "Model path does not exist: {}",
                    path.display()
                )));
            }
            Ok(path.clone())
        }
        ModelSource::HuggingFace { repo, revision } => download_from_huggingface(repo, revision),
    }
}

/// Download model files from HuggingFace Hub into the local cache
fn download_from_huggingface(repo: &str, revision: &str) -> Result<PathBuf> {
    tracing::info!("Downloading model from HuggingFace: {} @ {}", repo, revision);

    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("peerhive/models");

    let api = hf_hub::api::sync::ApiBuilder::new()
        .with_cache_dir(cache_dir)
        .build()
        .map_err(|e| {
            Error::classifier(format!("Failed to initialize HuggingFace API: {}", e))
        })?;

    let repo_obj = api.repo(hf_hub::Repo::with_revision(
        repo.to_string(),
        hf_hub::RepoType::Model,
        revision.to_string(),
    ));

    repo_obj
        .get("config.json")
        .map_err(|e| Error::classifier(format!("Failed to download config.json: {}", e)))?;

    let weights_found = WEIGHT_FILES.iter().any(|file| match repo_obj.get(file) {
        Ok(_) => {
            tracing::debug!("Downloaded weights: {}", file);
            true
        }
        Err(e) => {
            tracing::debug!("Weights file {} not available: {}", file, e);
            false
        }
    });

    if !weights_found {
        return Err(Error::classifier(format!(
            "No weights found in {} (tried {})",
            repo,
            WEIGHT_FILES.join(", ")
        )));
    }

    let tokenizer_found = ["tokenizer.json", "vocab.txt"]
        .iter()
        .any(|file| match repo_obj.get(file) {
            Ok(_) => {
                tracing::debug!("Found tokenizer file: {}", file);
                true
            }
            Err(e) => {
                tracing::debug!("Tokenizer file {} not available: {}", file, e);
                false
            }
        });

    if !tokenizer_found {
        return Err(Error::classifier(
            "No tokenizer found (tried tokenizer.json, vocab.txt)",
        ));
    }

    let config_path = repo_obj.get("config.json").map_err(|e| {
        Error::classifier(format!("Failed to locate model cache: {}", e))
    })?;

    let model_dir = config_path
        .parent()
        .ok_or_else(|| Error::classifier("Invalid cache path"))?;

    tracing::info!("Model available at: {}", model_dir.display());
    Ok(model_dir.to_path_buf())
}

/// Pick the compute device.
///
/// `Auto` tries CUDA, then Metal, and settles on CPU when neither is usable.
pub fn select_device(spec: DeviceSpec) -> Result<Device> {
    match spec {
        DeviceSpec::Cpu => Ok(Device::Cpu),
        DeviceSpec::Cuda => Device::new_cuda(0)
            .map_err(|e| Error::classifier(format!("Failed to initialize CUDA: {}", e))),
        DeviceSpec::Metal => Device::new_metal(0)
            .map_err(|e| Error::classifier(format!("Failed to initialize Metal: {}", e))),
        DeviceSpec::Auto => {
            if candle_core::utils::cuda_is_available() {
                match Device::new_cuda(0) {
                    Ok(device) => return Ok(device),
                    Err(e) => tracing::warn!("CUDA available but unusable, falling back: {}", e),
                }
            }
            if candle_core::utils::metal_is_available() {
                match Device::new_metal(0) {
                    Ok(device) => return Ok(device),
                    Err(e) => tracing::warn!("Metal available but unusable, falling back: {}", e),
                }
            }
            Ok(Device::Cpu)
        }
    }
}

/// Short device name for logs and health output
pub fn device_label(device: &Device) -> &'static str {
    if device.is_cuda() {
        "cuda"
    } else if device.is_metal() {
        "metal"
    } else {
        "cpu"
    }
}

/// Read and deserialize a JSON file from the model directory
pub fn parse_json_config<T: DeserializeOwned>(config_path: &Path) -> Result<T> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        Error::classifier(format!(
            "Failed to read config {}: {}",
            config_path.display(),
            e
        ))
    })?;

    serde_json::from_str(&config_str).map_err(|e| {
        Error::classifier(format!(
            "Failed to parse config {}: {}",
            config_path.display(),
            e
        ))
    })
}

/// Load the tokenizer and configure truncation and padding to `max_length`.
///
/// Prefers `tokenizer.json`; falls back to a BERT WordPiece tokenizer built
/// from `vocab.txt`.
pub fn load_tokenizer(model_path: &Path, max_length: usize) -> Result<Tokenizer> {
    let mut tokenizer = read_tokenizer(model_path)?;

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| Error::classifier(format!("Failed to configure truncation: {}", e)))?;

    let pad_token = "[PAD]".to_string();
    let pad_id = tokenizer.token_to_id(&pad_token).unwrap_or(0);
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        pad_id,
        pad_token,
        ..Default::default()
    }));

    Ok(tokenizer)
}

fn read_tokenizer(model_path: &Path) -> Result<Tokenizer> {
    let tokenizer_json_path = model_path.join("tokenizer.json");
    if tokenizer_json_path.exists() {
        tracing::debug!("Loading tokenizer from tokenizer.json");
        return Tokenizer::from_file(&tokenizer_json_path)
            .map_err(|e| Error::classifier(format!("Failed to load tokenizer.json: {}", e)));
    }

    let vocab_path = model_path.join("vocab.txt");
    if vocab_path.exists() {
        tracing::debug!("Building tokenizer from vocab.txt");

        use tokenizers::models::wordpiece::WordPiece;
        use tokenizers::normalizers::BertNormalizer;
        use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
        use tokenizers::processors::bert::BertProcessing;

        let wordpiece = WordPiece::from_file(vocab_path.to_string_lossy().as_ref())
            .unk_token("[UNK]".to_string())
            .build()
            .map_err(|e| Error::classifier(format!("Failed to build WordPiece model: {}", e)))?;

        let mut tokenizer = Tokenizer::new(wordpiece);
        tokenizer.with_normalizer(Some(BertNormalizer::default()));
        tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));

        let special = |token: &str| -> Result<(String, u32)> {
            tokenizer
                .token_to_id(token)
                .map(|id| (token.to_string(), id))
                .ok_or_else(|| Error::classifier(format!("vocab.txt has no {} token", token)))
        };
        let sep = special("[SEP]")?;
        let cls = special("[CLS]")?;
        tokenizer.with_post_processor(Some(BertProcessing::new(sep, cls)));

        return Ok(tokenizer);
    }

    Err(Error::classifier(format!(
        "No tokenizer found in {} (tried tokenizer.json, vocab.txt)",
        model_path.display()
    )))
}

/// Weight files accepted in a model directory, in order of preference
pub const WEIGHT_FILES: [&str; 2] = ["model.safetensors", "pytorch_model.bin"];

/// Open the model weights.
///
/// `model.safetensors` is memory-mapped; older `save_pretrained` output
/// (`pytorch_model.bin`) is read through candle's pickle loader.
pub fn load_var_builder(model_path: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors_path = model_path.join(WEIGHT_FILES[0]);
    if safetensors_path.exists() {
        // SAFETY: the weights file is not modified while the server runs.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[safetensors_path], DType::F32, device)
                .map_err(|e| Error::classifier(format!("Failed to load weights: {}", e)))?
        };
        return Ok(vb);
    }

    let pth_path = model_path.join(WEIGHT_FILES[1]);
    if pth_path.exists() {
        tracing::debug!("Loading PyTorch weights from {}", pth_path.display());
        return VarBuilder::from_pth(&pth_path, DType::F32, device)
            .map_err(|e| Error::classifier(format!("Failed to load weights: {}", e)));
    }

    Err(Error::classifier(format!(
        "No weights found in {} (tried {})",
        model_path.display(),
        WEIGHT_FILES.join(", ")
    )))
}

/// Load a trained linear layer; a missing or mis-shaped tensor is an error
pub fn load_linear(vb: &VarBuilder, in_dim: usize, out_dim: usize, prefix: &str) -> Result<Linear> {
    candle_nn::linear(in_dim, out_dim, vb.pp(prefix)).map_err(|e| {
        Error::classifier(format!(
            "Failed to load '{}' layer ({} -> {}): {}",
            prefix, in_dim, out_dim, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_vocab(dir: &Path) {
        let mut file = std::fs::File::create(dir.join("vocab.txt")).unwrap();
        for token in [
            "[PAD]", "[UNK]", "[CLS]", "[SEP]", "i", "feel", "fine", "today", "so", "tired",
        ] {
            writeln!(file, "{}", token).unwrap();
        }
    }

    #[test]
    fn test_missing_local_path() {
        let source = ModelSource::Local {
            path: PathBuf::from("/definitely/not/a/model/dir"),
        };
        let err = resolve_model_path(&source).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_existing_local_path() {
        let dir = tempfile::tempdir().unwrap();
        let source = ModelSource::Local {
            path: dir.path().to_path_buf(),
        };
        assert_eq!(resolve_model_path(&source).unwrap(), dir.path());
    }

    #[test]
    fn test_cpu_device() {
        let device = select_device(DeviceSpec::Cpu).unwrap();
        assert!(device.is_cpu());
        assert_eq!(device_label(&device), "cpu");
    }

    #[test]
    fn test_auto_device_always_resolves() {
        assert!(select_device(DeviceSpec::Auto).is_ok());
    }

    #[test]
    fn test_tokenizer_from_vocab() {
        let dir = tempfile::tempdir().unwrap();
        write_vocab(dir.path());

        let tokenizer = load_tokenizer(dir.path(), 128).unwrap();
        let encoding = tokenizer.encode("I feel fine today", true).unwrap();

        // [CLS] i feel fine today [SEP]
        assert_eq!(encoding.get_ids(), &[2, 4, 5, 6, 7, 3]);
        assert!(encoding.get_attention_mask().iter().all(|&m| m == 1));
    }

    #[test]
    fn test_tokenizer_truncates() {
        let dir = tempfile::tempdir().unwrap();
        write_vocab(dir.path());

        let tokenizer = load_tokenizer(dir.path(), 4).unwrap();
        let encoding = tokenizer
            .encode("i feel so so so tired today", true)
            .unwrap();

        let ids = encoding.get_ids();
        assert_eq!(ids.len(), 4);
        assert_eq!(ids.first(), Some(&2));
        assert_eq!(ids.last(), Some(&3));
    }

    #[test]
    fn test_tokenizer_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_tokenizer(dir.path(), 128).unwrap_err();
        assert!(err.to_string().contains("No tokenizer found"));
    }

    #[test]
    fn test_missing_weights() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_var_builder(dir.path(), &Device::Cpu).err().unwrap();
        let msg = err.to_string();
        assert!(msg.contains("No weights found"), "{}", msg);
        assert!(msg.contains("model.safetensors"), "{}", msg);
        assert!(msg.contains("pytorch_model.bin"), "{}", msg);
    }

    #[test]
    fn test_unreadable_pytorch_weights() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pytorch_model.bin"), b"not a torch archive").unwrap();

        let err = load_var_builder(dir.path(), &Device::Cpu).err().unwrap();
        assert!(err.to_string().contains("Failed to load weights"), "{}", err);
    }
}
