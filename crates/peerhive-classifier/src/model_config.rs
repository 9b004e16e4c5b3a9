//! Model configuration structures

use peerhive_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Configuration for the zone model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name, reported by the health endpoint
    #[serde(default = "default_name")]
    pub name: String,

    /// Model source (where to load from)
    #[serde(default)]
    pub source: ModelSource,

    /// Inference settings
    #[serde(default)]
    pub inference: InferenceConfig,
}

fn default_name() -> String {
    "distilbert-zones".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            source: ModelSource::default(),
            inference: InferenceConfig::default(),
        }
    }
}

impl ModelConfig {
    /// Model stored in a local directory, other settings default
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ModelSource::Local { path: path.into() },
            ..Default::default()
        }
    }

    /// Reject settings the loader cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.inference.max_length == 0 {
            return Err(Error::config("inference.max_length must be greater than 0"));
        }

        if let ModelSource::HuggingFace { repo, .. } = &self.source {
            if repo.trim().is_empty() {
                return Err(Error::config("huggingface source requires a repo"));
            }
        }

        Ok(())
    }
}

/// Model source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSource {
    /// Load from local filesystem
    Local { path: PathBuf },

    /// Download from HuggingFace Hub
    HuggingFace {
        repo: String,
        #[serde(default = "default_revision")]
        revision: String,
    },
}

fn default_revision() -> String {
    "main".to_string()
}

impl Default for ModelSource {
    fn default() -> Self {
        Self::Local {
            path: PathBuf::from("./models/distilbert_goemotions"),
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { path } => write!(f, "{}", path.display()),
            Self::HuggingFace { repo, revision } => write!(f, "hf://{}@{}", repo, revision),
        }
    }
}

/// Compute device preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpec {
    /// Accelerator if one is available, otherwise CPU
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

impl FromStr for DeviceSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "cuda:0" | "gpu" => Ok(Self::Cuda),
            "metal" | "mps" => Ok(Self::Metal),
            other => Err(format!(
                "Unknown device '{}' (expected auto, cpu, cuda or metal)",
                other
            )),
        }
    }
}

/// Inference configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Device to run on
    #[serde(default)]
    pub device: DeviceSpec,

    /// Maximum sequence length, including special tokens
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

fn default_max_length() -> usize {
    128
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            device: DeviceSpec::default(),
            max_length: default_max_length(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ModelConfig::default();
        assert_eq!(config.name, "distilbert-zones");
        assert_eq!(config.inference.max_length, 128);
        assert_eq!(config.inference.device, DeviceSpec::Auto);
        assert_eq!(
            config.source,
            ModelSource::Local {
                path: PathBuf::from("./models/distilbert_goemotions")
            }
        );
    }

    #[test]
    fn test_parse_local_source() {
        let yaml = r#"
name: "zones-v2"
source:
  type: local
  path: "/srv/models/zones"
inference:
  device: cpu
  max_length: 64
"#;

        let config: ModelConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.name, "zones-v2");
        assert_eq!(config.inference.device, DeviceSpec::Cpu);
        assert_eq!(config.inference.max_length, 64);

        match &config.source {
            ModelSource::Local { path } => {
                assert_eq!(path.to_str().unwrap(), "/srv/models/zones");
            }
            _ => panic!("Expected local source"),
        }
    }

    #[test]
    fn test_parse_huggingface_source() {
        let yaml = r#"
source:
  type: huggingface
  repo: "peerhive/distilbert-zones"
"#;

        let config: ModelConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.source,
            ModelSource::HuggingFace {
                repo: "peerhive/distilbert-zones".to_string(),
                revision: "main".to_string(),
            }
        );
        assert_eq!(config.inference.max_length, 128);
        assert_eq!(config.source.to_string(), "hf://peerhive/distilbert-zones@main");
    }

    #[test]
    fn test_validate() {
        assert!(ModelConfig::default().validate().is_ok());

        let mut config = ModelConfig::default();
        config.inference.max_length = 0;
        assert!(config.validate().is_err());

        let config = ModelConfig {
            source: ModelSource::HuggingFace {
                repo: "  ".to_string(),
                revision: "main".to_string(),
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_device_from_str() {
        assert_eq!("AUTO".parse::<DeviceSpec>().unwrap(), DeviceSpec::Auto);
        assert_eq!("mps".parse::<DeviceSpec>().unwrap(), DeviceSpec::Metal);
        assert_eq!("cuda:0".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cuda);
        assert!("tpu".parse::<DeviceSpec>().is_err());
    }
}
