//! Server configuration

use crate::cli::Cli;
use peerhive_classifier::{ModelConfig, ModelSource};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Zone model configuration
    #[serde(default)]
    pub model: ModelConfig,
}

impl ServerConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &Cli) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", config_path, e))?
        } else {
            Self::default()
        };

        // Apply CLI overrides
        if let Some(listen) = &cli.listen {
            config.listen = listen.clone();
        }

        if let Some(port) = cli.port {
            config.port = port;
        }

        if let Some(path) = &cli.model_path {
            config.model.source = ModelSource::Local { path: path.clone() };
        }

        if let Some(device) = cli.device {
            config.model.inference.device = device;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_body_bytes == 0 {
            anyhow::bail!("max_body_bytes must be greater than 0");
        }
        self.model.validate()?;
        Ok(())
    }

    /// Socket address to bind
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.listen, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address {}:{}: {}", self.listen, self.port, e))?;
        Ok(addr)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            model: ModelConfig::default(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerhive_classifier::DeviceSpec;
    use std::path::PathBuf;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ServerConfig::load("/no/such/peerhive.yaml", &Cli::default()).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:5000");
        assert_eq!(config.model.inference.max_length, 128);
    }

    #[test]
    fn test_file_then_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peerhive.yaml");
        std::fs::write(
            &path,
            r#"
listen: "0.0.0.0"
port: 9000
model:
  name: "zones-staging"
  source:
    type: local
    path: "/srv/models/staging"
  inference:
    device: cuda
"#,
        )
        .unwrap();

        let path = path.to_str().unwrap();

        let config = ServerConfig::load(path, &Cli::default()).unwrap();
        assert_eq!(config.listen, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.model.name, "zones-staging");
        assert_eq!(config.model.inference.device, DeviceSpec::Cuda);

        let cli = Cli {
            port: Some(5050),
            model_path: Some(PathBuf::from("/tmp/zones")),
            device: Some(DeviceSpec::Cpu),
            ..Default::default()
        };
        let config = ServerConfig::load(path, &cli).unwrap();
        assert_eq!(config.listen, "0.0.0.0");
        assert_eq!(config.port, 5050);
        assert_eq!(config.model.inference.device, DeviceSpec::Cpu);
        assert_eq!(
            config.model.source,
            ModelSource::Local {
                path: PathBuf::from("/tmp/zones")
            }
        );
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peerhive.yaml");
        std::fs::write(&path, "port: [not, a, port]\n").unwrap();

        assert!(ServerConfig::load(path.to_str().unwrap(), &Cli::default()).is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = ServerConfig::default();
        config.max_body_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.model.inference.max_length = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_listen_address() {
        let config = ServerConfig {
            listen: "not an address".to_string(),
            ..Default::default()
        };
        assert!(config.socket_addr().is_err());
    }
}
