use clap::Parser;
use peerhive_classifier::DeviceSpec;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "peerhive-server")]
#[command(author, version, about = "PeerHive emotional zone prediction service", long_about = None)]
pub struct Cli {
    /// Configuration file path (skipped if it does not exist)
    #[arg(short, long, env = "PEERHIVE_CONFIG", default_value = "peerhive.yaml")]
    pub config: String,

    /// Listen address
    #[arg(short = 'l', long, env = "PEERHIVE_LISTEN")]
    pub listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long, env = "PEERHIVE_PORT")]
    pub port: Option<u16>,

    /// Directory holding the fine-tuned model and tokenizer
    #[arg(short, long, env = "PEERHIVE_MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Compute device: auto, cpu, cuda or metal
    #[arg(short, long, env = "PEERHIVE_DEVICE", value_parser = parse_device)]
    pub device: Option<DeviceSpec>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_device(s: &str) -> Result<DeviceSpec, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["peerhive-server"]).unwrap();
        assert_eq!(cli.config, "peerhive.yaml");
        assert!(cli.port.is_none());
        assert!(cli.device.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "peerhive-server",
            "--port",
            "8080",
            "--model-path",
            "/srv/zones",
            "--device",
            "cpu",
            "-v",
        ])
        .unwrap();

        assert_eq!(cli.port, Some(8080));
        assert_eq!(cli.model_path, Some(PathBuf::from("/srv/zones")));
        assert_eq!(cli.device, Some(DeviceSpec::Cpu));
        assert!(cli.verbose);
    }

    #[test]
    fn test_rejects_unknown_device() {
        assert!(Cli::try_parse_from(["peerhive-server", "--device", "tpu"]).is_err());
    }
}
