//! CLI argument definitions for the FarmaChat terminal client.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use farma_core::config::FarmaConfig;

/// FarmaChat: ask about medicines, get tips, and have photos of medicine
/// packaging analysed.
#[derive(Parser, Debug, Default)]
#[command(name = "farma", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Chat gateway endpoint URL.
    #[arg(short = 'g', long = "gateway-url")]
    pub gateway_url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > FARMA_CONFIG env var > ~/.farma/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("FARMA_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Fold flag and env overrides into a loaded config.
    ///
    /// Gateway URL: --gateway-url > FARMA_GATEWAY_URL > file.
    /// API key: FARMA_API_KEY > file. Log level: --log-level > file.
    pub fn apply_overrides(&self, config: &mut FarmaConfig) {
        if let Some(url) = self
            .gateway_url
            .clone()
            .or_else(|| std::env::var("FARMA_GATEWAY_URL").ok())
        {
            config.gateway.url = url;
        }
        if let Ok(key) = std::env::var("FARMA_API_KEY") {
            if !key.is_empty() {
                config.gateway.api_key = Some(key);
            }
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".farma").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".farma").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse_from([
            "farma",
            "--config",
            "/tmp/farma.toml",
            "--gateway-url",
            "http://localhost:8080/chat",
            "-l",
            "debug",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/farma.toml")));
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/farma.toml"));
        assert_eq!(
            args.gateway_url.as_deref(),
            Some("http://localhost:8080/chat")
        );
    }

    #[test]
    fn test_flags_override_config() {
        let args = CliArgs {
            gateway_url: Some("http://localhost:8080/chat".to_string()),
            log_level: Some("trace".to_string()),
            ..CliArgs::default()
        };
        let mut config = FarmaConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.gateway.url, "http://localhost:8080/chat");
        assert_eq!(config.general.log_level, "trace");
    }
}
