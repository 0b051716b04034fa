use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{FarmaError, Result};
use crate::types::Facing;

/// Top-level configuration for the FarmaChat client.
///
/// Loaded from `~/.farma/config.toml` by default. Each section corresponds
/// to one component of the chat session layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FarmaConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub inactivity: InactivityConfig,
}

impl FarmaConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FarmaConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| FarmaError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Completion gateway endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Full URL of the completion function (`POST`).
    pub url: String,
    /// Key sent as both `Authorization: Bearer` and `apikey` headers.
    pub api_key: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:54321/functions/v1/openai-chat".to_string(),
            api_key: None,
        }
    }
}

/// Camera capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Facing direction used when the camera view is first opened.
    pub default_facing: Facing,
    /// JPEG quality (1-100).
    pub jpeg_quality: u8,
    /// Pause between stopping one stream and starting the next on toggle.
    pub settle_delay_ms: u64,
}

impl CameraConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            default_facing: Facing::Back,
            jpeg_quality: 80,
            settle_delay_ms: 100,
        }
    }
}

/// Fixed conversational texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// The single assistant message a fresh or reset session starts with.
    pub greeting: String,
    /// Prompt sent when the user submits an image without text.
    pub image_prompt: String,
    /// Assistant message appended when a turn fails.
    pub failure_message: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting: "Hola buenas, puedo ayudarte con consultas sobre medicamentos, tips y \
                       análisis de fotos de medicamentos. ¿En qué puedo ayudarte?"
                .to_string(),
            image_prompt: "Analiza esta imagen".to_string(),
            failure_message:
                "Lo siento, hubo un error procesando tu consulta. Por favor intenta de nuevo."
                    .to_string(),
        }
    }
}

/// Idle detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InactivityConfig {
    /// Quiet period after which the session is flagged idle.
    pub threshold_secs: u64,
    /// How often the idle check runs.
    pub poll_interval_secs: u64,
}

impl InactivityConfig {
    pub fn threshold(&self) -> Duration {
        Duration::from_secs(self.threshold_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        // A zero period would make tokio's interval panic.
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl Default for InactivityConfig {
    fn default() -> Self {
        Self {
            threshold_secs: 120,
            poll_interval_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_config_default_values() {
        let config = FarmaConfig::default();

        assert_eq!(config.general.log_level, "info");
        assert!(config.gateway.url.ends_with("/openai-chat"));
        assert!(config.gateway.api_key.is_none());

        assert_eq!(config.camera.default_facing, Facing::Back);
        assert_eq!(config.camera.jpeg_quality, 80);
        assert_eq!(config.camera.settle_delay(), Duration::from_millis(100));

        assert!(config.session.greeting.starts_with("Hola buenas"));
        assert_eq!(config.session.image_prompt, "Analiza esta imagen");
        assert!(config.session.failure_message.starts_with("Lo siento"));

        assert_eq!(config.inactivity.threshold(), Duration::from_secs(120));
        assert_eq!(config.inactivity.poll_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_config_load_full() {
        let content = r#"
[general]
log_level = "debug"

[gateway]
url = "https://example.test/functions/v1/openai-chat"
api_key = "anon-key"

[camera]
default_facing = "front"
jpeg_quality = 90
settle_delay_ms = 250

[session]
greeting = "Hola"
image_prompt = "Describe la foto"
failure_message = "Error"

[inactivity]
threshold_secs = 60
poll_interval_secs = 5
"#;
        let file = create_temp_config(content);
        let config = FarmaConfig::load(file.path()).unwrap();

        assert_eq!(config.general.log_level, "debug");
        assert_eq!(
            config.gateway.url,
            "https://example.test/functions/v1/openai-chat"
        );
        assert_eq!(config.gateway.api_key.as_deref(), Some("anon-key"));
        assert_eq!(config.camera.default_facing, Facing::Front);
        assert_eq!(config.camera.jpeg_quality, 90);
        assert_eq!(config.camera.settle_delay_ms, 250);
        assert_eq!(config.session.greeting, "Hola");
        assert_eq!(config.session.image_prompt, "Describe la foto");
        assert_eq!(config.session.failure_message, "Error");
        assert_eq!(config.inactivity.threshold_secs, 60);
        assert_eq!(config.inactivity.poll_interval_secs, 5);
    }

    #[test]
    fn test_config_partial_sections_fill_defaults() {
        let content = r#"
[camera]
jpeg_quality = 70
"#;
        let file = create_temp_config(content);
        let config = FarmaConfig::load(file.path()).unwrap();

        assert_eq!(config.camera.jpeg_quality, 70);
        assert_eq!(config.camera.default_facing, Facing::Back);
        assert_eq!(config.camera.settle_delay_ms, 100);
        assert_eq!(config.inactivity.threshold_secs, 120);
    }

    #[test]
    fn test_config_load_or_default_missing_file() {
        let config = FarmaConfig::load_or_default(Path::new("/does/not/exist/config.toml"));
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.inactivity.threshold_secs, 120);
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        let result = FarmaConfig::load(file.path());
        assert!(matches!(result, Err(FarmaError::Config(_))));
    }

    #[test]
    fn test_config_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("dir").join("config.toml");

        let mut config = FarmaConfig::default();
        config.camera.default_facing = Facing::Front;
        config.save(&path).unwrap();

        assert!(path.exists());
        let reloaded = FarmaConfig::load(&path).unwrap();
        assert_eq!(reloaded.camera.default_facing, Facing::Front);
        assert_eq!(reloaded.session.greeting, config.session.greeting);
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let config = InactivityConfig {
            threshold_secs: 120,
            poll_interval_secs: 0,
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }
}
