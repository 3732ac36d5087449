use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::input::{gamepad::GamepadTiming, mapping::GamepadMapping};
use crate::models::{DEFAULT_SPEED_PERCENT, MAX_SPEED_PERCENT, MIN_SPEED_PERCENT};

/// Prefix of environment overrides, e.g. `SCARA__BACKEND__BASE_URL`.
const ENV_PREFIX: &str = "SCARA";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found at {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to load configuration: {source}")]
    LoadError { source: ::config::ConfigError },

    #[error("Failed to serialize configuration: {source}")]
    SerializeError { source: toml::ser::Error },

    #[error("Failed to write configuration file: {source}")]
    WriteError { source: std::io::Error },

    #[error("Configuration validation failed: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_ms: 5000,
            csrf_token: None,
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub busy_poll_ms: u64,
    pub status_poll_ms: u64,
    pub gamepad_poll_ms: u64,
    pub input_throttle_ms: u64,
    pub grip_throttle_ms: u64,
    pub auto_send_delay_ms: u64,
    pub sequence_step_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            busy_poll_ms: 500,
            status_poll_ms: 5000,
            gamepad_poll_ms: 50,
            input_throttle_ms: 100,
            grip_throttle_ms: 500,
            auto_send_delay_ms: 300,
            sequence_step_ms: 1000,
        }
    }
}

impl TimingConfig {
    pub fn busy_poll(&self) -> Duration {
        Duration::from_millis(self.busy_poll_ms)
    }

    pub fn status_poll(&self) -> Duration {
        Duration::from_millis(self.status_poll_ms)
    }

    pub fn sequence_step(&self) -> Duration {
        Duration::from_millis(self.sequence_step_ms)
    }

    fn intervals(&self) -> [(&'static str, u64); 7] {
        [
            ("busy_poll_ms", self.busy_poll_ms),
            ("status_poll_ms", self.status_poll_ms),
            ("gamepad_poll_ms", self.gamepad_poll_ms),
            ("input_throttle_ms", self.input_throttle_ms),
            ("grip_throttle_ms", self.grip_throttle_ms),
            ("auto_send_delay_ms", self.auto_send_delay_ms),
            ("sequence_step_ms", self.sequence_step_ms),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub default_speed_percent: u8,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            default_speed_percent: DEFAULT_SPEED_PERCENT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GamepadConfig {
    pub enabled: bool,
    pub auto_send: bool,
    /// Unix socket that gamepad readers connect to.
    pub socket_path: PathBuf,
    pub mapping: GamepadMapping,
}

impl Default for GamepadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_send: true,
            socket_path: PathBuf::from("/tmp/scara_gamepad.sock"),
            mapping: GamepadMapping::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
    /// Daily rolling log files are written here when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            directory: None,
            file_prefix: "scara_panel.log".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub backend: BackendConfig,
    pub timing: TimingConfig,
    pub motion: MotionConfig,
    pub gamepad: GamepadConfig,
    pub logging: LoggingConfig,
}

impl PanelConfig {
    pub fn gamepad_timing(&self) -> GamepadTiming {
        GamepadTiming {
            poll: Duration::from_millis(self.timing.gamepad_poll_ms),
            input_throttle: Duration::from_millis(self.timing.input_throttle_ms),
            grip_throttle: Duration::from_millis(self.timing.grip_throttle_ms),
            auto_send_delay: Duration::from_millis(self.timing.auto_send_delay_ms),
            auto_send: self.gamepad.auto_send,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::ValidationError { message });

        if !self.backend.base_url.starts_with("http://")
            && !self.backend.base_url.starts_with("https://")
        {
            return invalid(format!(
                "backend.base_url must be an http(s) URL, got {}",
                self.backend.base_url
            ));
        }

        if let Some((name, _)) = self
            .timing
            .intervals()
            .into_iter()
            .find(|(_, millis)| *millis == 0)
        {
            return invalid(format!("timing.{} must be greater than zero", name));
        }

        let speed = self.motion.default_speed_percent;
        if !(MIN_SPEED_PERCENT..=MAX_SPEED_PERCENT).contains(&speed) {
            return invalid(format!(
                "motion.default_speed_percent must be within {}..={}, got {}",
                MIN_SPEED_PERCENT, MAX_SPEED_PERCENT, speed
            ));
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct ConfigOptions {
    pub config_path: PathBuf,
    pub create_if_missing: bool,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            create_if_missing: true,
        }
    }
}

impl ConfigOptions {
    pub fn default_config_path() -> PathBuf {
        std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("default_config.toml"))
    }

    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }
}

#[derive(Debug)]
pub struct ConfigManager {
    options: ConfigOptions,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            options: ConfigOptions::default(),
        }
    }

    pub fn with_options(options: ConfigOptions) -> Self {
        Self { options }
    }

    /// Reads the TOML file, then applies `SCARA__SECTION__KEY` overrides.
    pub fn load(&self) -> anyhow::Result<PanelConfig> {
        let config_path = &self.options.config_path;

        if !config_path.exists() {
            if self.options.create_if_missing {
                self.save(&PanelConfig::default())
                    .context("Failed to save default config")?;
            } else {
                return Err(ConfigError::FileNotFound {
                    path: config_path.clone(),
                }
                .into());
            }
        }

        let config: PanelConfig = ::config::Config::builder()
            .add_source(
                ::config::File::from(config_path.as_path()).format(::config::FileFormat::Toml),
            )
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|source| ConfigError::LoadError { source })?;

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &PanelConfig) -> anyhow::Result<()> {
        let config_path = &self.options.config_path;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError { source: e })?;
        }

        let content = toml::to_string_pretty(config)
            .map_err(|e| ConfigError::SerializeError { source: e })?;

        fs::write(config_path, content).map_err(|e| ConfigError::WriteError { source: e })?;

        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

pub fn init_config() -> anyhow::Result<(ConfigManager, PanelConfig)> {
    let manager = ConfigManager::new();
    let config = manager.load()?;
    Ok((manager, config))
}

pub fn create_default_config<P: AsRef<Path>>(path: Option<P>) -> anyhow::Result<()> {
    let config_path = path
        .map(|p| p.as_ref().to_path_buf())
        .unwrap_or_else(ConfigOptions::default_config_path);

    let manager = ConfigManager::with_options(ConfigOptions {
        config_path,
        create_if_missing: true,
    });
    manager.save(&PanelConfig::default())?;

    Ok(())
}
