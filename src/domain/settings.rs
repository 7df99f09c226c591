use crate::infrastructure::bluetooth::protocol;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How often the log file rolls over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    pub level: String,
    pub console_logging_enabled: bool,
    pub file_logging_enabled: bool,
    pub log_dir: PathBuf,
    pub file_name_prefix: String,
    pub rotation: LogRotation,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_logging_enabled: true,
            file_logging_enabled: false,
            log_dir: PathBuf::from("logs"),
            file_name_prefix: "evobot".to_string(),
            rotation: LogRotation::Daily,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Advertised name of the robot to connect to
    pub robot_name: String,

    /// Period of the retransmission timer
    pub transmit_interval_ms: u64,

    pub log_settings: LogSettings,
}

impl Settings {
    pub fn transmit_interval(&self) -> Duration {
        Duration::from_millis(self.transmit_interval_ms.max(1))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            robot_name: protocol::ROBOT_NAME.to_string(),
            transmit_interval_ms: protocol::TRANSMIT_INTERVAL.as_millis() as u64,
            log_settings: LogSettings::default(),
        }
    }
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::with_path(settings_path))
    }

    /// Load settings from an explicit file, falling back to defaults
    pub fn with_path(settings_path: PathBuf) -> Self {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!(
                    "Using default settings ({}): {}",
                    settings_path.display(),
                    e
                );
                Settings::default()
            }
        };

        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("EvoBot");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}
