//! Robot configuration
//!
//! The whole robot is configured from one TOML file. Every section falls back
//! to its defaults, so a partial file only needs the values that differ. When
//! the file does not exist it is created with the defaults, the same
//! "fail-safe" approach the rest of the program follows: a missing config
//! never prevents the robot from starting.

use crate::controller::{ButtonType, ControllerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "tagbot";
const CONFIG_FILE: &str = "robot.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Operator controller section
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    /// Driver station port the controller is bound to
    pub port: u32,
    /// Stick deadzone as a fraction of full travel
    pub deadzone: f32,
    /// Button that turns the robot toward the visible tag while held
    pub aim_button: ButtonType,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            deadzone: 0.05,
            aim_button: ButtonType::A,
        }
    }
}

/// Drivetrain section
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DriveConfig {
    pub max_speed_mps: f64,
    pub max_angular_speed_radps: f64,
    pub track_width_m: f64,
    /// Proportional gain from target yaw (degrees) to rotation (rad/s)
    pub aim_kp: f64,
    /// Wheel velocity time constant of the simulated plant
    pub sim_time_constant_s: f64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            max_speed_mps: 3.0,
            max_angular_speed_radps: 2.0 * std::f64::consts::PI,
            track_width_m: 0.381 * 2.0,
            aim_kp: 0.1,
            sim_time_constant_s: 0.1,
        }
    }
}

/// Scheduler section
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tick period in milliseconds
    pub period_ms: u64,
    /// Seconds between loop statistic log lines
    pub stats_interval_s: u64,
    /// Ticks between telemetry log lines in `periodic_update`
    pub telemetry_every: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period_ms: 20,
            stats_interval_s: 10,
            telemetry_every: 50,
        }
    }
}

/// A tag placed on the field
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct TagPlacement {
    pub id: u32,
    pub x_m: f64,
    pub y_m: f64,
    pub z_m: f64,
}

/// Vision section
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct VisionConfig {
    pub camera_name: String,
    pub horizontal_fov_deg: f64,
    pub max_range_m: f64,
    pub camera_height_m: f64,
    pub tags: Vec<TagPlacement>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            camera_name: "photonvision".to_string(),
            horizontal_fov_deg: 70.0,
            max_range_m: 6.0,
            camera_height_m: 0.5,
            tags: vec![
                TagPlacement {
                    id: 1,
                    x_m: 4.0,
                    y_m: 0.0,
                    z_m: 1.0,
                },
                TagPlacement {
                    id: 2,
                    x_m: 4.0,
                    y_m: 2.0,
                    z_m: 1.0,
                },
            ],
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct RobotConfig {
    pub controller: ControllerConfig,
    pub drive: DriveConfig,
    pub scheduler: SchedulerConfig,
    pub vision: VisionConfig,
}

impl RobotConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.controller.deadzone) {
            return Err(ConfigError::Invalid(
                ControllerError::InvalidDeadzone(self.controller.deadzone).to_string(),
            ));
        }
        let positive = [
            ("drive.max_speed_mps", self.drive.max_speed_mps),
            (
                "drive.max_angular_speed_radps",
                self.drive.max_angular_speed_radps,
            ),
            ("drive.track_width_m", self.drive.track_width_m),
            ("vision.horizontal_fov_deg", self.vision.horizontal_fov_deg),
            ("vision.max_range_m", self.vision.max_range_m),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.drive.aim_kp < 0.0 || self.drive.sim_time_constant_s < 0.0 {
            return Err(ConfigError::Invalid(
                "drive.aim_kp and drive.sim_time_constant_s must not be negative".to_string(),
            ));
        }
        if self.scheduler.period_ms == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.period_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load `path`, writing the defaults there first if it does not exist
    pub async fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        if !exists {
            info!("Creating default configuration at {}", path.display());
            let config = Self::default();
            config.save(path).await?;
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::from_toml(&content)?;
        debug!("Loaded configuration from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(path, self.to_toml()?)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// `<config_dir>/tagbot/robot.toml`, falling back to the working directory
pub fn default_config_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| {
        warn!("Could not determine config directory, using current directory");
        PathBuf::from(".")
    });
    path.push(CONFIG_DIR);
    path.push(CONFIG_FILE);
    path
}
