// Loop timing and drivetrain configuration
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::geometry::Translation2d;
use crate::motor::PidGains;

// Control loop frequency
pub const LOOP_HZ: u64 = 50;

// Control loop period, also the default discretization step
pub const LOOP_PERIOD: Duration = Duration::from_millis(1000 / LOOP_HZ);

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

/// Locations closer together than this count as the same point
const MIN_WHEEL_SEPARATION: f64 = 1e-6;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Wheel centers relative to the robot center, in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WheelLocations {
    Explicit {
        front_left: Translation2d,
        front_right: Translation2d,
        back_left: Translation2d,
        back_right: Translation2d,
    },
    /// Rectangle centered on the robot
    Rectangular { track_width: f64, wheel_base: f64 },
}

impl WheelLocations {
    /// `track_width` is left-to-right, `wheel_base` is front-to-back
    pub fn rectangular(track_width: f64, wheel_base: f64) -> Self {
        WheelLocations::Rectangular {
            track_width,
            wheel_base,
        }
    }

    /// Locations in module order: front left, front right, back left, back right
    pub fn translations(&self) -> [Translation2d; 4] {
        match *self {
            WheelLocations::Explicit {
                front_left,
                front_right,
                back_left,
                back_right,
            } => [front_left, front_right, back_left, back_right],
            WheelLocations::Rectangular {
                track_width,
                wheel_base,
            } => {
                let (x, y) = (wheel_base / 2.0, track_width / 2.0);
                [
                    Translation2d::new(x, y),
                    Translation2d::new(x, -y),
                    Translation2d::new(-x, y),
                    Translation2d::new(-x, -y),
                ]
            }
        }
    }
}

fn default_loop_period() -> f64 {
    LOOP_PERIOD.as_secs_f64()
}

/// Everything needed to set up a swerve drivetrain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveTrainConfig {
    pub wheel_locations: WheelLocations,
    /// Negate the gyro reading when true.
    ///
    /// The older `gyroReversed` flag had the opposite sense (it negated when false), so configs
    /// ported from it need the value flipped.
    #[serde(default)]
    pub gyro_reversed: bool,
    /// m/s at full stick
    pub max_speed: f64,
    /// rad/s at full stick
    pub max_angular_speed: f64,
    /// Cap on any single wheel's speed, m/s
    #[serde(default)]
    pub max_module_speed: Option<f64>,
    /// Path-following gains for x/y
    #[serde(default)]
    pub translation_pid: PidGains,
    /// Path-following gains for heading
    #[serde(default)]
    pub rotation_pid: PidGains,
    /// Seconds per control tick
    #[serde(default = "default_loop_period")]
    pub loop_period: f64,
}

impl DriveTrainConfig {
    pub fn new(wheel_locations: WheelLocations, max_speed: f64, max_angular_speed: f64) -> Self {
        Self {
            wheel_locations,
            gyro_reversed: false,
            max_speed,
            max_angular_speed,
            max_module_speed: None,
            translation_pid: PidGains::default(),
            rotation_pid: PidGains::default(),
            loop_period: default_loop_period(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading drivetrain config from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Gyro reading in degrees with `gyro_reversed` applied
    pub fn corrected_heading(&self, raw: f64) -> f64 {
        if self.gyro_reversed { -raw } else { raw }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("max_speed", self.max_speed)?;
        positive("max_angular_speed", self.max_angular_speed)?;
        positive("loop_period", self.loop_period)?;
        if let Some(cap) = self.max_module_speed {
            positive("max_module_speed", cap)?;
        }

        let locations = self.wheel_locations.translations();
        if let Some(bad) = locations.iter().find(|t| !t.x.is_finite() || !t.y.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "wheel location ({}, {}) is not finite",
                bad.x, bad.y
            )));
        }
        for (i, a) in locations.iter().enumerate() {
            for b in &locations[i + 1..] {
                if a.distance(b) < MIN_WHEEL_SEPARATION {
                    return Err(ConfigError::Invalid(format!(
                        "two wheels share location ({}, {})",
                        a.x, a.y
                    )));
                }
            }
        }
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{} must be positive, got {}",
            name, value
        )))
    }
}
