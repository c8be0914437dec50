// Swerve drivetrain
//
// Provides:
// - Module states, positions and chassis speeds
// - Inverse/forward kinematics over four wheel locations
// - Heading-authoritative odometry
// - Per-wheel modules with shortest-path steering
// - The four-module drivetrain with field-relative driving

pub mod drivetrain;
pub mod kinematics;
pub mod module;
pub mod odometry;
pub mod state;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::geometry::Translation2d;
use crate::motor::MotorError;

pub use drivetrain::{HeadingSensor, HolonomicDrive, SwerveDrivetrain};
pub use kinematics::SwerveKinematics;
pub use module::{AngleSensor, ModuleHardware, SteerAngleSource, SwerveModule};
pub use odometry::SwerveOdometry;
pub use state::{ChassisSpeeds, SwerveModulePosition, SwerveModuleState};

/// Module slots, in the order every four-element array in this crate uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModulePosition {
    FrontLeft,
    FrontRight,
    BackLeft,
    BackRight,
}

impl ModulePosition {
    pub const ALL: [ModulePosition; 4] = [
        ModulePosition::FrontLeft,
        ModulePosition::FrontRight,
        ModulePosition::BackLeft,
        ModulePosition::BackRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ModulePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModulePosition::FrontLeft => "front left",
            ModulePosition::FrontRight => "front right",
            ModulePosition::BackLeft => "back left",
            ModulePosition::BackRight => "back right",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SwerveError {
    #[error("Motor error: {0}")]
    Motor(#[from] MotorError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Motor {id} has no {capability}")]
    MissingCapability { id: u32, capability: &'static str },

    #[error(
        "The {position} module is at ({:.3}, {:.3}), expected ({:.3}, {:.3})",
        .declared.x, .declared.y, .configured.x, .configured.y
    )]
    ModuleLocationMismatch {
        position: ModulePosition,
        declared: Translation2d,
        configured: Translation2d,
    },

    #[error("Wheel locations do not determine chassis motion")]
    DegenerateGeometry,
}
