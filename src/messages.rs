// Message types exchanged with the drive loop

use serde::{Deserialize, Serialize};

use crate::swerve::{ModulePosition, SwerveModuleState};

/// Teleop command, each axis a fraction of full speed (-1 to 1)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriveCommand {
    pub x: f64,
    pub y: f64,
    pub rot: f64,
    #[serde(default)]
    pub field_relative: bool,
}

impl DriveCommand {
    pub fn new(x: f64, y: f64, rot: f64, field_relative: bool) -> Self {
        Self {
            x,
            y,
            rot,
            field_relative,
        }
    }
}

/// Health status published by the drive loop
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}

/// One wheel's setpoint, for printing or publishing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModuleReport {
    pub position: ModulePosition,
    /// m/s
    pub speed: f64,
    pub angle_degrees: f64,
}

impl ModuleReport {
    pub fn from_states(states: &[SwerveModuleState; 4]) -> [ModuleReport; 4] {
        std::array::from_fn(|i| ModuleReport {
            position: ModulePosition::ALL[i],
            speed: states[i].speed,
            angle_degrees: states[i].angle.degrees(),
        })
    }
}
