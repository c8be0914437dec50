// Control modes and their vendor-specific requests
//
// Each hardware family names its control requests differently; this module is the single
// place where an abstract mode becomes a Rev control type or a Ctre request.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ways a motor controller can be commanded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Percent output, -1 to 1
    DutyCycle,
    /// Output voltage in volts
    Voltage,
    /// Closed-loop position
    Position,
    /// Closed-loop position along a motion profile
    MotionProfiledPosition,
    /// Closed-loop velocity
    Velocity,
    /// Closed-loop velocity along a motion profile
    MotionProfiledVelocity,
}

/// Which conversion factor, if any, scales a command before dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scaling {
    Raw,
    Position,
    Velocity,
}

impl ControlMode {
    pub const ALL: [ControlMode; 6] = [
        ControlMode::DutyCycle,
        ControlMode::Voltage,
        ControlMode::Position,
        ControlMode::MotionProfiledPosition,
        ControlMode::Velocity,
        ControlMode::MotionProfiledVelocity,
    ];

    pub fn scaling(self) -> Scaling {
        match self {
            ControlMode::DutyCycle | ControlMode::Voltage => Scaling::Raw,
            ControlMode::Position | ControlMode::MotionProfiledPosition => Scaling::Position,
            ControlMode::Velocity | ControlMode::MotionProfiledVelocity => Scaling::Velocity,
        }
    }

    /// Convert a command in physical units to raw controller units
    pub fn scale(self, input: f64, position_factor: f64, velocity_factor: f64) -> f64 {
        match self.scaling() {
            Scaling::Raw => input,
            Scaling::Position => input * position_factor,
            Scaling::Velocity => input * velocity_factor,
        }
    }

    /// The Rev closed-loop controller type for this mode
    pub fn to_rev(self) -> RevControlType {
        match self {
            ControlMode::DutyCycle => RevControlType::DutyCycle,
            ControlMode::Voltage => RevControlType::Voltage,
            ControlMode::Position => RevControlType::Position,
            ControlMode::MotionProfiledPosition => RevControlType::MaxMotionPosition,
            ControlMode::Velocity => RevControlType::Velocity,
            ControlMode::MotionProfiledVelocity => RevControlType::MaxMotionVelocity,
        }
    }

    /// The Ctre control request carrying `input` for this mode
    pub fn to_ctre(self, input: f64) -> CtreRequest {
        match self {
            ControlMode::DutyCycle => CtreRequest::DutyCycleOut(input),
            ControlMode::Voltage => CtreRequest::VoltageOut(input),
            ControlMode::Position => CtreRequest::PositionDutyCycle(input),
            ControlMode::MotionProfiledPosition => CtreRequest::MotionMagicDutyCycle(input),
            ControlMode::Velocity => CtreRequest::VelocityDutyCycle(input),
            ControlMode::MotionProfiledVelocity => {
                CtreRequest::MotionMagicVelocityDutyCycle(input)
            }
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlMode::DutyCycle => "duty cycle",
            ControlMode::Voltage => "voltage",
            ControlMode::Position => "position",
            ControlMode::MotionProfiledPosition => "motion profiled position",
            ControlMode::Velocity => "velocity",
            ControlMode::MotionProfiledVelocity => "motion profiled velocity",
        };
        f.write_str(name)
    }
}

/// Rev (Spark) closed-loop reference types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevControlType {
    DutyCycle,
    Voltage,
    Position,
    Velocity,
    MaxMotionPosition,
    MaxMotionVelocity,
}

/// Ctre (Talon) control requests
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CtreRequest {
    DutyCycleOut(f64),
    VoltageOut(f64),
    PositionDutyCycle(f64),
    VelocityDutyCycle(f64),
    MotionMagicDutyCycle(f64),
    MotionMagicVelocityDutyCycle(f64),
    /// Mirror another Talon's output
    Follower { leader_id: u32, opposed: bool },
}
