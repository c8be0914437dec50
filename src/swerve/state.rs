// Module states and chassis speeds

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::geometry::{Pose2d, Rotation2d, Translation2d};

/// Wheel speed and steering angle of one module
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SwerveModuleState {
    /// m/s, signed
    pub speed: f64,
    pub angle: Rotation2d,
}

impl SwerveModuleState {
    pub fn new(speed: f64, angle: Rotation2d) -> Self {
        Self { speed, angle }
    }

    /// The equivalent state that needs at most a quarter turn from `current`.
    ///
    /// Anything further than 90 degrees away is reached by pointing the wheel the other way
    /// and reversing the drive direction.
    pub fn optimize(self, current: Rotation2d) -> Self {
        let delta = self.angle - current;
        if delta.cos() < 0.0 {
            Self {
                speed: -self.speed,
                angle: self.angle.rotate_by(Rotation2d::new(PI)),
            }
        } else {
            self
        }
    }
}

/// Distance driven and steering angle of one module
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SwerveModulePosition {
    /// Meters, as reported by the drive encoder
    pub distance: f64,
    pub angle: Rotation2d,
}

impl SwerveModulePosition {
    pub fn new(distance: f64, angle: Rotation2d) -> Self {
        Self { distance, angle }
    }
}

/// Chassis velocity: vx forward and vy left in m/s, omega counter-clockwise in rad/s
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChassisSpeeds {
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

impl ChassisSpeeds {
    pub const fn new(vx: f64, vy: f64, omega: f64) -> Self {
        Self { vx, vy, omega }
    }

    pub fn is_zero(&self) -> bool {
        self.vx == 0.0 && self.vy == 0.0 && self.omega == 0.0
    }

    /// Correct for translating and rotating at once over a period of `dt` seconds.
    ///
    /// Returns the constant speeds that, held for `dt`, end at the pose the input speeds
    /// would reach if translation and rotation were applied along a straight line.
    pub fn discretize(self, dt: f64) -> Self {
        let desired = Pose2d::new(
            self.vx * dt,
            self.vy * dt,
            Rotation2d::new(self.omega * dt),
        );
        let twist = Pose2d::default().log(&desired);
        Self {
            vx: twist.dx / dt,
            vy: twist.dy / dt,
            omega: twist.dtheta / dt,
        }
    }

    /// Field-frame speeds to robot-frame speeds for a robot facing `heading`
    pub fn from_field_relative(self, heading: Rotation2d) -> Self {
        let v = Translation2d::new(self.vx, self.vy).rotate_by(-heading);
        Self {
            vx: v.x,
            vy: v.y,
            omega: self.omega,
        }
    }

    /// Robot-frame speeds to field-frame speeds for a robot facing `heading`
    pub fn to_field_relative(self, heading: Rotation2d) -> Self {
        let v = Translation2d::new(self.vx, self.vy).rotate_by(heading);
        Self {
            vx: v.x,
            vy: v.y,
            omega: self.omega,
        }
    }
}

/// Scale all wheel speeds down together so none exceeds `max_speed`
pub fn desaturate_wheel_speeds(states: &mut [SwerveModuleState], max_speed: f64) {
    let fastest = states.iter().map(|s| s.speed.abs()).fold(0.0, f64::max);
    if fastest > max_speed {
        let scale = max_speed / fastest;
        for state in states {
            state.speed *= scale;
        }
    }
}
