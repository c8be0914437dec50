// Rev Spark MAX / Spark Flex backend
//
// A Spark holds its closed-loop gains, feedback sensor and follow target in one
// configuration blob that is written as a whole. Changing any of it means rewriting the
// blob, so gains are fixed at construction and following re-applies the stored config.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::control::{ControlMode, RevControlType};
use super::controller::{
    Capabilities, ConversionFactors, HardwareFamily, Leader, MotorController, MotorError,
};
use super::pid::PidGains;

/// Firmware handle for one Spark controller
pub trait SparkDevice {
    fn device_id(&self) -> u32;

    /// Write the full configuration, replacing whatever the device held before
    fn configure(&mut self, config: &SparkConfig) -> Result<(), MotorError>;

    fn set_reference(&mut self, value: f64, control: RevControlType) -> Result<(), MotorError>;

    fn applied_output(&self) -> f64;

    fn motor_temperature(&self) -> f64;

    fn output_current(&self) -> f64;

    /// Primary (relative) encoder position in rotations
    fn encoder_position(&self) -> f64;

    /// Primary (relative) encoder velocity in RPM
    fn encoder_velocity(&self) -> f64;

    fn set_encoder_position(&mut self, value: f64) -> Result<(), MotorError>;

    /// Absolute encoder position, already scaled by the configured conversion factor
    fn absolute_encoder_position(&self) -> f64;

    fn stop_motor(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleMode {
    #[default]
    Brake,
    Coast,
}

/// Sensor the onboard closed loop runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSensor {
    #[default]
    Primary,
    Absolute,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedLoopConfig {
    #[serde(default)]
    pub pid: PidGains,
    #[serde(default)]
    pub feedback_sensor: FeedbackSensor,
    /// (min, max) duty cycle the loop may output
    #[serde(default = "default_output_range")]
    pub output_range: (f64, f64),
    /// Input range the position loop wraps around, if any
    #[serde(default)]
    pub position_wrapping: Option<(f64, f64)>,
}

fn default_output_range() -> (f64, f64) {
    (-1.0, 1.0)
}

impl Default for ClosedLoopConfig {
    fn default() -> Self {
        Self {
            pid: PidGains::default(),
            feedback_sensor: FeedbackSensor::Primary,
            output_range: default_output_range(),
            position_wrapping: None,
        }
    }
}

/// Through-bore encoder on the data port
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbsoluteEncoderConfig {
    #[serde(default)]
    pub inverted: bool,
    pub position_conversion_factor: f64,
    pub velocity_conversion_factor: f64,
}

impl AbsoluteEncoderConfig {
    /// Reports radians and radians per second
    pub fn radians(inverted: bool) -> Self {
        Self {
            inverted,
            position_conversion_factor: std::f64::consts::TAU,
            velocity_conversion_factor: std::f64::consts::TAU / 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SparkConfig {
    #[serde(default)]
    pub inverted: bool,
    #[serde(default)]
    pub idle_mode: IdleMode,
    /// Smart current limit in amps
    #[serde(default)]
    pub smart_current_limit: Option<u32>,
    #[serde(default)]
    pub closed_loop: ClosedLoopConfig,
    #[serde(default)]
    pub absolute_encoder: Option<AbsoluteEncoderConfig>,
    #[serde(skip)]
    pub follow: Option<Leader>,
}

impl SparkConfig {
    /// Steering configuration: closed loop on the absolute encoder, wrapping over one turn
    pub fn steer(pid: PidGains, encoder_inverted: bool) -> Self {
        Self {
            closed_loop: ClosedLoopConfig {
                pid,
                feedback_sensor: FeedbackSensor::Absolute,
                position_wrapping: Some((0.0, std::f64::consts::TAU)),
                ..Default::default()
            },
            absolute_encoder: Some(AbsoluteEncoderConfig::radians(encoder_inverted)),
            ..Default::default()
        }
    }
}

/// Spark-backed [`MotorController`]
pub struct SparkController<D: SparkDevice> {
    device: D,
    config: SparkConfig,
    factors: ConversionFactors,
}

impl<D: SparkDevice> SparkController<D> {
    /// Take ownership of `device` and write `config` to it
    pub fn new(mut device: D, config: SparkConfig) -> Result<Self, MotorError> {
        device.configure(&config)?;
        info!(
            "Configured Spark {} (idle: {:?}, feedback: {:?}, absolute encoder: {})",
            device.device_id(),
            config.idle_mode,
            config.closed_loop.feedback_sensor,
            config.absolute_encoder.is_some()
        );
        Ok(Self {
            device,
            config,
            factors: ConversionFactors::default(),
        })
    }

    pub fn config(&self) -> &SparkConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }
}

impl<D: SparkDevice> MotorController for SparkController<D> {
    fn family(&self) -> HardwareFamily {
        HardwareFamily::Rev
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            absolute_encoder: self.config.absolute_encoder.is_some(),
            runtime_pid: false,
        }
    }

    fn motor_id(&self) -> u32 {
        self.device.device_id()
    }

    fn control_raw(&mut self, input: f64, mode: ControlMode) -> Result<(), MotorError> {
        self.device.set_reference(input, mode.to_rev())
    }

    fn get(&self) -> f64 {
        self.device.applied_output()
    }

    fn temperature(&self) -> f64 {
        self.device.motor_temperature()
    }

    fn output_current(&self) -> f64 {
        self.device.output_current()
    }

    fn raw_position(&self) -> f64 {
        self.device.encoder_position()
    }

    fn raw_velocity(&self) -> f64 {
        self.device.encoder_velocity()
    }

    fn position_conversion_factor(&self) -> f64 {
        self.factors.position
    }

    fn set_position_conversion_factor(&mut self, factor: f64) -> Result<(), MotorError> {
        let id = self.motor_id();
        self.factors.set_position(id, factor)
    }

    fn velocity_conversion_factor(&self) -> f64 {
        self.factors.velocity
    }

    fn set_velocity_conversion_factor(&mut self, factor: f64) -> Result<(), MotorError> {
        let id = self.motor_id();
        self.factors.set_velocity(id, factor)
    }

    fn set_pid(&mut self, _gains: &PidGains) -> Result<(), MotorError> {
        Err(MotorError::Unsupported {
            family: HardwareFamily::Rev,
            operation: "runtime PID configuration",
        })
    }

    fn follow(&mut self, leader: &dyn MotorController, inverted: bool) -> Result<(), MotorError> {
        if leader.family() != HardwareFamily::Rev {
            return Err(MotorError::FamilyMismatch {
                leader: leader.family(),
                follower: HardwareFamily::Rev,
            });
        }

        let target = Leader {
            id: leader.motor_id(),
            inverted,
        };
        let mut config = self.config.clone();
        config.follow = Some(target);
        self.device.configure(&config)?;
        self.config = config;

        info!(
            "Spark {} following motor {} (inverted: {})",
            self.motor_id(),
            target.id,
            inverted
        );
        Ok(())
    }

    fn leader(&self) -> Option<Leader> {
        self.config.follow
    }

    fn set_encoder_position(&mut self, value: f64) -> Result<(), MotorError> {
        debug!("Spark {} encoder position = {}", self.motor_id(), value);
        self.device.set_encoder_position(value)
    }

    fn absolute_position(&self) -> Result<f64, MotorError> {
        match self.config.absolute_encoder {
            Some(_) => Ok(self.device.absolute_encoder_position()),
            None => Err(MotorError::Unsupported {
                family: HardwareFamily::Rev,
                operation: "absolute position without a configured absolute encoder",
            }),
        }
    }

    fn stop(&mut self) {
        self.device.stop_motor();
    }
}
