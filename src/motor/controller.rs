// Generic motor controller interface
//
// One implementation per hardware family wraps a vendor device handle. Everything above
// this layer (modules, mechanisms, PID sets) talks to `dyn MotorController` only.

use std::cell::{RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::control::ControlMode;
use super::pid::PidGains;
use super::ratio::GearRatio;
use crate::telemetry::{Property, Telemetry, Value};

/// Motor controller shared between its owner and any PID sets linked to it
pub type SharedMotor = Rc<RefCell<dyn MotorController>>;

/// Wrap a controller for shared use
pub fn shared<M: MotorController + 'static>(motor: M) -> SharedMotor {
    Rc::new(RefCell::new(motor))
}

/// Vendor families behind the controller interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareFamily {
    /// Spark MAX / Spark Flex
    Rev,
    /// TalonFX / TalonFXS
    Ctre,
}

impl fmt::Display for HardwareFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareFamily::Rev => f.write_str("Rev"),
            HardwareFamily::Ctre => f.write_str("Ctre"),
        }
    }
}

/// Optional features a controller instance supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// `absolute_position` returns a reading
    pub absolute_encoder: bool,
    /// `set_pid` applies gains without a full reconfigure
    pub runtime_pid: bool,
}

/// The motor a follower mirrors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leader {
    pub id: u32,
    pub inverted: bool,
}

/// Error types for motor control
#[derive(Debug, thiserror::Error)]
pub enum MotorError {
    #[error("{operation} is not supported by {family} motor controllers")]
    Unsupported {
        family: HardwareFamily,
        operation: &'static str,
    },

    #[error("{follower} motor cannot follow a {leader} motor")]
    FamilyMismatch {
        leader: HardwareFamily,
        follower: HardwareFamily,
    },

    #[error("Invalid conversion factor {0}: must be finite and non-zero")]
    InvalidConversionFactor(f64),

    #[error("Motor {id} rejected the request: {reason}")]
    Device { id: u32, reason: String },

    #[error("Motor controller is already borrowed")]
    Busy,
}

/// Interface for controlling and reading one motor and its onboard sensor.
///
/// Conversion factors are raw units per physical unit: commands are multiplied by them,
/// readings are divided by them.
pub trait MotorController {
    fn family(&self) -> HardwareFamily;

    fn capabilities(&self) -> Capabilities;

    /// CAN bus ID
    fn motor_id(&self) -> u32;

    /// Send `input` to the hardware in the given mode, without conversion
    fn control_raw(&mut self, input: f64, mode: ControlMode) -> Result<(), MotorError>;

    /// Send `input` in physical units, scaled by the conversion factor the mode uses
    fn control(&mut self, input: f64, mode: ControlMode) -> Result<(), MotorError> {
        let raw = mode.scale(
            input,
            self.position_conversion_factor(),
            self.velocity_conversion_factor(),
        );
        self.control_raw(raw, mode)
    }

    /// Set percent output, -1 to 1
    fn set(&mut self, power: f64) -> Result<(), MotorError> {
        self.control(power, ControlMode::DutyCycle)
    }

    /// Current percent output as reported by the controller
    fn get(&self) -> f64;

    /// Motor temperature in Celsius
    fn temperature(&self) -> f64;

    /// Output current in amps
    fn output_current(&self) -> f64;

    fn raw_position(&self) -> f64;

    fn raw_velocity(&self) -> f64;

    fn position(&self) -> f64 {
        self.raw_position() / self.position_conversion_factor()
    }

    fn velocity(&self) -> f64 {
        self.raw_velocity() / self.velocity_conversion_factor()
    }

    fn position_conversion_factor(&self) -> f64;

    fn set_position_conversion_factor(&mut self, factor: f64) -> Result<(), MotorError>;

    fn set_position_ratio(&mut self, ratio: &GearRatio) -> Result<(), MotorError> {
        self.set_position_conversion_factor(ratio.conversion_factor())
    }

    fn velocity_conversion_factor(&self) -> f64;

    fn set_velocity_conversion_factor(&mut self, factor: f64) -> Result<(), MotorError>;

    fn set_velocity_ratio(&mut self, ratio: &GearRatio) -> Result<(), MotorError> {
        self.set_velocity_conversion_factor(ratio.conversion_factor())
    }

    /// Push gains to closed-loop slot 0
    fn set_pid(&mut self, gains: &PidGains) -> Result<(), MotorError>;

    /// Mirror `leader`'s output. Independent commands sent to a follower afterwards have
    /// no defined effect.
    fn follow(&mut self, leader: &dyn MotorController, inverted: bool) -> Result<(), MotorError>;

    fn leader(&self) -> Option<Leader>;

    /// Re-zero the encoder. Does not move the motor.
    fn set_encoder_position(&mut self, value: f64) -> Result<(), MotorError>;

    /// Absolute encoder reading, for controllers that have one
    fn absolute_position(&self) -> Result<f64, MotorError> {
        Err(MotorError::Unsupported {
            family: self.family(),
            operation: "absolute position",
        })
    }

    /// Command zero output regardless of the current mode
    fn stop(&mut self);
}

/// Borrow a shared motor for a command, failing instead of panicking if it is in use
pub fn borrow_mut(
    motor: &SharedMotor,
) -> Result<RefMut<'_, dyn MotorController + 'static>, MotorError> {
    motor.try_borrow_mut().map_err(|_| MotorError::Busy)
}

/// Make `follower` mirror `leader`
pub fn add_follower(
    leader: &SharedMotor,
    follower: &SharedMotor,
    inverted: bool,
) -> Result<(), MotorError> {
    let leader = leader.try_borrow().map_err(|_| MotorError::Busy)?;
    let mut follower = borrow_mut(follower)?;
    follower.follow(&*leader, inverted)
}

/// Position and velocity factors with the non-zero invariant enforced
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ConversionFactors {
    pub position: f64,
    pub velocity: f64,
}

impl ConversionFactors {
    pub fn set_position(&mut self, id: u32, factor: f64) -> Result<(), MotorError> {
        self.position = checked_factor(factor)?;
        debug!("Motor {} position conversion factor = {}", id, factor);
        Ok(())
    }

    pub fn set_velocity(&mut self, id: u32, factor: f64) -> Result<(), MotorError> {
        self.velocity = checked_factor(factor)?;
        debug!("Motor {} velocity conversion factor = {}", id, factor);
        Ok(())
    }
}

impl Default for ConversionFactors {
    fn default() -> Self {
        Self {
            position: 1.0,
            velocity: 1.0,
        }
    }
}

fn checked_factor(factor: f64) -> Result<f64, MotorError> {
    if factor.is_finite() && factor != 0.0 {
        Ok(factor)
    } else {
        Err(MotorError::InvalidConversionFactor(factor))
    }
}

impl Telemetry for dyn MotorController {
    fn properties() -> Vec<Property<Self>> {
        vec![
            Property::read("Motor ID", |m: &Self| Value::Number(m.motor_id() as f64)),
            Property::read("Power", |m: &Self| Value::Number(m.get())),
            Property::read("Temperature", |m: &Self| Value::Number(m.temperature())),
            Property::read("Output Current", |m: &Self| {
                Value::Number(m.output_current())
            }),
            Property::read("Position", |m: &Self| Value::Number(m.position())),
            Property::read("Velocity", |m: &Self| Value::Number(m.velocity())),
            Property::read("Conversion Factor", |m: &Self| {
                Value::Number(m.position_conversion_factor())
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::mock::MockMotor;
    use crate::telemetry::snapshot;

    #[test]
    fn test_control_scales_by_mode() {
        let mut motor = MockMotor::new(1, HardwareFamily::Rev);
        motor.set_position_conversion_factor(2.0).unwrap();
        motor.set_velocity_conversion_factor(10.0).unwrap();

        motor.control(3.0, ControlMode::Position).unwrap();
        motor.control(3.0, ControlMode::Velocity).unwrap();
        motor.control(0.5, ControlMode::DutyCycle).unwrap();
        motor.set(-0.25).unwrap();

        assert_eq!(
            motor.commands,
            vec![
                (6.0, ControlMode::Position),
                (30.0, ControlMode::Velocity),
                (0.5, ControlMode::DutyCycle),
                (-0.25, ControlMode::DutyCycle),
            ]
        );
    }

    #[test]
    fn test_readings_divide_by_factor() {
        let mut motor = MockMotor::new(1, HardwareFamily::Ctre);
        motor.raw_position = 12.0;
        motor.raw_velocity = 60.0;
        motor.set_position_ratio(&GearRatio::new(1.0, 4.0).unwrap()).unwrap();
        motor.set_velocity_conversion_factor(6.0).unwrap();

        assert_eq!(motor.position(), 3.0);
        assert_eq!(motor.velocity(), 10.0);
        // Reads have no side effects
        assert_eq!(motor.position(), motor.position());
    }

    #[test]
    fn test_zero_conversion_factor_rejected() {
        let mut motor = MockMotor::new(1, HardwareFamily::Rev);
        assert!(matches!(
            motor.set_position_conversion_factor(0.0),
            Err(MotorError::InvalidConversionFactor(_))
        ));
        assert!(motor.set_velocity_conversion_factor(f64::NAN).is_err());
        assert_eq!(motor.position_conversion_factor(), 1.0);
    }

    #[test]
    fn test_add_follower_links_by_id() {
        let leader = shared(MockMotor::new(3, HardwareFamily::Ctre));
        let follower = shared(MockMotor::new(4, HardwareFamily::Ctre));
        add_follower(&leader, &follower, true).unwrap();

        assert_eq!(
            follower.borrow().leader(),
            Some(Leader {
                id: 3,
                inverted: true
            })
        );
    }

    #[test]
    fn test_follow_self_is_busy() {
        let motor = shared(MockMotor::new(3, HardwareFamily::Ctre));
        assert!(matches!(
            add_follower(&motor, &motor, false),
            Err(MotorError::Busy)
        ));
    }

    #[test]
    fn test_borrow_mut_commands_or_reports_busy() {
        let motor = shared(MockMotor::new(5, HardwareFamily::Rev));
        borrow_mut(&motor).unwrap().set(0.4).unwrap();
        assert_eq!(motor.borrow().get(), 0.4);

        let _held = motor.borrow();
        assert!(matches!(borrow_mut(&motor), Err(MotorError::Busy)));
    }

    #[test]
    fn test_telemetry_keys() {
        let motor = shared(MockMotor::new(9, HardwareFamily::Rev));
        let values = snapshot(&*motor.borrow());
        let keys: Vec<&str> = values.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            [
                "Motor ID",
                "Power",
                "Temperature",
                "Output Current",
                "Position",
                "Velocity",
                "Conversion Factor"
            ]
        );
        assert_eq!(values[0].1, Value::Number(9.0));
    }
}
