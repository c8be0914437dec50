// Single-axis mechanisms built around one motor
//
// Three command styles (duty cycle, position with a goal, velocity) are separate traits so a
// mechanism only exposes what it supports. `GeneralMechanism` supports all three.

use crate::motor::controller::borrow_mut;
use crate::motor::{ControlMode, MotorError, SharedMotor};
use crate::telemetry::{Property, Telemetry, Value};

pub trait DutyCycleSubsystem {
    fn motor(&self) -> &SharedMotor;

    /// Percent output, -1 to 1
    fn set_power(&mut self, power: f64) -> Result<(), MotorError> {
        borrow_mut(self.motor())?.set(power)
    }

    fn power(&self) -> f64 {
        self.motor().borrow().get()
    }
}

pub trait PositionSubsystem {
    fn motor(&self) -> &SharedMotor;

    /// Drive toward `position` and remember it as the goal
    fn set_position(&mut self, position: f64) -> Result<(), MotorError>;

    fn position(&self) -> f64 {
        self.motor().borrow().position()
    }

    /// Last position passed to `set_position`
    fn goal(&self) -> f64;

    /// How far from the goal still counts as there
    fn tolerance(&self) -> f64;

    fn at_goal(&self) -> bool {
        (self.goal() - self.position()).abs() <= self.tolerance()
    }
}

pub trait VelocitySubsystem {
    fn motor(&self) -> &SharedMotor;

    fn set_velocity(&mut self, velocity: f64) -> Result<(), MotorError> {
        borrow_mut(self.motor())?.control(velocity, ControlMode::Velocity)
    }

    fn velocity(&self) -> f64 {
        self.motor().borrow().velocity()
    }
}

pub struct DutyCycleMechanism {
    motor: SharedMotor,
}

impl DutyCycleMechanism {
    pub fn new(motor: SharedMotor) -> Self {
        Self { motor }
    }

    pub fn motor(&self) -> &SharedMotor {
        &self.motor
    }
}

impl DutyCycleSubsystem for DutyCycleMechanism {
    fn motor(&self) -> &SharedMotor {
        &self.motor
    }
}

impl Telemetry for DutyCycleMechanism {
    fn properties() -> Vec<Property<Self>> {
        vec![Property::read("Power", |m: &Self| Value::Number(m.power()))]
    }
}

/// Position-controlled mechanism with a fixed goal tolerance
pub struct PositionMechanism {
    motor: SharedMotor,
    goal: f64,
    tolerance: f64,
}

impl PositionMechanism {
    pub fn new(motor: SharedMotor, tolerance: f64) -> Self {
        Self {
            motor,
            goal: 0.0,
            tolerance,
        }
    }

    pub fn motor(&self) -> &SharedMotor {
        &self.motor
    }
}

impl PositionSubsystem for PositionMechanism {
    fn motor(&self) -> &SharedMotor {
        &self.motor
    }

    fn set_position(&mut self, position: f64) -> Result<(), MotorError> {
        self.goal = position;
        borrow_mut(&self.motor)?.control(position, ControlMode::Position)
    }

    fn goal(&self) -> f64 {
        self.goal
    }

    fn tolerance(&self) -> f64 {
        self.tolerance
    }
}

impl Telemetry for PositionMechanism {
    fn properties() -> Vec<Property<Self>> {
        vec![
            Property::read("Position", |m: &Self| Value::Number(m.position())),
            Property::read("Goal", |m: &Self| Value::Number(m.goal())),
            Property::read("Tolerance", |m: &Self| Value::Number(m.tolerance())),
            Property::read("At Goal", |m: &Self| Value::Bool(m.at_goal())),
        ]
    }
}

pub struct VelocityMechanism {
    motor: SharedMotor,
}

impl VelocityMechanism {
    pub fn new(motor: SharedMotor) -> Self {
        Self { motor }
    }

    pub fn motor(&self) -> &SharedMotor {
        &self.motor
    }
}

impl VelocitySubsystem for VelocityMechanism {
    fn motor(&self) -> &SharedMotor {
        &self.motor
    }
}

impl Telemetry for VelocityMechanism {
    fn properties() -> Vec<Property<Self>> {
        vec![Property::read("Velocity", |m: &Self| Value::Number(m.velocity()))]
    }
}

/// Mechanism that accepts duty cycle, position and velocity commands
pub struct GeneralMechanism {
    motor: SharedMotor,
    goal: f64,
    tolerance: f64,
}

impl GeneralMechanism {
    pub fn new(motor: SharedMotor, tolerance: f64) -> Self {
        Self {
            motor,
            goal: 0.0,
            tolerance,
        }
    }

    pub fn motor(&self) -> &SharedMotor {
        &self.motor
    }
}

impl DutyCycleSubsystem for GeneralMechanism {
    fn motor(&self) -> &SharedMotor {
        &self.motor
    }
}

impl PositionSubsystem for GeneralMechanism {
    fn motor(&self) -> &SharedMotor {
        &self.motor
    }

    fn set_position(&mut self, position: f64) -> Result<(), MotorError> {
        self.goal = position;
        borrow_mut(&self.motor)?.control(position, ControlMode::Position)
    }

    fn goal(&self) -> f64 {
        self.goal
    }

    fn tolerance(&self) -> f64 {
        self.tolerance
    }
}

impl VelocitySubsystem for GeneralMechanism {
    fn motor(&self) -> &SharedMotor {
        &self.motor
    }
}

impl Telemetry for GeneralMechanism {
    fn properties() -> Vec<Property<Self>> {
        vec![
            Property::read("Power", |m: &Self| Value::Number(m.power())),
            Property::read("Position", |m: &Self| Value::Number(m.position())),
            Property::read("Goal", |m: &Self| Value::Number(m.goal())),
            Property::read("Tolerance", |m: &Self| Value::Number(m.tolerance())),
            Property::read("At Goal", |m: &Self| Value::Bool(m.at_goal())),
            Property::read("Velocity", |m: &Self| Value::Number(m.velocity())),
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::motor::{HardwareFamily, MotorController};
    use crate::motor::mock::MockMotor;
    use crate::telemetry::snapshot;

    fn mock() -> Rc<RefCell<MockMotor>> {
        Rc::new(RefCell::new(MockMotor::new(20, HardwareFamily::Rev)))
    }

    #[test]
    fn test_duty_cycle() {
        let motor = mock();
        let mut mechanism = DutyCycleMechanism::new(motor.clone());
        mechanism.set_power(-0.6).unwrap();
        assert_eq!(motor.borrow().last_command(), Some((-0.6, ControlMode::DutyCycle)));
        assert_eq!(mechanism.power(), -0.6);
    }

    #[test]
    fn test_position_goal_and_tolerance() {
        let motor = mock();
        motor.borrow_mut().set_position_conversion_factor(10.0).unwrap();
        let mut arm = PositionMechanism::new(motor.clone(), 0.05);

        arm.set_position(1.2).unwrap();
        assert_eq!(arm.goal(), 1.2);
        assert_eq!(motor.borrow().last_command(), Some((12.0, ControlMode::Position)));
        assert!(!arm.at_goal());

        motor.borrow_mut().raw_position = 11.4;
        assert!(!arm.at_goal());

        motor.borrow_mut().raw_position = 11.6;
        assert!(arm.at_goal());

        motor.borrow_mut().raw_position = 12.4;
        assert!(arm.at_goal());

        // Exactly on the tolerance boundary counts
        let mut exact = PositionMechanism::new(mock(), 0.5);
        exact.set_position(0.5).unwrap();
        assert!(exact.at_goal());
    }

    #[test]
    fn test_velocity() {
        let motor = mock();
        motor.borrow_mut().set_velocity_conversion_factor(2.0).unwrap();
        let mut roller = VelocityMechanism::new(motor.clone());
        roller.set_velocity(3.0).unwrap();
        assert_eq!(motor.borrow().last_command(), Some((6.0, ControlMode::Velocity)));

        motor.borrow_mut().raw_velocity = 5.0;
        assert_eq!(roller.velocity(), 2.5);
    }

    #[test]
    fn test_general_mechanism_supports_every_mode() {
        let motor = mock();
        let mut mechanism = GeneralMechanism::new(motor.clone(), 0.1);
        mechanism.set_power(0.3).unwrap();
        mechanism.set_velocity(1.0).unwrap();
        mechanism.set_position(4.0).unwrap();

        let modes: Vec<ControlMode> = motor.borrow().commands.iter().map(|c| c.1).collect();
        assert_eq!(
            modes,
            [ControlMode::DutyCycle, ControlMode::Velocity, ControlMode::Position]
        );

        motor.borrow_mut().raw_position = 4.05;
        let values = snapshot(&mechanism);
        assert_eq!(values[4], ("At Goal", Value::Bool(true)));
        assert_eq!(values.len(), 6);
    }
}
