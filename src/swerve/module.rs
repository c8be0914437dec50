// One swerve module: a drive motor and a steer motor on a shared wheel
//
// Angles come in two frames. The raw (mechanical) angle is what the steer sensor reads;
// the wheel angle is the raw angle minus the module's angular offset, so that zero always
// points the wheel forward. Setpoints arrive in the wheel frame and are shifted into the
// mechanical frame before they reach the steer motor.

use tracing::{debug, warn};

use super::SwerveError;
use super::state::{SwerveModulePosition, SwerveModuleState};
use crate::geometry::{Rotation2d, Translation2d};
use crate::motor::controller::borrow_mut;
use crate::motor::{ControlMode, MotorError, SharedMotor};
use crate::telemetry::{Property, Telemetry, Value};

/// Standalone steering sensor, such as a CAN-connected absolute encoder
pub trait AngleSensor {
    /// Mechanical steering angle
    fn angle(&self) -> Rotation2d;
}

/// Where the module reads its raw steering angle from
pub enum SteerAngleSource {
    /// Steer motor's primary encoder, converted to radians by its position factor
    SteerEncoder,
    /// Absolute encoder wired to the steer motor controller
    SteerAbsoluteEncoder,
    External(Box<dyn AngleSensor>),
}

/// Everything a module is built from
pub struct ModuleHardware {
    pub drive: SharedMotor,
    pub steer: SharedMotor,
    pub angle_source: SteerAngleSource,
    /// Raw angle at which the wheel points forward
    pub angular_offset: Rotation2d,
    /// Where the module sits on the chassis, checked against the drivetrain geometry
    pub location: Option<Translation2d>,
}

pub struct SwerveModule {
    drive: SharedMotor,
    steer: SharedMotor,
    angle_source: SteerAngleSource,
    angular_offset: Rotation2d,
    location: Option<Translation2d>,
    desired_state: Option<SwerveModuleState>,
}

impl SwerveModule {
    /// Build a module and zero its drive encoder
    pub fn new(hardware: ModuleHardware) -> Result<Self, SwerveError> {
        let ModuleHardware {
            drive,
            steer,
            angle_source,
            angular_offset,
            location,
        } = hardware;

        if let SteerAngleSource::SteerAbsoluteEncoder = angle_source {
            let steer = steer.borrow();
            if !steer.capabilities().absolute_encoder {
                return Err(SwerveError::MissingCapability {
                    id: steer.motor_id(),
                    capability: "absolute encoder",
                });
            }
        }

        borrow_mut(&drive)?.set_encoder_position(0.0)?;
        debug!(
            "Module ready: drive {}, steer {}, offset {:.3} rad",
            drive.borrow().motor_id(),
            steer.borrow().motor_id(),
            angular_offset.radians()
        );

        Ok(Self {
            drive,
            steer,
            angle_source,
            angular_offset,
            location,
            desired_state: None,
        })
    }

    pub fn location(&self) -> Option<Translation2d> {
        self.location
    }

    pub fn angular_offset(&self) -> Rotation2d {
        self.angular_offset
    }

    pub fn drive_motor(&self) -> &SharedMotor {
        &self.drive
    }

    pub fn steer_motor(&self) -> &SharedMotor {
        &self.steer
    }

    /// Steering angle as read from the sensor, in radians
    pub fn raw_angle(&self) -> f64 {
        match &self.angle_source {
            SteerAngleSource::SteerEncoder => self.steer.borrow().position(),
            SteerAngleSource::SteerAbsoluteEncoder => {
                let steer = self.steer.borrow();
                steer.absolute_position().unwrap_or_else(|e| {
                    warn!("Absolute steer angle unavailable ({}), using relative encoder", e);
                    steer.position()
                })
            }
            SteerAngleSource::External(sensor) => sensor.angle().radians(),
        }
    }

    /// Steering angle with the offset removed; zero points forward
    pub fn wheel_angle(&self) -> Rotation2d {
        Rotation2d::new(self.raw_angle() - self.angular_offset.radians())
    }

    /// Measured wheel speed and angle
    pub fn state(&self) -> SwerveModuleState {
        SwerveModuleState::new(self.drive_velocity(), self.wheel_angle())
    }

    /// Measured distance and angle
    pub fn position(&self) -> SwerveModulePosition {
        SwerveModulePosition::new(self.drive.borrow().position(), self.wheel_angle())
    }

    /// Last corrected setpoint, in the mechanical frame. `None` until the first command.
    pub fn desired_state(&self) -> Option<SwerveModuleState> {
        self.desired_state
    }

    /// Shift a wheel-frame setpoint into the mechanical frame and take the short way round
    /// from where the wheel is right now.
    ///
    /// The returned angle is not wrapped: it is the equivalent target nearest the raw steer
    /// reading, so a continuous steer encoder never travels more than a quarter turn.
    fn correct(&self, desired: SwerveModuleState) -> SwerveModuleState {
        let raw = self.raw_angle();
        let current = Rotation2d::new(raw);
        let corrected = SwerveModuleState::new(desired.speed, desired.angle + self.angular_offset)
            .optimize(current);
        let target = raw + (corrected.angle - current).radians();
        SwerveModuleState::new(corrected.speed, Rotation2d::new(target))
    }

    /// Closed-loop setpoint: speed in m/s, angle in the wheel frame
    pub fn set_desired_state(&mut self, desired: SwerveModuleState) -> Result<(), MotorError> {
        let state = self.correct(desired);
        borrow_mut(&self.drive)?.control(state.speed, ControlMode::Velocity)?;
        borrow_mut(&self.steer)?.control(state.angle.radians(), ControlMode::Position)?;
        self.desired_state = Some(state);
        Ok(())
    }

    /// Point the wheel at `angle` and drive at `power` percent output
    pub fn drive_raw(&mut self, angle: Rotation2d, power: f64) -> Result<(), MotorError> {
        let state = self.correct(SwerveModuleState::new(power, angle));
        borrow_mut(&self.steer)?.control(state.angle.radians(), ControlMode::Position)?;
        borrow_mut(&self.drive)?.control(state.speed, ControlMode::DutyCycle)?;
        self.desired_state = Some(SwerveModuleState::new(0.0, state.angle));
        Ok(())
    }

    pub fn reset_drive_encoder(&mut self) -> Result<(), MotorError> {
        borrow_mut(&self.drive)?.set_encoder_position(0.0)
    }

    pub fn stop(&mut self) -> Result<(), MotorError> {
        borrow_mut(&self.drive)?.stop();
        borrow_mut(&self.steer)?.stop();
        Ok(())
    }

    pub fn drive_temperature(&self) -> f64 {
        self.drive.borrow().temperature()
    }

    pub fn steer_temperature(&self) -> f64 {
        self.steer.borrow().temperature()
    }

    pub fn drive_current(&self) -> f64 {
        self.drive.borrow().output_current()
    }

    pub fn steer_current(&self) -> f64 {
        self.steer.borrow().output_current()
    }

    pub fn drive_velocity(&self) -> f64 {
        self.drive.borrow().velocity()
    }

    pub fn desired_speed(&self) -> f64 {
        self.desired_state.map_or(0.0, |s| s.speed)
    }

    pub fn desired_angle_degrees(&self) -> f64 {
        self.desired_state.map_or(0.0, |s| s.angle.degrees())
    }
}

impl Telemetry for SwerveModule {
    fn properties() -> Vec<Property<Self>> {
        vec![
            Property::read("Module Angle", |m: &Self| {
                Value::Number(m.wheel_angle().radians())
            }),
            Property::read("Raw Module Angle", |m: &Self| Value::Number(m.raw_angle())),
            Property::read("Drive Temperature", |m: &Self| {
                Value::Number(m.drive_temperature())
            }),
            Property::read("Turn Temperature", |m: &Self| {
                Value::Number(m.steer_temperature())
            }),
            Property::read("Drive Current", |m: &Self| Value::Number(m.drive_current())),
            Property::read("Turn Current", |m: &Self| Value::Number(m.steer_current())),
            Property::read("Desired Speed", |m: &Self| Value::Number(m.desired_speed())),
            Property::read("Desired Angle", |m: &Self| {
                Value::Number(m.desired_angle_degrees())
            }),
            Property::read("Drive Velocity", |m: &Self| Value::Number(m.drive_velocity())),
        ]
    }
}
