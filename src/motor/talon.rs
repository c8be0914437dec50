// Ctre TalonFX / TalonFXS backend
//
// Talons accept slot gains at runtime and follow through a dedicated control request.
// Sensor values arrive as status signals that are refreshed on read; a refresh that misses
// its deadline falls back to the last value that did arrive.

use std::cell::Cell;

use tracing::{debug, info, warn};

use super::control::{ControlMode, CtreRequest};
use super::controller::{
    Capabilities, ConversionFactors, HardwareFamily, Leader, MotorController, MotorError,
};
use super::pid::PidGains;

/// Status signals read from a Talon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TalonSignal {
    /// Rotor position in rotations
    Position,
    /// Rotor velocity in rotations per second
    Velocity,
    /// Device temperature in Celsius
    DeviceTemp,
    /// Torque current in amps
    TorqueCurrent,
}

impl TalonSignal {
    const COUNT: usize = 4;

    fn index(self) -> usize {
        match self {
            TalonSignal::Position => 0,
            TalonSignal::Velocity => 1,
            TalonSignal::DeviceTemp => 2,
            TalonSignal::TorqueCurrent => 3,
        }
    }
}

/// Gains written to closed-loop slot 0
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SlotConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Volts (or duty cycle) per unit of requested velocity
    pub kv: f64,
}

impl From<&PidGains> for SlotConfig {
    fn from(gains: &PidGains) -> Self {
        let kv = if gains.kff != 0.0 { 1.0 / gains.kff } else { 0.0 };
        Self {
            kp: gains.kp,
            ki: gains.ki,
            kd: gains.kd,
            kv,
        }
    }
}

/// Firmware handle for one Talon controller
pub trait TalonDevice {
    fn device_id(&self) -> u32;

    fn set_control(&mut self, request: CtreRequest) -> Result<(), MotorError>;

    /// Applied duty cycle, -1 to 1
    fn duty_cycle(&self) -> f64;

    /// Wait for a fresh value of `signal`. `None` when the deadline passes first.
    fn refresh(&self, signal: TalonSignal) -> Option<f64>;

    fn apply_slot0(&mut self, slot: SlotConfig) -> Result<(), MotorError>;

    /// Re-zero the rotor position, in rotations
    fn set_position(&mut self, rotations: f64) -> Result<(), MotorError>;

    fn stop_motor(&mut self);
}

/// Talon-backed [`MotorController`]
pub struct TalonController<D: TalonDevice> {
    device: D,
    factors: ConversionFactors,
    leader: Option<Leader>,
    last_known: [Cell<f64>; TalonSignal::COUNT],
}

impl<D: TalonDevice> TalonController<D> {
    pub fn new(device: D) -> Self {
        info!("Wrapping Talon {}", device.device_id());
        Self {
            device,
            factors: ConversionFactors::default(),
            leader: None,
            last_known: Default::default(),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Fresh signal value, or the last known one if the refresh timed out
    fn read(&self, signal: TalonSignal) -> f64 {
        let slot = &self.last_known[signal.index()];
        match self.device.refresh(signal) {
            Some(value) => {
                slot.set(value);
                value
            }
            None => {
                warn!(
                    "Talon {} {:?} refresh timed out, using last known value {}",
                    self.device.device_id(),
                    signal,
                    slot.get()
                );
                slot.get()
            }
        }
    }
}

impl<D: TalonDevice> MotorController for TalonController<D> {
    fn family(&self) -> HardwareFamily {
        HardwareFamily::Ctre
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            absolute_encoder: false,
            runtime_pid: true,
        }
    }

    fn motor_id(&self) -> u32 {
        self.device.device_id()
    }

    fn control_raw(&mut self, input: f64, mode: ControlMode) -> Result<(), MotorError> {
        self.device.set_control(mode.to_ctre(input))
    }

    fn get(&self) -> f64 {
        self.device.duty_cycle()
    }

    fn temperature(&self) -> f64 {
        self.read(TalonSignal::DeviceTemp)
    }

    fn output_current(&self) -> f64 {
        self.read(TalonSignal::TorqueCurrent)
    }

    fn raw_position(&self) -> f64 {
        self.read(TalonSignal::Position)
    }

    fn raw_velocity(&self) -> f64 {
        self.read(TalonSignal::Velocity)
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

    fn set_pid(&mut self, gains: &PidGains) -> Result<(), MotorError> {
        let slot = SlotConfig::from(gains);
        debug!("Talon {} slot 0 = {:?}", self.motor_id(), slot);
        self.device.apply_slot0(slot)
    }

    fn follow(&mut self, leader: &dyn MotorController, inverted: bool) -> Result<(), MotorError> {
        if leader.family() != HardwareFamily::Ctre {
            return Err(MotorError::FamilyMismatch {
                leader: leader.family(),
                follower: HardwareFamily::Ctre,
            });
        }

        let leader_id = leader.motor_id();
        self.device.set_control(CtreRequest::Follower {
            leader_id,
            opposed: inverted,
        })?;
        self.leader = Some(Leader {
            id: leader_id,
            inverted,
        });

        info!(
            "Talon {} following motor {} (opposed: {})",
            self.motor_id(),
            leader_id,
            inverted
        );
        Ok(())
    }

    fn leader(&self) -> Option<Leader> {
        self.leader
    }

    fn set_encoder_position(&mut self, value: f64) -> Result<(), MotorError> {
        self.device.set_position(value)?;
        self.last_known[TalonSignal::Position.index()].set(value);
        Ok(())
    }

    fn stop(&mut self) {
        self.device.stop_motor();
    }
}
