// In-memory motor controller for tests

use super::control::ControlMode;
use super::controller::{
    Capabilities, ConversionFactors, HardwareFamily, Leader, MotorController, MotorError,
};
use super::pid::PidGains;

/// Records every command and exposes settable raw sensor readings
#[derive(Debug)]
pub struct MockMotor {
    pub id: u32,
    pub family: HardwareFamily,
    pub capabilities: Capabilities,
    pub(crate) factors: ConversionFactors,
    pub commands: Vec<(f64, ControlMode)>,
    pub pid_pushes: Vec<PidGains>,
    pub leader: Option<Leader>,
    pub raw_position: f64,
    pub raw_velocity: f64,
    pub absolute: f64,
    pub output: f64,
    pub temperature: f64,
    pub current: f64,
    pub stopped: u32,
    /// Reject every command with a device error
    pub reject_commands: bool,
}

impl MockMotor {
    pub fn new(id: u32, family: HardwareFamily) -> Self {
        Self {
            id,
            family,
            capabilities: Capabilities {
                absolute_encoder: family == HardwareFamily::Rev,
                runtime_pid: true,
            },
            factors: ConversionFactors::default(),
            commands: Vec::new(),
            pid_pushes: Vec::new(),
            leader: None,
            raw_position: 0.0,
            raw_velocity: 0.0,
            absolute: 0.0,
            output: 0.0,
            temperature: 25.0,
            current: 0.0,
            stopped: 0,
            reject_commands: false,
        }
    }

    pub fn last_command(&self) -> Option<(f64, ControlMode)> {
        self.commands.last().copied()
    }
}

impl MotorController for MockMotor {
    fn family(&self) -> HardwareFamily {
        self.family
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn motor_id(&self) -> u32 {
        self.id
    }

    fn control_raw(&mut self, input: f64, mode: ControlMode) -> Result<(), MotorError> {
        if self.reject_commands {
            return Err(MotorError::Device {
                id: self.id,
                reason: "command rejected".into(),
            });
        }
        if mode == ControlMode::DutyCycle {
            self.output = input;
        }
        self.commands.push((input, mode));
        Ok(())
    }

    fn get(&self) -> f64 {
        self.output
    }

    fn temperature(&self) -> f64 {
        self.temperature
    }

    fn output_current(&self) -> f64 {
        self.current
    }

    fn raw_position(&self) -> f64 {
        self.raw_position
    }

    fn raw_velocity(&self) -> f64 {
        self.raw_velocity
    }

    fn position_conversion_factor(&self) -> f64 {
        self.factors.position
    }

    fn set_position_conversion_factor(&mut self, factor: f64) -> Result<(), MotorError> {
        self.factors.set_position(self.id, factor)
    }

    fn velocity_conversion_factor(&self) -> f64 {
        self.factors.velocity
    }

    fn set_velocity_conversion_factor(&mut self, factor: f64) -> Result<(), MotorError> {
        self.factors.set_velocity(self.id, factor)
    }

    fn set_pid(&mut self, gains: &PidGains) -> Result<(), MotorError> {
        if !self.capabilities.runtime_pid {
            return Err(MotorError::Unsupported {
                family: self.family,
                operation: "runtime PID configuration",
            });
        }
        self.pid_pushes.push(*gains);
        Ok(())
    }

    fn follow(&mut self, leader: &dyn MotorController, inverted: bool) -> Result<(), MotorError> {
        self.leader = Some(Leader {
            id: leader.motor_id(),
            inverted,
        });
        Ok(())
    }

    fn leader(&self) -> Option<Leader> {
        self.leader
    }

    fn set_encoder_position(&mut self, value: f64) -> Result<(), MotorError> {
        self.raw_position = value;
        Ok(())
    }

    fn absolute_position(&self) -> Result<f64, MotorError> {
        if self.capabilities.absolute_encoder {
            Ok(self.absolute)
        } else {
            Err(MotorError::Unsupported {
                family: self.family,
                operation: "absolute position",
            })
        }
    }

    fn stop(&mut self) {
        self.output = 0.0;
        self.stopped += 1;
    }
}
