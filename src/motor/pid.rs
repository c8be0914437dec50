// Tunable PID(F) gains that push themselves to linked motors
//
// A `PidValues` holds weak references to the motors it tunes; changing a gain re-applies
// the whole tuple to every motor that is still alive.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::controller::{MotorController, MotorError, SharedMotor, borrow_mut};
use crate::telemetry::{Property, Telemetry, Value};

/// Plain PID gains plus velocity feedforward
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    #[serde(default)]
    pub kff: f64,
}

impl PidGains {
    pub const fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            kff: 0.0,
        }
    }

    pub const fn with_ff(kp: f64, ki: f64, kd: f64, kff: f64) -> Self {
        Self { kp, ki, kd, kff }
    }
}

/// Mutable PID gains shared by any number of motors
#[derive(Debug, Default)]
pub struct PidValues {
    gains: PidGains,
    linked: Vec<Weak<RefCell<dyn MotorController>>>,
}

impl PidValues {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            linked: Vec::new(),
        }
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn p(&self) -> f64 {
        self.gains.kp
    }

    pub fn i(&self) -> f64 {
        self.gains.ki
    }

    pub fn d(&self) -> f64 {
        self.gains.kd
    }

    pub fn ff(&self) -> f64 {
        self.gains.kff
    }

    pub fn set_p(&mut self, kp: f64) -> Result<(), MotorError> {
        self.gains.kp = kp;
        self.update_linked()
    }

    pub fn set_i(&mut self, ki: f64) -> Result<(), MotorError> {
        self.gains.ki = ki;
        self.update_linked()
    }

    pub fn set_d(&mut self, kd: f64) -> Result<(), MotorError> {
        self.gains.kd = kd;
        self.update_linked()
    }

    pub fn set_ff(&mut self, kff: f64) -> Result<(), MotorError> {
        self.gains.kff = kff;
        self.update_linked()
    }

    /// Replace P, I and D together with a single push
    pub fn set_pid(&mut self, kp: f64, ki: f64, kd: f64) -> Result<(), MotorError> {
        self.gains = PidGains { kp, ki, kd, ..self.gains };
        self.update_linked()
    }

    /// Replace all four gains with a single push
    pub fn set_pidf(&mut self, gains: PidGains) -> Result<(), MotorError> {
        self.gains = gains;
        self.update_linked()
    }

    /// Link a motor and push the current gains to it. Earlier links are kept.
    pub fn link(&mut self, motor: &SharedMotor) -> Result<(), MotorError> {
        self.linked.push(Rc::downgrade(motor));
        let mut motor = borrow_mut(motor)?;
        debug!("Linking PID gains to motor {}", motor.motor_id());
        motor.set_pid(&self.gains)
    }

    /// Stop pushing gains to `motor`. Returns false if it was not linked.
    pub fn unlink(&mut self, motor: &SharedMotor) -> bool {
        let target = Rc::downgrade(motor);
        let before = self.linked.len();
        self.linked.retain(|weak| !Weak::ptr_eq(weak, &target));
        self.linked.len() != before
    }

    /// Number of linked motors that are still alive
    pub fn linked_count(&self) -> usize {
        self.linked.iter().filter(|w| w.strong_count() > 0).count()
    }

    /// Push to every live motor; the first failure is returned after all have been tried
    fn update_linked(&mut self) -> Result<(), MotorError> {
        self.linked.retain(|weak| weak.strong_count() > 0);

        let mut first_error = None;
        for motor in self.linked.iter().filter_map(Weak::upgrade) {
            let result = borrow_mut(&motor).and_then(|mut m| m.set_pid(&self.gains));

            if let Err(e) = result {
                warn!("Failed to apply PID gains to linked motor: {}", e);
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl Telemetry for PidValues {
    fn properties() -> Vec<Property<Self>> {
        vec![
            Property::read_write("P", |p: &Self| Value::Number(p.p()), |p: &mut Self, v: f64| {
                log_failure(p.set_p(v))
            }),
            Property::read_write("I", |p: &Self| Value::Number(p.i()), |p: &mut Self, v: f64| {
                log_failure(p.set_i(v))
            }),
            Property::read_write("D", |p: &Self| Value::Number(p.d()), |p: &mut Self, v: f64| {
                log_failure(p.set_d(v))
            }),
            Property::read_write("FF", |p: &Self| Value::Number(p.ff()), |p: &mut Self, v: f64| {
                log_failure(p.set_ff(v))
            }),
        ]
    }
}

fn log_failure(result: Result<(), MotorError>) {
    if let Err(e) = result {
        warn!("PID update from telemetry not applied everywhere: {}", e);
    }
}
