// Motor control layer
//
// Provides:
// - Gear ratio / conversion factor arithmetic
// - Control modes and their vendor request mapping
// - A generic motor controller over the Rev (Spark) and Ctre (Talon) families
// - Shared PID gain sets linked to any number of motors

pub mod control;
pub mod controller;
pub mod pid;
pub mod ratio;
pub mod spark;
pub mod talon;

#[cfg(test)]
pub(crate) mod mock;

pub use control::ControlMode;
pub use controller::{
    Capabilities, HardwareFamily, Leader, MotorController, MotorError, SharedMotor, add_follower,
    shared,
};
pub use pid::{PidGains, PidValues};
pub use ratio::{GearRatio, RatioError};
pub use spark::{SparkConfig, SparkController, SparkDevice};
pub use talon::{SlotConfig, TalonController, TalonDevice, TalonSignal};
