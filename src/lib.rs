// Swerve drivetrain control stack
//
// Provides:
// - A motor controller abstraction over two hardware families
// - Per-wheel swerve modules with shortest-path steering
// - Chassis kinematics, odometry and field-relative driving
// - Single-axis mechanisms with goal tolerance

pub mod config;
pub mod geometry;
pub mod messages;
pub mod motor;
pub mod runtime;
pub mod subsystem;
pub mod swerve;
pub mod telemetry;
