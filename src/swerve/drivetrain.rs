// Four-module swerve drivetrain
//
// Owns the modules, the kinematics derived from the configured wheel locations and the
// odometry estimate. `periodic` must run once per control tick before anything reads the
// pose in that tick.

use tracing::{debug, info};

use super::kinematics::SwerveKinematics;
use super::module::SwerveModule;
use super::odometry::SwerveOdometry;
use super::state::{
    ChassisSpeeds, SwerveModulePosition, SwerveModuleState, desaturate_wheel_speeds,
};
use super::{ModulePosition, SwerveError};
use crate::config::DriveTrainConfig;
use crate::geometry::{Pose2d, Rotation2d};
use crate::telemetry::{Property, Telemetry, Value};

/// Wheel locations closer than this to the configured ones are considered the same
const LOCATION_TOLERANCE: f64 = 1e-6;

/// Robot heading source (gyro / IMU)
pub trait HeadingSensor {
    /// Heading in degrees as the sensor reports it, before any sign correction
    fn raw_heading(&self) -> f64;
}

impl<F: Fn() -> f64> HeadingSensor for F {
    fn raw_heading(&self) -> f64 {
        self()
    }
}

/// What a path follower needs from a holonomic drivetrain
pub trait HolonomicDrive {
    fn pose(&self) -> Pose2d;

    fn reset_pose(&mut self, pose: Pose2d);

    fn robot_relative_speeds(&self) -> ChassisSpeeds;

    fn drive_robot_relative(&mut self, speeds: ChassisSpeeds) -> Result<(), SwerveError>;
}

/// Turn fractional stick inputs (-1 to 1) into robot-frame chassis speeds.
///
/// `heading` is the corrected robot heading; it is only used when `field_relative` is set.
pub fn command_speeds(
    config: &DriveTrainConfig,
    heading: Rotation2d,
    x: f64,
    y: f64,
    rot: f64,
    field_relative: bool,
) -> ChassisSpeeds {
    let speeds = ChassisSpeeds::new(
        x * config.max_speed,
        y * config.max_speed,
        rot * config.max_angular_speed,
    );
    if field_relative {
        speeds.from_field_relative(heading)
    } else {
        speeds
    }
}

/// Module setpoints for robot-frame `speeds`: discretized over one loop period, then
/// desaturated if a per-wheel cap is configured
pub fn module_setpoints(
    config: &DriveTrainConfig,
    kinematics: &SwerveKinematics,
    speeds: ChassisSpeeds,
) -> [SwerveModuleState; 4] {
    let mut states = kinematics.to_module_states(speeds.discretize(config.loop_period));
    if let Some(cap) = config.max_module_speed {
        desaturate_wheel_speeds(&mut states, cap);
    }
    states
}

pub struct SwerveDrivetrain<G: HeadingSensor> {
    modules: [SwerveModule; 4],
    kinematics: SwerveKinematics,
    odometry: SwerveOdometry,
    config: DriveTrainConfig,
    gyro: G,
}

impl<G: HeadingSensor> SwerveDrivetrain<G> {
    /// `modules` are in [`ModulePosition::ALL`] order
    pub fn new(
        modules: [SwerveModule; 4],
        gyro: G,
        config: DriveTrainConfig,
    ) -> Result<Self, SwerveError> {
        config.validate()?;
        let locations = config.wheel_locations.translations();

        for (position, (module, configured)) in
            ModulePosition::ALL.into_iter().zip(modules.iter().zip(locations))
        {
            if let Some(declared) = module.location() {
                if declared.distance(&configured) > LOCATION_TOLERANCE {
                    return Err(SwerveError::ModuleLocationMismatch {
                        position,
                        declared,
                        configured,
                    });
                }
            }
        }

        let kinematics = SwerveKinematics::new(locations)?;
        let heading = Rotation2d::from_degrees(config.corrected_heading(gyro.raw_heading()));
        let positions = modules.each_ref().map(|m| m.position());
        let odometry =
            SwerveOdometry::new(kinematics.clone(), heading, positions, Pose2d::default());

        info!(
            "Swerve drivetrain ready: max {:.2} m/s, {:.2} rad/s, gyro reversed: {}",
            config.max_speed, config.max_angular_speed, config.gyro_reversed
        );

        Ok(Self {
            modules,
            kinematics,
            odometry,
            config,
            gyro,
        })
    }

    pub fn config(&self) -> &DriveTrainConfig {
        &self.config
    }

    pub fn kinematics(&self) -> &SwerveKinematics {
        &self.kinematics
    }

    pub fn module(&self, position: ModulePosition) -> &SwerveModule {
        &self.modules[position.index()]
    }

    pub fn modules(&self) -> &[SwerveModule; 4] {
        &self.modules
    }

    /// Heading in degrees as the sensor reports it
    pub fn raw_heading(&self) -> f64 {
        self.gyro.raw_heading()
    }

    /// Heading in degrees, counter-clockwise positive, with `gyro_reversed` applied
    pub fn heading(&self) -> f64 {
        self.config.corrected_heading(self.raw_heading())
    }

    pub fn heading_rotation(&self) -> Rotation2d {
        Rotation2d::from_degrees(self.heading())
    }

    /// Once per tick: fold the latest gyro and wheel readings into the pose
    pub fn periodic(&mut self) {
        let heading = self.heading_rotation();
        let positions = self.module_positions();
        self.odometry.update(heading, positions);
    }

    pub fn pose(&self) -> Pose2d {
        self.odometry.pose()
    }

    /// Jump the pose estimate to `pose`
    pub fn reset_pose(&mut self, pose: Pose2d) {
        let heading = self.heading_rotation();
        let positions = self.module_positions();
        self.odometry.reset_position(heading, positions, pose);
        info!(
            "Pose reset to ({:.3}, {:.3}, {:.1} deg)",
            pose.x(),
            pose.y(),
            pose.rotation.degrees()
        );
    }

    pub fn module_states(&self) -> [SwerveModuleState; 4] {
        self.modules.each_ref().map(|m| m.state())
    }

    pub fn module_positions(&self) -> [SwerveModulePosition; 4] {
        self.modules.each_ref().map(|m| m.position())
    }

    /// Measured robot-frame chassis speeds
    pub fn relative_speeds(&self) -> ChassisSpeeds {
        self.kinematics.to_chassis_speeds(&self.module_states())
    }

    /// Closed-loop drive from robot-frame speeds.
    ///
    /// Zero speeds hold every wheel at its current angle instead of snapping them forward.
    pub fn drive_relative(&mut self, speeds: ChassisSpeeds) -> Result<(), SwerveError> {
        let states = if speeds.is_zero() {
            self.modules
                .each_ref()
                .map(|m| SwerveModuleState::new(0.0, m.wheel_angle()))
        } else {
            module_setpoints(&self.config, &self.kinematics, speeds)
        };

        debug!("Module setpoints: {:?}", states);
        for (module, state) in self.modules.iter_mut().zip(states) {
            module.set_desired_state(state)?;
        }
        Ok(())
    }

    /// Closed-loop drive from fractional inputs, -1 to 1 on each axis
    pub fn drive(
        &mut self,
        x: f64,
        y: f64,
        rot: f64,
        field_relative: bool,
    ) -> Result<(), SwerveError> {
        let heading = self.heading_rotation();
        let speeds = command_speeds(&self.config, heading, x, y, rot, field_relative);
        self.drive_relative(speeds)
    }

    /// Open-loop drive: each axis is a duty cycle fraction rather than a speed
    pub fn drive_raw(
        &mut self,
        x: f64,
        y: f64,
        rot: f64,
        field_relative: bool,
    ) -> Result<(), SwerveError> {
        let mut speeds = ChassisSpeeds::new(x, y, rot);
        if field_relative {
            speeds = speeds.from_field_relative(self.heading_rotation());
        }

        let states = self.kinematics.to_module_states(speeds);
        for (module, state) in self.modules.iter_mut().zip(states) {
            module.drive_raw(state.angle, state.speed)?;
        }
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), SwerveError> {
        for module in &mut self.modules {
            module.stop()?;
        }
        Ok(())
    }

    pub fn reset_drive_encoders(&mut self) -> Result<(), SwerveError> {
        for module in &mut self.modules {
            module.reset_drive_encoder()?;
        }
        Ok(())
    }
}

impl<G: HeadingSensor> HolonomicDrive for SwerveDrivetrain<G> {
    fn pose(&self) -> Pose2d {
        SwerveDrivetrain::pose(self)
    }

    fn reset_pose(&mut self, pose: Pose2d) {
        SwerveDrivetrain::reset_pose(self, pose)
    }

    fn robot_relative_speeds(&self) -> ChassisSpeeds {
        self.relative_speeds()
    }

    fn drive_robot_relative(&mut self, speeds: ChassisSpeeds) -> Result<(), SwerveError> {
        self.drive_relative(speeds)
    }
}

impl<G: HeadingSensor> Telemetry for SwerveDrivetrain<G> {
    fn properties() -> Vec<Property<Self>> {
        vec![
            Property::read("Raw Heading", |d: &Self| Value::Number(d.raw_heading())),
            Property::read("Heading", |d: &Self| Value::Number(d.heading())),
            Property::read("Pose X", |d: &Self| Value::Number(d.pose().x())),
            Property::read("Pose Y", |d: &Self| Value::Number(d.pose().y())),
            Property::read("Pose Heading", |d: &Self| {
                Value::Number(d.pose().rotation.degrees())
            }),
        ]
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::{Cell, RefCell};
    use std::f64::consts::PI;
    use std::rc::Rc;

    use super::*;
    use crate::config::WheelLocations;
    use crate::geometry::Translation2d;
    use crate::motor::ControlMode;
    use crate::motor::mock::MockMotor;
    use crate::swerve::module::tests::test_module;
    use crate::swerve::module::{ModuleHardware, SteerAngleSource};
    use crate::telemetry::snapshot;
    use approx::assert_abs_diff_eq;

    /// Gyro whose reading the test can change
    #[derive(Clone, Default)]
    pub(crate) struct FakeGyro(pub Rc<Cell<f64>>);

    impl HeadingSensor for FakeGyro {
        fn raw_heading(&self) -> f64 {
            self.0.get()
        }
    }

    pub(crate) struct Motors {
        pub drive: Rc<RefCell<MockMotor>>,
        pub steer: Rc<RefCell<MockMotor>>,
    }

    pub(crate) struct Rig {
        pub drivetrain: SwerveDrivetrain<FakeGyro>,
        pub gyro: FakeGyro,
        pub mocks: Vec<Motors>,
    }

    pub(crate) fn build(config: DriveTrainConfig) -> Rig {
        let mut mocks = Vec::new();
        let modules = std::array::from_fn(|i| {
            let t = test_module(10 * i as u32 + 1, 0.0);
            mocks.push(Motors {
                drive: t.drive,
                steer: t.steer,
            });
            t.module
        });
        let gyro = FakeGyro::default();
        let drivetrain = SwerveDrivetrain::new(modules, gyro.clone(), config).unwrap();
        Rig {
            drivetrain,
            gyro,
            mocks,
        }
    }

    pub(crate) fn square_config() -> DriveTrainConfig {
        DriveTrainConfig::new(WheelLocations::rectangular(0.6, 0.6), 4.0, 2.0 * PI)
    }

    fn commanded(rig: &Rig) -> Vec<(f64, f64)> {
        rig.mocks
            .iter()
            .map(|t| {
                let (speed, drive_mode) = t.drive.borrow().last_command().unwrap();
                let (angle, steer_mode) = t.steer.borrow().last_command().unwrap();
                assert_eq!(drive_mode, ControlMode::Velocity);
                assert_eq!(steer_mode, ControlMode::Position);
                (speed, angle)
            })
            .collect()
    }

    #[test]
    fn test_full_forward() {
        let mut rig = build(square_config());
        rig.drivetrain.drive(1.0, 0.0, 0.0, false).unwrap();

        for (speed, angle) in commanded(&rig) {
            assert_abs_diff_eq!(speed, 4.0, epsilon = 1e-9);
            assert_abs_diff_eq!(angle, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_full_rotation_on_square_chassis() {
        let mut rig = build(square_config());
        // Put each wheel at its tangent direction so optimization leaves the angles alone
        for (t, degrees) in rig.mocks.iter().zip([135.0, 45.0, -135.0, -45.0]) {
            t.steer.borrow_mut().raw_position = f64::to_radians(degrees);
        }
        rig.drivetrain.drive(0.0, 0.0, 1.0, false).unwrap();

        let out = commanded(&rig);
        let (fl, br) = (out[0], out[3]);
        assert_abs_diff_eq!(fl.1.to_degrees(), 135.0, epsilon = 1e-3);
        assert_abs_diff_eq!(br.1.to_degrees(), -45.0, epsilon = 1e-3);
        assert_abs_diff_eq!(fl.0, br.0, epsilon = 1e-9);
        assert!(fl.0 > 0.0);
    }

    #[test]
    fn test_field_relative_sign() {
        let mut rig = build(square_config());
        rig.gyro.0.set(90.0);
        let speeds = command_speeds(
            rig.drivetrain.config(),
            rig.drivetrain.heading_rotation(),
            0.25,
            0.0,
            0.0,
            true,
        );
        assert_abs_diff_eq!(speeds.vx, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(speeds.vy, -1.0, epsilon = 1e-12);

        // Reversed gyro: the same reading means the robot faces -90 degrees
        let mut config = square_config();
        config.gyro_reversed = true;
        rig = build(config);
        rig.gyro.0.set(90.0);
        assert_eq!(rig.drivetrain.heading(), -90.0);
        let speeds = command_speeds(
            rig.drivetrain.config(),
            rig.drivetrain.heading_rotation(),
            0.25,
            0.0,
            0.0,
            true,
        );
        assert_abs_diff_eq!(speeds.vy, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_speed_holds_wheel_angle() {
        let mut rig = build(square_config());
        for t in &rig.mocks {
            t.steer.borrow_mut().raw_position = 0.7;
        }
        rig.drivetrain.drive(0.0, 0.0, 0.0, true).unwrap();

        for (speed, angle) in commanded(&rig) {
            assert_eq!(speed, 0.0);
            assert_abs_diff_eq!(angle, 0.7, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_reset_pose_is_exact() {
        let mut rig = build(square_config());
        rig.gyro.0.set(33.0);
        for t in &rig.mocks {
            t.drive.borrow_mut().raw_position = 1.8;
        }
        rig.drivetrain.periodic();

        let target = Pose2d::new(1.0, -2.0, Rotation2d::from_degrees(45.0));
        rig.drivetrain.reset_pose(target);
        assert_eq!(rig.drivetrain.pose(), target);
        assert_eq!(HolonomicDrive::pose(&rig.drivetrain), target);
    }

    #[test]
    fn test_periodic_tracks_wheel_travel() {
        let mut rig = build(square_config());
        for t in &rig.mocks {
            t.drive.borrow_mut().raw_position = 0.5;
        }
        rig.drivetrain.periodic();
        assert_abs_diff_eq!(rig.drivetrain.pose().x(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(rig.drivetrain.pose().y(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_relative_speeds_from_measured_states() {
        let rig = build(square_config());
        for t in &rig.mocks {
            t.drive.borrow_mut().raw_velocity = 1.5;
            t.steer.borrow_mut().raw_position = PI / 2.0;
        }
        let speeds = rig.drivetrain.relative_speeds();
        assert_abs_diff_eq!(speeds.vx, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(speeds.vy, 1.5, epsilon = 1e-9);
        assert_abs_diff_eq!(speeds.omega, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_desaturation_cap() {
        let config = DriveTrainConfig {
            max_module_speed: Some(3.0),
            ..square_config()
        };
        let mut rig = build(config);
        rig.drivetrain.drive(1.0, 0.0, 0.0, false).unwrap();
        for (speed, _) in commanded(&rig) {
            assert_abs_diff_eq!(speed, 3.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_drive_raw_uses_duty_cycle() {
        let mut rig = build(square_config());
        rig.drivetrain.drive_raw(0.4, 0.0, 0.0, false).unwrap();
        for t in &rig.mocks {
            let (power, mode) = t.drive.borrow().last_command().unwrap();
            assert_eq!(mode, ControlMode::DutyCycle);
            assert_abs_diff_eq!(power, 0.4, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_stop_and_reset_encoders() {
        let mut rig = build(square_config());
        for t in &rig.mocks {
            t.drive.borrow_mut().raw_position = 2.0;
        }
        rig.drivetrain.reset_drive_encoders().unwrap();
        rig.drivetrain.stop().unwrap();
        for t in &rig.mocks {
            assert_eq!(t.drive.borrow().raw_position, 0.0);
            assert_eq!(t.drive.borrow().stopped, 1);
        }
    }

    #[test]
    fn test_module_location_mismatch() {
        let modules = std::array::from_fn(|i| {
            let t = test_module(i as u32 * 2, 0.0);
            if i == 1 {
                SwerveModule::new(ModuleHardware {
                    drive: t.drive.clone(),
                    steer: t.steer.clone(),
                    angle_source: SteerAngleSource::SteerEncoder,
                    angular_offset: Rotation2d::zero(),
                    location: Some(Translation2d::new(-0.3, 0.3)),
                })
                .unwrap()
            } else {
                t.module
            }
        });
        let result = SwerveDrivetrain::new(modules, || 0.0, square_config());
        assert!(matches!(
            result,
            Err(SwerveError::ModuleLocationMismatch {
                position: ModulePosition::FrontRight,
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let modules = std::array::from_fn(|i| test_module(i as u32 * 2, 0.0).module);
        let mut config = square_config();
        config.max_speed = -1.0;
        assert!(matches!(
            SwerveDrivetrain::new(modules, || 0.0, config),
            Err(SwerveError::Config(_))
        ));
    }

    #[test]
    fn test_telemetry() {
        let rig = build(square_config());
        rig.gyro.0.set(12.0);
        let values = snapshot(&rig.drivetrain);
        assert_eq!(values[0], ("Raw Heading", Value::Number(12.0)));
        assert_eq!(values[1], ("Heading", Value::Number(12.0)));
    }
}
