// Wheel odometry with the heading sensor as the source of truth for rotation

use super::kinematics::SwerveKinematics;
use super::state::SwerveModulePosition;
use crate::geometry::{Pose2d, Rotation2d};

#[derive(Debug, Clone)]
pub struct SwerveOdometry {
    kinematics: SwerveKinematics,
    pose: Pose2d,
    /// Field heading minus gyro heading
    gyro_offset: Rotation2d,
    previous_angle: Rotation2d,
    previous_positions: [SwerveModulePosition; 4],
}

impl SwerveOdometry {
    pub fn new(
        kinematics: SwerveKinematics,
        gyro_angle: Rotation2d,
        positions: [SwerveModulePosition; 4],
        initial_pose: Pose2d,
    ) -> Self {
        Self {
            kinematics,
            pose: initial_pose,
            gyro_offset: initial_pose.rotation - gyro_angle,
            previous_angle: initial_pose.rotation,
            previous_positions: positions,
        }
    }

    pub fn pose(&self) -> Pose2d {
        self.pose
    }

    /// Start over from `pose`, taking the current gyro and module readings as its baseline
    pub fn reset_position(
        &mut self,
        gyro_angle: Rotation2d,
        positions: [SwerveModulePosition; 4],
        pose: Pose2d,
    ) {
        self.pose = pose;
        self.gyro_offset = pose.rotation - gyro_angle;
        self.previous_angle = pose.rotation;
        self.previous_positions = positions;
    }

    /// Integrate the motion since the last update and return the new pose
    pub fn update(
        &mut self,
        gyro_angle: Rotation2d,
        positions: [SwerveModulePosition; 4],
    ) -> Pose2d {
        let angle = gyro_angle + self.gyro_offset;

        let deltas: [SwerveModulePosition; 4] = std::array::from_fn(|i| {
            SwerveModulePosition::new(
                positions[i].distance - self.previous_positions[i].distance,
                positions[i].angle,
            )
        });

        let mut twist = self.kinematics.to_twist(&deltas);
        twist.dtheta = (angle - self.previous_angle).radians();

        let moved = self.pose.exp(twist);
        self.pose = Pose2d::from_parts(moved.translation, angle);
        self.previous_angle = angle;
        self.previous_positions = positions;
        self.pose
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Translation2d;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    fn kinematics() -> SwerveKinematics {
        SwerveKinematics::new([
            Translation2d::new(0.3, 0.3),
            Translation2d::new(0.3, -0.3),
            Translation2d::new(-0.3, 0.3),
            Translation2d::new(-0.3, -0.3),
        ])
        .unwrap()
    }

    fn all(distance: f64, degrees: f64) -> [SwerveModulePosition; 4] {
        [SwerveModulePosition::new(distance, Rotation2d::from_degrees(degrees)); 4]
    }

    #[test]
    fn test_straight_drive() {
        let mut odometry =
            SwerveOdometry::new(kinematics(), Rotation2d::zero(), all(0.0, 0.0), Pose2d::default());
        let pose = odometry.update(Rotation2d::zero(), all(1.5, 0.0));
        assert_abs_diff_eq!(pose.x(), 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.y(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_drive_in_field_frame_after_turn() {
        let start = Pose2d::new(1.0, 2.0, Rotation2d::new(FRAC_PI_2));
        let mut odometry =
            SwerveOdometry::new(kinematics(), Rotation2d::zero(), all(0.0, 0.0), start);

        // Robot-forward while facing +y moves along +y on the field
        let pose = odometry.update(Rotation2d::zero(), all(1.0, 0.0));
        assert_abs_diff_eq!(pose.x(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.y(), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.rotation.radians(), FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_gyro_is_authoritative_for_heading() {
        let mut odometry =
            SwerveOdometry::new(kinematics(), Rotation2d::zero(), all(0.0, 0.0), Pose2d::default());
        // Wheels report no rotation but the gyro turned
        let pose = odometry.update(Rotation2d::from_degrees(30.0), all(0.0, 0.0));
        assert_abs_diff_eq!(pose.rotation.degrees(), 30.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pose.x(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reset_returns_exact_pose() {
        let mut odometry =
            SwerveOdometry::new(kinematics(), Rotation2d::zero(), all(0.0, 0.0), Pose2d::default());
        odometry.update(Rotation2d::from_degrees(10.0), all(2.0, 45.0));

        let target = Pose2d::new(4.2, -1.3, Rotation2d::from_degrees(-120.0));
        odometry.reset_position(Rotation2d::from_degrees(10.0), all(2.0, 45.0), target);
        assert_eq!(odometry.pose(), target);

        // No motion since the reset leaves the pose where it was put
        let pose = odometry.update(Rotation2d::from_degrees(10.0), all(2.0, 45.0));
        assert_abs_diff_eq!(pose.x(), 4.2, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.y(), -1.3, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.rotation.degrees(), -120.0, epsilon = 1e-9);
    }
}
