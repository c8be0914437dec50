// Swerve drive kinematics
//
// Each module's velocity is the chassis velocity plus omega cross its location:
//   [vx_i]   [1  0  -y_i] [vx   ]
//   [vy_i] = [0  1   x_i] [vy   ]
//                         [omega]
// Stacking the four modules gives an 8x3 matrix. Forward kinematics is its least-squares
// pseudo-inverse, computed once from the fixed wheel geometry.

use nalgebra::{SMatrix, SVector, Vector3};

use super::SwerveError;
use super::state::{ChassisSpeeds, SwerveModulePosition, SwerveModuleState};
use crate::geometry::{Rotation2d, Translation2d, Twist2d};

type InverseMatrix = SMatrix<f64, 8, 3>;
type ForwardMatrix = SMatrix<f64, 3, 8>;

#[derive(Debug, Clone, PartialEq)]
pub struct SwerveKinematics {
    locations: [Translation2d; 4],
    inverse: InverseMatrix,
    forward: ForwardMatrix,
}

impl SwerveKinematics {
    /// Module locations relative to the robot center, in module order
    pub fn new(locations: [Translation2d; 4]) -> Result<Self, SwerveError> {
        let mut inverse = InverseMatrix::zeros();
        for (i, location) in locations.iter().enumerate() {
            inverse[(2 * i, 0)] = 1.0;
            inverse[(2 * i, 2)] = -location.y;
            inverse[(2 * i + 1, 1)] = 1.0;
            inverse[(2 * i + 1, 2)] = location.x;
        }

        let transpose = inverse.transpose();
        let normal = (transpose * inverse)
            .try_inverse()
            .ok_or(SwerveError::DegenerateGeometry)?;
        let forward = normal * transpose;

        Ok(Self {
            locations,
            inverse,
            forward,
        })
    }

    pub fn locations(&self) -> &[Translation2d; 4] {
        &self.locations
    }

    /// Chassis speeds to the four module states
    pub fn to_module_states(&self, speeds: ChassisSpeeds) -> [SwerveModuleState; 4] {
        let wheels = self.inverse * Vector3::new(speeds.vx, speeds.vy, speeds.omega);
        std::array::from_fn(|i| {
            let (x, y) = (wheels[2 * i], wheels[2 * i + 1]);
            SwerveModuleState::new(x.hypot(y), Rotation2d::from_xy(x, y))
        })
    }

    /// Least-squares chassis speeds for the four measured module states
    pub fn to_chassis_speeds(&self, states: &[SwerveModuleState; 4]) -> ChassisSpeeds {
        let chassis = self.solve(states.map(|s| (s.speed, s.angle)));
        ChassisSpeeds::new(chassis.x, chassis.y, chassis.z)
    }

    /// Chassis displacement for the given module distance deltas
    pub fn to_twist(&self, deltas: &[SwerveModulePosition; 4]) -> Twist2d {
        let chassis = self.solve(deltas.map(|d| (d.distance, d.angle)));
        Twist2d::new(chassis.x, chassis.y, chassis.z)
    }

    fn solve(&self, wheels: [(f64, Rotation2d); 4]) -> Vector3<f64> {
        let mut stacked = SVector::<f64, 8>::zeros();
        for (i, (magnitude, angle)) in wheels.iter().enumerate() {
            stacked[2 * i] = magnitude * angle.cos();
            stacked[2 * i + 1] = magnitude * angle.sin();
        }
        self.forward * stacked
    }
}
