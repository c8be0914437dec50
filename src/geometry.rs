// Planar geometry for the drivetrain
//
// Conventions: +x forward, +y left, angles counter-clockwise positive, radians unless
// a method name says otherwise.

use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Threshold below which twist arcs are treated as straight lines
const TWIST_EPSILON: f64 = 1e-9;

/// A rotation in the plane.
///
/// The raw angle is kept as given (so a reading of 3π stays 3π), while any rotation
/// produced by composing two rotations is wrapped to (-π, π].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Rotation2d {
    value: f64,
    cos: f64,
    sin: f64,
}

impl Rotation2d {
    pub fn new(radians: f64) -> Self {
        Self {
            value: radians,
            cos: radians.cos(),
            sin: radians.sin(),
        }
    }

    pub fn from_degrees(degrees: f64) -> Self {
        Self::new(degrees.to_radians())
    }

    /// Rotation pointing along the vector (x, y). A zero vector yields a zero rotation.
    pub fn from_xy(x: f64, y: f64) -> Self {
        let magnitude = x.hypot(y);
        if magnitude > 1e-6 {
            let (cos, sin) = (x / magnitude, y / magnitude);
            Self {
                value: sin.atan2(cos),
                cos,
                sin,
            }
        } else {
            Self::zero()
        }
    }

    pub fn zero() -> Self {
        Self {
            value: 0.0,
            cos: 1.0,
            sin: 0.0,
        }
    }

    pub fn radians(&self) -> f64 {
        self.value
    }

    pub fn degrees(&self) -> f64 {
        self.value.to_degrees()
    }

    pub fn cos(&self) -> f64 {
        self.cos
    }

    pub fn sin(&self) -> f64 {
        self.sin
    }

    /// Compose two rotations. The result is wrapped to (-π, π].
    pub fn rotate_by(&self, other: Rotation2d) -> Self {
        Self::from_xy(
            self.cos * other.cos - self.sin * other.sin,
            self.cos * other.sin + self.sin * other.cos,
        )
    }
}

impl Default for Rotation2d {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<f64> for Rotation2d {
    fn from(radians: f64) -> Self {
        Self::new(radians)
    }
}

impl From<Rotation2d> for f64 {
    fn from(rotation: Rotation2d) -> Self {
        rotation.value
    }
}

impl Add for Rotation2d {
    type Output = Rotation2d;

    fn add(self, other: Rotation2d) -> Rotation2d {
        self.rotate_by(other)
    }
}

impl Sub for Rotation2d {
    type Output = Rotation2d;

    fn sub(self, other: Rotation2d) -> Rotation2d {
        self.rotate_by(-other)
    }
}

impl Neg for Rotation2d {
    type Output = Rotation2d;

    fn neg(self) -> Rotation2d {
        Rotation2d::new(-self.value)
    }
}

/// A point or vector in the plane, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Translation2d {
    pub x: f64,
    pub y: f64,
}

impl Translation2d {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn from_polar(distance: f64, angle: Rotation2d) -> Self {
        Self::new(distance * angle.cos(), distance * angle.sin())
    }

    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(&self, other: &Translation2d) -> f64 {
        (*self - *other).norm()
    }

    pub fn angle(&self) -> Rotation2d {
        Rotation2d::from_xy(self.x, self.y)
    }

    pub fn rotate_by(&self, rotation: Rotation2d) -> Self {
        Self::new(
            self.x * rotation.cos() - self.y * rotation.sin(),
            self.x * rotation.sin() + self.y * rotation.cos(),
        )
    }
}

impl Add for Translation2d {
    type Output = Translation2d;

    fn add(self, other: Translation2d) -> Translation2d {
        Translation2d::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Translation2d {
    type Output = Translation2d;

    fn sub(self, other: Translation2d) -> Translation2d {
        Translation2d::new(self.x - other.x, self.y - other.y)
    }
}

impl Neg for Translation2d {
    type Output = Translation2d;

    fn neg(self) -> Translation2d {
        Translation2d::new(-self.x, -self.y)
    }
}

impl Mul<f64> for Translation2d {
    type Output = Translation2d;

    fn mul(self, scalar: f64) -> Translation2d {
        Translation2d::new(self.x * scalar, self.y * scalar)
    }
}

/// A change in pose along a constant-curvature arc, expressed in the starting frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist2d {
    pub dx: f64,
    pub dy: f64,
    pub dtheta: f64,
}

impl Twist2d {
    pub const fn new(dx: f64, dy: f64, dtheta: f64) -> Self {
        Self { dx, dy, dtheta }
    }
}

/// Robot position and heading on the field.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose2d {
    pub translation: Translation2d,
    pub rotation: Rotation2d,
}

impl Pose2d {
    pub fn new(x: f64, y: f64, rotation: Rotation2d) -> Self {
        Self {
            translation: Translation2d::new(x, y),
            rotation,
        }
    }

    pub fn from_parts(translation: Translation2d, rotation: Rotation2d) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn x(&self) -> f64 {
        self.translation.x
    }

    pub fn y(&self) -> f64 {
        self.translation.y
    }

    pub fn heading(&self) -> Rotation2d {
        self.rotation
    }

    /// Apply a transform expressed in this pose's frame.
    pub fn transform_by(&self, translation: Translation2d, rotation: Rotation2d) -> Self {
        Self {
            translation: self.translation + translation.rotate_by(self.rotation),
            rotation: self.rotation + rotation,
        }
    }

    /// This pose expressed in the frame of `origin`.
    pub fn relative_to(&self, origin: &Pose2d) -> Self {
        Self {
            translation: (self.translation - origin.translation).rotate_by(-origin.rotation),
            rotation: self.rotation - origin.rotation,
        }
    }

    /// Follow `twist` from this pose along a constant-curvature arc.
    pub fn exp(&self, twist: Twist2d) -> Self {
        let Twist2d { dx, dy, dtheta } = twist;
        let (sin_theta, cos_theta) = dtheta.sin_cos();

        let (s, c) = if dtheta.abs() < TWIST_EPSILON {
            (1.0 - dtheta * dtheta / 6.0, 0.5 * dtheta)
        } else {
            (sin_theta / dtheta, (1.0 - cos_theta) / dtheta)
        };

        let translation = Translation2d::new(dx * s - dy * c, dx * c + dy * s);
        self.transform_by(translation, Rotation2d::from_xy(cos_theta, sin_theta))
    }

    /// The twist that carries this pose onto `end`. Inverse of [`Pose2d::exp`].
    pub fn log(&self, end: &Pose2d) -> Twist2d {
        let transform = end.relative_to(self);
        let dtheta = transform.rotation.radians();
        let half_dtheta = dtheta / 2.0;
        let cos_minus_one = transform.rotation.cos() - 1.0;

        let half_theta_by_tan_of_half_dtheta = if cos_minus_one.abs() < TWIST_EPSILON {
            1.0 - dtheta * dtheta / 12.0
        } else {
            -(half_dtheta * transform.rotation.sin()) / cos_minus_one
        };

        let translation = transform
            .translation
            .rotate_by(Rotation2d::from_xy(
                half_theta_by_tan_of_half_dtheta,
                -half_dtheta,
            ))
            * half_theta_by_tan_of_half_dtheta.hypot(half_dtheta);

        Twist2d::new(translation.x, translation.y, dtheta)
    }
}
