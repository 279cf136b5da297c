//! 3D Vector
//!
//! Minimal `f32` vector for tile and occupant positions.
//! Y is the vertical axis; the arena floor spans X and Z.

use std::fmt;
use std::ops::{Add, Sub, Neg};
use serde::{Serialize, Deserialize};

/// 3D vector with `f32` components.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component (floor axis)
    pub x: f32,
    /// Y component (vertical axis)
    pub y: f32,
    /// Z component (floor axis)
    pub z: f32,
}

impl Vec3 {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    /// Unit vector pointing up (+Y)
    pub const UP: Self = Self { x: 0.0, y: 1.0, z: 0.0 };

    /// Unit vector pointing down (-Y)
    pub const DOWN: Self = Self { x: 0.0, y: -1.0, z: 0.0 };

    /// Create a new vector.
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Create a point on the floor plane (y = 0).
    #[inline]
    pub const fn on_floor(x: f32, z: f32) -> Self {
        Self { x, y: 0.0, z }
    }

    /// Scale by a scalar.
    #[inline]
    pub fn scale(self, scalar: f32) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
            z: self.z * scalar,
        }
    }

    /// Squared length (avoids sqrt - prefer this for comparisons).
    #[inline]
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Length (magnitude). Prefer `length_squared` when possible.
    #[inline]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Squared distance to another point.
    #[inline]
    pub fn distance_squared(self, other: Self) -> f32 {
        (self - other).length_squared()
    }

    /// Linear interpolation towards `other`; `t` is clamped to [0, 1].
    #[inline]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        self + (other - self).scale(t)
    }

    /// Same point raised (or lowered) on the vertical axis.
    #[inline]
    pub fn raised(self, height: f32) -> Self {
        Self { y: self.y + height, ..self }
    }

    /// True if every component is finite.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    #[inline]
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl fmt::Debug for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vec3({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}
