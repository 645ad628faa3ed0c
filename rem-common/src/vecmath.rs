use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// A simple 3D vector struct, in meters.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Creates a new Vec3.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3 { x, y, z }
    }

    /// Creates a zero vector.
    pub fn zero() -> Self {
        Vec3 { x: 0.0, y: 0.0, z: 0.0 }
    }

    /// Calculates the squared length (magnitude) of the vector.
    pub fn length_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Calculates the length (magnitude) of the vector.
    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Calculates the distance to another point.
    pub fn distance(&self, other: Vec3) -> f64 {
        (*self - other).length()
    }

    /// Distance projected on the horizontal plane.
    pub fn distance_2d(&self, other: Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self { x: self.x + other.x, y: self.y + other.y, z: self.z + other.z }
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self { x: self.x - other.x, y: self.y - other.y, z: self.z - other.z }
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(v: [f64; 3]) -> Self {
        Vec3::new(v[0], v[1], v[2])
    }
}

/// Direction expressed as azimuth (from the x axis, in the xy plane) and
/// inclination (zenith angle: 0 points up, PI/2 is the horizon). Radians.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Angles {
    pub azimuth: f64,
    pub inclination: f64,
}

impl Angles {
    pub fn new(azimuth: f64, inclination: f64) -> Self {
        Angles { azimuth, inclination }
    }

    /// Builds angles from degrees.
    pub fn from_degrees(azimuth_deg: f64, inclination_deg: f64) -> Self {
        Angles::new(azimuth_deg.to_radians(), inclination_deg.to_radians())
    }

    /// Direction of `to` as seen from `from`.
    /// Coincident points yield a horizontal direction along the x axis.
    pub fn between(from: Vec3, to: Vec3) -> Self {
        let d = to - from;
        let r = d.length();
        if r < 1e-9 {
            return Angles::new(0.0, std::f64::consts::FRAC_PI_2);
        }
        let azimuth = d.y.atan2(d.x);
        let inclination = clamp(d.z / r, -1.0, 1.0).acos();
        Angles::new(azimuth, inclination)
    }
}

/// Wraps an angle into [-PI, PI).
pub fn wrap_angle(angle_rad: f64) -> f64 {
    let two_pi = 2.0 * std::f64::consts::PI;
    (angle_rad + std::f64::consts::PI).rem_euclid(two_pi) - std::f64::consts::PI
}

/// Clamps a value between a minimum and maximum.
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_angles_horizontal() {
        let a = Angles::between(Vec3::zero(), Vec3::new(0.0, 10.0, 0.0));
        assert!((a.azimuth - FRAC_PI_2).abs() < 1e-12);
        assert!((a.inclination - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_angles_straight_down() {
        let a = Angles::between(Vec3::new(0.0, 0.0, 25.0), Vec3::new(0.0, 0.0, 1.5));
        assert!((a.inclination - PI).abs() < 1e-12);
    }

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(3.0 * PI / 2.0) + FRAC_PI_2).abs() < 1e-12);
        assert!((wrap_angle(-3.0 * PI / 2.0) - FRAC_PI_2).abs() < 1e-12);
        assert!((wrap_angle(0.25) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_distance_2d_ignores_height() {
        let a = Vec3::new(0.0, 0.0, 25.0);
        let b = Vec3::new(3.0, 4.0, 1.5);
        assert!((a.distance_2d(b) - 5.0).abs() < 1e-12);
        assert!(a.distance(b) > 5.0);
    }
}
