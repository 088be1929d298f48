//! Minimal vector math for placing the placeholder scene.

use std::ops::{Add, Mul, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
	pub x: f32,
	pub y: f32,
	pub z: f32,
}

impl Vec3 {
	pub const Y: Self = Self::new(0.0, 1.0, 0.0);
	/// Forward for a viewer with identity orientation.
	pub const FORWARD: Self = Self::new(0.0, 0.0, -1.0);

	pub const fn new(x: f32, y: f32, z: f32) -> Self {
		Self { x, y, z }
	}

	pub fn length_squared(self) -> f32 {
		self.x * self.x + self.y * self.y + self.z * self.z
	}

	pub fn length(self) -> f32 {
		self.length_squared().sqrt()
	}

	/// Unit vector in the same direction, or `None` for a near-zero vector.
	pub fn try_normalize(self) -> Option<Self> {
		let len = self.length();
		(len > 1e-5).then(|| self * (1.0 / len))
	}

	pub fn cross(self, other: Self) -> Self {
		Self {
			x: self.y * other.z - self.z * other.y,
			y: self.z * other.x - self.x * other.z,
			z: self.x * other.y - self.y * other.x,
		}
	}

	pub fn lerp(self, other: Self, t: f32) -> Self {
		self + (other - self) * t
	}

	pub fn distance(self, other: Self) -> f32 {
		(other - self).length()
	}

	pub fn to_array(self) -> [f32; 3] {
		[self.x, self.y, self.z]
	}
}

impl From<[f32; 3]> for Vec3 {
	fn from([x, y, z]: [f32; 3]) -> Self {
		Self::new(x, y, z)
	}
}

impl Add for Vec3 {
	type Output = Self;
	fn add(self, other: Self) -> Self {
		Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
	}
}

impl Sub for Vec3 {
	type Output = Self;
	fn sub(self, other: Self) -> Self {
		Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
	}
}

impl Mul<f32> for Vec3 {
	type Output = Self;
	fn mul(self, s: f32) -> Self {
		Self::new(self.x * s, self.y * s, self.z * s)
	}
}

/// Unit quaternion, `x, y, z, w`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quat {
	pub x: f32,
	pub y: f32,
	pub z: f32,
	pub w: f32,
}

impl Quat {
	/// Rotation of `radians` around `+Y`.
	pub fn from_yaw(radians: f32) -> Self {
		let half = radians * 0.5;
		Self {
			x: 0.0,
			y: half.sin(),
			z: 0.0,
			w: half.cos(),
		}
	}

	/// Rotation of `radians` around a unit `axis`.
	pub fn from_axis_angle(axis: Vec3, radians: f32) -> Self {
		let (sin, cos) = (radians * 0.5).sin_cos();
		Self {
			x: axis.x * sin,
			y: axis.y * sin,
			z: axis.z * sin,
			w: cos,
		}
	}

	pub fn rotate(self, v: Vec3) -> Vec3 {
		let q = Vec3::new(self.x, self.y, self.z);
		let t = q.cross(v) * 2.0;
		v + t * self.w + q.cross(t)
	}

	pub fn to_array(self) -> [f32; 4] {
		[self.x, self.y, self.z, self.w]
	}
}

impl From<[f32; 4]> for Quat {
	fn from([x, y, z, w]: [f32; 4]) -> Self {
		Self { x, y, z, w }
	}
}

#[cfg(test)]
mod tests {
	use std::f32::consts::FRAC_PI_2;

	use super::*;

	fn approx(a: Vec3, b: Vec3) -> bool {
		a.distance(b) < 1e-5
	}

	#[test]
	fn yaw_quarter_turn_points_forward_left() {
		let turned = Quat::from_yaw(FRAC_PI_2).rotate(Vec3::FORWARD);
		assert!(approx(turned, Vec3::new(-1.0, 0.0, 0.0)), "{turned:?}");
	}

	#[test]
	fn zero_yaw_leaves_vectors_alone() {
		let v = Vec3::new(0.3, -2.0, 5.0);
		assert!(approx(Quat::from_yaw(0.0).rotate(v), v));
	}

	#[test]
	fn zero_vector_has_no_direction() {
		assert!(Vec3::new(0.0, 0.0, 0.0).try_normalize().is_none());
		assert!(approx(Vec3::new(0.0, 0.0, -3.0).try_normalize().unwrap(), Vec3::FORWARD));
	}
}
