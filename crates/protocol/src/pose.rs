//! Tracked viewer pose as reported by the platform.

use serde::{Deserialize, Serialize};

/// Position in meters and orientation as a unit quaternion (`x, y, z, w`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewerPose {
	pub position: [f32; 3],
	pub orientation: [f32; 4],
}

impl ViewerPose {
	/// Viewer standing at the origin, eyes at `height`, looking down `-Z`.
	pub fn standing(height: f32) -> Self {
		Self {
			position: [0.0, height, 0.0],
			orientation: [0.0, 0.0, 0.0, 1.0],
		}
	}

	/// Viewer at `position` rotated by `yaw` radians around `+Y`.
	pub fn with_yaw(position: [f32; 3], yaw: f32) -> Self {
		let half = yaw * 0.5;
		Self {
			position,
			orientation: [0.0, half.sin(), 0.0, half.cos()],
		}
	}
}

impl Default for ViewerPose {
	fn default() -> Self {
		Self::standing(1.6)
	}
}
