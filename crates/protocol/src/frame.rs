//! Per-frame data handed from a session instance to its rendering context.

use serde::{Deserialize, Serialize};

use crate::pose::ViewerPose;

/// Timing information delivered by a frame scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameTiming {
	/// Display timestamp in milliseconds since an arbitrary epoch.
	pub timestamp_ms: f64,
}

impl FrameTiming {
	pub fn at(timestamp_ms: f64) -> Self {
		Self { timestamp_ms }
	}
}

/// Geometry kinds the placeholder scene uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
	Icosahedron,
	Torus,
	Octahedron,
	/// Unit quad facing `+Z`.
	Quad,
}

/// Light sources the placeholder scene uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Light {
	Ambient { color: [f32; 3], intensity: f32 },
	Directional { color: [f32; 3], intensity: f32, direction: [f32; 3] },
}

/// Identifies a texture uploaded by the instance; `version` bumps on redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureRef {
	pub id: u32,
	pub version: u32,
}

/// One object to draw this frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawItem {
	pub primitive: Primitive,
	pub position: [f32; 3],
	/// Unit quaternion, `x, y, z, w`.
	pub rotation: [f32; 4],
	pub scale: [f32; 3],
	/// Linear RGBA; alpha doubles as opacity.
	pub color: [f32; 4],
	#[serde(skip_serializing_if = "Option::is_none")]
	pub texture: Option<TextureRef>,
}

/// Everything a rendering context needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFrame {
	pub frame: u64,
	pub viewer: ViewerPose,
	pub lights: Vec<Light>,
	pub items: Vec<DrawItem>,
}
