//! Placeholder scene shown while the main application loads.

use std::f32::consts::TAU;

use xr_interim_protocol::{DrawItem, Light, Primitive, SessionMode, TextureRef, ViewerPose};

use crate::config::GateConfig;
use crate::math::{Quat, Vec3};

const GOLDEN_ANGLE: f32 = 2.399_963;

const FLOATER_COLORS: [[f32; 4]; 4] = [[0.36, 0.56, 0.98, 1.0], [0.62, 0.41, 0.93, 1.0], [0.29, 0.82, 0.74, 1.0], [0.95, 0.66, 0.32, 1.0]];

const FLOATER_SHAPES: [Primitive; 3] = [Primitive::Icosahedron, Primitive::Torus, Primitive::Octahedron];

/// Viewer camera, refreshed from the tracked pose every frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct Camera {
	pub pose: ViewerPose,
}

/// Decorative primitive bobbing in place.
#[derive(Debug, Clone)]
pub struct Floater {
	pub primitive: Primitive,
	pub base: Vec3,
	pub position: Vec3,
	pub color: [f32; 4],
	pub scale: f32,
	phase: f32,
	bob_speed: f32,
	bob_amplitude: f32,
	spin_speed: f32,
	spin: f32,
	spin_axis: Vec3,
}

impl Floater {
	fn animate(&mut self, elapsed_s: f32, delta_s: f32) {
		let bob = (elapsed_s * self.bob_speed + self.phase).sin() * self.bob_amplitude;
		self.position = Vec3::new(self.base.x, self.base.y + bob, self.base.z);
		self.spin = (self.spin + delta_s * self.spin_speed) % TAU;
	}

	fn draw_item(&self) -> DrawItem {
		DrawItem {
			primitive: self.primitive,
			position: self.position.to_array(),
			rotation: Quat::from_axis_angle(self.spin_axis, self.spin).to_array(),
			scale: [self.scale; 3],
			color: self.color,
			texture: None,
		}
	}
}

/// Loading card that hovers in front of the viewer.
#[derive(Debug, Clone)]
pub struct Billboard {
	pub position: Vec3,
	/// Rotation around `+Y` that turns the quad's `+Z` face toward the viewer.
	pub yaw: f32,
	pub opacity: f32,
	pub width: f32,
	pub height: f32,
	pub texture: TextureRef,
}

impl Billboard {
	fn new(texture: TextureRef) -> Self {
		Self {
			position: Vec3::new(0.0, 1.5, -1.5),
			yaw: 0.0,
			opacity: 1.0,
			width: 0.6,
			height: 0.3,
			texture,
		}
	}

	/// Point `distance` meters ahead of `viewer` on the horizontal plane.
	pub fn target(viewer: &ViewerPose, distance: f32, height_offset: f32) -> Vec3 {
		let eye = Vec3::from(viewer.position);
		let mut forward = Quat::from(viewer.orientation).rotate(Vec3::FORWARD);
		forward.y = 0.0;
		let forward = forward.try_normalize().unwrap_or(Vec3::FORWARD);
		eye + forward * distance + Vec3::Y * height_offset
	}

	/// Moves a `factor` fraction of the way to the target and faces the viewer.
	///
	/// `factor == 1.0` snaps.
	pub fn follow(&mut self, viewer: &ViewerPose, distance: f32, height_offset: f32, factor: f32) {
		let target = Self::target(viewer, distance, height_offset);
		self.position = self.position.lerp(target, factor.clamp(0.0, 1.0));

		let to_viewer = Vec3::from(viewer.position) - self.position;
		if to_viewer.x.abs() > 1e-6 || to_viewer.z.abs() > 1e-6 {
			self.yaw = to_viewer.x.atan2(to_viewer.z);
		}
	}

	fn draw_item(&self) -> DrawItem {
		DrawItem {
			primitive: Primitive::Quad,
			position: self.position.to_array(),
			rotation: Quat::from_yaw(self.yaw).to_array(),
			scale: [self.width, self.height, 1.0],
			color: [1.0, 1.0, 1.0, self.opacity],
			texture: Some(self.texture),
		}
	}
}

/// Everything drawn by a temporary session.
#[derive(Debug, Clone, Default)]
pub struct Scene {
	pub lights: Vec<Light>,
	pub floaters: Vec<Floater>,
	pub billboard: Option<Billboard>,
}

impl Scene {
	/// Builds the waiting scene for `mode`.
	///
	/// AR shows the camera passthrough, so it only gets the lights and the
	/// billboard; VR additionally gets a ring of floaters around the viewer.
	pub fn placeholder(mode: SessionMode, config: &GateConfig, card: TextureRef) -> Self {
		let lights = vec![
			Light::Ambient {
				color: [1.0, 1.0, 1.0],
				intensity: if mode.is_ar() { 1.0 } else { 0.6 },
			},
			Light::Directional {
				color: [1.0, 0.97, 0.92],
				intensity: 0.8,
				direction: [-0.3, -1.0, -0.5],
			},
		];

		let floaters = match mode {
			SessionMode::ImmersiveAr => Vec::new(),
			SessionMode::ImmersiveVr => (0..config.floater_count).map(|i| floater(i, config.floater_count, config.floater_radius_m)).collect(),
		};

		Self {
			lights,
			floaters,
			billboard: Some(Billboard::new(card)),
		}
	}

	pub fn animate_floaters(&mut self, elapsed_s: f32, delta_s: f32) {
		for floater in &mut self.floaters {
			floater.animate(elapsed_s, delta_s);
		}
	}

	pub fn draw_items(&self) -> Vec<DrawItem> {
		let mut items: Vec<DrawItem> = self.floaters.iter().map(Floater::draw_item).collect();
		items.extend(self.billboard.iter().map(Billboard::draw_item));
		items
	}

	/// Drops every object and light.
	pub fn clear(&mut self) {
		self.lights.clear();
		self.floaters.clear();
		self.billboard = None;
	}

	pub fn is_empty(&self) -> bool {
		self.lights.is_empty() && self.floaters.is_empty() && self.billboard.is_none()
	}
}

// Golden-angle spiral on a band between half and full radius, stacked in
// five height tiers so neighbors never overlap.
fn floater(index: usize, count: usize, radius: f32) -> Floater {
	let i = index as f32;
	let angle = i * GOLDEN_ANGLE;
	let ring = radius * (0.5 + 0.5 * ((i + 0.5) / count.max(1) as f32).sqrt());
	let base = Vec3::new(angle.cos() * ring, 0.4 + (index % 5) as f32 * 0.45, angle.sin() * ring);
	let spin_axis = Vec3::new(angle.sin(), 1.0, angle.cos()).try_normalize().unwrap_or(Vec3::Y);

	Floater {
		primitive: FLOATER_SHAPES[index % FLOATER_SHAPES.len()],
		base,
		position: base,
		color: FLOATER_COLORS[index % FLOATER_COLORS.len()],
		scale: 0.12 + (index % 3) as f32 * 0.05,
		phase: angle,
		bob_speed: 0.6 + (index % 4) as f32 * 0.15,
		bob_amplitude: 0.08,
		spin_speed: 0.3 + (index % 3) as f32 * 0.2,
		spin: 0.0,
		spin_axis,
	}
}
