//! Gate and placeholder-scene tuning loaded from JSON.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use xr_interim_protocol::SessionMode;

use crate::error::{Error, Result};

/// Bounds of the loading card texture width.
pub(crate) const MIN_CARD_SIZE_PX: u32 = 64;
pub(crate) const MAX_CARD_SIZE_PX: u32 = 4096;

/// Tuning for the gate, its timing and the placeholder scene.
///
/// Every field has a default, so a config file only needs the keys it
/// changes:
///
/// ```json
/// { "settle_delay_ms": 250, "smoothing_vr": 0.02 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
	/// Pause after ending a session in `stop()` so the platform can release it.
	pub settle_delay_ms: u64,
	/// Default fade before a handoff completes.
	pub handoff_transition_ms: u64,
	/// Distance of the loading billboard in front of the viewer.
	pub billboard_distance_m: f32,
	/// Vertical offset of the billboard relative to eye height.
	pub billboard_height_offset_m: f32,
	/// Per-frame interpolation factor toward the billboard target in VR.
	pub smoothing_vr: f32,
	/// Per-frame interpolation factor toward the billboard target in AR.
	pub smoothing_ar: f32,
	/// Frames that snap the billboard instead of interpolating.
	pub snap_frames: u64,
	/// Decorative floaters in VR scenes. AR scenes never have any.
	pub floater_count: usize,
	pub floater_radius_m: f32,
	/// Caption drawn under the logo; animated dots are appended.
	pub caption: String,
	pub caption_dot_period_ms: u64,
	/// Width of the loading card texture, 64 to 4096; height is half of it.
	pub card_size_px: u32,
}

impl Default for GateConfig {
	fn default() -> Self {
		Self {
			settle_delay_ms: 100,
			handoff_transition_ms: 300,
			billboard_distance_m: 1.5,
			billboard_height_offset_m: -0.1,
			smoothing_vr: 0.04,
			smoothing_ar: 0.2,
			snap_frames: 2,
			floater_count: 24,
			floater_radius_m: 4.0,
			caption: "Loading".to_string(),
			caption_dot_period_ms: 400,
			card_size_px: 256,
		}
	}
}

impl GateConfig {
	/// Parses a JSON document and normalizes out-of-range values.
	pub fn from_json_str(json: &str) -> Result<Self> {
		let config: Self = serde_json::from_str(json).map_err(|err| Error::Config {
			path: None,
			message: err.to_string(),
		})?;
		Ok(config.normalized())
	}

	/// Reads and parses a JSON config file.
	pub fn from_file(path: &Path) -> Result<Self> {
		let json = std::fs::read_to_string(path)?;
		Self::from_json_str(&json).map_err(|err| match err {
			Error::Config { message, .. } => Error::Config {
				path: Some(path.to_path_buf()),
				message,
			},
			other => other,
		})
	}

	/// Clamps values that would break the scene into their valid range.
	pub fn normalized(mut self) -> Self {
		for (name, factor) in [("smoothing_vr", &mut self.smoothing_vr), ("smoothing_ar", &mut self.smoothing_ar)] {
			if !(*factor > 0.0 && *factor <= 1.0) {
				let clamped = if factor.is_nan() { 1.0 } else { factor.clamp(f32::EPSILON, 1.0) };
				warn!(target = "interim.config", field = name, value = *factor, clamped, "smoothing factor out of range");
				*factor = clamped;
			}
		}
		let card = self.card_size_px.clamp(MIN_CARD_SIZE_PX, MAX_CARD_SIZE_PX);
		if card != self.card_size_px {
			warn!(target = "interim.config", value = self.card_size_px, clamped = card, "card_size_px out of range");
			self.card_size_px = card;
		}
		if self.caption_dot_period_ms == 0 {
			warn!(target = "interim.config", value = 0, clamped = 1, "caption_dot_period_ms must be positive");
			self.caption_dot_period_ms = 1;
		}
		self
	}

	pub fn settle_delay(&self) -> Duration {
		Duration::from_millis(self.settle_delay_ms)
	}

	pub fn handoff_transition(&self) -> Duration {
		Duration::from_millis(self.handoff_transition_ms)
	}

	/// Billboard smoothing for `mode`: slower in VR so the card feels
	/// anchored, faster in AR where it tracks the camera feed.
	pub fn smoothing(&self, mode: SessionMode) -> f32 {
		match mode {
			SessionMode::ImmersiveVr => self.smoothing_vr,
			SessionMode::ImmersiveAr => self.smoothing_ar,
		}
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;

	#[test]
	fn partial_json_keeps_defaults() {
		let config = GateConfig::from_json_str(r#"{"settle_delay_ms": 250}"#).unwrap();
		assert_eq!(config.settle_delay(), Duration::from_millis(250));
		assert_eq!(config.handoff_transition_ms, GateConfig::default().handoff_transition_ms);
		assert_eq!(config.caption, "Loading");
	}

	#[test]
	fn vr_smooths_slower_than_ar() {
		let config = GateConfig::default();
		assert!(config.smoothing(SessionMode::ImmersiveVr) < config.smoothing(SessionMode::ImmersiveAr));
	}

	#[test]
	fn out_of_range_smoothing_is_clamped() {
		let config = GateConfig::from_json_str(r#"{"smoothing_vr": 0.0, "smoothing_ar": 3.5, "card_size_px": 8}"#).unwrap();
		assert!(config.smoothing_vr > 0.0);
		assert_eq!(config.smoothing_ar, 1.0);
		assert_eq!(config.card_size_px, 64);
	}

	#[test]
	fn oversized_card_and_zero_dot_period_are_clamped() {
		let config = GateConfig::from_json_str(r#"{"card_size_px": 200000, "caption_dot_period_ms": 0}"#).unwrap();
		assert_eq!(config.card_size_px, MAX_CARD_SIZE_PX);
		assert_eq!(config.caption_dot_period_ms, 1);
	}

	#[test]
	fn unknown_keys_are_rejected() {
		let err = GateConfig::from_json_str(r#"{"setle_delay_ms": 1}"#).unwrap_err();
		assert!(matches!(err, Error::Config { path: None, .. }));
	}

	#[test]
	fn file_errors_carry_the_path() -> anyhow::Result<()> {
		let mut file = tempfile::NamedTempFile::new()?;
		write!(file, "{{ not json")?;
		let err = GateConfig::from_file(file.path()).unwrap_err();
		match err {
			Error::Config { path, .. } => assert_eq!(path.as_deref(), Some(file.path())),
			other => panic!("unexpected error: {other}"),
		}
		Ok(())
	}
}
