//! Session request parameters.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Immersive presentation mode requested from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionMode {
	/// Passthrough augmented reality.
	#[serde(rename = "immersive-ar")]
	ImmersiveAr,
	/// Fully rendered virtual reality.
	#[serde(rename = "immersive-vr")]
	ImmersiveVr,
}

impl SessionMode {
	/// Returns the platform-facing mode string.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::ImmersiveAr => "immersive-ar",
			Self::ImmersiveVr => "immersive-vr",
		}
	}

	pub fn is_ar(self) -> bool {
		matches!(self, Self::ImmersiveAr)
	}
}

impl fmt::Display for SessionMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Options passed through to the platform's session request.
///
/// The gate never interprets these; they are handed back untouched in the
/// session descriptor so the main application can inspect what was granted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionInit {
	/// Features the session cannot run without (e.g. `"local-floor"`).
	pub required_features: Vec<String>,
	/// Features the platform may grant if available (e.g. `"hit-test"`).
	pub optional_features: Vec<String>,
	/// Element id used as DOM overlay root, for platforms that support one.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub dom_overlay_root: Option<String>,
}

impl SessionInit {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a required feature.
	pub fn with_required(mut self, feature: impl Into<String>) -> Self {
		self.required_features.push(feature.into());
		self
	}

	/// Adds an optional feature.
	pub fn with_optional(mut self, feature: impl Into<String>) -> Self {
		self.optional_features.push(feature.into());
		self
	}

	/// Sets the DOM overlay root element id.
	pub fn with_dom_overlay(mut self, root: impl Into<String>) -> Self {
		self.dom_overlay_root = Some(root.into());
		self
	}
}
