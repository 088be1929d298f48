//! Errors reported by platform primitives.

use thiserror::Error;

/// Failure surfaced by an [`XrPlatform`](crate::XrPlatform) or a
/// [`PlatformSession`](crate::PlatformSession).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
	/// The platform has no support for the requested mode.
	#[error("session mode not supported: {0}")]
	NotSupported(String),

	/// The user or the platform declined the permission request.
	#[error("session request declined: {0}")]
	Declined(String),

	/// The session was already ended when the call was made.
	#[error("session already ended")]
	SessionEnded,

	/// Anything else the backend reports.
	#[error("platform backend error: {0}")]
	Backend(String),
}

pub type Result<T> = std::result::Result<T, PlatformError>;
