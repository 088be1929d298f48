//! Error taxonomy for the session gate.
//!
//! Gate entry points convert every variant into a logged `None`; these
//! values exist so the internal paths can use `?` and so logs carry a
//! consistent message.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use xr_interim_runtime::{PlatformError, SessionId};

/// Why the gate refused to admit a new request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentionReason {
	RequestInFlight,
	SessionActive,
	HandoffInProgress,
}

impl fmt::Display for ContentionReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::RequestInFlight => "a session request is already in flight",
			Self::SessionActive => "a temporary session is already active",
			Self::HandoffInProgress => "a handoff is in progress",
		})
	}
}

#[derive(Debug, Error)]
pub enum Error {
	#[error("session gate busy: {0}")]
	Contention(ContentionReason),

	#[error("platform session request failed: {0}")]
	PlatformRequest(#[from] PlatformError),

	#[error("{0} was granted after its request was cancelled")]
	OrphanedGrant(SessionId),

	#[error("invalid configuration{}: {message}", path.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default())]
	Config { path: Option<PathBuf>, message: String },

	#[error("failed to encode loading card: {0}")]
	Image(#[from] image::ImageError),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
