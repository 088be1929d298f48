//! Granted session handed to the main application.

use xr_interim_protocol::{SessionInit, SessionMode};
use xr_interim_runtime::SessionHandle;

/// The live platform session plus the parameters it was requested with.
///
/// Returned exactly once per granted session, by a successful handoff. Not
/// `Clone`: whoever holds it owns the session, including the duty to end it.
#[derive(Debug)]
pub struct SessionDescriptor {
	session: SessionHandle,
	mode: SessionMode,
	init: SessionInit,
}

impl SessionDescriptor {
	pub(crate) fn new(session: SessionHandle, mode: SessionMode, init: SessionInit) -> Self {
		Self { session, mode, init }
	}

	pub fn session(&self) -> &SessionHandle {
		&self.session
	}

	pub fn mode(&self) -> SessionMode {
		self.mode
	}

	pub fn init(&self) -> &SessionInit {
		&self.init
	}

	/// Whether the platform session is still running.
	///
	/// A session can end while a handoff is in flight; the descriptor is
	/// still returned, so receivers should check this before rendering.
	pub fn is_live(&self) -> bool {
		!self.session.is_ended()
	}

	pub fn into_parts(self) -> (SessionHandle, SessionMode, SessionInit) {
		(self.session, self.mode, self.init)
	}
}
