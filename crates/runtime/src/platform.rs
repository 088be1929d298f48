//! Traits a host implements to plug its XR backend into the gate.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use xr_interim_protocol::{FrameTiming, RenderFrame, SessionInit, SessionMode, TextureRef, ViewerPose};

use crate::error::Result;
use crate::subscription::Subscription;

/// Platform-assigned session identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "xr-session#{}", self.0)
	}
}

/// Why a session's end listeners fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
	/// Someone called [`PlatformSession::end`].
	Requested,
	/// The platform ended the session on its own (system UI, device removed).
	External,
}

pub type EndCallback = Box<dyn FnOnce(EndReason) + Send>;
pub type FrameCallback = Box<dyn FnMut(FrameTiming) + Send>;

/// Shared handle to a granted platform session.
pub type SessionHandle = Arc<dyn PlatformSession>;

/// Entry point into the platform's XR APIs.
pub trait XrPlatform: Send + Sync {
	/// Asks the platform for an immersive session. May prompt the user.
	///
	/// The returned future cannot be aborted from the gate's side; once
	/// polled, the platform may grant a session at any later point.
	fn request_session(&self, mode: SessionMode, init: &SessionInit) -> BoxFuture<'static, Result<SessionHandle>>;

	/// Creates a GPU rendering context targeting `session`.
	///
	/// Treated as infallible: a platform that granted a session can render
	/// into it.
	fn create_render_context(&self, session: &SessionHandle) -> Box<dyn RenderContext>;

	/// Returns the per-display-frame scheduler for `session`.
	fn frame_scheduler(&self, session: &SessionHandle) -> Arc<dyn FrameScheduler>;
}

/// A granted, possibly still live, platform session.
pub trait PlatformSession: Send + Sync + fmt::Debug {
	fn id(&self) -> SessionId;

	/// Registers `callback` to run once when the session ends.
	///
	/// Implementations must not call `callback` from inside `on_end`, even
	/// for a session that has already ended; callers check
	/// [`is_ended`](Self::is_ended) after registering.
	fn on_end(&self, callback: EndCallback) -> Subscription;

	/// Ends the session. End listeners still attached fire with
	/// [`EndReason::Requested`].
	fn end(&self) -> BoxFuture<'static, Result<()>>;

	/// Latest tracked viewer pose, if tracking is available.
	fn viewer_pose(&self) -> Option<ViewerPose>;

	fn is_ended(&self) -> bool;
}

/// Renderer bound to one session.
pub trait RenderContext: Send {
	/// Uploads or replaces the RGBA8 pixels behind `texture`.
	fn upload_texture(&mut self, texture: TextureRef, width: u32, height: u32, rgba: &[u8]);

	fn render(&mut self, frame: &RenderFrame);

	/// Releases GPU resources. Called exactly once by the owning instance.
	fn dispose(&mut self);
}

/// Drives a callback once per display frame.
pub trait FrameScheduler: Send + Sync {
	/// Installs `callback`, replacing any previous one.
	fn start(&self, callback: FrameCallback);

	/// Removes the current callback. A no-op when none is installed.
	fn stop(&self);
}
