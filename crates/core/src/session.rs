//! Temporary session instance: placeholder rendering inside a granted session.
//!
//! An instance is created by the gate the moment the platform grants a
//! session. It binds a rendering context and a frame scheduler to that
//! session, draws the waiting scene every frame, and is released exactly
//! once by whichever comes first:
//!
//! - [`TemporarySession::stop`]: release local resources, then end the
//!   platform session.
//! - [`TemporarySession::handoff`]: release local resources and return the
//!   still-running session to the caller.
//! - the platform's end event: release local resources only.
//!
//! All three share one teardown routine. Its guard is the end-listener
//! subscription slot: the first teardown takes the subscription, every later
//! call finds the slot empty and returns.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use xr_interim_protocol::{FrameTiming, RenderFrame, SessionInit, SessionMode};
use xr_interim_runtime::{EndReason, FrameScheduler, PlatformError, RenderContext, SessionHandle, SessionId, Subscription, XrPlatform};

use crate::config::GateConfig;
use crate::descriptor::SessionDescriptor;
use crate::loading_card::LoadingCard;
use crate::scene::{Billboard, Camera, Scene};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a temporary session instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u64);

impl fmt::Display for InstanceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "interim#{}", self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
	/// Rendering the placeholder scene.
	Running,
	/// Waiting out the pre-handoff transition.
	HandingOff,
	/// Released by `stop` or by the platform ending the session.
	TornDown,
	/// Released by a completed handoff; the platform session lives on.
	HandedOff,
}

/// Called once, after teardown, when the platform ends a running instance.
pub(crate) type ReleaseHook = Box<dyn FnOnce(InstanceId) + Send>;

struct Tuning {
	distance: f32,
	height_offset: f32,
	smoothing: f32,
	snap_frames: u64,
	transition: Duration,
}

struct SessionCore {
	id: InstanceId,
	session_id: SessionId,
	/// `None` once the session ended or was handed off.
	session: Option<SessionHandle>,
	mode: SessionMode,
	init: SessionInit,
	context: Option<Box<dyn RenderContext>>,
	scheduler: Arc<dyn FrameScheduler>,
	scene: Scene,
	camera: Camera,
	card: LoadingCard,
	frame_count: u64,
	started_at: Option<f64>,
	last_timestamp: Option<f64>,
	fade_started_at: Option<f64>,
	end_subscription: Option<Subscription>,
	phase: SessionPhase,
	tuning: Tuning,
}

/// Handle to a temporary session instance. Clones share the instance.
#[derive(Clone)]
pub struct TemporarySession {
	id: InstanceId,
	mode: SessionMode,
	core: Arc<Mutex<SessionCore>>,
}

impl TemporarySession {
	/// Binds rendering to a freshly granted `session` and starts the frame loop.
	pub(crate) fn launch(platform: &dyn XrPlatform, session: SessionHandle, mode: SessionMode, init: SessionInit, config: &GateConfig, on_release: ReleaseHook) -> Self {
		let id = InstanceId(NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed));
		let session_id = session.id();

		let mut context = platform.create_render_context(&session);
		let scheduler = platform.frame_scheduler(&session);
		let card = LoadingCard::new(config);
		context.upload_texture(card.texture(), card.width(), card.height(), card.pixels());
		let scene = Scene::placeholder(mode, config, card.texture());

		let core = Arc::new(Mutex::new(SessionCore {
			id,
			session_id,
			session: Some(Arc::clone(&session)),
			mode,
			init,
			context: Some(context),
			scheduler,
			scene,
			camera: Camera::default(),
			card,
			frame_count: 0,
			started_at: None,
			last_timestamp: None,
			fade_started_at: None,
			end_subscription: None,
			phase: SessionPhase::Running,
			tuning: Tuning {
				distance: config.billboard_distance_m,
				height_offset: config.billboard_height_offset_m,
				smoothing: config.smoothing(mode),
				snap_frames: config.snap_frames,
				transition: config.handoff_transition(),
			},
		}));

		{
			// Held across registration so an end event from another thread
			// waits until the subscription is stored.
			let mut guard = core.lock();

			let weak = Arc::downgrade(&core);
			guard.end_subscription = Some(session.on_end(Box::new(move |reason| {
				let Some(core) = weak.upgrade() else {
					return;
				};
				let released = core.lock().handle_platform_end(reason);
				if released {
					on_release(id);
				}
			})));

			let weak = Arc::downgrade(&core);
			guard.scheduler.start(Box::new(move |timing| {
				if let Some(core) = weak.upgrade() {
					core.lock().on_frame(timing);
				}
			}));

			if session.is_ended() {
				guard.handle_platform_end(EndReason::External);
			}
		}

		debug!(target = "interim.session", instance = %id, session = %session_id, %mode, "temporary session started");
		Self { id, mode, core }
	}

	pub fn id(&self) -> InstanceId {
		self.id
	}

	pub fn mode(&self) -> SessionMode {
		self.mode
	}

	pub fn session_id(&self) -> SessionId {
		self.core.lock().session_id
	}

	pub fn phase(&self) -> SessionPhase {
		self.core.lock().phase
	}

	/// Whether local resources have been released.
	pub fn is_released(&self) -> bool {
		self.core.lock().end_subscription.is_none()
	}

	pub fn frame_count(&self) -> u64 {
		self.core.lock().frame_count
	}

	pub fn camera(&self) -> Camera {
		self.core.lock().camera
	}

	pub fn billboard(&self) -> Option<Billboard> {
		self.core.lock().scene.billboard.clone()
	}

	pub fn floater_count(&self) -> usize {
		self.core.lock().scene.floaters.len()
	}

	pub fn caption(&self) -> String {
		self.core.lock().card.caption().to_string()
	}

	/// Advances the placeholder scene and renders one frame.
	///
	/// The frame scheduler calls this every display frame; calling it after
	/// teardown does nothing.
	pub fn update(&self, timestamp_ms: f64, delta_ms: f64) {
		self.core.lock().update(timestamp_ms, delta_ms);
	}

	/// Releases local resources and ends the platform session.
	///
	/// Does nothing once the instance was released or while a handoff is in
	/// progress: the session then belongs to the handoff.
	pub async fn stop(&self) {
		let session = {
			let mut core = self.core.lock();
			match core.phase {
				SessionPhase::Running => {}
				SessionPhase::HandingOff => {
					warn!(target = "interim.session", instance = %self.id, "stop ignored; handoff in progress");
					return;
				}
				SessionPhase::TornDown | SessionPhase::HandedOff => return,
			}
			core.teardown();
			core.phase = SessionPhase::TornDown;
			core.session.take()
		};

		let Some(session) = session else {
			return;
		};
		match session.end().await {
			Ok(()) => info!(target = "interim.session", instance = %self.id, session = %session.id(), "temporary session ended"),
			Err(PlatformError::SessionEnded) => debug!(target = "interim.session", instance = %self.id, "session had already ended"),
			Err(err) => warn!(target = "interim.session", instance = %self.id, error = %err, "failed to end session"),
		}
	}

	/// Hands the live session over after the configured fade.
	pub async fn handoff(&self) -> Option<SessionDescriptor> {
		let transition = self.core.lock().tuning.transition;
		self.handoff_with(tokio::time::sleep(transition)).await
	}

	/// Awaits `transition`, releases local resources without ending the
	/// platform session, and returns the session descriptor.
	///
	/// Returns `None` if the instance is not running. If the platform ends
	/// the session during `transition`, the descriptor is still returned;
	/// check [`SessionDescriptor::is_live`].
	pub async fn handoff_with<F>(&self, transition: F) -> Option<SessionDescriptor>
	where
		F: Future<Output = ()>,
	{
		{
			let mut core = self.core.lock();
			if core.phase != SessionPhase::Running || core.session.is_none() {
				warn!(target = "interim.session", instance = %self.id, phase = ?core.phase, "handoff refused; instance not running");
				return None;
			}
			core.phase = SessionPhase::HandingOff;
			debug!(target = "interim.session", instance = %self.id, "handoff transition started");
		}

		transition.await;

		let mut core = self.core.lock();
		core.scene.clear();
		core.teardown();
		core.phase = SessionPhase::HandedOff;
		let session = core.session.take()?;
		let init = std::mem::take(&mut core.init);
		info!(target = "interim.session", instance = %self.id, session = %session.id(), live = !session.is_ended(), "session handed off");
		Some(SessionDescriptor::new(session, core.mode, init))
	}
}

impl fmt::Debug for TemporarySession {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let phase = self.core.try_lock().map(|core| core.phase);
		f.debug_struct("TemporarySession")
			.field("id", &self.id)
			.field("mode", &self.mode)
			.field("phase", &phase)
			.finish()
	}
}

impl SessionCore {
	/// Releases local resources. Returns `false` if already released.
	fn teardown(&mut self) -> bool {
		let Some(subscription) = self.end_subscription.take() else {
			return false;
		};
		subscription.unsubscribe();
		self.scheduler.stop();
		if let Some(mut context) = self.context.take() {
			context.dispose();
		}
		self.scene.clear();
		debug!(target = "interim.session", instance = %self.id, frames = self.frame_count, "local resources released");
		true
	}

	/// Returns `true` when the owner should forget this instance.
	fn handle_platform_end(&mut self, reason: EndReason) -> bool {
		match self.phase {
			SessionPhase::Running => {
				info!(target = "interim.session", instance = %self.id, session = %self.session_id, ?reason, "platform ended temporary session");
				self.teardown();
				self.session = None;
				self.phase = SessionPhase::TornDown;
				true
			}
			SessionPhase::HandingOff => {
				info!(target = "interim.session", instance = %self.id, session = %self.session_id, ?reason, "platform ended session during handoff");
				self.teardown();
				false
			}
			SessionPhase::TornDown | SessionPhase::HandedOff => false,
		}
	}

	fn on_frame(&mut self, timing: FrameTiming) {
		let delta_ms = self.last_timestamp.map_or(0.0, |last| (timing.timestamp_ms - last).max(0.0));
		self.update(timing.timestamp_ms, delta_ms);
	}

	fn update(&mut self, timestamp_ms: f64, delta_ms: f64) {
		if self.context.is_none() {
			return;
		}
		self.frame_count += 1;
		self.last_timestamp = Some(timestamp_ms);
		let elapsed_ms = timestamp_ms - *self.started_at.get_or_insert(timestamp_ms);

		self.scene.animate_floaters((elapsed_ms / 1000.0) as f32, (delta_ms / 1000.0) as f32);

		// Keep the last known pose while tracking is lost.
		if let Some(pose) = self.session.as_ref().and_then(|session| session.viewer_pose()) {
			self.camera.pose = pose;
		}

		let factor = if self.frame_count <= self.tuning.snap_frames { 1.0 } else { self.tuning.smoothing };
		let opacity = self.fade_opacity(timestamp_ms);
		let card_changed = self.card.refresh(elapsed_ms);
		let texture = self.card.texture();
		if let Some(billboard) = self.scene.billboard.as_mut() {
			billboard.follow(&self.camera.pose, self.tuning.distance, self.tuning.height_offset, factor);
			billboard.opacity = opacity;
			billboard.texture = texture;
		}

		let frame = RenderFrame {
			frame: self.frame_count,
			viewer: self.camera.pose,
			lights: self.scene.lights.clone(),
			items: self.scene.draw_items(),
		};
		if let Some(context) = self.context.as_mut() {
			if card_changed {
				context.upload_texture(texture, self.card.width(), self.card.height(), self.card.pixels());
			}
			context.render(&frame);
		}
	}

	fn fade_opacity(&mut self, timestamp_ms: f64) -> f32 {
		if self.phase != SessionPhase::HandingOff {
			return 1.0;
		}
		let started = *self.fade_started_at.get_or_insert(timestamp_ms);
		let duration_ms = self.tuning.transition.as_secs_f64() * 1000.0;
		if duration_ms <= 0.0 {
			return 0.0;
		}
		(1.0 - (timestamp_ms - started) / duration_ms).clamp(0.0, 1.0) as f32
	}
}

impl Drop for SessionCore {
	fn drop(&mut self) {
		if self.teardown() {
			debug!(target = "interim.session", instance = %self.id, "instance dropped while running");
		}
	}
}
