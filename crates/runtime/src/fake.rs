//! In-memory XR platform for tests and headless runs.
//!
//! Grants are controlled from the outside, frames are delivered by calling
//! [`FakePlatform::tick_all`] (or [`FakeScheduler::tick`]), and every
//! resource the gate acquires is counted so tests can assert on leaks and
//! double releases.
//!
//! # Example
//!
//! ```ignore
//! let platform = FakePlatformBuilder::new().build();
//! let gate = SessionGate::new(Arc::new(platform.clone()), GateConfig::default());
//!
//! let pending = tokio::spawn({
//!     let gate = gate.clone();
//!     async move { gate.start(SessionMode::ImmersiveAr, SessionInit::new()).await }
//! });
//! platform.wait_for_requests(1).await;
//! platform.grant_next();
//! let instance = pending.await?.expect("granted");
//! platform.tick_all(FrameTiming::at(16.0));
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tracing::{debug, warn};
use xr_interim_protocol::{FrameTiming, RenderFrame, SessionInit, SessionMode, TextureRef, ViewerPose};

use crate::error::{PlatformError, Result};
use crate::platform::{EndCallback, EndReason, FrameCallback, FrameScheduler, PlatformSession, RenderContext, SessionHandle, SessionId, XrPlatform};
use crate::subscription::Subscription;

/// Builder for [`FakePlatform`].
pub struct FakePlatformBuilder {
	auto_grant: bool,
	end_on_grant: bool,
	unsupported: Vec<SessionMode>,
	pose: Option<ViewerPose>,
}

impl FakePlatformBuilder {
	pub fn new() -> Self {
		Self {
			auto_grant: false,
			end_on_grant: false,
			unsupported: Vec::new(),
			pose: Some(ViewerPose::default()),
		}
	}

	/// Grant every request as soon as it is made instead of waiting for
	/// [`FakePlatform::grant_next`].
	pub fn auto_grant(mut self, auto_grant: bool) -> Self {
		self.auto_grant = auto_grant;
		self
	}

	/// End every session externally the moment it is granted, before the
	/// requester sees it.
	pub fn end_on_grant(mut self, end_on_grant: bool) -> Self {
		self.end_on_grant = end_on_grant;
		self
	}

	/// Reject requests for `mode` with [`PlatformError::NotSupported`].
	pub fn unsupported(mut self, mode: SessionMode) -> Self {
		self.unsupported.push(mode);
		self
	}

	/// Initial viewer pose of new sessions; `None` simulates lost tracking.
	pub fn viewer_pose(mut self, pose: Option<ViewerPose>) -> Self {
		self.pose = pose;
		self
	}

	pub fn build(self) -> FakePlatform {
		let (requests, _) = watch::channel(0);
		FakePlatform {
			inner: Arc::new(PlatformInner {
				state: Mutex::new(PlatformState {
					auto_grant: self.auto_grant,
					end_on_grant: self.end_on_grant,
					unsupported: self.unsupported,
					pose: self.pose,
					pending: VecDeque::new(),
					sessions: Vec::new(),
					schedulers: Vec::new(),
					next_session: 1,
				}),
				requests,
				counters: Arc::new(Counters::default()),
				frames: Arc::new(Mutex::new(HashMap::new())),
			}),
		}
	}
}

impl Default for FakePlatformBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Snapshot of resource counters across all sessions of a [`FakePlatform`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FakeStats {
	pub requests: usize,
	pub contexts_created: usize,
	pub contexts_disposed: usize,
	/// `dispose` calls on a context that was already disposed.
	pub double_disposals: usize,
	pub frames_rendered: usize,
	pub textures_uploaded: usize,
}

#[derive(Debug, Default)]
struct Counters {
	contexts_created: AtomicUsize,
	contexts_disposed: AtomicUsize,
	double_disposals: AtomicUsize,
	frames_rendered: AtomicUsize,
	textures_uploaded: AtomicUsize,
}

type GrantSender = oneshot::Sender<Result<()>>;

struct PlatformState {
	auto_grant: bool,
	end_on_grant: bool,
	unsupported: Vec<SessionMode>,
	pose: Option<ViewerPose>,
	pending: VecDeque<GrantSender>,
	sessions: Vec<Arc<FakeSession>>,
	schedulers: Vec<(SessionId, Arc<FakeScheduler>)>,
	next_session: u64,
}

struct PlatformInner {
	state: Mutex<PlatformState>,
	requests: watch::Sender<usize>,
	counters: Arc<Counters>,
	frames: Arc<Mutex<HashMap<SessionId, RenderFrame>>>,
}

impl PlatformInner {
	fn create_session(&self, mode: SessionMode) -> Arc<FakeSession> {
		let (session, end_on_grant) = {
			let mut state = self.state.lock();
			let id = SessionId(state.next_session);
			state.next_session += 1;
			let session = Arc::new(FakeSession::new(id, mode, state.pose));
			state.sessions.push(Arc::clone(&session));
			debug!(target = "interim.fake", session = %id, %mode, "session granted");
			(session, state.end_on_grant)
		};
		if end_on_grant {
			session.simulate_external_end();
		}
		session
	}
}

/// Controllable in-memory [`XrPlatform`]. Cloning shares the same platform.
#[derive(Clone)]
pub struct FakePlatform {
	inner: Arc<PlatformInner>,
}

impl FakePlatform {
	/// Resolves the oldest pending request with a granted session.
	///
	/// Returns `false` when nothing is pending.
	pub fn grant_next(&self) -> bool {
		self.resolve_next(Ok(()))
	}

	/// Rejects the oldest pending request with [`PlatformError::Declined`].
	pub fn decline_next(&self, reason: &str) -> bool {
		self.resolve_next(Err(PlatformError::Declined(reason.to_string())))
	}

	fn resolve_next(&self, outcome: Result<()>) -> bool {
		let Some(sender) = self.inner.state.lock().pending.pop_front() else {
			return false;
		};
		sender.send(outcome).is_ok()
	}

	/// Number of requests still waiting for a grant or a decline.
	pub fn pending_requests(&self) -> usize {
		self.inner.state.lock().pending.len()
	}

	/// Total number of `request_session` calls so far.
	pub fn request_count(&self) -> usize {
		*self.inner.requests.borrow()
	}

	/// Waits until at least `count` requests have been made.
	pub async fn wait_for_requests(&self, count: usize) {
		let mut rx = self.inner.requests.subscribe();
		let _ = rx.wait_for(|made| *made >= count).await;
	}

	/// Every session granted so far, oldest first.
	pub fn sessions(&self) -> Vec<Arc<FakeSession>> {
		self.inner.state.lock().sessions.clone()
	}

	pub fn last_session(&self) -> Option<Arc<FakeSession>> {
		self.inner.state.lock().sessions.last().cloned()
	}

	/// Scheduler handed out for `session`, if one was requested.
	pub fn scheduler(&self, session: SessionId) -> Option<Arc<FakeScheduler>> {
		self.inner
			.state
			.lock()
			.schedulers
			.iter()
			.find(|(id, _)| *id == session)
			.map(|(_, scheduler)| Arc::clone(scheduler))
	}

	/// Delivers one frame to every running scheduler. Returns how many ran.
	pub fn tick_all(&self, timing: FrameTiming) -> usize {
		let schedulers: Vec<_> = self.inner.state.lock().schedulers.iter().map(|(_, s)| Arc::clone(s)).collect();
		schedulers.iter().filter(|scheduler| scheduler.tick(timing)).count()
	}

	/// Last frame rendered into `session`.
	pub fn last_frame(&self, session: SessionId) -> Option<RenderFrame> {
		self.inner.frames.lock().get(&session).cloned()
	}

	pub fn stats(&self) -> FakeStats {
		let counters = &self.inner.counters;
		FakeStats {
			requests: self.request_count(),
			contexts_created: counters.contexts_created.load(Ordering::SeqCst),
			contexts_disposed: counters.contexts_disposed.load(Ordering::SeqCst),
			double_disposals: counters.double_disposals.load(Ordering::SeqCst),
			frames_rendered: counters.frames_rendered.load(Ordering::SeqCst),
			textures_uploaded: counters.textures_uploaded.load(Ordering::SeqCst),
		}
	}
}

impl XrPlatform for FakePlatform {
	fn request_session(&self, mode: SessionMode, _init: &SessionInit) -> BoxFuture<'static, Result<SessionHandle>> {
		let waiter = {
			let mut state = self.inner.state.lock();
			if state.unsupported.contains(&mode) {
				Err(PlatformError::NotSupported(mode.to_string()))
			} else if state.auto_grant {
				Ok(None)
			} else {
				let (tx, rx) = oneshot::channel();
				state.pending.push_back(tx);
				Ok(Some(rx))
			}
		};
		self.inner.requests.send_modify(|made| *made += 1);

		let inner = Arc::clone(&self.inner);
		Box::pin(async move {
			if let Some(rx) = waiter? {
				rx.await.map_err(|_| PlatformError::Backend("request abandoned".to_string()))??;
			}
			Ok::<SessionHandle, PlatformError>(inner.create_session(mode))
		})
	}

	fn create_render_context(&self, session: &SessionHandle) -> Box<dyn RenderContext> {
		self.inner.counters.contexts_created.fetch_add(1, Ordering::SeqCst);
		Box::new(FakeRenderContext {
			session: session.id(),
			disposed: false,
			counters: Arc::clone(&self.inner.counters),
			frames: Arc::clone(&self.inner.frames),
		})
	}

	fn frame_scheduler(&self, session: &SessionHandle) -> Arc<dyn FrameScheduler> {
		let id = session.id();
		let mut state = self.inner.state.lock();
		if let Some((_, scheduler)) = state.schedulers.iter().find(|(existing, _)| *existing == id) {
			return Arc::clone(scheduler) as Arc<dyn FrameScheduler>;
		}
		let scheduler = Arc::new(FakeScheduler::default());
		state.schedulers.push((id, Arc::clone(&scheduler)));
		scheduler
	}
}

type Listeners = Arc<Mutex<Vec<(u64, EndCallback)>>>;

/// Session handed out by [`FakePlatform`].
pub struct FakeSession {
	id: SessionId,
	mode: SessionMode,
	pose: Mutex<Option<ViewerPose>>,
	ended: AtomicBool,
	end_calls: AtomicUsize,
	listeners: Listeners,
	next_listener: AtomicU64,
	detach_calls: Arc<AtomicUsize>,
}

impl FakeSession {
	fn new(id: SessionId, mode: SessionMode, pose: Option<ViewerPose>) -> Self {
		Self {
			id,
			mode,
			pose: Mutex::new(pose),
			ended: AtomicBool::new(false),
			end_calls: AtomicUsize::new(0),
			listeners: Arc::new(Mutex::new(Vec::new())),
			next_listener: AtomicU64::new(0),
			detach_calls: Arc::new(AtomicUsize::new(0)),
		}
	}

	pub fn mode(&self) -> SessionMode {
		self.mode
	}

	/// How many times [`PlatformSession::end`] was called.
	pub fn end_calls(&self) -> usize {
		self.end_calls.load(Ordering::SeqCst)
	}

	/// End listeners currently attached.
	pub fn listener_count(&self) -> usize {
		self.listeners.lock().len()
	}

	/// How many subscriptions were explicitly unsubscribed.
	pub fn detach_calls(&self) -> usize {
		self.detach_calls.load(Ordering::SeqCst)
	}

	pub fn set_viewer_pose(&self, pose: Option<ViewerPose>) {
		*self.pose.lock() = pose;
	}

	/// Ends the session the way system UI would. Returns `false` if it had
	/// already ended.
	pub fn simulate_external_end(&self) -> bool {
		self.finish(EndReason::External).is_ok()
	}

	fn finish(&self, reason: EndReason) -> Result<()> {
		if self.ended.swap(true, Ordering::SeqCst) {
			return Err(PlatformError::SessionEnded);
		}
		let listeners = std::mem::take(&mut *self.listeners.lock());
		debug!(target = "interim.fake", session = %self.id, ?reason, listeners = listeners.len(), "session ended");
		for (_, callback) in listeners {
			callback(reason);
		}
		Ok(())
	}
}

impl std::fmt::Debug for FakeSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FakeSession")
			.field("id", &self.id)
			.field("mode", &self.mode)
			.field("ended", &self.ended.load(Ordering::SeqCst))
			.finish()
	}
}

impl PlatformSession for FakeSession {
	fn id(&self) -> SessionId {
		self.id
	}

	fn on_end(&self, callback: EndCallback) -> Subscription {
		let key = self.next_listener.fetch_add(1, Ordering::SeqCst);
		self.listeners.lock().push((key, callback));

		let listeners: Weak<Mutex<Vec<(u64, EndCallback)>>> = Arc::downgrade(&self.listeners);
		let detach_calls = Arc::clone(&self.detach_calls);
		Subscription::new(move || {
			detach_calls.fetch_add(1, Ordering::SeqCst);
			if let Some(listeners) = listeners.upgrade() {
				listeners.lock().retain(|(existing, _)| *existing != key);
			}
		})
	}

	fn end(&self) -> BoxFuture<'static, Result<()>> {
		self.end_calls.fetch_add(1, Ordering::SeqCst);
		let outcome = self.finish(EndReason::Requested);
		Box::pin(async move { outcome })
	}

	fn viewer_pose(&self) -> Option<ViewerPose> {
		*self.pose.lock()
	}

	fn is_ended(&self) -> bool {
		self.ended.load(Ordering::SeqCst)
	}
}

/// Frame scheduler driven by explicit [`tick`](Self::tick) calls.
#[derive(Default)]
pub struct FakeScheduler {
	callback: Mutex<Option<FrameCallback>>,
	generation: AtomicU64,
	starts: AtomicUsize,
	stops: AtomicUsize,
}

impl FakeScheduler {
	/// Runs the installed callback once. Returns `false` when none is installed.
	///
	/// The callback runs without the scheduler lock held, so it may call
	/// [`FrameScheduler::stop`] on this scheduler.
	pub fn tick(&self, timing: FrameTiming) -> bool {
		let Some(mut callback) = self.callback.lock().take() else {
			return false;
		};
		let generation = self.generation.load(Ordering::SeqCst);
		callback(timing);

		let mut slot = self.callback.lock();
		if slot.is_none() && self.generation.load(Ordering::SeqCst) == generation {
			*slot = Some(callback);
		}
		true
	}

	pub fn is_running(&self) -> bool {
		self.callback.lock().is_some()
	}

	pub fn starts(&self) -> usize {
		self.starts.load(Ordering::SeqCst)
	}

	pub fn stops(&self) -> usize {
		self.stops.load(Ordering::SeqCst)
	}
}

impl FrameScheduler for FakeScheduler {
	fn start(&self, callback: FrameCallback) {
		self.generation.fetch_add(1, Ordering::SeqCst);
		self.starts.fetch_add(1, Ordering::SeqCst);
		*self.callback.lock() = Some(callback);
	}

	fn stop(&self) {
		self.generation.fetch_add(1, Ordering::SeqCst);
		self.stops.fetch_add(1, Ordering::SeqCst);
		self.callback.lock().take();
	}
}

struct FakeRenderContext {
	session: SessionId,
	disposed: bool,
	counters: Arc<Counters>,
	frames: Arc<Mutex<HashMap<SessionId, RenderFrame>>>,
}

impl RenderContext for FakeRenderContext {
	fn upload_texture(&mut self, texture: TextureRef, width: u32, height: u32, rgba: &[u8]) {
		if self.disposed {
			warn!(target = "interim.fake", session = %self.session, "texture upload after dispose");
			return;
		}
		debug_assert_eq!(rgba.len(), (width * height * 4) as usize);
		debug!(target = "interim.fake", session = %self.session, texture = texture.id, version = texture.version, "texture uploaded");
		self.counters.textures_uploaded.fetch_add(1, Ordering::SeqCst);
	}

	fn render(&mut self, frame: &RenderFrame) {
		if self.disposed {
			warn!(target = "interim.fake", session = %self.session, "render after dispose");
			return;
		}
		self.counters.frames_rendered.fetch_add(1, Ordering::SeqCst);
		self.frames.lock().insert(self.session, frame.clone());
	}

	fn dispose(&mut self) {
		if self.disposed {
			self.counters.double_disposals.fetch_add(1, Ordering::SeqCst);
			return;
		}
		self.disposed = true;
		self.counters.contexts_disposed.fetch_add(1, Ordering::SeqCst);
	}
}
