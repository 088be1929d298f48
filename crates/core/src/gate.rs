//! Admission control for temporary sessions.
//!
//! The gate owns the only shared mutable state in the crate: which instance
//! is active and which request, if any, holds the admission slot. Both are
//! read and written under one lock that is never held across an `.await`,
//! so every admission decision is atomic with respect to the others.
//!
//! ```text
//! Idle ──start──▶ Requesting ──grant──▶ Active ──stop──────▶ Idle (session ended)
//!                    │                    ├──handoff──▶ Idle (session kept by caller)
//!                    └─fail/cancel─▶ Idle └──end event─▶ Idle (cleanup only)
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use xr_interim_protocol::{SessionInit, SessionMode};
use xr_interim_runtime::{PlatformError, SessionHandle, XrPlatform};

use crate::config::GateConfig;
use crate::descriptor::SessionDescriptor;
use crate::error::{ContentionReason, Error, Result};
use crate::session::{InstanceId, ReleaseHook, TemporarySession};

/// Identifies the `start` call currently holding the admission slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequestTicket(u64);

#[derive(Default)]
struct GateState {
	active: Option<TemporarySession>,
	/// Cleared by `stop()` to cancel the pending request.
	request: Option<RequestTicket>,
	handoff_in_progress: bool,
}

struct GateInner {
	platform: Arc<dyn XrPlatform>,
	config: GateConfig,
	state: Mutex<GateState>,
	next_ticket: AtomicU64,
}

enum Install {
	Installed,
	Cancelled,
	Ended,
}

/// Single point of entry for temporary sessions.
///
/// Construct one per process and share it by cloning; clones refer to the
/// same gate. None of the entry points return errors: refusals and platform
/// failures are logged and reported as `None`.
#[derive(Clone)]
pub struct SessionGate {
	inner: Arc<GateInner>,
}

impl SessionGate {
	pub fn new(platform: Arc<dyn XrPlatform>, config: GateConfig) -> Self {
		Self {
			inner: Arc::new(GateInner {
				platform,
				config: config.normalized(),
				state: Mutex::new(GateState::default()),
				next_ticket: AtomicU64::new(1),
			}),
		}
	}

	pub fn config(&self) -> &GateConfig {
		&self.inner.config
	}

	/// The running temporary session, if any.
	pub fn active(&self) -> Option<TemporarySession> {
		self.inner.state.lock().active.clone()
	}

	/// Whether a `start` is waiting on the platform.
	pub fn is_requesting(&self) -> bool {
		self.inner.state.lock().request.is_some()
	}

	/// Requests a platform session and starts the placeholder scene in it.
	///
	/// Returns `None` without touching the platform when a request is
	/// already in flight, a session is active, or a handoff is running.
	/// Also returns `None` when the platform refuses, or when `stop()` ran
	/// while the request was pending; a grant that arrives after such a
	/// cancellation is ended immediately.
	pub async fn start(&self, mode: SessionMode, init: SessionInit) -> Option<TemporarySession> {
		match self.try_start(mode, init).await {
			Ok(instance) => Some(instance),
			Err(err @ Error::Contention(_)) => {
				warn!(target = "interim.gate", %mode, error = %err, "start refused");
				None
			}
			Err(err @ Error::OrphanedGrant(_)) => {
				info!(target = "interim.gate", %mode, error = %err, "discarded late grant");
				None
			}
			Err(err) => {
				warn!(target = "interim.gate", %mode, error = %err, "start failed");
				None
			}
		}
	}

	async fn try_start(&self, mode: SessionMode, init: SessionInit) -> Result<TemporarySession> {
		let ticket = self.admit()?;
		debug!(target = "interim.gate", %mode, ticket = ticket.0, "requesting platform session");

		let session = match self.inner.platform.request_session(mode, &init).await {
			Ok(session) => session,
			Err(err) => {
				self.release_ticket(ticket);
				return Err(err.into());
			}
		};

		if !self.holds_ticket(ticket) {
			end_orphan(&session).await;
			return Err(Error::OrphanedGrant(session.id()));
		}

		let instance = TemporarySession::launch(self.inner.platform.as_ref(), Arc::clone(&session), mode, init, &self.inner.config, self.release_hook());
		match self.install(ticket, &instance) {
			Install::Installed => {
				info!(target = "interim.gate", instance = %instance.id(), session = %session.id(), %mode, "temporary session active");
				Ok(instance)
			}
			Install::Cancelled => {
				instance.stop().await;
				Err(Error::OrphanedGrant(session.id()))
			}
			Install::Ended => Err(PlatformError::SessionEnded.into()),
		}
	}

	/// Cancels a pending request and ends the active session, if any.
	///
	/// After ending an active session, waits for the configured settle delay
	/// so the platform can release it before the caller continues.
	pub async fn stop(&self) {
		let (instance, cancelled, handing_off) = {
			let mut state = self.inner.state.lock();
			let cancelled = state.request.take();
			(state.active.take(), cancelled, state.handoff_in_progress)
		};

		if let Some(ticket) = cancelled {
			info!(target = "interim.gate", ticket = ticket.0, "pending session request cancelled");
		}

		match instance {
			Some(instance) => {
				debug!(target = "interim.gate", instance = %instance.id(), "stopping temporary session");
				instance.stop().await;
				tokio::time::sleep(self.inner.config.settle_delay()).await;
			}
			None if handing_off => debug!(target = "interim.gate", "stop ignored; session is being handed off"),
			None => debug!(target = "interim.gate", "stop with no active session"),
		}
	}

	/// Transfers the active session to the caller after the configured fade.
	///
	/// The platform session is not ended. Returns `None` when nothing is
	/// active, including while a `start` is still waiting on the platform.
	///
	/// The instance leaves the gate as soon as the transition begins:
	/// during the fade [`active`](Self::active) returns `None`, `stop()`
	/// does nothing and `start()` is refused.
	pub async fn handoff(&self) -> Option<SessionDescriptor> {
		let transition = self.inner.config.handoff_transition();
		self.handoff_with(tokio::time::sleep(transition)).await
	}

	/// Like [`handoff`](Self::handoff), but awaits `transition` instead of
	/// the configured delay.
	pub async fn handoff_with<F>(&self, transition: F) -> Option<SessionDescriptor>
	where
		F: Future<Output = ()>,
	{
		let instance = {
			let mut state = self.inner.state.lock();
			let Some(instance) = state.active.take() else {
				if state.request.is_some() {
					warn!(target = "interim.gate", "handoff refused; session request still pending");
				} else {
					debug!(target = "interim.gate", "handoff with no active session");
				}
				return None;
			};
			state.handoff_in_progress = true;
			instance
		};

		let _guard = HandoffGuard(&self.inner);
		let descriptor = instance.handoff_with(transition).await;
		match &descriptor {
			Some(descriptor) => info!(
				target = "interim.gate",
				instance = %instance.id(),
				session = %descriptor.session().id(),
				live = descriptor.is_live(),
				"ownership transferred"
			),
			None => warn!(target = "interim.gate", instance = %instance.id(), "instance could not be handed off"),
		}
		descriptor
	}

	fn admit(&self) -> Result<RequestTicket> {
		let mut state = self.inner.state.lock();
		if state.active.is_some() {
			return Err(Error::Contention(ContentionReason::SessionActive));
		}
		if state.request.is_some() {
			return Err(Error::Contention(ContentionReason::RequestInFlight));
		}
		if state.handoff_in_progress {
			return Err(Error::Contention(ContentionReason::HandoffInProgress));
		}
		let ticket = RequestTicket(self.inner.next_ticket.fetch_add(1, Ordering::Relaxed));
		state.request = Some(ticket);
		Ok(ticket)
	}

	fn holds_ticket(&self, ticket: RequestTicket) -> bool {
		self.inner.state.lock().request == Some(ticket)
	}

	fn release_ticket(&self, ticket: RequestTicket) {
		let mut state = self.inner.state.lock();
		if state.request == Some(ticket) {
			state.request = None;
		}
	}

	fn install(&self, ticket: RequestTicket, instance: &TemporarySession) -> Install {
		{
			let mut state = self.inner.state.lock();
			if state.request != Some(ticket) {
				return Install::Cancelled;
			}
			state.request = None;
			state.active = Some(instance.clone());
		}
		// The platform may have ended the session before it was installed,
		// in which case the release hook found nothing to forget.
		if instance.is_released() {
			self.inner.forget(instance.id());
			return Install::Ended;
		}
		Install::Installed
	}

	fn release_hook(&self) -> ReleaseHook {
		let inner: Weak<GateInner> = Arc::downgrade(&self.inner);
		Box::new(move |id| {
			if let Some(inner) = inner.upgrade() {
				inner.forget(id);
			}
		})
	}
}

impl GateInner {
	fn forget(&self, id: InstanceId) {
		// Take the handle out before dropping it so the drop runs unlocked.
		let released = {
			let mut state = self.state.lock();
			if state.active.as_ref().is_some_and(|active| active.id() == id) {
				state.active.take()
			} else {
				None
			}
		};
		if released.is_some() {
			info!(target = "interim.gate", instance = %id, "temporary session closed by platform");
		}
	}
}

/// Clears the handoff flag even if the handoff future is dropped mid-way.
struct HandoffGuard<'a>(&'a GateInner);

impl Drop for HandoffGuard<'_> {
	fn drop(&mut self) {
		self.0.state.lock().handoff_in_progress = false;
	}
}

async fn end_orphan(session: &SessionHandle) {
	warn!(target = "interim.gate", session = %session.id(), "session granted after cancellation; ending it");
	if let Err(err) = session.end().await {
		warn!(target = "interim.gate", session = %session.id(), error = %err, "failed to end orphaned session");
	}
}

#[cfg(test)]
mod tests {
	use xr_interim_runtime::fake::{FakePlatform, FakePlatformBuilder};

	use super::*;
	use crate::session::SessionPhase;

	fn quick_config() -> GateConfig {
		GateConfig {
			settle_delay_ms: 0,
			handoff_transition_ms: 0,
			..GateConfig::default()
		}
	}

	fn gate(platform: &FakePlatform) -> SessionGate {
		SessionGate::new(Arc::new(platform.clone()), quick_config())
	}

	#[tokio::test]
	async fn admit_reports_contention_reason() {
		let platform = FakePlatformBuilder::new().build();
		let gate = gate(&platform);

		let first = gate.admit().unwrap();
		assert!(matches!(gate.admit(), Err(Error::Contention(ContentionReason::RequestInFlight))));
		gate.release_ticket(first);
		assert!(!gate.is_requesting());

		gate.inner.state.lock().handoff_in_progress = true;
		assert!(matches!(gate.admit(), Err(Error::Contention(ContentionReason::HandoffInProgress))));
	}

	#[tokio::test]
	async fn stale_ticket_does_not_clear_newer_request() {
		let platform = FakePlatformBuilder::new().build();
		let gate = gate(&platform);

		let old = gate.admit().unwrap();
		gate.inner.state.lock().request = None;
		let new = gate.admit().unwrap();
		gate.release_ticket(old);
		assert!(gate.holds_ticket(new));
	}

	#[tokio::test]
	async fn platform_end_clears_active() {
		let platform = FakePlatformBuilder::new().auto_grant(true).build();
		let gate = gate(&platform);

		let instance = gate.start(SessionMode::ImmersiveVr, SessionInit::new()).await.unwrap();
		assert_eq!(gate.active().map(|active| active.id()), Some(instance.id()));

		assert!(platform.last_session().unwrap().simulate_external_end());
		assert!(gate.active().is_none());
		assert_eq!(instance.phase(), SessionPhase::TornDown);
		assert!(gate.start(SessionMode::ImmersiveVr, SessionInit::new()).await.is_some());
	}

	#[tokio::test]
	async fn session_ended_before_install_is_not_activated() {
		let platform = FakePlatformBuilder::new().auto_grant(true).end_on_grant(true).build();
		let gate = gate(&platform);

		assert!(gate.start(SessionMode::ImmersiveAr, SessionInit::new()).await.is_none());
		assert!(gate.active().is_none());
		assert!(!gate.is_requesting());

		let stats = platform.stats();
		assert_eq!(stats.contexts_created, 1);
		assert_eq!(stats.contexts_disposed, 1);
		assert_eq!(stats.double_disposals, 0);
		let session = platform.last_session().unwrap();
		assert_eq!(session.end_calls(), 0);
		assert_eq!(session.listener_count(), 0);

		// The admission slot is free again.
		assert!(gate.admit().is_ok());
	}

	#[tokio::test]
	async fn dropped_handoff_clears_flag() {
		let platform = FakePlatformBuilder::new().auto_grant(true).build();
		let gate = gate(&platform);
		gate.start(SessionMode::ImmersiveAr, SessionInit::new()).await.unwrap();

		let handoff = gate.handoff_with(std::future::pending::<()>());
		let timed_out = tokio::time::timeout(std::time::Duration::from_millis(10), handoff).await;
		assert!(timed_out.is_err());
		assert!(!gate.inner.state.lock().handoff_in_progress);
	}
}
