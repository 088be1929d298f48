use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use interim::{FrameTiming, GateConfig, PlatformSession, SessionGate, SessionInit, SessionMode, SessionPhase, TemporarySession};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use xr_interim_runtime::fake::{FakePlatform, FakePlatformBuilder};

fn quick_config() -> GateConfig {
	GateConfig {
		settle_delay_ms: 0,
		handoff_transition_ms: 0,
		..GateConfig::default()
	}
}

fn setup(platform: FakePlatform) -> (FakePlatform, SessionGate) {
	let gate = SessionGate::new(Arc::new(platform.clone()), quick_config());
	(platform, gate)
}

fn ar_init() -> SessionInit {
	SessionInit::new().with_required("local-floor").with_optional("hit-test").with_dom_overlay("#overlay")
}

fn spawn_start(gate: &SessionGate, mode: SessionMode, init: SessionInit) -> JoinHandle<Option<TemporarySession>> {
	let gate = gate.clone();
	tokio::spawn(async move { gate.start(mode, init).await })
}

#[tokio::test]
async fn uncontended_start_becomes_active() -> Result<()> {
	let (platform, gate) = setup(FakePlatformBuilder::new().build());

	let pending = spawn_start(&gate, SessionMode::ImmersiveAr, ar_init());
	platform.wait_for_requests(1).await;
	assert!(gate.is_requesting());
	assert!(platform.grant_next());

	let instance = pending.await?.expect("session granted");
	assert_eq!(instance.mode(), SessionMode::ImmersiveAr);
	assert_eq!(instance.phase(), SessionPhase::Running);
	assert_eq!(gate.active().map(|active| active.id()), Some(instance.id()));
	assert!(!gate.is_requesting());

	assert_eq!(platform.tick_all(FrameTiming::at(16.0)), 1);
	assert_eq!(instance.frame_count(), 1);
	Ok(())
}

#[tokio::test]
async fn second_start_while_pending_is_refused_without_prompt() -> Result<()> {
	let (platform, gate) = setup(FakePlatformBuilder::new().build());

	let first = spawn_start(&gate, SessionMode::ImmersiveVr, SessionInit::new());
	platform.wait_for_requests(1).await;

	assert!(gate.start(SessionMode::ImmersiveVr, SessionInit::new()).await.is_none());
	assert!(gate.start(SessionMode::ImmersiveAr, SessionInit::new()).await.is_none());
	assert_eq!(platform.request_count(), 1);

	platform.grant_next();
	assert!(first.await?.is_some());
	assert!(gate.start(SessionMode::ImmersiveVr, SessionInit::new()).await.is_none());
	assert_eq!(platform.request_count(), 1);
	Ok(())
}

#[tokio::test]
async fn stop_while_pending_ends_the_late_grant() -> Result<()> {
	let (platform, gate) = setup(FakePlatformBuilder::new().build());

	let pending = spawn_start(&gate, SessionMode::ImmersiveAr, ar_init());
	platform.wait_for_requests(1).await;

	gate.stop().await;
	assert!(!gate.is_requesting());
	assert!(gate.active().is_none());

	platform.grant_next();
	assert!(pending.await?.is_none());
	assert!(gate.active().is_none());

	let session = platform.last_session().expect("platform granted a session");
	assert_eq!(session.end_calls(), 1);
	assert_eq!(platform.stats().contexts_created, 0);
	Ok(())
}

#[tokio::test]
async fn stale_grant_cannot_displace_a_newer_start() -> Result<()> {
	let (platform, gate) = setup(FakePlatformBuilder::new().build());

	let stale = spawn_start(&gate, SessionMode::ImmersiveVr, SessionInit::new());
	platform.wait_for_requests(1).await;
	gate.stop().await;

	let fresh = spawn_start(&gate, SessionMode::ImmersiveVr, SessionInit::new());
	platform.wait_for_requests(2).await;

	// Grants resolve oldest first: the stale request gets the first session.
	platform.grant_next();
	assert!(stale.await?.is_none());
	assert!(gate.is_requesting());

	platform.grant_next();
	let instance = fresh.await?.expect("newer request granted");
	let sessions = platform.sessions();
	assert_eq!(sessions.len(), 2);
	assert_eq!(sessions[0].end_calls(), 1);
	assert_eq!(sessions[1].end_calls(), 0);
	assert_eq!(instance.session_id(), sessions[1].id());
	Ok(())
}

#[tokio::test]
async fn handoff_returns_request_without_ending_session() -> Result<()> {
	let (platform, gate) = setup(FakePlatformBuilder::new().auto_grant(true).build());

	let instance = gate.start(SessionMode::ImmersiveAr, ar_init()).await.expect("granted");
	platform.tick_all(FrameTiming::at(0.0));

	let descriptor = gate.handoff().await.expect("handed off");
	assert_eq!(descriptor.mode(), SessionMode::ImmersiveAr);
	assert_eq!(descriptor.init(), &ar_init());
	assert!(descriptor.is_live());
	assert!(gate.active().is_none());
	assert_eq!(instance.phase(), SessionPhase::HandedOff);

	let session = platform.last_session().expect("session");
	assert_eq!(session.end_calls(), 0);
	assert_eq!(session.listener_count(), 0);
	assert_eq!(platform.stats().contexts_disposed, 1);

	// Nothing reachable through the gate or the old handle may end it now.
	gate.stop().await;
	instance.stop().await;
	assert!(gate.handoff().await.is_none());
	assert_eq!(session.end_calls(), 0);
	assert_eq!(platform.tick_all(FrameTiming::at(16.0)), 0);

	let (handle, mode, init) = descriptor.into_parts();
	assert!(!handle.is_ended());
	assert_eq!((mode, init), (SessionMode::ImmersiveAr, ar_init()));
	Ok(())
}

#[tokio::test]
async fn platform_end_releases_everything_without_stop() -> Result<()> {
	let (platform, gate) = setup(FakePlatformBuilder::new().auto_grant(true).build());

	let instance = gate.start(SessionMode::ImmersiveVr, SessionInit::new()).await.expect("granted");
	platform.tick_all(FrameTiming::at(0.0));
	let session = platform.last_session().expect("session");

	assert!(session.simulate_external_end());
	assert!(gate.active().is_none());
	assert_eq!(instance.phase(), SessionPhase::TornDown);
	assert!(instance.is_released());

	let stats = platform.stats();
	assert_eq!(stats.contexts_created, 1);
	assert_eq!(stats.contexts_disposed, 1);
	assert_eq!(session.listener_count(), 0);
	assert!(!platform.scheduler(instance.session_id()).expect("scheduler").is_running());
	assert_eq!(session.end_calls(), 0);

	// A late stop after the end event is a no-op.
	instance.stop().await;
	gate.stop().await;
	assert_eq!(session.end_calls(), 0);
	assert_eq!(platform.stats().double_disposals, 0);
	Ok(())
}

#[tokio::test]
async fn stop_then_end_event_releases_once() -> Result<()> {
	let (platform, gate) = setup(FakePlatformBuilder::new().auto_grant(true).build());

	gate.start(SessionMode::ImmersiveAr, SessionInit::new()).await.expect("granted");
	let session = platform.last_session().expect("session");

	gate.stop().await;
	gate.stop().await;
	assert!(!session.simulate_external_end());

	let stats = platform.stats();
	assert_eq!(stats.contexts_disposed, 1);
	assert_eq!(stats.double_disposals, 0);
	assert_eq!(session.end_calls(), 1);
	assert_eq!(session.detach_calls(), 1);
	Ok(())
}

#[tokio::test]
async fn handoff_while_requesting_fails_fast() -> Result<()> {
	let (platform, gate) = setup(FakePlatformBuilder::new().build());

	let pending = spawn_start(&gate, SessionMode::ImmersiveVr, SessionInit::new());
	platform.wait_for_requests(1).await;
	assert!(gate.handoff().await.is_none());

	platform.grant_next();
	let instance = pending.await?.expect("grant still lands");
	assert_eq!(gate.active().map(|active| active.id()), Some(instance.id()));
	Ok(())
}

#[tokio::test]
async fn start_and_stop_during_handoff_leave_it_alone() -> Result<()> {
	let (platform, gate) = setup(FakePlatformBuilder::new().auto_grant(true).build());
	let instance = gate.start(SessionMode::ImmersiveVr, SessionInit::new()).await.expect("granted");

	let (finish, finished) = oneshot::channel::<()>();
	let handoff = tokio::spawn({
		let gate = gate.clone();
		async move {
			gate.handoff_with(async move {
				let _ = finished.await;
			})
			.await
		}
	});
	while instance.phase() != SessionPhase::HandingOff {
		tokio::task::yield_now().await;
	}

	assert!(gate.start(SessionMode::ImmersiveVr, SessionInit::new()).await.is_none());
	assert_eq!(platform.request_count(), 1);
	gate.stop().await;
	instance.stop().await;
	let session = platform.last_session().expect("session");
	assert_eq!(session.end_calls(), 0);

	finish.send(()).ok();
	let descriptor = handoff.await?.expect("handoff completes");
	assert!(descriptor.is_live());
	assert_eq!(session.end_calls(), 0);

	// The gate accepts new work once the handoff returned.
	assert!(gate.start(SessionMode::ImmersiveAr, SessionInit::new()).await.is_some());
	Ok(())
}

#[tokio::test]
async fn session_ending_during_handoff_still_hands_off() -> Result<()> {
	let (platform, gate) = setup(FakePlatformBuilder::new().auto_grant(true).build());
	gate.start(SessionMode::ImmersiveAr, SessionInit::new()).await.expect("granted");
	let session = platform.last_session().expect("session");

	let descriptor = gate
		.handoff_with(async {
			session.simulate_external_end();
		})
		.await
		.expect("descriptor returned");
	assert!(!descriptor.is_live());
	assert_eq!(platform.stats().contexts_disposed, 1);
	assert_eq!(platform.stats().double_disposals, 0);
	Ok(())
}

#[tokio::test]
async fn declined_or_unsupported_requests_clear_the_slot() -> Result<()> {
	let (platform, gate) = setup(FakePlatformBuilder::new().unsupported(SessionMode::ImmersiveAr).build());

	assert!(gate.start(SessionMode::ImmersiveAr, SessionInit::new()).await.is_none());
	assert!(!gate.is_requesting());

	let pending = spawn_start(&gate, SessionMode::ImmersiveVr, SessionInit::new());
	platform.wait_for_requests(2).await;
	platform.decline_next("permission denied");
	assert!(pending.await?.is_none());
	assert!(!gate.is_requesting());
	assert!(gate.active().is_none());

	let retry = spawn_start(&gate, SessionMode::ImmersiveVr, SessionInit::new());
	platform.wait_for_requests(3).await;
	platform.grant_next();
	assert!(retry.await?.is_some());
	Ok(())
}

#[tokio::test]
async fn stop_waits_for_settle_delay() -> Result<()> {
	let platform = FakePlatformBuilder::new().auto_grant(true).build();
	let config = GateConfig {
		settle_delay_ms: 40,
		..quick_config()
	};
	let gate = SessionGate::new(Arc::new(platform.clone()), config);
	gate.start(SessionMode::ImmersiveVr, SessionInit::new()).await.expect("granted");

	let started = tokio::time::Instant::now();
	gate.stop().await;
	assert!(started.elapsed() >= Duration::from_millis(40));

	// No active session means no delay.
	let started = tokio::time::Instant::now();
	gate.stop().await;
	assert!(started.elapsed() < Duration::from_millis(40));
	Ok(())
}

#[tokio::test]
async fn random_call_sequences_keep_one_instance() -> Result<()> {
	let (platform, gate) = setup(FakePlatformBuilder::new().build());
	let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
	let mut pending: Vec<JoinHandle<Option<TemporarySession>>> = Vec::new();
	let mut handed_off = Vec::new();

	for _ in 0..200 {
		seed ^= seed << 13;
		seed ^= seed >> 7;
		seed ^= seed << 17;
		match seed % 5 {
			0 => pending.push(spawn_start(&gate, SessionMode::ImmersiveVr, SessionInit::new())),
			1 => {
				platform.grant_next();
			}
			2 => gate.stop().await,
			3 => {
				if let Some(descriptor) = gate.handoff().await {
					handed_off.push(descriptor);
				}
			}
			_ => {
				platform.tick_all(FrameTiming::at(16.0));
			}
		}
		tokio::task::yield_now().await;

		let running = platform
			.sessions()
			.iter()
			.filter(|session| platform.scheduler(session.id()).is_some_and(|s| s.is_running()))
			.count();
		assert!(running <= 1, "{running} instances rendering at once");
		assert!(!(gate.active().is_some() && gate.is_requesting()));
	}

	while platform.pending_requests() > 0 {
		platform.grant_next();
	}
	for task in pending {
		task.await?;
	}
	for descriptor in &handed_off {
		let id = descriptor.session().id();
		let session = platform.sessions().into_iter().find(|session| session.id() == id);
		assert_eq!(session.map(|session| session.end_calls()), Some(0));
	}
	assert_eq!(platform.stats().double_disposals, 0);
	Ok(())
}
