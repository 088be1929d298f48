//! One full temporary-session lifecycle against the in-memory platform.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use interim::loading_card::LoadingCard;
use interim::{FrameTiming, GateConfig, SessionGate, SessionInit, SessionMode, ViewerPose};
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;
use xr_interim_runtime::fake::{FakePlatform, FakePlatformBuilder};

use crate::cli::Outcome;

#[derive(Debug, Clone)]
pub struct DemoOptions {
	pub mode: SessionMode,
	pub grant_ms: u64,
	pub load_ms: u64,
	pub fps: u32,
	pub outcome: Outcome,
	pub required: Vec<String>,
	pub optional: Vec<String>,
	pub card_png: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct DemoReport {
	pub mode: SessionMode,
	pub outcome: Outcome,
	pub instance: String,
	pub session: String,
	/// Frames the temporary session rendered before it was released.
	pub frames: u64,
	pub textures_uploaded: usize,
	pub contexts_disposed: usize,
	/// `end()` calls the gate made on the platform session.
	pub end_calls: usize,
	pub active_after: bool,
	pub caption: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub handoff: Option<HandoffReport>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub card_png: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct HandoffReport {
	pub mode: SessionMode,
	pub live: bool,
	pub init: SessionInit,
}

pub async fn execute(config: GateConfig, options: DemoOptions) -> Result<DemoReport> {
	let platform = FakePlatformBuilder::new().build();
	let gate = SessionGate::new(Arc::new(platform.clone()), config);
	let init = session_init(&options);
	let clock = Instant::now();

	let pending = tokio::spawn({
		let gate = gate.clone();
		let init = init.clone();
		let mode = options.mode;
		async move { gate.start(mode, init).await }
	});
	platform.wait_for_requests(1).await;
	tokio::time::sleep(Duration::from_millis(options.grant_ms)).await;
	platform.grant_next();
	let instance = pending.await?.context("platform did not grant a temporary session")?;
	let session = platform.last_session().context("granted session missing from platform")?;
	info!(target = "interim.cli", instance = %instance.id(), mode = %options.mode, "temporary session running");

	let ticker = tokio::spawn(drive_frames(platform.clone(), options.fps, clock));
	tokio::time::sleep(Duration::from_millis(options.load_ms)).await;

	let handoff = match options.outcome {
		Outcome::Handoff => {
			let descriptor = gate.handoff().await.context("handoff returned no session")?;
			Some(HandoffReport {
				mode: descriptor.mode(),
				live: descriptor.is_live(),
				init: descriptor.init().clone(),
			})
		}
		Outcome::Stop => {
			gate.stop().await;
			None
		}
		Outcome::Exit => {
			session.simulate_external_end();
			None
		}
	};
	ticker.abort();

	let card_png = match options.card_png {
		Some(path) => {
			let mut card = LoadingCard::new(gate.config());
			card.refresh(clock.elapsed().as_secs_f64() * 1000.0);
			card.save_png(&path).with_context(|| format!("failed to write {}", path.display()))?;
			Some(path)
		}
		None => None,
	};

	let stats = platform.stats();
	Ok(DemoReport {
		mode: options.mode,
		outcome: options.outcome,
		instance: instance.id().to_string(),
		session: instance.session_id().to_string(),
		frames: instance.frame_count(),
		textures_uploaded: stats.textures_uploaded,
		contexts_disposed: stats.contexts_disposed,
		end_calls: session.end_calls(),
		active_after: gate.active().is_some(),
		caption: instance.caption(),
		handoff,
		card_png,
	})
}

fn session_init(options: &DemoOptions) -> SessionInit {
	let init = options.required.iter().fold(SessionInit::new(), |init, feature| init.with_required(feature.as_str()));
	options.optional.iter().fold(init, |init, feature| init.with_optional(feature.as_str()))
}

async fn drive_frames(platform: FakePlatform, fps: u32, clock: Instant) {
	let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(fps.max(1))));
	interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
	loop {
		interval.tick().await;
		let elapsed_ms = clock.elapsed().as_secs_f64() * 1000.0;
		// Slow head sway so the billboard has something to follow.
		let yaw = ((elapsed_ms / 1000.0) * 0.8).sin() as f32 * 0.5;
		if let Some(session) = platform.last_session() {
			session.set_viewer_pose(Some(ViewerPose::with_yaw([0.0, 1.6, 0.0], yaw)));
		}
		platform.tick_all(FrameTiming::at(elapsed_ms));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn options(outcome: Outcome) -> DemoOptions {
		DemoOptions {
			mode: SessionMode::ImmersiveVr,
			grant_ms: 0,
			load_ms: 60,
			fps: 120,
			outcome,
			required: vec!["local-floor".to_string()],
			optional: vec!["hand-tracking".to_string()],
			card_png: None,
		}
	}

	fn quick_config() -> GateConfig {
		GateConfig {
			settle_delay_ms: 0,
			handoff_transition_ms: 20,
			..GateConfig::default()
		}
	}

	#[tokio::test]
	async fn handoff_keeps_session_alive() {
		let report = execute(quick_config(), options(Outcome::Handoff)).await.unwrap();
		let handoff = report.handoff.expect("handoff report");
		assert!(handoff.live);
		assert_eq!(handoff.mode, SessionMode::ImmersiveVr);
		assert_eq!(handoff.init.required_features, vec!["local-floor".to_string()]);
		assert_eq!(report.end_calls, 0);
		assert_eq!(report.contexts_disposed, 1);
		assert!(report.frames > 0);
		assert!(!report.active_after);
	}

	#[tokio::test]
	async fn stop_ends_session_once() {
		let report = execute(quick_config(), options(Outcome::Stop)).await.unwrap();
		assert!(report.handoff.is_none());
		assert_eq!(report.end_calls, 1);
		assert!(!report.active_after);
	}

	#[tokio::test]
	async fn platform_exit_releases_without_end_call() {
		let report = execute(quick_config(), options(Outcome::Exit)).await.unwrap();
		assert_eq!(report.end_calls, 0);
		assert_eq!(report.contexts_disposed, 1);
		assert!(!report.active_after);
	}
}
