use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use xr_interim_protocol::SessionMode;

#[derive(Parser, Debug)]
#[command(name = "interim")]
#[command(about = "Temporary XR session gate - headless host")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Gate configuration file (JSON)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Print the effective gate configuration as JSON
	Config,

	/// Run one temporary session lifecycle against the in-memory platform
	Demo {
		/// Session mode to request
		#[arg(long, value_enum, default_value = "ar")]
		mode: ModeArg,

		/// Time the platform takes to grant the session (ms)
		#[arg(long, default_value = "50")]
		grant_ms: u64,

		/// Time the main application takes to load after the grant (ms)
		#[arg(long, default_value = "500")]
		load_ms: u64,

		/// Simulated display refresh rate
		#[arg(long, default_value = "60", value_parser = clap::value_parser!(u32).range(1..=240))]
		fps: u32,

		/// How the temporary session finishes
		#[arg(long, value_enum, default_value = "handoff")]
		outcome: Outcome,

		/// Required session feature (repeatable)
		#[arg(long = "require", value_name = "FEATURE")]
		required: Vec<String>,

		/// Optional session feature (repeatable)
		#[arg(long = "optional", value_name = "FEATURE")]
		optional: Vec<String>,

		/// Write the final loading card image to this PNG file
		#[arg(long, value_name = "FILE")]
		card_png: Option<PathBuf>,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
	Ar,
	Vr,
}

impl From<ModeArg> for SessionMode {
	fn from(mode: ModeArg) -> Self {
		match mode {
			ModeArg::Ar => SessionMode::ImmersiveAr,
			ModeArg::Vr => SessionMode::ImmersiveVr,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
	/// Transfer the live session to the (simulated) main application
	Handoff,
	/// End the session through the gate
	Stop,
	/// The platform ends the session, as when the user exits immersive mode
	Exit,
}
