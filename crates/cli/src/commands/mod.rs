mod config;
mod demo;

use std::path::Path;

use anyhow::Result;
use interim::GateConfig;
use tracing::debug;

use crate::cli::Commands;

pub use demo::{DemoOptions, DemoReport, HandoffReport};

pub async fn dispatch(command: Commands, config_path: Option<&Path>) -> Result<()> {
	let config = load_config(config_path)?;
	match command {
		Commands::Config => config::execute(&config),
		Commands::Demo {
			mode,
			grant_ms,
			load_ms,
			fps,
			outcome,
			required,
			optional,
			card_png,
		} => {
			let options = DemoOptions {
				mode: mode.into(),
				grant_ms,
				load_ms,
				fps,
				outcome,
				required,
				optional,
				card_png,
			};
			let report = demo::execute(config, options).await?;
			println!("{}", serde_json::to_string_pretty(&report)?);
			Ok(())
		}
	}
}

fn load_config(path: Option<&Path>) -> Result<GateConfig> {
	match path {
		Some(path) => {
			debug!(target = "interim.cli", path = %path.display(), "loading config");
			Ok(GateConfig::from_file(path)?)
		}
		None => Ok(GateConfig::default()),
	}
}
