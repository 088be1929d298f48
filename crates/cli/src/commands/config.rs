use anyhow::Result;
use interim::GateConfig;

pub fn execute(config: &GateConfig) -> Result<()> {
	println!("{}", serde_json::to_string_pretty(config)?);
	Ok(())
}
