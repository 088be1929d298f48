use clap::Parser;
use tracing::error;
use xr_interim_cli::{cli::Cli, commands, logging};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = commands::dispatch(cli.command, cli.config.as_deref()).await {
		error!(target = "interim.cli", error = %err, "command failed");
		std::process::exit(1);
	}
}
