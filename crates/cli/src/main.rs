use anyhow::Result;
use chatlink_cli::cli::Cli;
use chatlink_cli::config::{self, FileConfig};
use chatlink_cli::{commands, logging};
use clap::Parser;
use tracing::error;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = run(cli).await {
		error!(target = "chatlink.cli", error = %format!("{err:#}"), "command failed");
		std::process::exit(1);
	}
}

async fn run(cli: Cli) -> Result<()> {
	let file = match &cli.config {
		Some(path) => FileConfig::load(path)?,
		None => FileConfig::default(),
	};
	let config = config::resolve(file, &cli.connection)?;
	commands::dispatch(cli.command, config).await
}
