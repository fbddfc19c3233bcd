use clap::Parser;
use colored::Colorize;
use tracing::debug;

use bairro_node::commands::{self, Cli};
use bairro_node::config::NodeConfig;
use bairro_node::telemetry;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_file(path)?,
        None => NodeConfig::default(),
    };
    if let Some(state) = cli.state {
        config.state_file = state;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    match &config.logging.log_file {
        Some(file) => {
            telemetry::init_telemetry_with_file(&config.logging.level, config.logging.json(), file)?
        }
        None => telemetry::init_telemetry(&config.logging.level, config.logging.json())?,
    }
    debug!(name = %config.name, state = %config.state_file.display(), "configuration loaded");

    if let Err(e) = commands::execute(cli.command, &config) {
        eprintln!("{}", format!("Error: {:#}", e).red());
        std::process::exit(1);
    }

    Ok(())
}
