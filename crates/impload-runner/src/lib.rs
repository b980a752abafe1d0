//! # impload-runner
//!
//! The `impload` command: resolves a device, connects, and runs one
//! mission command against an INAV flight controller.
//!
//! ```text
//! impload -d /dev/ttyACM0 upload mission.json
//! impload -d tcp://localhost:5760 download out.json
//! impload restore
//! impload multi=2
//! ```

pub mod cli;
pub mod commands;
pub mod device;
pub mod error;
pub mod mission_io;

pub use cli::{Cli, Command};
pub use error::RunnerError;

use impload_link::{Engine, LinkConfig};
use tracing::info;

/// Link configuration from `--config` (if given) and the environment.
pub fn load_config(cli: &Cli) -> Result<LinkConfig, RunnerError> {
    let config = match &cli.config {
        Some(path) => LinkConfig::load(path)?,
        None => LinkConfig::default(),
    };
    Ok(config.with_env())
}

/// Run the command named on the command line.
pub fn run(cli: &Cli) -> Result<(), RunnerError> {
    let command: Command = cli.command.parse()?;
    let config = load_config(cli)?;

    if !command.needs_device() {
        if command == Command::Check {
            // Warnings only; a failing mission is not a failed run.
            commands::check_file(cli.mission_path(), &config)?;
        } else {
            println!("{}", commands::version_string());
        }
        return Ok(());
    }

    let device = device::resolve_device(cli.device.as_deref(), cli.baud)?;
    let restore = matches!(command, Command::Download { restore: true });
    let mut engine = Engine::connect(&device, config, restore)?;
    let result = execute(&mut engine, command, cli, &device.to_string());
    engine.close();
    result
}

/// Run `command` on a connected engine.
pub fn execute(
    engine: &mut Engine,
    command: Command,
    cli: &Cli,
    source: &str,
) -> Result<(), RunnerError> {
    match command {
        Command::Test | Command::Version | Command::Check => {}
        Command::Upload { persist } => {
            commands::upload_file(engine, cli.mission_path(), &cli.sanitise_options(), persist)?;
        }
        Command::Download { restore } => {
            commands::download_to(engine, cli.output_path(), restore, source)?;
        }
        Command::Clear { persist } => {
            let report = engine.clear(persist)?;
            info!("Mission cleared ({})", report.device);
        }
        Command::Multi(index) => {
            commands::multi_index(engine, index)?;
        }
    }
    Ok(())
}
