//! Command line.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use impload_mission::SanitiseOptions;

use crate::error::RunnerError;
use crate::mission_io::STDIO;

/// Setting selecting the active mission of a multi-mission upload.
pub const MULTI_MISSION_SETTING: &str = "nav_wp_multi_mission_index";

/// Highest multi-mission index the firmware accepts.
pub const MAX_MULTI_MISSION_INDEX: u8 = 9;

/// Upload and download INAV waypoint missions over MSP.
#[derive(Parser, Debug, Clone)]
#[command(name = "impload", version)]
#[command(about = "Upload and download INAV waypoint missions over MSP")]
#[command(after_help = "Commands: test, upload (up), store (sto), download (down), \
    restore (rest), clear, erase, check, multi[=n], version")]
pub struct Cli {
    /// Device: serial path[@baud], tcp://host:port, udp://..., or a Bluetooth address
    #[arg(short, long)]
    pub device: Option<String>,

    /// Serial baud rate
    #[arg(short, long, default_value_t = 115200)]
    pub baud: u32,

    /// Altitude (m) for waypoints without one
    #[arg(short = 'a', long, default_value_t = 20)]
    pub default_alt: i32,

    /// Speed (m/s) for waypoints without one
    #[arg(short = 's', long, default_value_t = 0.0)]
    pub default_speed: f64,

    /// Append RTH to every mission segment
    #[arg(long)]
    pub force_rth: bool,

    /// Append RTH and land to every mission segment
    #[arg(long)]
    pub force_land: bool,

    /// Link configuration file (YAML)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(long)]
    pub verbose: bool,

    /// Output file for downloads (default stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<String>,

    /// Action to perform
    #[arg(value_name = "COMMAND")]
    pub command: String,

    /// Mission file; `-` or absent for stdin/stdout
    #[arg(value_name = "FILE")]
    pub files: Vec<String>,
}

impl Cli {
    /// Mission file named on the command line.
    pub fn mission_path(&self) -> &str {
        self.files.first().map(String::as_str).unwrap_or(STDIO)
    }

    /// Where downloads go.
    pub fn output_path(&self) -> &str {
        self.output.as_deref().unwrap_or_else(|| self.mission_path())
    }

    pub fn sanitise_options(&self) -> SanitiseOptions {
        SanitiseOptions {
            default_alt: self.default_alt,
            default_speed: self.default_speed,
            force_rth: self.force_rth,
            force_land: self.force_land,
        }
    }
}

/// What to do once connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Handshake only.
    Test,
    /// Upload a mission, optionally saving it to storage.
    Upload { persist: bool },
    /// Download the mission, optionally restoring it from storage first.
    Download { restore: bool },
    /// Replace the mission with a single RTH, optionally saving.
    Clear { persist: bool },
    /// Validate a mission file without connecting.
    Check,
    /// Print the version.
    Version,
    /// Show, or with a value set, the active multi-mission index.
    Multi(Option<u8>),
}

impl Command {
    /// Whether the command talks to a flight controller.
    pub fn needs_device(&self) -> bool {
        !matches!(self, Command::Check | Command::Version)
    }
}

impl FromStr for Command {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let command = match s {
            "test" => Command::Test,
            "upload" | "up" => Command::Upload { persist: false },
            "store" | "sto" => Command::Upload { persist: true },
            "download" | "down" => Command::Download { restore: false },
            "restore" | "rest" => Command::Download { restore: true },
            "clear" => Command::Clear { persist: false },
            "erase" => Command::Clear { persist: true },
            "check" => Command::Check,
            "version" => Command::Version,
            "multi" => Command::Multi(None),
            _ => {
                let index = s
                    .strip_prefix("multi=")
                    .and_then(|v| v.parse::<u8>().ok())
                    .filter(|&v| v <= MAX_MULTI_MISSION_INDEX)
                    .ok_or_else(|| RunnerError::UnknownCommand(s.to_string()))?;
                Command::Multi(Some(index))
            }
        };
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_aliases() {
        assert_eq!("up".parse::<Command>().unwrap(), Command::Upload { persist: false });
        assert_eq!("sto".parse::<Command>().unwrap(), Command::Upload { persist: true });
        assert_eq!("down".parse::<Command>().unwrap(), Command::Download { restore: false });
        assert_eq!("rest".parse::<Command>().unwrap(), Command::Download { restore: true });
        assert_eq!("erase".parse::<Command>().unwrap(), Command::Clear { persist: true });
    }

    #[test]
    fn test_multi_index() {
        assert_eq!("multi".parse::<Command>().unwrap(), Command::Multi(None));
        assert_eq!("multi=3".parse::<Command>().unwrap(), Command::Multi(Some(3)));
        assert!("multi=10".parse::<Command>().is_err());
        assert!("multi=x".parse::<Command>().is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert!(matches!(
            "launch".parse::<Command>(),
            Err(RunnerError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["impload", "download"]);
        assert_eq!(cli.baud, 115200);
        assert_eq!(cli.default_alt, 20);
        assert_eq!(cli.mission_path(), "-");
        assert_eq!(cli.output_path(), "-");
        assert!(cli.command.parse::<Command>().unwrap().needs_device());
        assert!(!Command::Check.needs_device());
    }

    #[test]
    fn test_cli_options() {
        let cli = Cli::parse_from([
            "impload",
            "-d",
            "tcp://localhost:5760",
            "-a",
            "50",
            "--force-land",
            "-o",
            "out.json",
            "store",
            "mission.json",
        ]);
        assert_eq!(cli.device.as_deref(), Some("tcp://localhost:5760"));
        assert_eq!(cli.mission_path(), "mission.json");
        assert_eq!(cli.output_path(), "out.json");
        let options = cli.sanitise_options();
        assert_eq!(options.default_alt, 50);
        assert!(options.force_land);
    }
}
