//! Error types for the impload binary.

use impload_link::LinkError;
use thiserror::Error;

/// Errors that end an impload run.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Connection, protocol or transfer failure.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Device string could not be understood.
    #[error("invalid device \"{device}\": {reason}")]
    InvalidDevice { device: String, reason: String },

    /// No device given and none found.
    #[error("no device available")]
    NoDevice,

    /// Mission file could not be read or written.
    #[error("{path}: {source}")]
    MissionFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Mission file is not valid mission JSON.
    #[error("invalid mission file {path}: {source}")]
    MissionFormat {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Command word not recognised.
    #[error("unrecognised command \"{0}\"")]
    UnknownCommand(String),

    /// The flight controller returned something the command cannot use.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}

impl RunnerError {
    pub(crate) fn invalid_device(device: &str, reason: impl Into<String>) -> Self {
        RunnerError::InvalidDevice {
            device: device.to_string(),
            reason: reason.into(),
        }
    }
}
