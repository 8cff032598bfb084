use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by a transport when it tries to hand bytes to
/// the aircraft. These never escape the radio link, the link recovers
/// from them by restarting the payload arbiter after a cool-down.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The underlying socket failed.
    #[error("transport i/o failed: {0}")]
    Io(#[from] std::io::Error),
    /// The payload did not go out as a whole, with the reason.
    #[error("payload was rejected: {0}")]
    Rejected(String),
    /// There is no aircraft on the other end.
    #[error("aircraft is disconnected")]
    Disconnected,
}

/// Failures when talking to the radio link worker.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// The worker has been torn down, nothing can be submitted anymore.
    #[error("radio link worker has stopped")]
    WorkerStopped,
}

/// Failures when loading or validating configuration files.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be parsed into the expected struct.
    #[error("failed to load config: {0}")]
    Load(#[from] config::ConfigError),
    /// There is no file at the given path.
    #[error("could not locate the config file {0:?}")]
    Missing(PathBuf),
    /// Telemetry frequency must be between 5 and 60 Hz.
    #[error("telemetry frequency {0} Hz is outside of 5 - 60 Hz")]
    FrequencyOutOfRange(u32),
}
