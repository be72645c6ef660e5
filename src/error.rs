use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the recording/upload pipeline building blocks
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("No free recording name under {root:?} (all {capacity} slots taken)")]
    StorageFull { root: PathBuf, capacity: u32 },

    #[error("Storage I/O failed for {path:?}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid server URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Server URL states port {url_port} but the configured port is {configured}")]
    PortMismatch { url_port: u16, configured: u16 },

    #[error("Invalid config value for '{key}': {message}")]
    Config { key: String, message: String },
}

pub type RecorderResult<T> = std::result::Result<T, RecorderError>;
