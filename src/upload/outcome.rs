use std::fmt;
use std::path::Path;

/// Why an upload was not attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoNetwork,
    EmptyFile,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::NoNetwork => "no network",
            SkipReason::EmptyFile => "empty file",
        })
    }
}

/// Why an attempted upload failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
    OpenError,
    ConnectError,
    WriteError,
    NoResponse,
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailReason::OpenError => "open error",
            FailReason::ConnectError => "connect error",
            FailReason::WriteError => "write error",
            FailReason::NoResponse => "no response",
        })
    }
}

/// Result of one upload attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The request went out and the server answered; holds the raw response lines
    Sent(String),
    Skipped(SkipReason),
    Failed(FailReason),
}

impl UploadOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, UploadOutcome::Sent(_))
    }
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadOutcome::Sent(response) => {
                write!(f, "sent ({} response bytes)", response.len())
            }
            UploadOutcome::Skipped(reason) => write!(f, "skipped: {}", reason),
            UploadOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Hands a finished recording to a remote endpoint
#[async_trait::async_trait]
pub trait Uploader: Send {
    async fn upload(&mut self, path: &Path) -> UploadOutcome;
}
