pub mod audio;
pub mod config;
pub mod error;
pub mod receiver;
pub mod recording;
pub mod upload;

pub use audio::{AudioFile, CaptureDriver, QueuedCapture, ToneCapture, WavFileCapture, WavWriter};
pub use config::Config;
pub use error::{RecorderError, RecorderResult};
pub use receiver::{create_router, ReceiverState};
pub use recording::{RecordingSession, SessionConfig, SessionEvent, Storage};
pub use upload::{Endpoint, UploadClient, UploadOutcome, UploadSettings};
