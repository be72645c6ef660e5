//! Upload client for finished recordings
//!
//! Streams one WAV file as a hand-built multipart/form-data POST over a raw
//! byte stream:
//! - `endpoint` - server URL/port resolution
//! - `multipart` - boundary framing and `Content-Length`
//! - `network` - bounded link precheck
//! - `client` - chunked transmit and response drain
//! - `probe` - start-up connectivity check

mod client;
mod endpoint;
mod multipart;
mod network;
mod outcome;
mod probe;

pub use client::{Connector, TcpConnector, TransferStats, UploadClient, UploadSettings};
pub use endpoint::Endpoint;
pub use multipart::{MultipartFrame, DEFAULT_BOUNDARY, FIELD_NAME};
pub use network::{ensure_connected, HostNetwork, NetworkLink};
pub use outcome::{FailReason, SkipReason, UploadOutcome, Uploader};
pub use probe::{probe, ProbeReport};
