//! Development upload receiver
//!
//! A small HTTP server that accepts the recorder's multipart uploads:
//! - GET / - Banner (connectivity probe target)
//! - GET /health - Health check
//! - POST /api/upload - Store the `audio` part of a multipart body
//! - GET /api/uploads - List the most recent uploads (in-memory, development only)

mod handlers;
mod routes;
mod state;

pub use routes::{create_router, MAX_UPLOAD_BYTES};
pub use state::{ReceivedUpload, ReceiverState, DEFAULT_HISTORY};
