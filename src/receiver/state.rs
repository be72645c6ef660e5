use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A recording accepted by the receiver
#[derive(Debug, Clone, Serialize)]
pub struct ReceivedUpload {
    pub id: String,
    pub original_filename: String,
    pub stored_as: PathBuf,
    pub size: usize,
    pub received_at: DateTime<Utc>,
}

/// Uploads remembered for `GET /api/uploads` by default
pub const DEFAULT_HISTORY: usize = 1000;

/// Shared application state for receiver handlers
///
/// Development use only: the upload history lives in memory and is lost on
/// restart. Files on disk are never pruned.
#[derive(Clone)]
pub struct ReceiverState {
    /// Directory uploads are written to
    pub upload_dir: Arc<PathBuf>,

    /// Most recent uploads, oldest first
    received: Arc<RwLock<VecDeque<ReceivedUpload>>>,
    history: usize,
}

impl ReceiverState {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self::with_history(upload_dir, DEFAULT_HISTORY)
    }

    /// Keep at most `history` entries; older ones are forgotten first
    pub fn with_history(upload_dir: impl Into<PathBuf>, history: usize) -> Self {
        Self {
            upload_dir: Arc::new(upload_dir.into()),
            received: Arc::new(RwLock::new(VecDeque::new())),
            history: history.max(1),
        }
    }

    pub async fn record(&self, upload: ReceivedUpload) {
        let mut received = self.received.write().await;
        received.push_back(upload);
        while received.len() > self.history {
            received.pop_front();
        }
    }

    pub async fn received(&self) -> Vec<ReceivedUpload> {
        self.received.read().await.iter().cloned().collect()
    }
}
