use std::fs::File;
use std::future::Future;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use super::button::{ButtonInput, Debouncer, Edge};
use super::storage::Storage;
use crate::audio::{pcm16_from_native, CaptureDriver, WavWriter};
use crate::upload::{UploadOutcome, Uploader};

/// Configuration for the recording session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sample rate written into every WAV header
    pub sample_rate: u32,

    /// Settle time before a pin change is re-read and confirmed
    pub debounce: Duration,

    /// Pause between polls while idle (recording polls back-to-back)
    pub idle_poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            debounce: Duration::from_millis(10),
            idle_poll_interval: Duration::from_millis(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
}

/// What a single poll cycle did
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Nothing to do this cycle
    Nothing,
    /// One sample was appended to the active recording
    Sampled,
    /// A recording was opened
    Started(PathBuf),
    /// A press was confirmed but no recording could be opened
    StartFailed(String),
    /// A recording was closed and handed to the uploader
    Finished {
        path: PathBuf,
        payload_bytes: u32,
        outcome: UploadOutcome,
    },
    /// The recording hit a storage fault and was closed without upload
    Aborted { path: PathBuf, reason: String },
}

type Sink = WavWriter<BufWriter<File>>;

/// Button-driven recorder: one press opens a WAV, release closes and uploads it
///
/// Everything runs on the caller's task. While an upload is in flight the
/// button and microphone are not serviced; presses during that time are lost.
pub struct RecordingSession<B, C, U> {
    config: SessionConfig,
    button: B,
    debouncer: Debouncer,
    storage: Storage,
    capture: C,
    uploader: U,

    /// Open only while recording
    sink: Option<Sink>,

    /// Recording target, chosen at session start
    target_path: Option<PathBuf>,

    /// PCM bytes written to the current recording (header excluded)
    bytes_written_of_audio: u32,
}

impl<B, C, U> RecordingSession<B, C, U>
where
    B: ButtonInput,
    C: CaptureDriver,
    U: Uploader,
{
    pub fn new(config: SessionConfig, button: B, storage: Storage, capture: C, uploader: U) -> Self {
        let debouncer = Debouncer::new(config.debounce);
        Self {
            config,
            button,
            debouncer,
            storage,
            capture,
            uploader,
            sink: None,
            target_path: None,
            bytes_written_of_audio: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.sink.is_some()
    }

    pub fn state(&self) -> SessionState {
        if self.is_active() {
            SessionState::Recording
        } else {
            SessionState::Idle
        }
    }

    pub fn target_path(&self) -> Option<&Path> {
        self.target_path.as_deref()
    }

    pub fn bytes_written_of_audio(&self) -> u32 {
        self.bytes_written_of_audio
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    /// One cycle: advance the button state machine, then pull at most one sample
    pub async fn poll(&mut self) -> SessionEvent {
        let transition = match self.debouncer.poll(&self.button).await {
            Some(Edge::Pressed) if !self.is_active() => Some(self.start()),
            Some(Edge::Released) if self.is_active() => return self.stop().await,
            _ => None,
        };

        let sampled = match self.pull_sample() {
            Ok(sampled) => sampled,
            Err(event) => return event,
        };

        match transition {
            Some(event) => event,
            None if sampled => SessionEvent::Sampled,
            None => SessionEvent::Nothing,
        }
    }

    /// Poll until `shutdown` resolves, then close any open recording
    ///
    /// Shutdown is only observed between cycles, so a running upload or
    /// debounce wait always completes first.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!("Recorder ready; waiting for button press");
        tokio::pin!(shutdown);

        loop {
            self.poll().await;

            let idle = if self.is_active() {
                None
            } else {
                Some(self.config.idle_poll_interval)
            };

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = pause(idle) => {}
            }
        }

        self.shutdown();
    }

    /// Finalize an open recording without uploading it
    pub fn shutdown(&mut self) -> Option<PathBuf> {
        let sink = self.sink.take()?;
        let path = self.target_path.clone()?;

        match sink.finish() {
            Ok((_, payload)) => {
                info!(
                    "Recording {} closed on shutdown ({} bytes, not uploaded)",
                    path.display(),
                    payload
                );
            }
            Err(e) => error!("Failed to finalize {} on shutdown: {}", path.display(), e),
        }

        Some(path)
    }

    fn start(&mut self) -> SessionEvent {
        let path = match self.storage.next_recording_path() {
            Ok(path) => path,
            Err(e) => {
                error!("Cannot start recording: {}", e);
                return SessionEvent::StartFailed(e.to_string());
            }
        };

        let sample_rate = self.config.sample_rate;
        let writer = self.storage.create_with(&path, |file| {
            WavWriter::create(BufWriter::new(file), sample_rate)
        });

        match writer {
            Ok(writer) => {
                self.sink = Some(writer);
                self.target_path = Some(path.clone());
                self.bytes_written_of_audio = 0;
                info!("Recording to {}", path.display());
                SessionEvent::Started(path)
            }
            Err(e) => {
                error!("Failed to open recording {}: {}", path.display(), e);
                SessionEvent::StartFailed(e.to_string())
            }
        }
    }

    async fn stop(&mut self) -> SessionEvent {
        let (Some(sink), Some(path)) = (self.sink.take(), self.target_path.clone()) else {
            return SessionEvent::Nothing;
        };

        let payload_bytes = match close_sink(sink) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to close {}: {}", path.display(), e);
                return SessionEvent::Aborted {
                    path,
                    reason: e.to_string(),
                };
            }
        };

        if payload_bytes == 0 {
            info!("No data recorded; skipping header update");
        }
        info!(
            "Recording stopped: {} ({} payload bytes)",
            path.display(),
            payload_bytes
        );

        let outcome = self.uploader.upload(&path).await;
        info!("Upload of {}: {}", path.display(), outcome);

        SessionEvent::Finished {
            path,
            payload_bytes,
            outcome,
        }
    }

    /// Pull one sample into the open recording; `Err` carries an abort event
    fn pull_sample(&mut self) -> Result<bool, SessionEvent> {
        let Some(sink) = self.sink.as_mut() else {
            return Ok(false);
        };
        let Some(native) = self.capture.try_read() else {
            return Ok(false);
        };

        match sink.write_sample(pcm16_from_native(native)) {
            Ok(()) => {
                self.bytes_written_of_audio = sink.payload_bytes();
                Ok(true)
            }
            Err(e) => {
                let path = self.target_path.clone().unwrap_or_default();
                error!("Write to {} failed, abandoning recording: {}", path.display(), e);
                if let Some(sink) = self.sink.take() {
                    if let Err(e) = sink.finish() {
                        warn!("Failed to finalize {}: {}", path.display(), e);
                    }
                }
                Err(SessionEvent::Aborted {
                    path,
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// Patch the header, flush buffered samples and sync the file to the medium
fn close_sink(sink: Sink) -> std::io::Result<u32> {
    let (writer, payload) = sink.finish()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(payload)
}

async fn pause(idle: Option<Duration>) {
    match idle {
        Some(interval) => tokio::time::sleep(interval).await,
        None => tokio::task::yield_now().await,
    }
}
