use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::DmaConfig;
use crate::error::RecorderError;
use crate::recording::SessionConfig;
use crate::upload::{Endpoint, UploadSettings, DEFAULT_BOUNDARY};

/// Prefix of environment overrides, e.g. `REC_UPLOADER__SERVER__PORT=8080`
pub const ENV_PREFIX: &str = "REC_UPLOADER";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub audio: AudioConfig,
    pub capture: CaptureConfig,
    pub server: ServerConfig,
    pub network: NetworkConfig,
    pub receiver: ReceiverConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Mount point of the recording medium
    pub root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub debounce_ms: u64,
    pub idle_poll_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSourceKind {
    Tone,
    File,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub source: CaptureSourceKind,
    /// Tone frequency in Hz
    pub frequency: f64,
    /// WAV replayed when `source = "file"`
    pub path: Option<PathBuf>,
    pub dma_buf_count: usize,
    pub dma_buf_len: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub url: String,
    /// Must agree with the port stated in `url`, if any
    pub port: u16,
    pub boundary: String,
    pub chunk_size: usize,
    pub response_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    pub bind: String,
    pub port: u16,
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("recordings"),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            debounce_ms: 10,
            idle_poll_ms: 1,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let dma = DmaConfig::default();
        Self {
            source: CaptureSourceKind::Tone,
            frequency: 440.0,
            path: None,
            dma_buf_count: dma.buf_count,
            dma_buf_len: dma.buf_len,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:32531/api/upload".to_string(),
            port: 32531,
            boundary: DEFAULT_BOUNDARY.to_string(),
            chunk_size: 512,
            response_timeout_secs: 15,
            connect_timeout_secs: 5,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            reconnect_attempts: 10,
            reconnect_delay_ms: 500,
        }
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 32531,
            upload_dir: PathBuf::from("uploads"),
        }
    }
}

impl Config {
    /// Layer the optional config file and `REC_UPLOADER__*` overrides over the defaults
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let cfg: Self = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse config from {}", path))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), RecorderError> {
        if self.audio.sample_rate == 0 {
            return Err(RecorderError::Config {
                key: "audio.sample_rate".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.server.chunk_size == 0 {
            return Err(RecorderError::Config {
                key: "server.chunk_size".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.server.boundary.is_empty() {
            return Err(RecorderError::Config {
                key: "server.boundary".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        self.endpoint()?;
        Ok(())
    }

    pub fn endpoint(&self) -> Result<Endpoint, RecorderError> {
        Endpoint::resolve(&self.server.url, self.server.port)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            sample_rate: self.audio.sample_rate,
            debounce: Duration::from_millis(self.audio.debounce_ms),
            idle_poll_interval: Duration::from_millis(self.audio.idle_poll_ms),
        }
    }

    pub fn dma_config(&self) -> DmaConfig {
        DmaConfig {
            buf_count: self.capture.dma_buf_count,
            buf_len: self.capture.dma_buf_len,
        }
    }

    pub fn upload_settings(&self) -> Result<UploadSettings, RecorderError> {
        Ok(UploadSettings {
            endpoint: self.endpoint()?,
            boundary: self.server.boundary.clone(),
            chunk_size: self.server.chunk_size,
            response_timeout: Duration::from_secs(self.server.response_timeout_secs),
            reconnect_attempts: self.network.reconnect_attempts,
            reconnect_delay: Duration::from_millis(self.network.reconnect_delay_ms),
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.server.connect_timeout_secs)
    }
}
