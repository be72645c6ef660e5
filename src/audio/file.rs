use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::wav::HEADER_LEN;

/// A recording read back from storage
///
/// Only the format the recorder writes is accepted: mono, 16-bit integer PCM.
/// The payload size declared in the header is kept next to the size actually
/// on disk, so a recording whose header was never patched can be told apart
/// from an empty one.
#[derive(Debug)]
pub struct AudioFile {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
    /// Data chunk size as stated at offset 40
    pub declared_payload_bytes: u32,
    /// File length minus the 44-byte header
    pub stored_payload_bytes: u64,
    /// Samples covered by the declared data chunk
    pub samples: Vec<i16>,
    pub duration_seconds: f64,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let file_len = file.metadata()?.len();
        if file_len < HEADER_LEN {
            bail!("{} is shorter than a WAV header ({} bytes)", path.display(), file_len);
        }

        let mut raw = [0u8; HEADER_LEN as usize];
        file.read_exact(&mut raw)?;
        let declared_payload_bytes = u32::from_le_bytes([raw[40], raw[41], raw[42], raw[43]]);
        let stored_payload_bytes = file_len - HEADER_LEN;

        let reader = WavReader::open(path)
            .with_context(|| format!("{} is not a readable WAV file", path.display()))?;
        let spec = reader.spec();
        if spec.channels != 1 || spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int
        {
            bail!(
                "{} is not a mono 16-bit PCM recording ({} ch, {}-bit {:?})",
                path.display(),
                spec.channels,
                spec.bits_per_sample,
                spec.sample_format
            );
        }

        let samples = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read recording samples")?;

        let recording = Self {
            path: path.to_path_buf(),
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            declared_payload_bytes,
            stored_payload_bytes,
            duration_seconds: samples.len() as f64 / spec.sample_rate as f64,
            samples,
        };

        if !recording.is_finalized() {
            warn!(
                "{} carries a placeholder header ({} payload bytes on disk)",
                path.display(),
                stored_payload_bytes
            );
        }
        debug!(
            "Read {}: {} samples at {}Hz",
            path.display(),
            recording.samples.len(),
            recording.sample_rate
        );
        Ok(recording)
    }

    /// Whether the header sizes were patched to match the payload on disk
    ///
    /// An empty recording keeps its zeroed header and still counts as finalized.
    pub fn is_finalized(&self) -> bool {
        self.declared_payload_bytes as u64 == self.stored_payload_bytes
    }

    /// Payload bytes of the decoded samples
    pub fn payload_bytes(&self) -> usize {
        self.samples.len() * 2
    }

    /// Peak absolute amplitude, 0 for silence
    pub fn peak(&self) -> u16 {
        self.samples
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0)
    }
}
