use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};
use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Non-blocking source of native microphone samples
///
/// The microphone delivers 32-bit words; the meaningful audio sits in the
/// high-order half. Implementations must never block: `None` means no sample
/// is ready this cycle.
pub trait CaptureDriver: Send {
    /// Pull one native sample if one is available
    fn try_read(&mut self) -> Option<i32>;

    /// Get driver name for logging
    fn name(&self) -> &str;
}

/// Down-convert a native 32-bit sample to 16-bit PCM (high-order half)
pub fn pcm16_from_native(sample: i32) -> i16 {
    (sample >> 16) as i16
}

/// Widen a 16-bit PCM sample into the native 32-bit word layout
pub fn native_from_pcm16(sample: i16) -> i32 {
    (sample as i32) << 16
}

/// DMA ring parameters of the capture peripheral
#[derive(Debug, Clone, Copy)]
pub struct DmaConfig {
    pub buf_count: usize,
    pub buf_len: usize,
}

impl DmaConfig {
    /// Maximum number of samples the ring holds before the oldest are overwritten
    pub fn capacity(&self) -> usize {
        self.buf_count * self.buf_len
    }
}

impl Default for DmaConfig {
    fn default() -> Self {
        Self {
            buf_count: 16,
            buf_len: 1024,
        }
    }
}

/// Synthetic sine-wave microphone
pub struct ToneCapture {
    sample_rate: u32,
    frequency: f64,
    amplitude: f64,
    position: u64,
    pacing: Option<Pacing>,
}

struct Pacing {
    started: Instant,
    capacity: u64,
}

impl ToneCapture {
    /// Tone that produces samples at `sample_rate` in wall-clock time, buffered
    /// like the DMA ring (oldest samples dropped once the ring is full)
    pub fn realtime(sample_rate: u32, frequency: f64, dma: DmaConfig) -> Self {
        Self {
            sample_rate,
            frequency,
            amplitude: 0.5,
            position: 0,
            pacing: Some(Pacing {
                started: Instant::now(),
                capacity: dma.capacity() as u64,
            }),
        }
    }

    /// Tone that always has a sample ready
    pub fn unpaced(sample_rate: u32, frequency: f64) -> Self {
        Self {
            sample_rate,
            frequency,
            amplitude: 0.5,
            position: 0,
            pacing: None,
        }
    }

    fn sample_at(&self, position: u64) -> i32 {
        let t = position as f64 / self.sample_rate as f64;
        let value = (TAU * self.frequency * t).sin() * self.amplitude;
        native_from_pcm16((value * i16::MAX as f64) as i16)
    }
}

impl CaptureDriver for ToneCapture {
    fn try_read(&mut self) -> Option<i32> {
        if let Some(pacing) = &self.pacing {
            let produced =
                (pacing.started.elapsed().as_secs_f64() * self.sample_rate as f64) as u64;
            if produced <= self.position {
                return None;
            }
            // Ring overflow: skip past samples the hardware has already overwritten
            if produced - self.position > pacing.capacity {
                self.position = produced - pacing.capacity;
            }
        }

        let sample = self.sample_at(self.position);
        self.position += 1;
        Some(sample)
    }

    fn name(&self) -> &str {
        "tone"
    }
}

/// Replays a 16-bit WAV file as if it came from the microphone
pub struct WavFileCapture {
    samples: VecDeque<i32>,
}

impl WavFileCapture {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = WavReader::open(path)
            .with_context(|| format!("Failed to open capture file: {}", path.display()))?;

        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
            anyhow::bail!(
                "Capture file must be 16-bit integer PCM, got {}-bit {:?}",
                spec.bits_per_sample,
                spec.sample_format
            );
        }
        if spec.channels != 1 {
            warn!(
                "Capture file has {} channels; samples are replayed interleaved",
                spec.channels
            );
        }

        let samples = reader
            .into_samples::<i16>()
            .map(|s| s.map(native_from_pcm16))
            .collect::<Result<VecDeque<_>, _>>()
            .context("Failed to read capture samples")?;

        info!(
            "Capture file loaded: {} ({} samples at {}Hz)",
            path.display(),
            samples.len(),
            spec.sample_rate
        );

        Ok(Self { samples })
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl CaptureDriver for WavFileCapture {
    fn try_read(&mut self) -> Option<i32> {
        self.samples.pop_front()
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}

/// FIFO of native samples fed by the caller
#[derive(Debug, Default)]
pub struct QueuedCapture {
    queue: VecDeque<i32>,
}

impl QueuedCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: i32) {
        self.queue.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Extend<i32> for QueuedCapture {
    fn extend<T: IntoIterator<Item = i32>>(&mut self, iter: T) {
        self.queue.extend(iter);
    }
}

impl FromIterator<i32> for QueuedCapture {
    fn from_iter<T: IntoIterator<Item = i32>>(iter: T) -> Self {
        Self {
            queue: iter.into_iter().collect(),
        }
    }
}

impl CaptureDriver for QueuedCapture {
    fn try_read(&mut self) -> Option<i32> {
        self.queue.pop_front()
    }

    fn name(&self) -> &str {
        "queue"
    }
}

impl<T: CaptureDriver + ?Sized> CaptureDriver for Box<T> {
    fn try_read(&mut self) -> Option<i32> {
        (**self).try_read()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
