use std::io::{self, Seek, SeekFrom, Write};

/// Size of the canonical PCM WAV preamble
pub const HEADER_LEN: u64 = 44;

/// Offset of the RIFF chunk size field
const RIFF_SIZE_OFFSET: u64 = 4;

/// Offset of the data chunk size field
const DATA_SIZE_OFFSET: u64 = 40;

/// Fixed format description of a mono 16-bit PCM recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl WavHeader {
    pub fn mono_pcm16(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            bits_per_sample: 16,
        }
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.channels as u32 * (self.bits_per_sample as u32 / 8)
    }

    pub fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    /// Encode the 44-byte header for a given payload size
    ///
    /// A payload of zero yields the placeholder form: both size fields are 0.
    pub fn encode(&self, payload: u32) -> [u8; HEADER_LEN as usize] {
        let riff_size = if payload == 0 { 0 } else { payload.saturating_add(36) };

        let mut out = [0u8; HEADER_LEN as usize];
        out[0..4].copy_from_slice(b"RIFF");
        out[4..8].copy_from_slice(&riff_size.to_le_bytes());
        out[8..12].copy_from_slice(b"WAVE");
        out[12..16].copy_from_slice(b"fmt ");
        out[16..20].copy_from_slice(&16u32.to_le_bytes());
        out[20..22].copy_from_slice(&1u16.to_le_bytes());
        out[22..24].copy_from_slice(&self.channels.to_le_bytes());
        out[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[28..32].copy_from_slice(&self.byte_rate().to_le_bytes());
        out[32..34].copy_from_slice(&self.block_align().to_le_bytes());
        out[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        out[36..40].copy_from_slice(b"data");
        out[40..44].copy_from_slice(&payload.to_le_bytes());
        out
    }
}

/// Incremental WAV writer that does not know its final size up front
///
/// The header goes out with zeroed size fields; `finish` seeks back and
/// patches them once the payload length is known. Until then the sink does
/// not hold a valid WAV file.
pub struct WavWriter<W: Write + Seek> {
    sink: W,
    header: WavHeader,
    payload_bytes: u32,
}

impl<W: Write + Seek> WavWriter<W> {
    /// Write the placeholder header and return a writer positioned at the payload
    ///
    /// The header is flushed, so a medium that cannot take it fails here.
    pub fn create(mut sink: W, sample_rate: u32) -> io::Result<Self> {
        let header = WavHeader::mono_pcm16(sample_rate);
        sink.write_all(&header.encode(0))?;
        sink.flush()?;

        Ok(Self {
            sink,
            header,
            payload_bytes: 0,
        })
    }

    pub fn write_sample(&mut self, sample: i16) -> io::Result<()> {
        let payload_bytes = self
            .payload_bytes
            .checked_add(2)
            .ok_or_else(payload_too_large)?;
        self.sink.write_all(&sample.to_le_bytes())?;
        self.payload_bytes = payload_bytes;
        Ok(())
    }

    /// PCM bytes appended so far (header excluded)
    pub fn payload_bytes(&self) -> u32 {
        self.payload_bytes
    }

    pub fn header(&self) -> WavHeader {
        self.header
    }

    /// Patch the size fields from the sink's length and flush
    ///
    /// Returns the sink together with the payload size. An empty payload
    /// leaves the placeholder header untouched.
    pub fn finish(mut self) -> io::Result<(W, u32)> {
        let len = self.sink.seek(SeekFrom::End(0))?;
        let payload = u32::try_from(len.saturating_sub(HEADER_LEN))
            .map_err(|_| payload_too_large())?;

        if payload > 0 {
            let riff_size = payload.checked_add(36).ok_or_else(payload_too_large)?;
            self.sink.seek(SeekFrom::Start(RIFF_SIZE_OFFSET))?;
            self.sink.write_all(&riff_size.to_le_bytes())?;
            self.sink.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
            self.sink.write_all(&payload.to_le_bytes())?;
            self.sink.seek(SeekFrom::End(0))?;
        }

        self.sink.flush()?;
        Ok((self.sink, payload))
    }
}

fn payload_too_large() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "WAV payload exceeds the 32-bit size fields")
}
