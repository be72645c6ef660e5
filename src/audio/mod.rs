pub mod capture;
pub mod file;
pub mod wav;

pub use capture::{
    native_from_pcm16, pcm16_from_native, CaptureDriver, DmaConfig, QueuedCapture, ToneCapture,
    WavFileCapture,
};
pub use file::AudioFile;
pub use wav::{WavHeader, WavWriter, HEADER_LEN};
