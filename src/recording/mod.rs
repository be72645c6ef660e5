//! Button-driven recording
//!
//! This module provides the `RecordingSession` state machine that manages:
//! - Debounced button edges (press starts, release stops)
//! - Collision-free recording names on the storage medium
//! - Incremental WAV writing from the capture driver
//! - Handing the finished file to the uploader

mod button;
mod session;
mod storage;

pub use button::{ButtonInput, Debouncer, Edge, KeyboardButton, Level, ManualButton, ScriptedButton};
pub use session::{RecordingSession, SessionConfig, SessionEvent, SessionState};
pub use storage::{Storage, NAME_SLOTS};
