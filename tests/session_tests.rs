// Integration tests for the button-driven recording session
//
// These tests verify debounce behaviour, the Idle/Recording state machine,
// WAV output on disk, and the hand-off to the uploader.

mod common;

use anyhow::Result;
use common::{spawn_mock_endpoint, FakeUploader, RefusingConnector};
use rec_uploader::audio::{native_from_pcm16, AudioFile, CaptureDriver, QueuedCapture, ToneCapture};
use rec_uploader::recording::{
    Debouncer, Edge, Level, ManualButton, RecordingSession, ScriptedButton, SessionConfig,
    SessionEvent, SessionState, Storage,
};
use rec_uploader::upload::{
    Endpoint, HostNetwork, SkipReason, TcpConnector, UploadClient, UploadOutcome, UploadSettings,
    Uploader,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tempfile::TempDir;

const SAMPLE_RATE: u32 = 16000;

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn session_config() -> SessionConfig {
    SessionConfig {
        sample_rate: SAMPLE_RATE,
        debounce: ms(10),
        idle_poll_interval: ms(1),
    }
}

fn sent() -> UploadOutcome {
    UploadOutcome::Sent("HTTP/1.1 200 OK\n".to_string())
}

/// Uploader during which the user presses and releases the button again
struct PressDuringUpload {
    button: ManualButton,
    uploads: Vec<PathBuf>,
}

#[async_trait::async_trait]
impl Uploader for PressDuringUpload {
    async fn upload(&mut self, path: &Path) -> UploadOutcome {
        self.uploads.push(path.to_path_buf());
        self.button.press();
        tokio::time::sleep(ms(30)).await;
        self.button.release();
        tokio::time::sleep(ms(30)).await;
        sent()
    }
}

// ============================================================================
// Debounce
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_glitch_shorter_than_window_is_ignored() {
    let button = ScriptedButton::new(vec![(ms(5), Level::Low), (ms(8), Level::High)]);
    let mut debouncer = Debouncer::new(ms(10));

    assert_eq!(debouncer.poll(&button).await, None);

    tokio::time::advance(ms(5)).await;
    assert_eq!(debouncer.poll(&button).await, None, "3ms dip must not count as a press");
    assert_eq!(debouncer.last_level(), Level::High);

    for _ in 0..10 {
        tokio::time::advance(ms(3)).await;
        assert_eq!(debouncer.poll(&button).await, None);
    }
}

#[tokio::test(start_paused = true)]
async fn test_held_press_yields_exactly_one_edge() {
    let button = ScriptedButton::new(vec![(ms(5), Level::Low)]);
    let mut debouncer = Debouncer::new(ms(10));

    tokio::time::advance(ms(5)).await;
    let mut edges = Vec::new();
    for _ in 0..20 {
        if let Some(edge) = debouncer.poll(&button).await {
            edges.push(edge);
        }
        tokio::time::advance(ms(2)).await;
    }

    assert_eq!(edges, vec![Edge::Pressed]);
    assert_eq!(debouncer.last_level(), Level::Low);
}

#[tokio::test(start_paused = true)]
async fn test_press_then_release_edges() {
    let button = ScriptedButton::new(vec![(ms(5), Level::Low), (ms(200), Level::High)]);
    let mut debouncer = Debouncer::new(ms(10));

    let mut edges = Vec::new();
    for _ in 0..100 {
        if let Some(edge) = debouncer.poll(&button).await {
            edges.push(edge);
        }
        tokio::time::advance(ms(5)).await;
    }

    assert_eq!(edges, vec![Edge::Pressed, Edge::Released]);
}

#[tokio::test(start_paused = true)]
async fn test_glitch_does_not_start_a_recording() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let button = ScriptedButton::new(vec![(ms(5), Level::Low), (ms(7), Level::High)]);
    let capture = ToneCapture::unpaced(SAMPLE_RATE, 440.0);
    let mut session = RecordingSession::new(
        session_config(),
        button,
        Storage::new(temp_dir.path()),
        capture,
        FakeUploader::answering(sent()),
    );

    for _ in 0..20 {
        assert_eq!(session.poll().await, SessionEvent::Nothing);
        tokio::time::advance(ms(1)).await;
    }

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(fs::read_dir(temp_dir.path())?.count(), 0, "No file for a glitch");

    Ok(())
}

// ============================================================================
// Recording lifecycle
// ============================================================================

#[tokio::test]
async fn test_press_record_release_upload_end_to_end() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (port, server) = spawn_mock_endpoint("HTTP/1.1 200 OK\r\n").await?;

    let endpoint = Endpoint::resolve(&format!("http://127.0.0.1:{}/api/upload", port), port)?;
    let uploader = UploadClient::new(
        HostNetwork,
        TcpConnector::default(),
        UploadSettings::new(endpoint),
    );

    // Two seconds of synthetic audio at the configured rate
    let total_samples = 2 * SAMPLE_RATE as usize;
    let mut tone = ToneCapture::unpaced(SAMPLE_RATE, 440.0);
    let capture: QueuedCapture = std::iter::from_fn(|| tone.try_read())
        .take(total_samples)
        .collect();

    let button = ManualButton::new();
    let mut session = RecordingSession::new(
        session_config(),
        button.clone(),
        Storage::new(temp_dir.path()),
        capture,
        uploader,
    );

    assert_eq!(session.poll().await, SessionEvent::Nothing);

    button.press();
    let path = temp_dir.path().join("rec0.wav");
    assert_eq!(session.poll().await, SessionEvent::Started(path.clone()));
    assert_eq!(session.state(), SessionState::Recording);

    // The start cycle already pulled one sample
    for _ in 1..total_samples {
        assert_eq!(session.poll().await, SessionEvent::Sampled);
    }
    assert_eq!(session.poll().await, SessionEvent::Nothing, "Capture ran dry; nothing padded");
    assert_eq!(session.bytes_written_of_audio(), (total_samples * 2) as u32);

    button.release();
    let expected_payload = 2 * SAMPLE_RATE * 2;
    match session.poll().await {
        SessionEvent::Finished {
            path: finished,
            payload_bytes,
            outcome,
        } => {
            assert_eq!(finished, path);
            assert_eq!(payload_bytes, expected_payload);
            assert_eq!(outcome, sent());
        }
        other => panic!("Expected Finished, got {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Idle);

    let audio = AudioFile::open(&path)?;
    assert_eq!(audio.sample_rate, SAMPLE_RATE);
    assert_eq!(audio.channels, 1);
    assert_eq!(audio.payload_bytes() as u32, expected_payload);
    assert!((audio.duration_seconds - 2.0).abs() < 1e-9);

    let request = server.await??;
    assert!(request.head.starts_with("POST /api/upload HTTP/1.1\r\n"));
    assert!(request.body.windows(8).any(|w| w == b"rec0.wav"));

    Ok(())
}

#[tokio::test]
async fn test_samples_are_down_converted() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let samples = [1234i16, -5678, i16::MAX, i16::MIN, 0];
    // Low half carries noise that must be discarded
    let capture: QueuedCapture = samples
        .iter()
        .map(|&s| native_from_pcm16(s) | 0x0000_7FFF)
        .collect();

    let button = ManualButton::new();
    let mut session = RecordingSession::new(
        session_config(),
        button.clone(),
        Storage::new(temp_dir.path()),
        capture,
        FakeUploader::answering(sent()),
    );

    button.press();
    for _ in 0..10 {
        session.poll().await;
    }
    button.release();
    session.poll().await;

    let audio = AudioFile::open(temp_dir.path().join("rec0.wav"))?;
    assert_eq!(audio.samples, samples.to_vec());

    Ok(())
}

#[tokio::test]
async fn test_zero_sample_recording_still_goes_to_uploader() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let connector = RefusingConnector::default();
    let attempts = connector.attempts.clone();
    let endpoint = Endpoint::resolve("http://127.0.0.1:9/api/upload", 9)?;
    let uploader = UploadClient::new(HostNetwork, connector, UploadSettings::new(endpoint));

    let button = ManualButton::new();
    let mut session = RecordingSession::new(
        session_config(),
        button.clone(),
        Storage::new(temp_dir.path()),
        QueuedCapture::new(),
        uploader,
    );

    button.press();
    assert!(matches!(session.poll().await, SessionEvent::Started(_)));
    button.release();

    let path = temp_dir.path().join("rec0.wav");
    assert_eq!(
        session.poll().await,
        SessionEvent::Finished {
            path: path.clone(),
            payload_bytes: 0,
            outcome: UploadOutcome::Skipped(SkipReason::EmptyFile),
        }
    );
    assert_eq!(attempts.load(Ordering::SeqCst), 0);

    // Header left with its placeholder sizes
    let bytes = fs::read(&path)?;
    assert_eq!(bytes.len(), 44);
    assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
    assert_eq!(&bytes[40..44], &[0, 0, 0, 0]);

    Ok(())
}

#[tokio::test]
async fn test_consecutive_recordings_use_new_names() -> Result<()> {
    let temp_dir = TempDir::new()?;
    fs::write(temp_dir.path().join("rec1.wav"), b"from an earlier boot")?;

    let button = ManualButton::new();
    let capture = ToneCapture::unpaced(SAMPLE_RATE, 440.0);
    let mut session = RecordingSession::new(
        session_config(),
        button.clone(),
        Storage::new(temp_dir.path()),
        capture,
        FakeUploader::answering(sent()),
    );

    let mut started = Vec::new();
    for _ in 0..3 {
        button.press();
        if let SessionEvent::Started(path) = session.poll().await {
            started.push(path);
        }
        session.poll().await;
        button.release();
        session.poll().await;
    }

    let names: Vec<_> = started
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    assert_eq!(names, vec!["rec0.wav", "rec2.wav", "rec3.wav"]);
    assert_eq!(session.uploader().uploads, started);
    assert_eq!(fs::read(temp_dir.path().join("rec1.wav"))?, b"from an earlier boot");

    Ok(())
}

#[tokio::test]
async fn test_start_failure_leaves_session_idle() -> Result<()> {
    let temp_dir = TempDir::new()?;
    // Storage root that cannot hold files
    let missing_root = temp_dir.path().join("not-mounted");

    let button = ManualButton::new();
    let mut session = RecordingSession::new(
        session_config(),
        button.clone(),
        Storage::new(&missing_root),
        ToneCapture::unpaced(SAMPLE_RATE, 440.0),
        FakeUploader::answering(sent()),
    );

    button.press();
    assert!(matches!(session.poll().await, SessionEvent::StartFailed(_)));
    assert_eq!(session.state(), SessionState::Idle);

    // Releasing without an active recording is a no-op
    button.release();
    assert_eq!(session.poll().await, SessionEvent::Nothing);
    assert!(session.uploader().uploads.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_run_closes_open_recording_on_shutdown() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let button = ManualButton::new();
    button.press();

    let mut session = RecordingSession::new(
        session_config(),
        button.clone(),
        Storage::new(temp_dir.path()),
        ToneCapture::unpaced(SAMPLE_RATE, 440.0),
        FakeUploader::answering(sent()),
    );

    session.run(tokio::time::sleep(ms(100))).await;

    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.uploader().uploads.is_empty(), "Shutdown does not upload");

    let audio = AudioFile::open(temp_dir.path().join("rec0.wav"))?;
    assert!(!audio.samples.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_press_during_upload_is_lost() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let button = ManualButton::new();
    let uploader = PressDuringUpload {
        button: button.clone(),
        uploads: Vec::new(),
    };
    let mut session = RecordingSession::new(
        session_config(),
        button.clone(),
        Storage::new(temp_dir.path()),
        ToneCapture::unpaced(SAMPLE_RATE, 440.0),
        uploader,
    );

    button.press();
    assert!(matches!(session.poll().await, SessionEvent::Started(_)));
    session.poll().await;
    button.release();
    assert!(matches!(session.poll().await, SessionEvent::Finished { .. }));

    // The press and release happened while the upload held the loop
    for _ in 0..50 {
        let event = session.poll().await;
        assert!(
            !matches!(event, SessionEvent::Started(_)),
            "Edge during upload must not start a recording"
        );
        assert_eq!(event, SessionEvent::Nothing);
    }
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.uploader().uploads.len(), 1);
    assert_eq!(fs::read_dir(temp_dir.path())?.count(), 1);

    Ok(())
}
