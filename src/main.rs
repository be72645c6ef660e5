use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rec_uploader::audio::{AudioFile, CaptureDriver, ToneCapture, WavFileCapture};
use rec_uploader::config::CaptureSourceKind;
use rec_uploader::recording::{KeyboardButton, RecordingSession, Storage};
use rec_uploader::upload::{probe, HostNetwork, TcpConnector, UploadClient, UploadOutcome};
use rec_uploader::{create_router, Config, ReceiverState};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rec-uploader", version, about = "Button-driven WAV recorder with multipart upload")]
struct Cli {
    /// Config file (extension optional; missing file means defaults)
    #[arg(short, long, default_value = "config/rec-uploader")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record on button press (Enter toggles the button) and upload on release
    Run {
        /// Skip the start-up connectivity test
        #[arg(long)]
        skip_probe: bool,
    },
    /// Upload an existing recording
    Upload { file: PathBuf },
    /// Send a GET / to the configured server
    Probe,
    /// Serve the development upload receiver
    Receive {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Print the format and length of a recording
    Inspect { file: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    match cli.command {
        Command::Inspect { file } => inspect(&file),
        Command::Receive { bind, port, dir } => {
            let bind = bind.unwrap_or_else(|| cfg.receiver.bind.clone());
            let port = port.unwrap_or(cfg.receiver.port);
            let dir = dir.unwrap_or_else(|| cfg.receiver.upload_dir.clone());
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(receive(&bind, port, dir))
        }
        command => {
            // The recorder is single-threaded: polling, capture and upload share one task
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(async move {
                match command {
                    Command::Run { skip_probe } => run(cfg, skip_probe).await,
                    Command::Upload { file } => upload(cfg, file).await,
                    Command::Probe => probe_server(cfg).await,
                    Command::Inspect { .. } | Command::Receive { .. } => Ok(()),
                }
            })
        }
    }
}

async fn run(cfg: Config, skip_probe: bool) -> Result<()> {
    info!("rec-uploader v{}", env!("CARGO_PKG_VERSION"));

    let settings = cfg.upload_settings()?;
    if !skip_probe {
        match probe(&settings.endpoint, cfg.connect_timeout()).await {
            Ok(report) => info!("Server reachable: {}", report.status_line),
            Err(e) => warn!("Connectivity test failed: {:#}", e),
        }
    }

    let storage = Storage::open(&cfg.storage.root)?;
    info!("Storage initialized at {}", storage.root().display());

    let capture: Box<dyn CaptureDriver> = match cfg.capture.source {
        CaptureSourceKind::Tone => Box::new(ToneCapture::realtime(
            cfg.audio.sample_rate,
            cfg.capture.frequency,
            cfg.dma_config(),
        )),
        CaptureSourceKind::File => {
            let path = cfg
                .capture
                .path
                .as_ref()
                .context("capture.path is required when capture.source = \"file\"")?;
            Box::new(WavFileCapture::open(path)?)
        }
    };
    info!("Capture initialized ({} at {}Hz)", capture.name(), cfg.audio.sample_rate);

    let uploader = UploadClient::new(
        HostNetwork,
        TcpConnector::new(cfg.connect_timeout()),
        settings,
    );
    let button = KeyboardButton::spawn();
    info!("Press Enter to start recording, Enter again to stop and upload");

    let mut session = RecordingSession::new(cfg.session_config(), button, storage, capture, uploader);
    session.run(shutdown_signal()).await;

    info!("Recorder stopped");
    Ok(())
}

async fn upload(cfg: Config, file: PathBuf) -> Result<()> {
    let mut client = UploadClient::new(
        HostNetwork,
        TcpConnector::new(cfg.connect_timeout()),
        cfg.upload_settings()?,
    );

    match client.upload(&file).await {
        UploadOutcome::Sent(response) => {
            print!("{}", response);
            Ok(())
        }
        UploadOutcome::Skipped(reason) => {
            warn!("Upload skipped: {}", reason);
            Ok(())
        }
        UploadOutcome::Failed(reason) => anyhow::bail!("Upload failed: {}", reason),
    }
}

async fn probe_server(cfg: Config) -> Result<()> {
    let report = probe(&cfg.endpoint()?, cfg.connect_timeout()).await?;
    println!("{}", report.status_line);
    if !report.body.is_empty() {
        println!("{}", report.body);
    }
    Ok(())
}

async fn receive(bind: &str, port: u16, dir: PathBuf) -> Result<()> {
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create upload directory {}", dir.display()))?;

    let addr = format!("{}:{}", bind, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Receiver listening on {} (storing into {})", addr, dir.display());
    axum::serve(listener, create_router(ReceiverState::new(dir)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Receiver failed")?;

    Ok(())
}

fn inspect(file: &Path) -> Result<()> {
    let audio = AudioFile::open(file)?;
    println!("Path: {}", audio.path.display());
    println!("Duration: {:.2}s", audio.duration_seconds);
    println!("Sample rate: {}Hz", audio.sample_rate);
    println!("Payload (header): {} bytes", audio.declared_payload_bytes);
    println!("Payload (on disk): {} bytes", audio.stored_payload_bytes);
    if !audio.is_finalized() {
        println!("Header: placeholder, sizes were never patched");
    }
    println!("Peak: {}", audio.peak());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("Shutdown requested");
}
