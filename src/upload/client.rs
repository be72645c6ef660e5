use std::io::{self, SeekFrom};
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::endpoint::Endpoint;
use super::multipart::{MultipartFrame, DEFAULT_BOUNDARY};
use super::network::{ensure_connected, NetworkLink};
use super::outcome::{FailReason, SkipReason, UploadOutcome, Uploader};
use crate::audio::HEADER_LEN;

/// Bytes between two progress log lines
const PROGRESS_INTERVAL: u64 = 2048;

/// Settings for the upload client
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub endpoint: Endpoint,

    /// Multipart boundary, fixed for the process lifetime
    pub boundary: String,

    /// File bytes sent per transport write
    pub chunk_size: usize,

    /// Deadline for draining the response, counted from the end of the body
    pub response_timeout: Duration,

    /// Link checks while waiting for the network to come back
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl UploadSettings {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            boundary: DEFAULT_BOUNDARY.to_string(),
            chunk_size: 512,
            response_timeout: Duration::from_secs(15),
            reconnect_attempts: 10,
            reconnect_delay: Duration::from_millis(500),
        }
    }
}

/// Opens raw byte streams to the server
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    async fn connect(&self, host: &str, port: u16) -> io::Result<Self::Stream>;
}

/// Plain TCP, no TLS
#[derive(Debug, Clone)]
pub struct TcpConnector {
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait::async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        tokio::time::timeout(self.timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))?
    }
}

/// Accounting of the file body of the last upload attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Transport writes issued for the file body
    pub chunks: usize,
    /// Bytes handed to those writes
    pub bytes_requested: u64,
    /// Bytes the transport reported as accepted
    pub bytes_accepted: u64,
    /// Writes that accepted fewer bytes than requested
    pub short_writes: usize,
}

/// One-shot multipart uploader over a raw stream
///
/// Never retries: each call consumes at most one connection and one file handle.
pub struct UploadClient<L, C> {
    link: L,
    connector: C,
    settings: UploadSettings,
    last_transfer: TransferStats,
}

impl<L, C> UploadClient<L, C>
where
    L: NetworkLink,
    C: Connector,
{
    pub fn new(link: L, connector: C, settings: UploadSettings) -> Self {
        Self {
            link,
            connector,
            settings,
            last_transfer: TransferStats::default(),
        }
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    pub fn last_transfer(&self) -> TransferStats {
        self.last_transfer
    }

    pub async fn upload(&mut self, path: &Path) -> UploadOutcome {
        info!("Starting upload of {}", path.display());
        self.last_transfer = TransferStats::default();

        if !ensure_connected(
            &mut self.link,
            self.settings.reconnect_attempts,
            self.settings.reconnect_delay,
        )
        .await
        {
            warn!("Skipping upload of {}: no network", path.display());
            return UploadOutcome::Skipped(SkipReason::NoNetwork);
        }

        let mut file = match File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                error!("Failed to open {} for upload: {}", path.display(), e);
                return UploadOutcome::Failed(FailReason::OpenError);
            }
        };
        let file_size = match file.metadata().await {
            Ok(meta) => meta.len(),
            Err(e) => {
                error!("Failed to stat {}: {}", path.display(), e);
                return UploadOutcome::Failed(FailReason::OpenError);
            }
        };
        info!("File size: {} bytes", file_size);

        if file_size == 0 {
            info!("File is empty, skipping upload");
            return UploadOutcome::Skipped(SkipReason::EmptyFile);
        }

        match is_bare_wav_header(&mut file, file_size).await {
            Ok(true) => {
                info!("Recording holds no samples, skipping upload");
                return UploadOutcome::Skipped(SkipReason::EmptyFile);
            }
            Ok(false) => {}
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                return UploadOutcome::Failed(FailReason::OpenError);
            }
        }

        let endpoint = &self.settings.endpoint;
        debug!(
            "Host: {}, Port: {}, Path: {}",
            endpoint.host, endpoint.port, endpoint.path
        );

        let mut stream = match self.connector.connect(&endpoint.host, endpoint.port).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Connection to {} failed: {}", endpoint.authority(), e);
                return UploadOutcome::Failed(FailReason::ConnectError);
            }
        };
        info!("Connected to {}", endpoint.authority());

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        if let Err(e) = self.transmit(&mut stream, file, file_size, &filename).await {
            error!("Upload of {} aborted: {}", path.display(), e);
            return UploadOutcome::Failed(FailReason::WriteError);
        }

        let response = drain_response(&mut stream, self.settings.response_timeout).await;
        if let Err(e) = stream.shutdown().await {
            debug!("Connection shutdown: {}", e);
        }

        if response.is_empty() {
            error!("No response received from server");
            return UploadOutcome::Failed(FailReason::NoResponse);
        }

        info!("Upload of {} complete", path.display());
        UploadOutcome::Sent(response)
    }

    /// Headers, preamble, chunked file body, epilogue
    async fn transmit<S>(
        &mut self,
        stream: &mut S,
        mut file: File,
        file_size: u64,
        filename: &str,
    ) -> io::Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        let frame = MultipartFrame::new(&self.settings.boundary, filename);
        info!("Total content length: {}", frame.content_length(file_size));

        stream
            .write_all(frame.request_head(&self.settings.endpoint, file_size).as_bytes())
            .await?;
        stream.write_all(frame.preamble().as_bytes()).await?;

        let mut buffer = vec![0u8; self.settings.chunk_size.max(1)];
        let mut total_sent = 0u64;

        while total_sent < file_size {
            let wanted = (buffer.len() as u64).min(file_size - total_sent) as usize;
            let read = match read_chunk(&mut file, &mut buffer[..wanted]).await {
                Ok(0) | Err(_) => {
                    error!("Error reading file at offset {}", total_sent);
                    break;
                }
                Ok(read) => read,
            };

            // Single write per chunk; a partial write is reported, not resent
            let written = stream.write(&buffer[..read]).await?;
            self.last_transfer.chunks += 1;
            self.last_transfer.bytes_requested += read as u64;
            self.last_transfer.bytes_accepted += written as u64;
            if written != read {
                warn!("Write error: expected {}, wrote {}", read, written);
                self.last_transfer.short_writes += 1;
            }

            total_sent += read as u64;
            if total_sent % PROGRESS_INTERVAL == 0 {
                debug!("Sent {}/{} bytes", total_sent, file_size);
            }
        }
        drop(file);

        stream.write_all(frame.epilogue().as_bytes()).await?;
        stream.flush().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<L, C> Uploader for UploadClient<L, C>
where
    L: NetworkLink,
    C: Connector,
{
    async fn upload(&mut self, path: &Path) -> UploadOutcome {
        UploadClient::upload(self, path).await
    }
}

/// Whether the file is nothing but a WAV header declaring an empty data chunk
///
/// Leaves the file positioned at its start.
async fn is_bare_wav_header(file: &mut File, file_size: u64) -> io::Result<bool> {
    if file_size != HEADER_LEN {
        return Ok(false);
    }

    let mut header = [0u8; HEADER_LEN as usize];
    file.read_exact(&mut header).await?;
    file.seek(SeekFrom::Start(0)).await?;

    Ok(&header[0..4] == b"RIFF" && &header[36..40] == b"data" && header[40..44] == [0; 4])
}

/// Fill `buf` from the file, short only at end of file
async fn read_chunk(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Collect response lines until the peer closes or the deadline passes
async fn drain_response<S>(stream: &mut S, timeout: Duration) -> String
where
    S: AsyncRead + Unpin,
{
    info!("Waiting for server response");
    let deadline = Instant::now() + timeout;
    let mut reader = BufReader::new(stream);
    let mut response = String::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        let closed = match tokio::time::timeout_at(deadline, reader.read_until(b'\n', &mut line)).await {
            Ok(Ok(0)) => true,
            Ok(Ok(_)) => false,
            Ok(Err(e)) => {
                warn!("Response read failed: {}", e);
                true
            }
            Err(_) => {
                warn!("Response deadline of {:?} reached", timeout);
                true
            }
        };

        // A timed-out read may still have buffered a partial line
        if !line.is_empty() {
            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\r', '\n']);
            if response.is_empty() {
                info!("Response started:");
            }
            info!("{}", text);
            response.push_str(text);
            response.push('\n');
        }

        if closed {
            break;
        }
    }

    response
}
