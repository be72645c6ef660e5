// Shared helpers for integration tests: mock endpoints and fake transports
#![allow(dead_code)]

use rec_uploader::upload::{Connector, NetworkLink, UploadOutcome, Uploader};
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A request as seen by a mock endpoint
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub head: String,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        let prefix = format!("{}: ", name);
        self.head
            .lines()
            .find_map(|line| line.strip_prefix(prefix.as_str()))
            .map(str::trim)
    }
}

pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Read headers plus `Content-Length` bytes of body
pub async fn read_request<S: AsyncRead + Unpin>(socket: &mut S) -> io::Result<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "request head truncated"));
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut request = CapturedRequest {
        head,
        body: buf[head_end..].to_vec(),
    };
    let content_length = request
        .header("Content-Length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);

    while request.body.len() < content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        request.body.extend_from_slice(&chunk[..n]);
    }

    Ok(request)
}

/// Endpoint that accepts one connection, reads the request, answers with
/// `response` and closes
pub async fn spawn_mock_endpoint(
    response: &'static str,
) -> io::Result<(u16, JoinHandle<io::Result<CapturedRequest>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await?;
        let request = read_request(&mut socket).await?;
        socket.write_all(response.as_bytes()).await?;
        socket.shutdown().await?;
        Ok(request)
    });

    Ok((port, handle))
}

/// Endpoint that reads the request and then keeps the connection open
/// without answering for `hold`
pub async fn spawn_silent_endpoint(
    hold: Duration,
) -> io::Result<(u16, JoinHandle<io::Result<CapturedRequest>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    let handle = tokio::spawn(async move {
        let (mut socket, _): (TcpStream, _) = listener.accept().await?;
        let request = read_request(&mut socket).await?;
        tokio::time::sleep(hold).await;
        Ok(request)
    });

    Ok((port, handle))
}

/// A port with nothing listening on it
pub async fn closed_port() -> io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Connector that hands out a prepared stream once and counts attempts
pub struct OneShotConnector<S> {
    stream: Mutex<Option<S>>,
    pub attempts: Arc<AtomicUsize>,
}

impl<S> OneShotConnector<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: Mutex::new(Some(stream)),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait::async_trait]
impl<S> Connector for OneShotConnector<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Stream = S;

    async fn connect(&self, _host: &str, _port: u16) -> io::Result<S> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let stream = self.stream.lock().ok().and_then(|mut slot| slot.take());
        stream.ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "already used"))
    }
}

/// Connector that refuses every attempt
#[derive(Default)]
pub struct RefusingConnector {
    pub attempts: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Connector for RefusingConnector {
    type Stream = tokio::io::DuplexStream;

    async fn connect(&self, _host: &str, _port: u16) -> io::Result<Self::Stream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
    }
}

/// Stream whose writes accept at most `max_write` bytes each
pub struct ShortWriteStream<S> {
    inner: S,
    max_write: usize,
}

impl<S> ShortWriteStream<S> {
    pub fn new(inner: S, max_write: usize) -> Self {
        Self { inner, max_write }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for ShortWriteStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for ShortWriteStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let limit = buf.len().min(self.max_write);
        Pin::new(&mut self.inner).poll_write(cx, &buf[..limit])
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Link that is down until it has been checked `up_after` times
pub struct FlakyLink {
    checks: AtomicUsize,
    up_after: Option<usize>,
    pub reconnects: usize,
}

impl FlakyLink {
    pub fn never_up() -> Self {
        Self {
            checks: AtomicUsize::new(0),
            up_after: None,
            reconnects: 0,
        }
    }

    pub fn up_after(checks: usize) -> Self {
        Self {
            checks: AtomicUsize::new(0),
            up_after: Some(checks),
            reconnects: 0,
        }
    }
}

impl NetworkLink for FlakyLink {
    fn is_connected(&self) -> bool {
        let checks = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
        matches!(self.up_after, Some(n) if checks > n)
    }

    fn reconnect(&mut self) {
        self.reconnects += 1;
    }
}

/// Uploader that records what it was handed
pub struct FakeUploader {
    pub uploads: Vec<PathBuf>,
    pub outcome: UploadOutcome,
}

impl FakeUploader {
    pub fn answering(outcome: UploadOutcome) -> Self {
        Self {
            uploads: Vec::new(),
            outcome,
        }
    }
}

#[async_trait::async_trait]
impl Uploader for FakeUploader {
    async fn upload(&mut self, path: &Path) -> UploadOutcome {
        self.uploads.push(path.to_path_buf());
        self.outcome.clone()
    }
}
