use anyhow::{Context, Result};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::info;

use super::endpoint::Endpoint;

/// Result of a connectivity probe against the server root
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub status: u16,
    pub status_line: String,
    pub body: String,
}

/// Issue `GET /` and report the status code
pub async fn probe(endpoint: &Endpoint, timeout: Duration) -> Result<ProbeReport> {
    info!("Testing connectivity to {}", endpoint.authority());

    let exchange = async {
        let mut stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .context("Failed to connect to server")?;

        let request = format!(
            "GET / HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            endpoint.authority()
        );
        stream
            .write_all(request.as_bytes())
            .await
            .context("Failed to send probe request")?;

        let mut raw = Vec::new();
        stream
            .read_to_end(&mut raw)
            .await
            .context("Failed to read probe response")?;
        Ok::<_, anyhow::Error>(raw)
    };

    let raw = tokio::time::timeout(timeout, exchange)
        .await
        .context("Probe timed out")??;

    let report = parse_response(&String::from_utf8_lossy(&raw))?;
    info!("HTTP GET response: {}", report.status);
    Ok(report)
}

fn parse_response(text: &str) -> Result<ProbeReport> {
    let status_line = text.lines().next().unwrap_or_default().trim().to_string();

    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .with_context(|| format!("Malformed status line: {:?}", status_line))?;

    let body = text
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();

    Ok(ProbeReport {
        status,
        status_line,
        body,
    })
}
