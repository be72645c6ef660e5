use std::time::Duration;
use tracing::{debug, info, warn};

/// The device's network association
pub trait NetworkLink: Send {
    fn is_connected(&self) -> bool;

    /// Ask the link to re-associate; progress is observed through `is_connected`
    fn reconnect(&mut self);
}

/// Host networking is managed by the OS; the link is always considered up
#[derive(Debug, Default, Clone, Copy)]
pub struct HostNetwork;

impl NetworkLink for HostNetwork {
    fn is_connected(&self) -> bool {
        true
    }

    fn reconnect(&mut self) {}
}

/// Bounded reconnect wait: `attempts` checks spaced `delay` apart
///
/// Returns whether the link is up afterwards.
pub async fn ensure_connected<L: NetworkLink + ?Sized>(
    link: &mut L,
    attempts: u32,
    delay: Duration,
) -> bool {
    if link.is_connected() {
        return true;
    }

    warn!("Network link down, reconnecting");
    link.reconnect();

    for attempt in 0..attempts {
        if link.is_connected() {
            break;
        }
        debug!("Waiting for network link (attempt {}/{})", attempt + 1, attempts);
        tokio::time::sleep(delay).await;
    }

    let connected = link.is_connected();
    if connected {
        info!("Network link reconnected");
    } else {
        warn!("Failed to reconnect network link after {} attempts", attempts);
    }
    connected
}
