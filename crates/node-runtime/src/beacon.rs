//! Periodic self-announcement so that discovery clients can find a node without prior
//! configuration.

use serde::Serialize;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::warn;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// The identity fields a beacon advertises on every tick; `status` is computed fresh
/// each tick from the shared `online` flag rather than stored here.
#[derive(Debug, Clone)]
pub struct BeaconIdentity {
    pub name: String,
    pub kind: String,
    pub id: String,
    pub ip: IpAddr,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize)]
struct BeaconPayload<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    id: &'a str,
    status: &'static str,
    ip: IpAddr,
    port: u16,
    interval: f64,
}

/// Runs the beacon loop at `interval`, broadcasting to `target` (typically a subnet
/// broadcast address) until `run_flag` clears. `online` toggles the advertised status
/// between `"online"` and `"offline"` without restarting the loop.
pub async fn run_beacon(
    identity: BeaconIdentity,
    target: &str,
    interval: Duration,
    online: Arc<AtomicBool>,
    run_flag: Arc<AtomicBool>,
) -> Result<(), std::io::Error> {
    let span = tracing::info_span!("beacon", node_id = %identity.id);
    let _enter = span.enter();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.set_broadcast(true)?;

    while run_flag.load(Ordering::Relaxed) {
        let status = if online.load(Ordering::Relaxed) { "online" } else { "offline" };
        let payload = BeaconPayload {
            name: &identity.name,
            kind: &identity.kind,
            id: &identity.id,
            status,
            ip: identity.ip,
            port: identity.port,
            interval: interval.as_secs_f64(),
        };
        match serde_json::to_vec(&payload) {
            Ok(bytes) => {
                if let Err(err) = socket.send_to(&bytes, target).await {
                    warn!(%err, "beacon send failed");
                }
            }
            Err(err) => warn!(%err, "beacon payload encoding failed"),
        }
        tokio::time::sleep(interval).await;
    }
    Ok(())
}
