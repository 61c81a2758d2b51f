//! Drains an outbound notification queue to a pub/sub socket.
//!
//! The queue is a bounded `tokio::sync::mpsc` channel of capacity [`QUEUE_CAPACITY`];
//! producers that outrun the publisher block on `send`, which is the backpressure the
//! design calls for. The consume loop awaits the next message rather than polling, so
//! it is idle (not spinning) whenever the queue is empty.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use zeromq::{Socket, SocketSend};

use crate::protocol::frame_publication;

pub const QUEUE_CAPACITY: usize = 10;

/// Handle producers use to enqueue a publication. Cloning is cheap; every clone shares
/// the same bounded channel.
#[derive(Clone)]
pub struct PublisherHandle {
    tx: mpsc::Sender<String>,
}

impl PublisherHandle {
    /// Enqueues `payload`, blocking until the publisher has room. Returns `Err` only
    /// if the publisher task has already shut down.
    pub async fn publish(&self, payload: String) -> Result<(), mpsc::error::SendError<String>> {
        self.tx.send(payload).await
    }
}

/// Creates the bounded queue and returns a producer-facing handle plus the receiving
/// half for [`run_publisher`].
pub fn channel() -> (PublisherHandle, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    (PublisherHandle { tx }, rx)
}

/// Runs the publisher loop: bind a PUB socket at `url`, then forward every dequeued
/// message as `"<nodename>;<payload>"` until `run_flag` clears.
pub async fn run_publisher(
    url: &str,
    nodename: &str,
    mut rx: mpsc::Receiver<String>,
    run_flag: Arc<AtomicBool>,
) -> Result<(), zeromq::ZmqError> {
    let span = tracing::info_span!("publisher", url);
    let _enter = span.enter();

    let mut socket = zeromq::PubSocket::new();
    socket.bind(url).await?;
    info!("publisher bound");

    while run_flag.load(Ordering::Relaxed) {
        let Some(payload) = rx.recv().await else {
            info!("publisher queue closed, exiting");
            return Ok(());
        };
        let framed = frame_publication(nodename, &payload);
        if let Err(err) = socket.send(framed.into()).await {
            warn!(%err, "publish failed");
        }
    }
    Ok(())
}
