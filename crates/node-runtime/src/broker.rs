//! Load-balancing broker between external clients and the responder pool.
//!
//! Classic two-socket LRU-queue device: a `ROUTER` front end accepts client requests,
//! a `ROUTER` back end talks to responders. Responders announce readiness with a
//! `READY` sentinel frame on connect and again after every reply; the broker only
//! reads the front end while at least one responder is idle, so backpressure when
//! every responder is busy falls naturally out of not polling that socket.
//!
//! Every peer on either side of this broker is a `ReqSocket`, which prepends an empty
//! delimiter frame to each message it sends and strips one back off on receive. A
//! `RouterSocket` only ever adds/removes the routing-identity frame, so the broker has
//! to do the delimiter bookkeeping itself when unwrapping an incoming message and
//! rewrapping it for the other side — the `zmsg_unwrap`/`zmsg_wrap` half of the classic
//! zguide `lruqueue` pattern this device is modeled on.

use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use zeromq::{RouterSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

const READY: &[u8] = b"READY";

/// How often a blocked `recv` is interrupted to re-check `run_flag`. Real shutdown
/// still happens at the next such check, not instantly, trading a small latency for
/// not depending on the transport surfacing socket closure as a distinguishable
/// error.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

fn frames(msg: ZmqMessage) -> VecDeque<Bytes> {
    msg.into_vec().into_iter().collect()
}

fn to_message(frames: VecDeque<Bytes>) -> ZmqMessage {
    let mut iter = frames.into_iter();
    let mut msg: ZmqMessage = iter.next().unwrap_or_else(Bytes::new).into();
    for frame in iter {
        msg.push_back(frame);
    }
    msg
}

/// Strips the two envelope frames a `RouterSocket::recv()` hands back for a message
/// from a `ReqSocket` peer: the routing identity `ROUTER` injects, then the empty
/// delimiter the peer's `ReqSocket::send()` prepended. `None` if the message is too
/// short to be a well-formed request/reply.
fn unwrap_envelope(mut parts: VecDeque<Bytes>) -> Option<(Bytes, VecDeque<Bytes>)> {
    let identity = parts.pop_front()?;
    parts.pop_front()?; // the peer's ReqSocket delimiter frame, discarded
    Some((identity, parts))
}

/// Rebuilds the envelope a `RouterSocket::send()` needs to reach a `ReqSocket` peer:
/// the destination identity (consumed by `ROUTER` before the message hits the wire)
/// followed by an explicit empty delimiter frame, then the body.
fn wrap_envelope(identity: Bytes, body: VecDeque<Bytes>) -> VecDeque<Bytes> {
    let mut out = VecDeque::with_capacity(body.len() + 2);
    out.push_back(identity);
    out.push_back(Bytes::new());
    out.extend(body);
    out
}

/// Runs the broker until `run_flag` clears or either socket closes. A blocked `recv`
/// is raced against a periodic re-check of `run_flag` so shutdown is bounded by
/// [`SHUTDOWN_POLL`] instead of depending on the peer closing its socket.
pub async fn run_broker(
    frontend_url: &str,
    backend_url: &str,
    run_flag: Arc<AtomicBool>,
) -> Result<(), zeromq::ZmqError> {
    let span = tracing::info_span!("broker", frontend = frontend_url, backend = backend_url);
    let _enter = span.enter();

    let mut frontend = RouterSocket::new();
    let mut backend = RouterSocket::new();
    frontend.bind(frontend_url).await?;
    backend.bind(backend_url).await?;
    info!("broker bound");

    let mut idle: VecDeque<Bytes> = VecDeque::new();

    while run_flag.load(Ordering::Relaxed) {
        if idle.is_empty() {
            // No responder is free; only the back end can make progress.
            tokio::select! {
                result = backend.recv() => {
                    let Ok(msg) = result else {
                        info!("backend closed, broker exiting");
                        return Ok(());
                    };
                    handle_backend_message(msg, &mut idle, &mut frontend).await;
                }
                () = tokio::time::sleep(SHUTDOWN_POLL) => {}
            }
            continue;
        }

        tokio::select! {
            result = backend.recv() => {
                let Ok(msg) = result else {
                    info!("backend closed, broker exiting");
                    return Ok(());
                };
                handle_backend_message(msg, &mut idle, &mut frontend).await;
            }
            result = frontend.recv() => {
                let Ok(msg) = result else {
                    info!("frontend closed, broker exiting");
                    return Ok(());
                };
                let Some((client_id, body)) = unwrap_envelope(frames(msg)) else {
                    warn!("dropping malformed client request");
                    continue;
                };
                let worker = idle.pop_front().expect("idle checked non-empty above");
                let mut forwarded = VecDeque::with_capacity(body.len() + 1);
                forwarded.push_back(client_id);
                forwarded.extend(body);
                if let Err(err) = backend.send(to_message(wrap_envelope(worker, forwarded))).await {
                    warn!(%err, "forwarding client request to responder failed");
                }
            }
            () = tokio::time::sleep(SHUTDOWN_POLL) => {}
        }
    }
    info!("run_flag cleared, broker exiting");
    Ok(())
}

async fn handle_backend_message(msg: ZmqMessage, idle: &mut VecDeque<Bytes>, frontend: &mut RouterSocket) {
    let Some((worker_id, mut body)) = unwrap_envelope(frames(msg)) else {
        warn!("dropping malformed backend message");
        return;
    };

    if body.front().map(Bytes::as_ref) == Some(READY) {
        idle.push_back(worker_id);
        return;
    }

    // Otherwise this is a reply: body = [client_id, ...payload]. Forward the payload
    // to the client, rewrapped in the client's own delimiter envelope, and mark the
    // responder idle again.
    let Some(client_id) = body.pop_front() else {
        warn!("dropping reply with no client address");
        idle.push_back(worker_id);
        return;
    };
    if let Err(err) = frontend.send(to_message(wrap_envelope(client_id, body))).await {
        warn!(%err, "forwarding responder reply to client failed");
    }
    idle.push_back(worker_id);
}
