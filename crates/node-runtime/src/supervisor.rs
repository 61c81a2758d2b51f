//! Starts and stops every long-running worker that makes up a node: the broker, the
//! responder pool, the optional receiver and publisher, the beacon, and any
//! user-supplied secondary-channel workers.

use crate::beacon::{run_beacon, BeaconIdentity, DEFAULT_INTERVAL};
use crate::broker::run_broker;
use crate::error::NodeError;
use crate::publisher::{self, run_publisher, PublisherHandle};
use crate::receiver::{run_receiver, SampleSource};
use crate::responder::run_responder;
use crate::state::NodeState;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

type UserWorker = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Grace period `start` waits before returning, to cover the startup race between
/// socket binds and responder registration. Overridable for tests.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Owns the shared run-flag and every spawned worker's join handle. Dropping a
/// running `Supervisor` without calling [`Supervisor::stop`] leaves its workers
/// detached — always call `stop` on shutdown.
pub struct Supervisor {
    run_flag: Arc<AtomicBool>,
    online: Arc<AtomicBool>,
    grace_period: Duration,
    handles: Vec<JoinHandle<()>>,
    running: bool,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

impl Supervisor {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            run_flag: Arc::new(AtomicBool::new(false)),
            online: Arc::new(AtomicBool::new(false)),
            grace_period,
            handles: Vec::new(),
            running: false,
        }
    }

    pub fn run_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.run_flag)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Builds the metric registry (already populated on `state`), constructs the
    /// beacon, launches the broker, the responder pool, the optional receiver and
    /// publisher, and any user workers, then marks the beacon online. Returns the
    /// producer-facing publisher handle when the publisher is enabled, so callers can
    /// actually publish notifications; `None` when `run_publisher` is off.
    pub async fn start<S>(
        &mut self,
        state: Arc<NodeState>,
        source: Option<S>,
        beacon_target: String,
        user_workers: Vec<UserWorker>,
    ) -> Result<Option<PublisherHandle>, NodeError>
    where
        S: SampleSource + 'static,
    {
        if self.running {
            return Err(NodeError::AlreadyRunning);
        }
        self.run_flag.store(true, Ordering::Relaxed);

        let frontend_url = format!("tcp://{}:{}", state.config.identity.ip, state.config.identity.port_frontend);
        let backend_url = format!("tcp://127.0.0.1:{}", state.config.identity.port_backend);

        let broker_span_backend = backend_url.clone();
        let run_flag = self.run_flag();
        self.handles.push(tokio::spawn(async move {
            if let Err(err) = run_broker(&frontend_url, &broker_span_backend, run_flag).await {
                warn!(%err, "broker exited with error");
            }
        }));

        for _ in 0..state.config.n_workers {
            let state = Arc::clone(&state);
            let run_flag = self.run_flag();
            let backend_url = backend_url.clone();
            self.handles.push(tokio::spawn(async move {
                if let Err(err) = run_responder(&backend_url, state, run_flag).await {
                    warn!(%err, "responder exited with error");
                }
            }));
        }

        if state.config.primary_node {
            if let (Some(source), Some(ring)) = (source, state.primary.clone()) {
                let stream_name = state.config.primary.lsl_stream_name.clone();
                let run_flag = self.run_flag();
                self.handles.push(tokio::spawn(async move {
                    run_receiver(source, &stream_name, ring, run_flag).await;
                }));
            }
        }

        let mut publisher_handle = None;
        if state.config.run_publisher {
            if let Some(port) = state.config.identity.port_publisher {
                let (handle, rx) = publisher::channel();
                let url = format!("tcp://{}:{}", state.config.identity.ip, port);
                let nodename = state.config.identity.name.clone();
                let run_flag = self.run_flag();
                self.handles.push(tokio::spawn(async move {
                    if let Err(err) = run_publisher(&url, &nodename, rx, run_flag).await {
                        warn!(%err, "publisher exited with error");
                    }
                }));
                publisher_handle = Some(handle);
            }
        }

        let beacon_identity = BeaconIdentity {
            name: state.config.identity.name.clone(),
            kind: state.config.identity.kind.clone(),
            id: state.config.identity.id.clone(),
            ip: state.config.identity.ip,
            port: state.config.identity.port_frontend,
        };
        let online = Arc::clone(&self.online);
        let run_flag = self.run_flag();
        self.handles.push(tokio::spawn(async move {
            if let Err(err) = run_beacon(beacon_identity, &beacon_target, DEFAULT_INTERVAL, online, run_flag).await {
                warn!(%err, "beacon exited with error");
            }
        }));

        for worker in user_workers {
            self.handles.push(tokio::spawn(worker));
        }

        self.online.store(true, Ordering::Relaxed);
        tokio::time::sleep(self.grace_period).await;
        self.running = true;
        info!("node started");
        Ok(publisher_handle)
    }

    /// Clears the run-flag, marks the beacon offline, and joins every worker. A
    /// second call on an already-stopped node is a no-op.
    pub async fn stop(&mut self) {
        if !self.running {
            info!("stop called on a node that is not running, ignoring");
            return;
        }
        self.run_flag.store(false, Ordering::Relaxed);
        self.online.store(false, Ordering::Relaxed);
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
        self.running = false;
        info!("node stopped");
    }
}
