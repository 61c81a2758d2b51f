//! Pulls samples from the external streaming source into the primary ring.
//!
//! The connection to the stream is a small trait rather than a concrete dependency on
//! any particular acquisition library, so the receiver loop can be exercised with a
//! fake source in tests.

use ring_store::PrimaryRing;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const RESOLVE_RETRY: Duration = Duration::from_secs(10);

/// How often a blocked `pull_sample` is raced against a re-check of `run_flag`. Real
/// shutdown still happens at the next such check, not instantly, trading a small
/// latency for not depending on the source surfacing cancellation itself.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// A connection to the external time-synchronized sample source.
pub trait SampleSource: Send {
    /// Attempts to resolve and open the named stream once. `false` means not found
    /// yet; the caller retries.
    fn connect(&mut self, name: &str) -> impl Future<Output = bool> + Send;

    /// Pulls the next sample: one value per primary channel, plus an optional
    /// timestamp (the receiver synthesizes one when the source provides none).
    fn pull_sample(&mut self) -> impl Future<Output = (Vec<f64>, Option<f64>)> + Send;
}

/// Runs the receiver loop until `run_flag` clears: resolve the stream (retrying every
/// [`RESOLVE_RETRY`]), then forever pull and append samples. This is the ring's sole
/// writer — the rest of the system relies on that invariant.
pub async fn run_receiver<S: SampleSource>(
    mut source: S,
    stream_name: &str,
    ring: Arc<PrimaryRing>,
    run_flag: Arc<AtomicBool>,
) {
    let span = tracing::info_span!("receiver", stream = stream_name);
    let _enter = span.enter();

    while run_flag.load(Ordering::Relaxed) {
        if source.connect(stream_name).await {
            break;
        }
        warn!("stream not found, retrying");
        tokio::time::sleep(RESOLVE_RETRY).await;
    }
    if !run_flag.load(Ordering::Relaxed) {
        return;
    }
    info!("stream connected");

    while run_flag.load(Ordering::Relaxed) {
        tokio::select! {
            (samples, timestamp) = source.pull_sample() => {
                if let Err(err) = ring.append(&samples, timestamp) {
                    warn!(%err, "dropping sample: append failed");
                }
            }
            () = tokio::time::sleep(SHUTDOWN_POLL) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring_store::TimeWindow;
    use std::sync::atomic::AtomicUsize;

    struct FakeSource {
        samples: std::vec::IntoIter<(Vec<f64>, Option<f64>)>,
        resolved_after: usize,
        attempts: Arc<AtomicUsize>,
    }

    impl SampleSource for FakeSource {
        async fn connect(&mut self, _name: &str) -> bool {
            let n = self.attempts.fetch_add(1, Ordering::Relaxed);
            n + 1 >= self.resolved_after
        }

        async fn pull_sample(&mut self) -> (Vec<f64>, Option<f64>) {
            self.samples.next().unwrap_or((vec![0.0], None))
        }
    }

    #[tokio::test]
    async fn appends_every_pulled_sample() {
        let ring = Arc::new(PrimaryRing::new(1, 4, 1.0).unwrap());
        let run_flag = Arc::new(AtomicBool::new(true));
        let samples = vec![
            (vec![10.0], Some(1.0)),
            (vec![20.0], Some(2.0)),
            (vec![30.0], Some(3.0)),
        ];
        let source = FakeSource {
            samples: samples.clone().into_iter(),
            resolved_after: 1,
            attempts: Arc::new(AtomicUsize::new(0)),
        };

        let ring_clone = Arc::clone(&ring);
        let flag_clone = Arc::clone(&run_flag);
        let handle = tokio::spawn(async move {
            run_receiver(source, "stream", ring_clone, flag_clone).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        run_flag.store(false, Ordering::Relaxed);
        let _ = tokio::time::timeout(Duration::from_millis(200), handle).await;

        let snap = ring.snapshot(TimeWindow::new(0.0, 10.0));
        assert!(!snap.data[0].is_empty());
    }

    struct NeverYieldingSource;

    impl SampleSource for NeverYieldingSource {
        async fn connect(&mut self, _name: &str) -> bool {
            true
        }

        async fn pull_sample(&mut self) -> (Vec<f64>, Option<f64>) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            (vec![0.0], None)
        }
    }

    #[tokio::test]
    async fn stops_promptly_even_when_pull_sample_blocks() {
        let ring = Arc::new(PrimaryRing::new(1, 4, 1.0).unwrap());
        let run_flag = Arc::new(AtomicBool::new(true));

        let flag_clone = Arc::clone(&run_flag);
        let ring_clone = Arc::clone(&ring);
        let handle = tokio::spawn(async move {
            run_receiver(NeverYieldingSource, "stream", ring_clone, flag_clone).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        run_flag.store(false, Ordering::Relaxed);
        let done = tokio::time::timeout(Duration::from_millis(500), handle).await;
        assert!(done.is_ok(), "receiver should stop within SHUTDOWN_POLL of run_flag clearing");
    }

    #[tokio::test]
    async fn stops_connect_retries_once_run_flag_clears() {
        let ring = Arc::new(PrimaryRing::new(1, 4, 1.0).unwrap());
        let run_flag = Arc::new(AtomicBool::new(false));
        let source = FakeSource {
            samples: Vec::new().into_iter(),
            resolved_after: 1000,
            attempts: Arc::new(AtomicUsize::new(0)),
        };

        let done = tokio::time::timeout(
            Duration::from_millis(100),
            run_receiver(source, "stream", ring, run_flag),
        )
        .await;
        assert!(done.is_ok());
    }
}
