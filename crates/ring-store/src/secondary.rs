use crate::invariants::{debug_assert_cursor_in_bounds, debug_assert_lock_order};
use crate::metrics::RingMetrics;
use crate::snapshot::{reindex_and_select, Snapshot, TimeWindow};
use crate::RingError;
use std::sync::{Mutex, MutexGuard};

struct SecondaryState {
    samples: Vec<f64>,
    times: Vec<f64>,
    w: usize,
    full: bool,
}

impl SecondaryState {
    fn push(&mut self, buffer_len: usize, timestamp: f64, value: f64, metrics: &RingMetrics) {
        let w = self.w;
        debug_assert_cursor_in_bounds!(w, buffer_len);
        self.samples[w] = value;
        self.times[w] = timestamp;
        self.w = (w + 1) % buffer_len;
        if !self.full && self.w == 0 {
            self.full = true;
            metrics.record_wrap();
        }
        metrics.record_append();
    }
}

/// One independently-clocked measurement channel: its own lock, its own write
/// cursor, its own buffer length. Unlike [`crate::PrimaryRing`], a secondary channel
/// advances on its own schedule, uncoupled from every other channel.
pub struct SecondaryRing {
    state: Mutex<SecondaryState>,
    buffer_len: usize,
    metrics: RingMetrics,
}

impl SecondaryRing {
    pub fn new(buffer_len: usize) -> Result<Self, RingError> {
        if buffer_len == 0 {
            return Err(RingError::ZeroLengthBuffer);
        }
        Ok(Self {
            state: Mutex::new(SecondaryState {
                samples: vec![0.0; buffer_len],
                times: vec![0.0; buffer_len],
                w: 0,
                full: false,
            }),
            buffer_len,
            metrics: RingMetrics::new(),
        })
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    pub fn metrics(&self) -> &RingMetrics {
        &self.metrics
    }

    pub fn is_full(&self) -> bool {
        self.state.lock().unwrap().full
    }

    /// Pushes one `(timestamp, value)` pair, taking the lock itself.
    pub fn push_sample(&self, timestamp: f64, value: f64) {
        let mut state = self.state.lock().unwrap();
        state.push(self.buffer_len, timestamp, value, &self.metrics);
    }

    /// Pushes a chunk of samples under a single lock acquisition, so readers never
    /// observe a partial chunk.
    pub fn push_chunk(&self, timestamps: &[f64], values: &[f64]) -> Result<(), RingError> {
        if timestamps.len() != values.len() {
            return Err(RingError::ChunkLengthMismatch {
                timestamps: timestamps.len(),
                values: values.len(),
            });
        }
        let mut state = self.state.lock().unwrap();
        for (&t, &v) in timestamps.iter().zip(values) {
            state.push(self.buffer_len, t, v, &self.metrics);
        }
        Ok(())
    }

    fn copy_locked(&self) -> (Vec<f64>, Vec<f64>, usize, bool) {
        let state = self.state.lock().unwrap();
        (
            state.samples.clone(),
            state.times.clone(),
            state.w,
            state.full,
        )
    }

    /// Takes a consistent snapshot of this one channel within `window`.
    pub fn snapshot(&self, window: TimeWindow) -> Snapshot {
        let (samples, times, w, full) = self.copy_locked();
        self.metrics.record_snapshot();
        reindex_and_select(&[samples], &times, self.buffer_len, full, w, window)
    }
}

/// The collection of every secondary channel a node exposes, keyed by channel index.
///
/// Channels are locked independently so that a write to one never blocks a write to
/// another, but a [`SecondaryBank::snapshot_all`] call still needs every lock held at
/// once to guarantee the per-channel snapshots it returns are mutually consistent with
/// one another at a single instant. Locks are always acquired in index order to rule
/// out lock-order deadlocks between concurrent snapshot calls.
pub struct SecondaryBank {
    rings: Vec<SecondaryRing>,
}

impl SecondaryBank {
    pub fn new(buffer_lens: &[usize]) -> Result<Self, RingError> {
        let rings = buffer_lens
            .iter()
            .map(|&len| SecondaryRing::new(len))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rings })
    }

    pub fn channel_count(&self) -> usize {
        self.rings.len()
    }

    fn ring(&self, channel: usize) -> Result<&SecondaryRing, RingError> {
        self.rings
            .get(channel)
            .ok_or(RingError::ChannelIndexOutOfRange {
                index: channel,
                len: self.rings.len(),
            })
    }

    /// Pushes one `(timestamp, value)` pair onto channel `channel`.
    pub fn push_sample(&self, channel: usize, timestamp: f64, value: f64) -> Result<(), RingError> {
        self.ring(channel)?.push_sample(timestamp, value);
        Ok(())
    }

    /// Pushes a chunk of samples onto channel `channel` under a single lock
    /// acquisition.
    pub fn push_chunk(
        &self,
        channel: usize,
        timestamps: &[f64],
        values: &[f64],
    ) -> Result<(), RingError> {
        self.ring(channel)?.push_chunk(timestamps, values)
    }

    /// Takes a mutually consistent snapshot of every secondary channel within
    /// `window`. Locks are held across every channel at once, then released before
    /// any unwrapping or windowing work happens.
    pub fn snapshot_all(&self, window: TimeWindow) -> Vec<Snapshot> {
        let guards: Vec<MutexGuard<'_, SecondaryState>> = {
            let mut guards = Vec::with_capacity(self.rings.len());
            let mut prev = 0usize;
            for (i, ring) in self.rings.iter().enumerate() {
                if i > 0 {
                    debug_assert_lock_order!(prev, i);
                }
                guards.push(ring.state.lock().unwrap());
                prev = i;
            }
            guards
        };

        let copies: Vec<(Vec<f64>, Vec<f64>, usize, bool)> = guards
            .iter()
            .map(|g| (g.samples.clone(), g.times.clone(), g.w, g.full))
            .collect();
        drop(guards);

        copies
            .into_iter()
            .zip(&self.rings)
            .map(|((samples, times, w, full), ring)| {
                ring.metrics.record_snapshot();
                reindex_and_select(&[samples], &times, ring.buffer_len, full, w, window)
            })
            .collect()
    }

    /// Takes a snapshot of a single channel without locking the whole bank.
    pub fn snapshot_one(&self, channel: usize, window: TimeWindow) -> Result<Snapshot, RingError> {
        Ok(self.ring(channel)?.snapshot(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_channel_push_and_snapshot() {
        let ring = SecondaryRing::new(4).unwrap();
        for (t, v) in [(1.0, 10.0), (2.0, 20.0), (3.0, 30.0)] {
            ring.push_sample(t, v);
        }
        let snap = ring.snapshot(TimeWindow::new(0.0, 10.0));
        assert_eq!(snap.data, vec![vec![10.0, 20.0, 30.0]]);
        assert_eq!(snap.ages, vec![2.0, 1.0, 0.0]);
        assert!(!ring.is_full());
    }

    #[test]
    fn chunk_push_is_atomic_and_ordered() {
        let ring = SecondaryRing::new(4).unwrap();
        ring.push_chunk(&[1.0, 2.0, 3.0], &[10.0, 20.0, 30.0]).unwrap();
        let snap = ring.snapshot(TimeWindow::new(0.0, 10.0));
        assert_eq!(snap.data, vec![vec![10.0, 20.0, 30.0]]);
    }

    #[test]
    fn chunk_push_rejects_mismatched_lengths() {
        let ring = SecondaryRing::new(4).unwrap();
        let err = ring.push_chunk(&[1.0, 2.0], &[10.0]).unwrap_err();
        assert_eq!(
            err,
            RingError::ChunkLengthMismatch {
                timestamps: 2,
                values: 1
            }
        );
    }

    #[test]
    fn independent_channels_wrap_on_their_own_schedules() {
        let bank = SecondaryBank::new(&[2, 8]).unwrap();
        bank.push_sample(0, 1.0, 1.0).unwrap();
        bank.push_sample(0, 2.0, 2.0).unwrap();
        bank.push_sample(0, 3.0, 3.0).unwrap();
        bank.push_sample(1, 1.0, 100.0).unwrap();

        assert!(bank.snapshot_one(0, TimeWindow::new(0.0, 10.0)).is_ok());
        let snap0 = bank.snapshot_one(0, TimeWindow::new(0.0, 10.0)).unwrap();
        assert_eq!(snap0.data, vec![vec![2.0, 3.0]]);

        let snap1 = bank.snapshot_one(1, TimeWindow::new(0.0, 10.0)).unwrap();
        assert_eq!(snap1.data, vec![vec![100.0]]);
    }

    #[test]
    fn snapshot_all_returns_one_snapshot_per_channel() {
        let bank = SecondaryBank::new(&[4, 4, 4]).unwrap();
        bank.push_sample(0, 1.0, 1.0).unwrap();
        bank.push_sample(1, 1.0, 2.0).unwrap();
        bank.push_sample(2, 1.0, 3.0).unwrap();

        let snaps = bank.snapshot_all(TimeWindow::new(0.0, 10.0));
        assert_eq!(snaps.len(), 3);
        assert_eq!(snaps[0].data, vec![vec![1.0]]);
        assert_eq!(snaps[1].data, vec![vec![2.0]]);
        assert_eq!(snaps[2].data, vec![vec![3.0]]);
    }

    #[test]
    fn out_of_range_channel_is_an_error() {
        let bank = SecondaryBank::new(&[4]).unwrap();
        assert_eq!(
            bank.push_sample(1, 1.0, 1.0).unwrap_err(),
            RingError::ChannelIndexOutOfRange { index: 1, len: 1 }
        );
    }
}
