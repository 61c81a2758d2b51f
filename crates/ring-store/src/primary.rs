use crate::invariants::{debug_assert_cursor_in_bounds, debug_assert_time_monotonic};
use crate::metrics::RingMetrics;
use crate::snapshot::{reindex_and_select, Snapshot, TimeWindow};
use crate::RingError;
use std::sync::Mutex;

struct PrimaryState {
    /// One array per channel, all of length `buffer_len`, advancing in lockstep.
    channels: Vec<Vec<f64>>,
    times: Vec<f64>,
    w: usize,
    full: bool,
    last_time: f64,
    writes: u64,
}

/// The node's primary ring: every primary channel shares one write cursor and one
/// timestamp array, because all primary channels arrive together as one sample
/// vector from the external stream.
///
/// The receiver is the single writer; any number of responders may call
/// [`PrimaryRing::snapshot`] concurrently. The write lock is only ever held for the
/// duration of a handful of `Vec` copies — no arithmetic happens while it is held.
pub struct PrimaryRing {
    state: Mutex<PrimaryState>,
    channel_count: usize,
    buffer_len: usize,
    sampling_rate: f64,
    metrics: RingMetrics,
}

impl PrimaryRing {
    /// Creates a new primary ring with `channel_count` channels, each holding
    /// `buffer_len` samples, sampled at `sampling_rate` Hz.
    pub fn new(channel_count: usize, buffer_len: usize, sampling_rate: f64) -> Result<Self, RingError> {
        if buffer_len == 0 {
            return Err(RingError::ZeroLengthBuffer);
        }
        Ok(Self {
            state: Mutex::new(PrimaryState {
                channels: vec![vec![0.0; buffer_len]; channel_count],
                times: vec![0.0; buffer_len],
                w: 0,
                full: false,
                last_time: 0.0,
                writes: 0,
            }),
            channel_count,
            buffer_len,
            sampling_rate,
            metrics: RingMetrics::new(),
        })
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    pub fn metrics(&self) -> &RingMetrics {
        &self.metrics
    }

    /// Returns whether the ring has ever been filled (has wrapped at least once).
    pub fn is_full(&self) -> bool {
        self.state.lock().unwrap().full
    }

    /// Appends one sample per channel at the current write cursor. If `timestamp` is
    /// `None`, a timestamp is synthesized as `last_time + 1/sampling_rate`.
    pub fn append(&self, samples: &[f64], timestamp: Option<f64>) -> Result<(), RingError> {
        if samples.len() != self.channel_count {
            return Err(RingError::ChannelCountMismatch {
                expected: self.channel_count,
                got: samples.len(),
            });
        }

        let mut state = self.state.lock().unwrap();
        let w = state.w;
        debug_assert_cursor_in_bounds!(w, self.buffer_len);

        for (channel, &value) in state.channels.iter_mut().zip(samples) {
            channel[w] = value;
        }

        let t = timestamp.unwrap_or_else(|| state.last_time + 1.0 / self.sampling_rate);
        debug_assert_time_monotonic!(state.last_time, t);
        state.times[w] = t;
        state.last_time = t;

        state.writes += 1;
        state.w = (w + 1) % self.buffer_len;
        if !state.full && state.writes >= self.buffer_len as u64 {
            state.full = true;
            self.metrics.record_wrap();
        }

        self.metrics.record_append();
        Ok(())
    }

    /// Takes a consistent snapshot of every primary channel within `window`.
    pub fn snapshot(&self, window: TimeWindow) -> Snapshot {
        let (channels, times, w, full) = {
            let state = self.state.lock().unwrap();
            (state.channels.clone(), state.times.clone(), state.w, state.full)
        };

        self.metrics.record_snapshot();
        reindex_and_select(&channels, &times, self.buffer_len, full, w, window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_scenario_s1() -> PrimaryRing {
        let ring = PrimaryRing::new(1, 4, 1.0).unwrap();
        for (t, x) in [(1.0, 10.0), (2.0, 20.0), (3.0, 30.0), (4.0, 40.0), (5.0, 50.0)] {
            ring.append(&[x], Some(t)).unwrap();
        }
        ring
    }

    #[test]
    fn s1_fill_and_wrap() {
        let ring = fill_scenario_s1();
        let snap = ring.snapshot(TimeWindow::new(0.0, 4.0));
        assert_eq!(snap.data, vec![vec![20.0, 30.0, 40.0, 50.0]]);
        assert_eq!(snap.ages, vec![3.0, 2.0, 1.0, 0.0]);
        assert!(ring.is_full());
    }

    #[test]
    fn s2_sub_window() {
        let ring = fill_scenario_s1();
        let snap = ring.snapshot(TimeWindow::new(0.0, 2.0));
        assert_eq!(snap.data, vec![vec![40.0, 50.0]]);
        assert_eq!(snap.ages, vec![1.0, 0.0]);
    }

    #[test]
    fn s3_synthesized_timestamp() {
        let ring = PrimaryRing::new(1, 3, 2.0).unwrap();
        ring.append(&[1.0], Some(10.0)).unwrap();
        ring.append(&[2.0], None).unwrap();
        ring.append(&[3.0], None).unwrap();

        let snap = ring.snapshot(TimeWindow::new(0.0, 10.0));
        assert_eq!(snap.ages, vec![4.0, 2.0, 0.0]);
    }

    #[test]
    fn append_rejects_wrong_channel_count() {
        let ring = PrimaryRing::new(2, 4, 1.0).unwrap();
        let err = ring.append(&[1.0], Some(1.0)).unwrap_err();
        assert_eq!(
            err,
            RingError::ChannelCountMismatch {
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn zero_length_buffer_rejected() {
        assert_eq!(
            PrimaryRing::new(1, 0, 1.0).unwrap_err(),
            RingError::ZeroLengthBuffer
        );
    }

    #[test]
    fn not_full_before_filling_buffer() {
        let ring = PrimaryRing::new(1, 4, 1.0).unwrap();
        ring.append(&[1.0], Some(1.0)).unwrap();
        assert!(!ring.is_full());
    }

    #[test]
    fn append_and_snapshot_do_not_mix_partial_state() {
        // Property 3: a snapshot taken strictly between two appends reflects one of
        // the two consistent states, never a mix of fields from both.
        let ring = PrimaryRing::new(1, 4, 1.0).unwrap();
        ring.append(&[1.0], Some(1.0)).unwrap();
        let before = ring.snapshot(TimeWindow::new(0.0, 10.0));
        ring.append(&[2.0], Some(2.0)).unwrap();
        let after = ring.snapshot(TimeWindow::new(0.0, 10.0));
        assert_eq!(before.data, vec![vec![1.0]]);
        assert_eq!(after.data, vec![vec![1.0, 2.0]]);
    }
}
