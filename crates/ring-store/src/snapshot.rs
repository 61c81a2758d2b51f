use crate::invariants::debug_assert_ages_monotonic;

/// A time window for snapshot queries: `end_offset` seconds back from "now" to
/// `end_offset + duration` seconds back from "now".
///
/// Age 0 is the most recent sample; larger ages are older. A window of
/// `{end_offset: 0, duration: d}` selects the most recent `d` seconds of history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub end_offset: f64,
    pub duration: f64,
}

impl TimeWindow {
    pub fn new(end_offset: f64, duration: f64) -> Self {
        Self {
            end_offset,
            duration,
        }
    }

    /// The `[lo, hi)` age range this window selects: inclusive of `end_offset`,
    /// exclusive of `end_offset + duration`.
    fn age_bounds(&self) -> (f64, f64) {
        (self.end_offset, self.end_offset + self.duration)
    }
}

/// The result of taking a consistent snapshot of one or more channel arrays: the
/// per-channel data already reindexed into chronological order and sliced to the
/// requested window, plus the matching age vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub data: Vec<Vec<f64>>,
    pub ages: Vec<f64>,
}

/// Computes the index vector that reorders a circular buffer of length `len` into
/// chronological order, given the current write cursor `w` and whether the buffer has
/// wrapped (`full`).
///
/// When `full`, the oldest sample is at `w` and the newest at `w - 1` (mod `len`):
/// `[w, w+1, …, len-1, 0, …, w-1]`. Otherwise the buffer has never wrapped and the
/// chronological order is simply `[0, …, w-1]`.
pub fn unwrap_indices(len: usize, full: bool, w: usize) -> Vec<usize> {
    if !full {
        return (0..w).collect();
    }
    (w..len).chain(0..w).collect()
}

/// Turns a chronologically-ordered absolute timestamp vector into an age vector
/// relative to the most recent sample (`ages[i] = |t[i] - t[last]|`).
fn ages_from_times(times: &[f64]) -> Vec<f64> {
    let Some(&last) = times.last() else {
        return Vec::new();
    };
    times.iter().map(|t| (t - last).abs()).collect()
}

/// Finds the `[start, stop)` slice range in a chronologically-ordered age vector
/// (oldest/largest age first, most recent/age-0 last) whose ages fall in
/// `[end_offset, end_offset + duration)`.
///
/// The age vector is non-increasing by construction, so each bound is found with a
/// `partition_point` over the complementary predicate (true for the older prefix,
/// false once ages drop below the bound).
fn select_range(ages: &[f64], window: TimeWindow) -> (usize, usize) {
    let (lo, hi) = window.age_bounds();
    let start = ages.partition_point(|&age| age >= hi);
    let stop = ages.partition_point(|&age| age >= lo);
    (start, stop.max(start))
}

/// Applies the unwrap → age → window-select pipeline shared by primary and secondary
/// snapshots to a set of channel arrays that share one timestamp array.
///
/// `channels` and `times` are the raw (still circular-order) arrays copied out from
/// under a lock; `len`/`full`/`w` describe how to unwrap them.
pub fn reindex_and_select(
    channels: &[Vec<f64>],
    times: &[f64],
    len: usize,
    full: bool,
    w: usize,
    window: TimeWindow,
) -> Snapshot {
    let order = unwrap_indices(len, full, w);

    let ordered_times: Vec<f64> = order.iter().map(|&i| times[i]).collect();
    let ages = ages_from_times(&ordered_times);
    debug_assert_ages_monotonic!(ages);

    let (start, stop) = select_range(&ages, window);

    let data = channels
        .iter()
        .map(|ch| {
            order[start..stop]
                .iter()
                .map(|&i| ch[i])
                .collect::<Vec<f64>>()
        })
        .collect();

    Snapshot {
        data,
        ages: ages[start..stop].to_vec(),
    }
}
