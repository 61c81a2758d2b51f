//! Debug assertion macros for ring buffer invariants.
//!
//! These are only active in debug builds (`#[cfg(debug_assertions)]`), so there is
//! zero overhead in release builds.

/// INV-PRIM-01: the write cursor always stays within `[0, len)`.
macro_rules! debug_assert_cursor_in_bounds {
    ($w:expr, $len:expr) => {
        debug_assert!(
            $w < $len,
            "INV-PRIM-01 violated: write cursor {} out of bounds for buffer length {}",
            $w,
            $len
        )
    };
}

/// INV-PRIM-02: a synthesized timestamp never moves backwards relative to the
/// previous `last_time`.
macro_rules! debug_assert_time_monotonic {
    ($old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "INV-PRIM-02 violated: last_time decreased from {} to {}",
            $old,
            $new
        )
    };
}

/// INV-WIN-01: an age vector produced by a snapshot runs oldest-to-newest, i.e. is
/// non-increasing (age 0, the most recent sample, comes last).
macro_rules! debug_assert_ages_monotonic {
    ($ages:expr) => {
        #[cfg(debug_assertions)]
        {
            for pair in $ages.windows(2) {
                debug_assert!(
                    pair[1] <= pair[0],
                    "INV-WIN-01 violated: ages not non-increasing ({} followed by {})",
                    pair[0],
                    pair[1]
                );
            }
        }
    };
}

/// INV-SEC-01: secondary snapshots must acquire per-channel locks in index order to
/// match the order every other caller uses, preventing lock-order deadlocks.
macro_rules! debug_assert_lock_order {
    ($prev:expr, $cur:expr) => {
        debug_assert!(
            $cur >= $prev,
            "INV-SEC-01 violated: secondary locks acquired out of index order ({} after {})",
            $cur,
            $prev
        )
    };
}

pub(crate) use debug_assert_ages_monotonic;
pub(crate) use debug_assert_cursor_in_bounds;
pub(crate) use debug_assert_lock_order;
pub(crate) use debug_assert_time_monotonic;
