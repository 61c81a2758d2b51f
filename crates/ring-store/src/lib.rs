//! Mutex-guarded circular buffers for a measurement node's primary and secondary
//! channels.
//!
//! A [`PrimaryRing`] holds all primary channels in lockstep behind one mutex: the
//! receiver is the single writer, and any number of readers can take a consistent
//! [`Snapshot`] of the whole ring. A [`SecondaryBank`] is a collection of independent
//! [`SecondaryRing`]s, each with its own lock and its own write cadence, used by
//! user-supplied worker code.
//!
//! Both ring kinds follow the same two-step discipline: copy the raw arrays under
//! lock (`copy_state`), then unwrap the circular order and compute ages outside the
//! lock (`unwrap`). This keeps the critical section to a bounded set of memory copies
//! with no arithmetic, so writers are blocked for as little time as possible.

mod error;
mod invariants;
mod metrics;
mod primary;
mod secondary;
mod snapshot;

pub use error::RingError;
pub use metrics::RingMetrics;
pub use primary::PrimaryRing;
pub use secondary::{SecondaryBank, SecondaryRing};
pub use snapshot::{unwrap_indices, Snapshot, TimeWindow};
