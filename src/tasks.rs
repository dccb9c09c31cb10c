//! Scheduling primitives the indexing pipeline is built on: a bounded
//! concurrent drain, an unbounded fixed-interval retry loop, and a
//! non-overlapping periodic runner.

pub mod periodic;
pub mod pile;
pub mod retry;

pub use periodic::run_every;
pub use pile::drain_bounded;
pub use retry::{retry_forever, RetryForever};
