//! Fixed-Capacity Ring Buffer
//!
//! Bounded FIFO storage for per-frame sliding windows. Capacity is fixed at
//! construction, so the "last N samples" invariant holds structurally.

mod buffer;

pub use buffer::{Iter, RingBuffer};
