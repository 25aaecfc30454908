//! # SPSC Ring Buffer
//!
//! A fixed-capacity, lock-free ring buffer for handing values from exactly
//! one producer thread to exactly one consumer thread.
//!
//! A [`RingBuffer`] is a factory for its two ends. [`RingBuffer::acquire_producer_end`]
//! and [`RingBuffer::acquire_consumer_end`] each hand out at most one live
//! handle; a second request while the first handle is alive returns `None`.
//! Dropping a handle releases its role.
//!
//! ```
//! use spsc_ring::{Full, RingBuffer};
//!
//! let ring = RingBuffer::new(1);
//! let producer = ring.acquire_producer_end().unwrap();
//! let consumer = ring.acquire_consumer_end().unwrap();
//!
//! assert_eq!(producer.enqueue("a"), Ok(()));
//! assert_eq!(producer.enqueue("b"), Err(Full("b")));
//! assert_eq!(consumer.dequeue(), Some("a"));
//! assert_eq!(consumer.dequeue(), None);
//! ```
//!
//! ## Non-blocking by construction
//!
//! [`Producer::enqueue`] and [`Consumer::dequeue`] never block, allocate or
//! enter the kernel. A full buffer is reported as [`Full`], an empty one as
//! `None`; both are routine states that the caller resolves by retrying.
//! How to wait between retries is a caller policy, see [`wait`]:
//!
//! - **[`wait::Spin`]:** lowest latency, one fully busy core per waiter.
//! - **[`wait::Yield`]:** lets other threads run on an oversubscribed box.
//! - **[`wait::Backoff`]:** spins briefly, then yields.
//!
//! ## Memory ordering
//!
//! Each index has exactly one writer. The producer publishes a slot with a
//! `Release` store of `write_index` that the consumer `Acquire`-loads; the
//! consumer hands a slot back with a `Release` store of `read_index` that the
//! producer `Acquire`-loads. One slot beyond the stated capacity stays unused
//! so that full and empty are distinct index states.
//!
//! ## Logging
//!
//! With the `tracing` feature, role acquisition and release are logged
//! through [`tracing`](https://docs.rs/tracing); call [`init_tracing`] to
//! install a subscriber. The enqueue/dequeue paths are never instrumented.
//!
//! ## Modules
//!
//! - `ring_buffer` — [`RingBuffer`], [`Producer`], [`Consumer`].
//! - [`wait`] — caller-side wait strategies and timeouts.
//! - `utils` — benchmarking helpers ([`mono_time_ns`], [`Trials`]).
//!
//! ## License
//!
//! Copyright © 2005–2025
//! IKH Software, Inc.
//!
//! Licensed under the terms of the **GNU Lesser General Public License**,
//! version 3.0, or (at your option) any later version.
//!
//! See <https://www.gnu.org/licenses/lgpl-3.0.html> for details.

#[cfg(not(unix))]
compile_error!("This crate only supports Unix-like operating systems.");

mod error;
mod ring_buffer;
mod sync;
mod trace;
mod utils;
pub mod wait;

pub use error::{Full, Role};
pub use ring_buffer::{Consumer, DEFAULT_CAPACITY, Producer, RingBuffer};
pub use trace::init_tracing;
pub use utils::{Trials, mono_time_ns};
