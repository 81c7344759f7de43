//! Rate Limiter (spec §4.3) — per-tenant leaky bucket with a FIFO admission queue.
//!
//! [`Limiter::admit`] is the caller-facing operation: it suspends until the tenant's
//! leaky bucket has room, then releases exactly one admission at a time per domain, in
//! enqueue order. [`Limiter::observe`] is the transport-facing operation: it records a
//! server-enforced rate-limit breach and imposes a hard block.

pub mod bucket;
pub mod registry;

pub use registry::Limiter;

// std
use std::time::Duration;
// self
use crate::_prelude::*;

/// Tunable limiter parameters (spec §4.3). Defaults match the spec's literal values.
#[derive(Clone, Copy, Debug)]
pub struct LimiterConfig {
	/// Bucket capacity in units (default 50).
	pub max_bucket: f64,
	/// Leak rate in units/second (default 2).
	pub leak_rate: f64,
	/// Minimum spacing between two releases for the same tenant (default 150ms).
	pub min_request_interval: Duration,
	/// Duration of a hard block imposed by [`Limiter::observe`] (default 5000ms).
	pub max_block_time: Duration,
	/// Optional cap on the number of admissions that may be outstanding (queued or
	/// in-flight) for a single tenant; `None` means unbounded.
	pub max_queue_len: Option<usize>,
	/// Fraction of `max_bucket` the counter is prefilled to on a breach (default 0.9).
	pub breach_prefill_fraction: f64,
	/// Tenant idle timeout before its state is eligible for sweeping (default 30 minutes).
	pub idle_sweep_after: Duration,
}
impl Default for LimiterConfig {
	fn default() -> Self {
		Self {
			max_bucket: 50.0,
			leak_rate: 2.0,
			min_request_interval: Duration::from_millis(150),
			max_block_time: Duration::from_millis(5000),
			max_queue_len: None,
			breach_prefill_fraction: 0.9,
			idle_sweep_after: Duration::from_secs(30 * 60),
		}
	}
}

/// Error returned by [`Limiter::admit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum LimiterError {
	/// The tenant's admission queue exceeded its configured cap.
	#[error("Admission queue overflowed for this tenant.")]
	QueueOverflow,
}
