//! Pure leaky-bucket arithmetic (spec §4.3).
//!
//! Kept free of any timer/scheduling concern so the decay/admission math can be unit tested
//! deterministically against injected [`Instant`] values (spec §8's quantified invariants).

// std
use std::time::{Duration, Instant};

/// Per-tenant bucket state. All methods take an explicit `now` rather than reading the
/// clock, so callers control time in tests.
#[derive(Debug, Clone)]
pub struct BucketState {
	counter: f64,
	last_update: Instant,
	blocked_until: Option<Instant>,
	last_request: Option<Instant>,
	total_requests: u64,
}
impl BucketState {
	/// Creates a fresh bucket, empty and unblocked, anchored at `now`.
	pub fn new(now: Instant) -> Self {
		Self { counter: 0.0, last_update: now, blocked_until: None, last_request: None, total_requests: 0 }
	}

	/// Current fractional bucket level.
	pub fn counter(&self) -> f64 {
		self.counter
	}

	/// Total number of admissions released for this tenant since creation.
	pub fn total_requests(&self) -> u64 {
		self.total_requests
	}

	/// Decays the counter toward zero at `leak_rate` units/second since the last update, and
	/// clears an expired hard block. Must be called before every admission decision (spec
	/// §4.3 "Leak arithmetic").
	pub fn decay(&mut self, now: Instant, leak_rate: f64) {
		let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

		self.counter = (self.counter - elapsed * leak_rate).max(0.0);
		self.last_update = now;

		if let Some(block_until) = self.blocked_until {
			if now > block_until {
				self.blocked_until = None;
			}
		}
	}

	/// Returns the remaining duration of a hard block at `now`, or `None` if unblocked.
	pub fn blocked_remaining(&self, now: Instant) -> Option<Duration> {
		self.blocked_until.filter(|&until| now < until).map(|until| until - now)
	}

	/// Returns the remaining cooldown before `MIN_REQUEST_INTERVAL` has elapsed since the
	/// last released admission, or `None` if the interval has already elapsed.
	pub fn min_interval_remaining(&self, now: Instant, min_interval: Duration) -> Option<Duration> {
		let last_request = self.last_request?;
		let elapsed = now.saturating_duration_since(last_request);

		(elapsed < min_interval).then(|| min_interval - elapsed)
	}

	/// Returns `true` if the bucket is at or above capacity.
	pub fn is_full(&self, max_bucket: f64) -> bool {
		self.counter >= max_bucket
	}

	/// Releases one admission: increments the counter by one unit and records `now` as the
	/// last request time.
	pub fn release(&mut self, now: Instant) {
		self.counter += 1.0;
		self.last_request = Some(now);
		self.total_requests += 1;
	}

	/// Applies a server-observed rate-limit breach (spec §4.3 `observe`): imposes a hard
	/// block of `block_for` and prefills the counter to `prefill_fraction * max_bucket` (at
	/// least; never lowers an already-higher counter).
	pub fn observe_breach(
		&mut self,
		now: Instant,
		max_bucket: f64,
		prefill_fraction: f64,
		block_for: Duration,
	) {
		self.counter = self.counter.max(max_bucket * prefill_fraction);
		self.blocked_until = Some(now + block_for);
	}

	/// Returns `true` if this bucket is idle: no pending hard block and the last request (if
	/// any) happened before `now - idle_after`.
	pub fn is_idle_since(&self, now: Instant, idle_after: Duration) -> bool {
		if self.blocked_until.is_some() {
			return false;
		}

		match self.last_request {
			Some(last) => now.saturating_duration_since(last) >= idle_after,
			None => now.saturating_duration_since(self.last_update) >= idle_after,
		}
	}
}
