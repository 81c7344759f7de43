//! Per-tenant FIFO registry (spec §4.3).
//!
//! Grounded on the *shape* of the teacher's `flows.rs` `flow_guards` map — a
//! [`Mutex`]-protected `HashMap` lazily populating one [`AsyncMutex`] per key — generalized
//! here from a one-shot mutual-exclusion guard into a persistent per-tenant leaky bucket plus
//! admission queue. `AsyncMutex` (async-lock) is documented as FIFO: waiters are woken in the
//! order they queued, which is exactly the ordering guarantee [`Limiter::admit`] needs.

// std
use std::{
	sync::atomic::{AtomicUsize, Ordering},
	time::{Duration, Instant},
};
// self
use crate::{
	_prelude::*,
	auth::Domain,
	limiter::{LimiterConfig, LimiterError, bucket::BucketState},
};

struct Tenant {
	/// FIFO admission gate: whoever acquires this first runs its bucket check first.
	gate: AsyncMutex<()>,
	bucket: Mutex<BucketState>,
	pending: AtomicUsize,
}
impl Tenant {
	fn new(now: Instant) -> Self {
		Self { gate: AsyncMutex::new(()), bucket: Mutex::new(BucketState::new(now)), pending: AtomicUsize::new(0) }
	}
}

/// Per-tenant leaky-bucket rate limiter with FIFO admission (spec §4.3).
///
/// Tenant state is created lazily on first use and reaped by [`Limiter::sweep`] once idle.
pub struct Limiter {
	config: LimiterConfig,
	tenants: Mutex<HashMap<Domain, Arc<Tenant>>>,
}
impl Limiter {
	/// Builds a limiter with the given configuration.
	pub fn new(config: LimiterConfig) -> Self {
		Self { config, tenants: Mutex::new(HashMap::new()) }
	}

	/// The configuration this limiter was built with.
	pub fn config(&self) -> &LimiterConfig {
		&self.config
	}

	fn tenant(&self, domain: &Domain) -> Arc<Tenant> {
		let mut tenants = self.tenants.lock();

		if let Some(tenant) = tenants.get(domain) {
			return tenant.clone();
		}

		let tenant = Arc::new(Tenant::new(Instant::now()));

		tenants.insert(domain.clone(), tenant.clone());

		tenant
	}

	/// Suspends until `domain`'s leaky bucket has room for one more admission, then releases
	/// it and returns. Admissions for the same domain are released in the order this method
	/// was called (spec §4.3, §8 FIFO invariant).
	///
	/// Returns [`LimiterError::QueueOverflow`] immediately, without waiting, if the tenant
	/// already has `max_queue_len` admissions outstanding.
	pub async fn admit(&self, domain: &Domain) -> Result<(), LimiterError> {
		let tenant = self.tenant(domain);
		let outstanding = tenant.pending.fetch_add(1, Ordering::SeqCst) + 1;

		if let Some(cap) = self.config.max_queue_len {
			if outstanding > cap {
				tenant.pending.fetch_sub(1, Ordering::SeqCst);

				return Err(LimiterError::QueueOverflow);
			}
		}

		let _gate = tenant.gate.lock().await;

		loop {
			let now = Instant::now();
			let mut bucket = tenant.bucket.lock();

			bucket.decay(now, self.config.leak_rate);

			if let Some(remaining) = bucket.blocked_remaining(now) {
				drop(bucket);
				tokio::time::sleep(remaining).await;
				continue;
			}
			if let Some(remaining) = bucket.min_interval_remaining(now, self.config.min_request_interval) {
				drop(bucket);
				tokio::time::sleep(remaining).await;
				continue;
			}
			if bucket.is_full(self.config.max_bucket) {
				drop(bucket);
				tokio::time::sleep(leak_wait(self.config.leak_rate)).await;
				continue;
			}

			bucket.release(now);
			break;
		}

		tenant.pending.fetch_sub(1, Ordering::SeqCst);

		Ok(())
	}

	/// Records a server-enforced rate-limit breach for `domain`: prefills the bucket and
	/// imposes a hard block (spec §4.3 `observe`). Called by the orchestrator after a
	/// `QUERY_LIMIT_EXCEEDED` response, independent of whether the call is retried.
	pub fn observe(&self, domain: &Domain) {
		let tenant = self.tenant(domain);
		let now = Instant::now();
		let mut bucket = tenant.bucket.lock();

		bucket.decay(now, self.config.leak_rate);
		bucket.observe_breach(now, self.config.max_bucket, self.config.breach_prefill_fraction, self.config.max_block_time);

		#[cfg(feature = "metrics")]
		metrics::counter!("bitrix24_client_limiter_blocks_total").increment(1);
	}

	/// Current bucket level for `domain`, or `0.0` if the tenant has no tracked state.
	pub fn counter(&self, domain: &Domain) -> f64 {
		self.tenants.lock().get(domain).map(|tenant| tenant.bucket.lock().counter()).unwrap_or(0.0)
	}

	/// Total admissions released for `domain` since it was first seen.
	pub fn total_requests(&self, domain: &Domain) -> u64 {
		self.tenants.lock().get(domain).map(|tenant| tenant.bucket.lock().total_requests()).unwrap_or(0)
	}

	/// Drops tracked state for tenants that are idle (no pending admissions, no active hard
	/// block, and no activity within `idle_sweep_after`). Safe to call concurrently with
	/// in-flight [`Limiter::admit`] calls: a tenant with a pending admission is never swept.
	pub fn sweep(&self) {
		let now = Instant::now();
		let mut tenants = self.tenants.lock();

		tenants.retain(|_, tenant| {
			if tenant.pending.load(Ordering::SeqCst) != 0 {
				return true;
			}

			let mut bucket = tenant.bucket.lock();

			// Decay first so an expired hard block is cleared before the idle check, or a
			// long-blocked tenant would never look idle.
			bucket.decay(now, self.config.leak_rate);

			!bucket.is_idle_since(now, self.config.idle_sweep_after)
		});
	}

	/// Number of tenants currently tracked. Exposed for tests and diagnostics.
	pub fn tracked_tenants(&self) -> usize {
		self.tenants.lock().len()
	}
}

/// Wait time for one leaked unit to free up a full bucket, rounded up to the millisecond.
fn leak_wait(leak_rate: f64) -> Duration {
	Duration::from_millis((1000.0 / leak_rate).ceil() as u64)
}
