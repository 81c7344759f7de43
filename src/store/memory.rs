//! In-memory [`CredentialStore`] useful for tests and ephemeral deployments.

// self
use crate::{
	_prelude::*,
	auth::{CredentialHint, CredentialRecord, Domain},
	store::{CredentialStore, StoreFuture},
};

/// Keeps credential records in a process-local map, keyed by domain. Nothing is persisted
/// across restarts.
#[derive(Debug, Default)]
pub struct MemoryStore {
	inner: RwLock<HashMap<Domain, CredentialRecord>>,
}
impl CredentialStore for MemoryStore {
	fn read<'a>(&'a self, hint: &'a CredentialHint) -> StoreFuture<'a, Option<CredentialRecord>> {
		Box::pin(async move { Ok(self.inner.read().get(&hint.domain).cloned()) })
	}

	fn write(&self, record: CredentialRecord) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.inner.write().insert(record.domain.clone(), record);

			Ok(())
		})
	}
}
impl MemoryStore {
	/// Returns the record currently stored for `domain`, bypassing the `CredentialStore`
	/// future machinery — handy for assertions in tests.
	pub fn peek(&self, domain: &Domain) -> Option<CredentialRecord> {
		self.inner.read().get(domain).cloned()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn domain() -> Domain {
		Domain::new("t.bitrix24.com").expect("Domain fixture should be valid.")
	}

	#[tokio::test]
	async fn write_then_read_round_trips() {
		let store = MemoryStore::default();
		let record = CredentialRecord::builder(domain())
			.access_token("T")
			.refresh_token("R")
			.build()
			.expect("Record should build.");

		store.write(record.clone()).await.expect("Write should succeed.");

		let fetched = store
			.read(&CredentialHint::new(domain()))
			.await
			.expect("Read should succeed.")
			.expect("Record should be present after write.");

		assert_eq!(fetched.access_token.expose(), "T");
	}

	#[tokio::test]
	async fn write_overwrites_prior_record_for_domain() {
		let store = MemoryStore::default();

		store
			.write(
				CredentialRecord::builder(domain())
					.access_token("T1")
					.refresh_token("R1")
					.build()
					.expect("Record should build."),
			)
			.await
			.expect("First write should succeed.");
		store
			.write(
				CredentialRecord::builder(domain())
					.access_token("T2")
					.refresh_token("R2")
					.build()
					.expect("Record should build."),
			)
			.await
			.expect("Second write should succeed.");

		let fetched = store.peek(&domain()).expect("Record should be present.");

		assert_eq!(fetched.access_token.expose(), "T2");
	}

	#[tokio::test]
	async fn missing_domain_returns_none() {
		let store = MemoryStore::default();
		let fetched = store
			.read(&CredentialHint::new(domain()))
			.await
			.expect("Read should not fail for a missing record.");

		assert!(fetched.is_none());
	}
}
