//! Storage contract (spec §4.2) and built-in store implementations.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{CredentialHint, CredentialRecord},
};

/// Boxed future returned by [`CredentialStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistence contract for tenant credential records (spec §4.2).
///
/// Both operations may suspend. The core validates the record returned by [`Self::read`]
/// against [`CredentialRecord::is_valid`] and treats any violation as "no record present" —
/// implementations are not required to duplicate that check.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the record for the tenant identified by `hint`, if one exists.
	fn read<'a>(&'a self, hint: &'a CredentialHint) -> StoreFuture<'a, Option<CredentialRecord>>;

	/// Persists the given record, replacing any existing record for the same domain.
	fn write(&self, record: CredentialRecord) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures (e.g., serde) surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{auth::Domain, error::Error};
	use std::error::Error as StdError;

	#[test]
	fn store_error_converts_into_client_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let client_error: Error = store_error.clone().into();

		assert!(matches!(client_error, Error::Storage(_)));
		assert!(client_error.to_string().contains("database unreachable"));

		let source = StdError::source(&client_error)
			.expect("Client error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn hint_carries_domain_only() {
		let domain = Domain::new("t.bitrix24.com").expect("Domain fixture should be valid.");
		let hint = CredentialHint::new(domain.clone());

		assert_eq!(hint.domain, domain);
	}
}
