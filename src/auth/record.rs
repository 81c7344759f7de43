//! Credential record model (spec §3) and the builder used by the install handler and the
//! refresh path.

// self
use crate::{
	_prelude::*,
	auth::{Domain, Secret},
};

/// Minimal tenant hint passed into [`crate::store::CredentialStore::read`].
///
/// The store contract (spec §4.2) only requires the hint to carry a domain; callers that
/// already hold a full [`CredentialRecord`] can build a hint from it with
/// [`CredentialRecord::hint`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialHint {
	/// Domain the record is keyed by.
	pub domain: Domain,
}
impl CredentialHint {
	/// Creates a new hint for the provided domain.
	pub fn new(domain: Domain) -> Self {
		Self { domain }
	}
}

/// Per-tenant OAuth credential record (spec §3).
///
/// A record is *valid* iff `access_token`, `domain`, `refresh_token`, and `client_endpoint`
/// are all non-empty — see [`CredentialRecord::is_valid`]. The orchestrator treats any
/// store read that fails this invariant as "no record present" (spec §4.2).
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
	/// Opaque OAuth access token.
	pub access_token: Secret,
	/// Opaque OAuth refresh token.
	pub refresh_token: Secret,
	/// DNS domain naming the tenant; primary key.
	pub domain: Domain,
	/// Absolute URL prefix for method invocations, canonically `https://<domain>/rest/`.
	pub client_endpoint: String,
	/// Opaque application token (`APP_SID`), when supplied by the install payload.
	pub application_token: Option<Secret>,
	/// Opaque member id supplied by the server.
	pub member_id: Option<String>,
	/// Free-form tenant status string supplied by the server.
	pub status: Option<String>,
	/// Access token lifetime in seconds, as reported by the server.
	pub expires_in: i64,
	/// Optional server endpoint used to derive a tenant-specific OAuth endpoint (spec §4.6,
	/// §9).
	pub server_endpoint: Option<String>,
}
impl CredentialRecord {
	/// Starts building a record for the given domain.
	pub fn builder(domain: Domain) -> CredentialRecordBuilder {
		CredentialRecordBuilder::new(domain)
	}

	/// Returns `true` iff the record satisfies spec §3's validity invariant: access token,
	/// domain, refresh token, and client endpoint are all non-empty.
	pub fn is_valid(&self) -> bool {
		!self.access_token.is_empty()
			&& !self.domain.is_empty()
			&& !self.refresh_token.is_empty()
			&& !self.client_endpoint.is_empty()
	}

	/// Builds the minimal hint used to re-look up this record.
	pub fn hint(&self) -> CredentialHint {
		CredentialHint::new(self.domain.clone())
	}

	/// Returns the canonical client endpoint for a bare domain (`https://<domain>/rest/`).
	pub fn canonical_client_endpoint(domain: &Domain) -> String {
		format!("https://{domain}/rest/")
	}
}
impl Debug for CredentialRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialRecord")
			.field("domain", &self.domain)
			.field("client_endpoint", &self.client_endpoint)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("application_token", &self.application_token.as_ref().map(|_| "<redacted>"))
			.field("member_id", &self.member_id)
			.field("status", &self.status)
			.field("expires_in", &self.expires_in)
			.field("server_endpoint", &self.server_endpoint)
			.finish()
	}
}

/// Errors produced by [`CredentialRecordBuilder::build`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CredentialRecordBuilderError {
	/// No access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// No refresh token value was provided.
	#[error("Refresh token is required.")]
	MissingRefreshToken,
}

/// Builder for [`CredentialRecord`].
#[derive(Clone, Debug)]
pub struct CredentialRecordBuilder {
	domain: Domain,
	access_token: Option<Secret>,
	refresh_token: Option<Secret>,
	client_endpoint: Option<String>,
	application_token: Option<Secret>,
	member_id: Option<String>,
	status: Option<String>,
	expires_in: i64,
	server_endpoint: Option<String>,
}
impl CredentialRecordBuilder {
	const DEFAULT_EXPIRES_IN: i64 = 3600;

	fn new(domain: Domain) -> Self {
		Self {
			domain,
			access_token: None,
			refresh_token: None,
			client_endpoint: None,
			application_token: None,
			member_id: None,
			status: None,
			expires_in: Self::DEFAULT_EXPIRES_IN,
			server_endpoint: None,
		}
	}

	/// Sets the access token.
	pub fn access_token(mut self, value: impl Into<String>) -> Self {
		self.access_token = Some(Secret::new(value.into()));

		self
	}

	/// Sets the refresh token.
	pub fn refresh_token(mut self, value: impl Into<String>) -> Self {
		self.refresh_token = Some(Secret::new(value.into()));

		self
	}

	/// Sets the client endpoint explicitly; defaults to the canonical
	/// `https://<domain>/rest/` when left unset.
	pub fn client_endpoint(mut self, value: impl Into<String>) -> Self {
		self.client_endpoint = Some(value.into());

		self
	}

	/// Sets the application token.
	pub fn application_token(mut self, value: impl Into<String>) -> Self {
		self.application_token = Some(Secret::new(value.into()));

		self
	}

	/// Sets the member id.
	pub fn member_id(mut self, value: impl Into<String>) -> Self {
		self.member_id = Some(value.into());

		self
	}

	/// Sets the status string.
	pub fn status(mut self, value: impl Into<String>) -> Self {
		self.status = Some(value.into());

		self
	}

	/// Sets the access token lifetime in seconds (default 3600).
	pub fn expires_in(mut self, value: i64) -> Self {
		self.expires_in = value;

		self
	}

	/// Sets the server endpoint used for OAuth endpoint derivation.
	pub fn server_endpoint(mut self, value: impl Into<String>) -> Self {
		self.server_endpoint = Some(value.into());

		self
	}

	/// Builds the record, validating that an access and refresh token were supplied.
	pub fn build(self) -> Result<CredentialRecord, CredentialRecordBuilderError> {
		let access_token =
			self.access_token.ok_or(CredentialRecordBuilderError::MissingAccessToken)?;
		let refresh_token =
			self.refresh_token.ok_or(CredentialRecordBuilderError::MissingRefreshToken)?;
		let client_endpoint = self
			.client_endpoint
			.unwrap_or_else(|| CredentialRecord::canonical_client_endpoint(&self.domain));

		Ok(CredentialRecord {
			access_token,
			refresh_token,
			domain: self.domain,
			client_endpoint,
			application_token: self.application_token,
			member_id: self.member_id,
			status: self.status,
			expires_in: self.expires_in,
			server_endpoint: self.server_endpoint,
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn domain() -> Domain {
		Domain::new("t.bitrix24.com").expect("Domain fixture should be valid.")
	}

	#[test]
	fn builder_defaults_client_endpoint_from_domain() {
		let record = CredentialRecord::builder(domain())
			.access_token("T")
			.refresh_token("R")
			.build()
			.expect("Record should build with only required fields.");

		assert_eq!(record.client_endpoint, "https://t.bitrix24.com/rest/");
		assert!(record.is_valid());
	}

	#[test]
	fn builder_rejects_missing_tokens() {
		assert!(matches!(
			CredentialRecord::builder(domain()).refresh_token("R").build(),
			Err(CredentialRecordBuilderError::MissingAccessToken)
		));
		assert!(matches!(
			CredentialRecord::builder(domain()).access_token("T").build(),
			Err(CredentialRecordBuilderError::MissingRefreshToken)
		));
	}

	#[test]
	fn empty_access_token_fails_validity_invariant() {
		let mut record = CredentialRecord::builder(domain())
			.access_token("T")
			.refresh_token("R")
			.build()
			.expect("Record should build.");

		record.access_token = Secret::new("");

		assert!(!record.is_valid());
	}

	#[test]
	fn debug_redacts_secrets() {
		let record = CredentialRecord::builder(domain())
			.access_token("T-secret")
			.refresh_token("R-secret")
			.application_token("APP-secret")
			.build()
			.expect("Record should build.");
		let rendered = format!("{record:?}");

		assert!(!rendered.contains("T-secret"));
		assert!(!rendered.contains("R-secret"));
		assert!(!rendered.contains("APP-secret"));
	}

	#[test]
	fn hint_carries_domain() {
		let record = CredentialRecord::builder(domain())
			.access_token("T")
			.refresh_token("R")
			.build()
			.expect("Record should build.");

		assert_eq!(record.hint().domain, record.domain);
	}
}
