//! Install Handler (spec §4.7) — turns an install-callback payload into an initial
//! [`CredentialRecord`] and writes it through a [`CredentialStore`].
//!
//! Grounded on [`crate::store::CredentialStore::write`]'s writer contract; this module is new
//! orchestration code with no direct teacher precedent — the teacher's broker is provisioned
//! out of band (callers hand it a `CachedTokenRequest` up front) rather than via an inbound
//! install webhook, so there is no `flows`-shaped control flow to generalize here.

// self
use crate::{
	_prelude::*,
	auth::{CredentialRecord, Domain},
	error::InstallError,
	store::CredentialStore,
};

const EVENT_ONAPPINSTALL: &str = "ONAPPINSTALL";
const PLACEMENT_DEFAULT: &str = "DEFAULT";

/// Outcome of a successful install, mirroring the two recognized payload shapes (spec §4.7).
#[derive(Clone, Debug, Serialize)]
pub struct InstallOutcome {
	/// `true` for a headless install (`ONAPPINSTALL`), `false` for a UI install
	/// (`PLACEMENT=DEFAULT`).
	pub rest_only: bool,
	/// The credential record written to the store.
	pub auth: CredentialRecord,
}

/// Accepts a map-shaped install-callback `payload` and writes the resulting
/// [`CredentialRecord`] through `store` (spec §4.7).
///
/// Recognizes two shapes: a headless install (`event: "ONAPPINSTALL"` with a nested `auth`
/// object) and a UI install (`PLACEMENT: "DEFAULT"` with flat `AUTH_ID`/`DOMAIN`/... fields).
/// Any other shape, or a write failure, returns [`InstallError`].
pub async fn handle_install(
	store: &dyn CredentialStore,
	payload: &serde_json::Value,
) -> Result<InstallOutcome, InstallError> {
	if payload.get("event").and_then(serde_json::Value::as_str) == Some(EVENT_ONAPPINSTALL) {
		return handle_headless_install(store, payload).await;
	}

	if payload.get("PLACEMENT").and_then(serde_json::Value::as_str) == Some(PLACEMENT_DEFAULT) {
		return handle_ui_install(store, payload).await;
	}

	Err(InstallError::new("Unrecognized install payload shape: expected ONAPPINSTALL or PLACEMENT=DEFAULT."))
}

async fn handle_headless_install(
	store: &dyn CredentialStore,
	payload: &serde_json::Value,
) -> Result<InstallOutcome, InstallError> {
	let auth_value = payload
		.get("auth")
		.ok_or_else(|| InstallError::new("Headless install payload is missing its `auth` object."))?;
	let record: CredentialRecord = serde_json::from_value(auth_value.clone())
		.map_err(|source| InstallError::new(format!("Failed to parse `auth` record: {source}")))?;

	write_record(store, record).await.map(|auth| InstallOutcome { rest_only: true, auth })
}

async fn handle_ui_install(
	store: &dyn CredentialStore,
	payload: &serde_json::Value,
) -> Result<InstallOutcome, InstallError> {
	let auth_id = required_str(payload, "AUTH_ID")?;
	let domain_str = required_str(payload, "DOMAIN")?;
	let domain = Domain::new(domain_str)
		.map_err(|source| InstallError::new(format!("Invalid DOMAIN in install payload: {source}")))?;
	let expires_in = optional_str(payload, "AUTH_EXPIRES")
		.and_then(|value| value.parse::<i64>().ok())
		.unwrap_or(3600);
	let mut builder = CredentialRecord::builder(domain.clone())
		.access_token(auth_id)
		.refresh_token(optional_str(payload, "REFRESH_ID").unwrap_or_default())
		.client_endpoint(format!("https://{domain}/rest/"))
		.expires_in(expires_in);

	if let Some(app_sid) = optional_str(payload, "APP_SID") {
		builder = builder.application_token(app_sid);
	}
	if let Some(member_id) = optional_str(payload, "member_id") {
		builder = builder.member_id(member_id);
	}
	if let Some(status) = optional_str(payload, "status") {
		builder = builder.status(status);
	}

	let record = builder
		.build()
		.map_err(|source| InstallError::new(format!("Failed to build credential record: {source}")))?;

	write_record(store, record).await.map(|auth| InstallOutcome { rest_only: false, auth })
}

async fn write_record(store: &dyn CredentialStore, record: CredentialRecord) -> Result<CredentialRecord, InstallError> {
	store
		.write(record.clone())
		.await
		.map_err(|source| InstallError::new(format!("Failed to persist install credential record: {source}")))?;

	Ok(record)
}

fn required_str<'a>(payload: &'a serde_json::Value, field: &str) -> Result<&'a str, InstallError> {
	payload
		.get(field)
		.and_then(serde_json::Value::as_str)
		.filter(|value| !value.is_empty())
		.ok_or_else(|| InstallError::new(format!("Install payload is missing required field `{field}`.")))
}

fn optional_str(payload: &serde_json::Value, field: &str) -> Option<String> {
	payload.get(field).and_then(serde_json::Value::as_str).map(str::to_owned)
}
