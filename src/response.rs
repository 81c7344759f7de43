//! Response envelope helpers and the domain-error vocabulary (spec §6).
//!
//! A successful or domain-error response is always a decoded JSON object (see
//! [`crate::transport::body`]); this module adds typed accessors over that
//! [`serde_json::Value`] rather than introducing a parallel envelope type, since the shape
//! genuinely varies by content type and status (spec §3 "Response Envelope").

/// `error` field value that triggers the orchestrator's refresh path (spec §4.6).
pub const EXPIRED_TOKEN: &str = "expired_token";
/// Recognized domain-error vocabulary beyond `expired_token` (spec §6).
pub const INVALID_TOKEN: &str = "invalid_token";
/// Returned by the OAuth endpoint when a refresh token is no longer valid.
pub const INVALID_GRANT: &str = "invalid_grant";
/// Returned by the OAuth endpoint when the client id/secret pair is rejected.
pub const INVALID_CLIENT: &str = "invalid_client";
/// Server-enforced rate-limit breach; triggers the limiter's hard block (spec §4.3).
pub const QUERY_LIMIT_EXCEEDED: &str = "QUERY_LIMIT_EXCEEDED";
/// The requested method name is not recognized by the server.
pub const ERROR_METHOD_NOT_FOUND: &str = "ERROR_METHOD_NOT_FOUND";
/// No OAuth installation could be resolved for the request.
pub const NO_AUTH_FOUND: &str = "NO_AUTH_FOUND";
/// Generic server-side failure.
pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
/// Transport-level failure reported in-band by the server.
pub const CONNECTION_ERROR: &str = "CONNECTION_ERROR";

/// Returns the `error` field of a decoded response envelope, if present.
pub fn error_code(envelope: &serde_json::Value) -> Option<&str> {
	envelope.get("error").and_then(serde_json::Value::as_str)
}

/// Returns the `error_description` field of a decoded response envelope, if present.
pub fn error_description(envelope: &serde_json::Value) -> Option<&str> {
	envelope.get("error_description").and_then(serde_json::Value::as_str)
}

/// Returns `true` if `envelope` (or an accompanying HTTP status) indicates a server-enforced
/// rate-limit breach: domain error [`QUERY_LIMIT_EXCEEDED`], a description containing "limit
/// exceeded", or HTTP 503 (spec §4.3 `observe`).
pub fn indicates_rate_limit_breach(envelope: &serde_json::Value, http_status: Option<u16>) -> bool {
	if error_code(envelope) == Some(QUERY_LIMIT_EXCEEDED) {
		return true;
	}
	if error_description(envelope).is_some_and(|description| description.to_ascii_lowercase().contains("limit exceeded")) {
		return true;
	}

	http_status == Some(503)
}

/// Returns `true` if `envelope`'s `error` is exactly [`EXPIRED_TOKEN`] (spec §4.6 step 6).
pub fn is_expired_token(envelope: &serde_json::Value) -> bool {
	error_code(envelope) == Some(EXPIRED_TOKEN)
}
