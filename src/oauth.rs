//! OAuth endpoint derivation and refresh-request construction (spec §4.6 step 6, §9).
//!
//! Grounded on the teacher's provider-quirk layer (`src/provider/descriptor/quirks.rs`'s role
//! of adjusting a provider's advertised endpoints), collapsed here to the single literal
//! derivation rule spec §9 calls out as exact, with no broader provider-descriptor registry.

// self
use crate::{_prelude::*, auth::Secret, encode::Map};

/// Library-wide default OAuth endpoint, used whenever a tenant's `server_endpoint` doesn't
/// match the expected shape (spec §4.6 step 6a, §9).
pub const DEFAULT_OAUTH_ENDPOINT: &str = "https://oauth.bitrix.info/oauth/token/";

/// Derives the tenant-specific OAuth token endpoint from a credential record's
/// `server_endpoint`, falling back to [`DEFAULT_OAUTH_ENDPOINT`] if `server_endpoint` is
/// absent or doesn't match `^https://oauth\.bitrix\d*\.(tech|info)/rest$` exactly (spec §9:
/// "the conversion regex ... is exact; anything else falls back to the default endpoint").
pub fn derive_endpoint(server_endpoint: Option<&str>) -> String {
	server_endpoint
		.and_then(strip_oauth_rest_suffix)
		.map(|base| format!("{base}/oauth/token/"))
		.unwrap_or_else(|| DEFAULT_OAUTH_ENDPOINT.to_owned())
}

/// Matches `https://oauth.bitrix<digits?>.{tech,info}/rest` exactly and returns the URL with
/// the trailing `/rest` stripped, or `None` if `candidate` doesn't match the shape.
fn strip_oauth_rest_suffix(candidate: &str) -> Option<&str> {
	let rest = candidate.strip_prefix("https://oauth.bitrix")?;
	let rest = rest.strip_suffix("/rest")?;
	let tld_start = rest.find(".tech").or_else(|| rest.find(".info"))?;
	let (digits, tld) = rest.split_at(tld_start);

	if !digits.chars().all(|c| c.is_ascii_digit()) || (tld != ".tech" && tld != ".info") {
		return None;
	}

	Some(&candidate[..candidate.len() - "/rest".len()])
}

/// Builds the query parameters for a `grant_type=refresh_token` request (spec §4.6 step 6b):
/// `{client_id, client_secret, grant_type: "refresh_token", refresh_token}`.
pub fn refresh_request_params(client_id: &str, client_secret: &Secret, refresh_token: &Secret) -> Map {
	let mut params = Map::new();

	params
		.insert("client_id", client_id)
		.insert("client_secret", client_secret.expose())
		.insert("grant_type", "refresh_token")
		.insert("refresh_token", refresh_token.expose());

	params
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn derives_endpoint_from_matching_server_endpoint() {
		assert_eq!(derive_endpoint(Some("https://oauth.bitrix.info/rest")), "https://oauth.bitrix.info/oauth/token/");
		assert_eq!(derive_endpoint(Some("https://oauth.bitrix24.tech/rest")), "https://oauth.bitrix24.tech/oauth/token/");
	}

	#[test]
	fn falls_back_to_default_when_shape_does_not_match() {
		assert_eq!(derive_endpoint(None), DEFAULT_OAUTH_ENDPOINT);
		assert_eq!(derive_endpoint(Some("https://oauth.bitrix.com/rest")), DEFAULT_OAUTH_ENDPOINT);
		assert_eq!(derive_endpoint(Some("https://oauth.bitrix.info/rest/")), DEFAULT_OAUTH_ENDPOINT);
		assert_eq!(derive_endpoint(Some("not a url at all")), DEFAULT_OAUTH_ENDPOINT);
	}

	#[test]
	fn refresh_params_carry_all_four_fields() {
		let params = refresh_request_params("C", &Secret::new("S"), &Secret::new("R"));
		let pairs: Vec<_> = params.iter().map(|(k, v)| (k.to_owned(), v.clone())).collect();

		assert_eq!(pairs.len(), 4);
	}
}
