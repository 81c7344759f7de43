//! Content-type-driven response body parsing (spec §4.4 "Body parsing").

// self
use crate::{_prelude::*, error::TransportError};

/// Parses a response body into a JSON value according to its `Content-Type`.
///
/// - A JSON media type decodes strictly; failure is a [`TransportError::ResponseParse`].
/// - `text/html` and `text/plain` try JSON first (servers sometimes mislabel), falling back
///   to `{content, format}`.
/// - An absent/empty content type, or HTTP 204, yields `{ok: <status in 2xx>}`.
/// - Any other media type tries JSON, falling back to `{content, format}`.
pub fn parse(status: u16, content_type: Option<&str>, bytes: &[u8]) -> Result<serde_json::Value, TransportError> {
	let content_type = content_type.map(str::trim).filter(|value| !value.is_empty());

	if content_type.is_none() || status == 204 {
		return Ok(serde_json::json!({ "ok": (200..300).contains(&status) }));
	}

	let content_type = content_type.expect("checked above");
	let media = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();

	if media.contains("json") {
		return parse_json(bytes, status, Some(content_type));
	}

	let text = String::from_utf8_lossy(bytes).into_owned();

	if media == "text/html" || media == "text/plain" {
		if let Ok(value) = parse_json(bytes, status, Some(content_type)) {
			return Ok(value);
		}

		let format = if media == "text/html" { "html" } else { "text" };

		return Ok(serde_json::json!({ "content": text, "format": format }));
	}

	if let Ok(value) = parse_json(bytes, status, Some(content_type)) {
		return Ok(value);
	}

	Ok(serde_json::json!({ "content": text, "format": media }))
}

fn parse_json(
	bytes: &[u8],
	status: u16,
	content_type: Option<&str>,
) -> Result<serde_json::Value, TransportError> {
	let mut deserializer = serde_json::Deserializer::from_slice(bytes);

	serde_path_to_error::deserialize(&mut deserializer).map_err(|source| TransportError::ResponseParse {
		status: Some(status),
		content_type: content_type.map(str::to_owned),
		source: Some(source),
	})
}
