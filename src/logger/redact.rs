//! Mandatory redaction pass (spec §4.5).
//!
//! Every payload the [`super::Logger`] emits is routed through [`redact_value`] first;
//! there is no configuration flag to disable it; the scrub list is fixed, not tunable, because
//! the contract is "never leak a secret", not "leak less by default".

// self
use crate::_prelude::*;

const PLACEHOLDER: &str = "[REDACTED]";

/// Field names scrubbed to [`PLACEHOLDER`] wherever they occur, at any nesting depth,
/// compared case-insensitively.
const SCRUBBED_FIELDS: &[&str] = &[
	"auth",
	"access_token",
	"refresh_token",
	"client_secret",
	"token",
	"password",
	"key",
	"secret",
	"code",
	"authorization",
];

/// Redacts `value`, replacing scrubbed fields and collapsing oversized byte streams, giving
/// up at `max_depth` to stay cycle-safe on pathological input.
pub fn redact_value(value: &serde_json::Value, max_depth: usize) -> serde_json::Value {
	redact_at(value, max_depth, 0)
}

fn redact_at(value: &serde_json::Value, max_depth: usize, depth: usize) -> serde_json::Value {
	if depth >= max_depth {
		return serde_json::Value::String("[MAX DEPTH EXCEEDED]".to_owned());
	}

	match value {
		serde_json::Value::Object(fields) => {
			let mut out = serde_json::Map::with_capacity(fields.len());

			for (key, field_value) in fields {
				if is_cancellation_field(key) {
					continue;
				}

				if is_scrubbed_field(key) {
					out.insert(key.clone(), serde_json::Value::String(PLACEHOLDER.to_owned()));
				} else {
					out.insert(key.clone(), redact_at(field_value, max_depth, depth + 1));
				}
			}

			serde_json::Value::Object(out)
		},
		serde_json::Value::Array(items) =>
			serde_json::Value::Array(items.iter().map(|item| redact_at(item, max_depth, depth + 1)).collect()),
		serde_json::Value::String(text) =>
			serde_json::Value::String(collapse_byte_stream(text).unwrap_or_else(|| text.clone())),
		other => other.clone(),
	}
}

fn is_scrubbed_field(key: &str) -> bool {
	let lower = key.to_ascii_lowercase();

	SCRUBBED_FIELDS.contains(&lower.as_str())
}

fn is_cancellation_field(key: &str) -> bool {
	let lower = key.to_ascii_lowercase();

	lower.contains("cancellationtoken") || lower.contains("cancel_token") || lower.contains("abortsignal")
}

/// Collapses a base64-looking or `data:image/*;base64,...` string longer than 500 characters
/// into a length-only summary; returns `None` if `text` doesn't match either shape.
fn collapse_byte_stream(text: &str) -> Option<String> {
	if let Some(rest) = text.strip_prefix("data:image/") {
		let (media_type, data) = rest.split_once(";base64,")?;

		return (data.len() > 500)
			.then(|| format!("[IMAGE BASE64 DATA type={media_type}, length={}]", data.len()));
	}

	looks_like_base64(text).then(|| format!("[BASE64 DATA length={}]", text.len()))
}

/// `true` if `text` is longer than 500 characters and decodes cleanly as standard base64 —
/// the cheap charset pre-check alone would also match long hex strings and hashes, so a real
/// decode attempt confirms it before the log line collapses it.
fn looks_like_base64(text: &str) -> bool {
	use base64::Engine;

	text.len() > 500
		&& text.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '-' | '_'))
		&& base64::engine::general_purpose::STANDARD.decode(text).is_ok()
}

/// Rewrites `raw_url`'s scrubbed query parameter values to [`PLACEHOLDER`], preserving every
/// other part of the URL unchanged. Returns `raw_url` verbatim if it fails to parse.
pub fn redact_url(raw_url: &str) -> String {
	let Ok(mut parsed) = Url::parse(raw_url) else { return raw_url.to_owned() };
	let scrubbed: Vec<(String, String)> = parsed
		.query_pairs()
		.map(|(key, value)| {
			if is_scrubbed_field(&key) {
				(key.into_owned(), PLACEHOLDER.to_owned())
			} else {
				(key.into_owned(), value.into_owned())
			}
		})
		.collect();

	if scrubbed.is_empty() {
		return parsed.to_string();
	}

	{
		let mut serializer = parsed.query_pairs_mut();

		serializer.clear();

		for (key, value) in &scrubbed {
			serializer.append_pair(key, value);
		}
	}

	parsed.to_string()
}
