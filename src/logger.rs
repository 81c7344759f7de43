//! Logger (spec §4.5) — leveled logging with a mandatory redaction contract.
//!
//! Promoted from the teacher's optional `tracing`-gated [`obs::tracing::FlowSpan`] span
//! wrapper into a mandatory, always-present logger: every [`crate::client::Client`] carries
//! one, and it is the only place structured payloads are serialized for human eyes, so
//! redaction cannot be opted out of the way `tracing`/`metrics` can.

pub mod redact;

// self
use crate::_prelude::*;

/// Minimum depth at which the structured serializer gives up and emits a placeholder,
/// guarding against cyclic or pathologically deep payloads (spec §4.5).
const MAX_SERIALIZE_DEPTH: usize = 10;

/// Log levels, ordered `Debug < Info < Warn < Error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
	/// Verbose diagnostic detail.
	Debug,
	/// Routine operational detail.
	Info,
	/// Recoverable anomaly.
	Warn,
	/// Failure surfaced to the caller.
	Error,
}
impl Level {
	const fn as_str(self) -> &'static str {
		match self {
			Self::Debug => "debug",
			Self::Info => "info",
			Self::Warn => "warn",
			Self::Error => "error",
		}
	}
}
impl Display for Level {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Per-record context rendered into the fixed `[<library>][<domain>][<apiMethod>][<httpStatus?>]`
/// prefix (spec §4.5).
#[derive(Clone, Debug, Default)]
pub struct LogContext {
	/// Tenant domain this record concerns, if known.
	pub domain: Option<String>,
	/// API method name this record concerns, if known.
	pub api_method: Option<String>,
	/// HTTP status observed for this record, if any.
	pub http_status: Option<u16>,
	/// Short random token making one logical call's attempts traceable.
	pub request_id: Option<String>,
}
impl LogContext {
	/// An empty context; fields are filled in as a call progresses.
	pub fn new() -> Self {
		Self::default()
	}

	fn prefix(&self, library: &str) -> String {
		let domain = self.domain.as_deref().unwrap_or("-");
		let method = self.api_method.as_deref().unwrap_or("-");

		match self.http_status {
			Some(status) => format!("[{library}][{domain}][{method}][{status}]"),
			None => format!("[{library}][{domain}][{method}]"),
		}
	}
}

/// Leveled logger gated by a minimum level and an enable flag (spec §4.5).
///
/// Cloning is cheap; a [`Client`](crate::client::Client) holds one `Logger` for its
/// lifetime. The `tracing` feature routes records through the `tracing` facade in addition
/// to (never instead of) the redaction pass below — disabling the feature never disables
/// redaction, only the downstream emission backend.
#[derive(Clone, Debug)]
pub struct Logger {
	enabled: bool,
	level: Level,
	library: &'static str,
}
impl Logger {
	/// Builds a logger gated at `level`, identifying itself as `library` in every record's
	/// prefix.
	pub fn new(library: &'static str, level: Level) -> Self {
		Self { enabled: true, level, library }
	}

	/// Builds a logger that discards every record; handy for tests and silent deployments.
	pub fn silent() -> Self {
		Self { enabled: false, level: Level::Error, library: "bitrix24-client" }
	}

	/// Returns `true` if a record at `level` would be emitted.
	pub fn enabled_for(&self, level: Level) -> bool {
		self.enabled && level >= self.level
	}

	/// Emits a debug-level record.
	pub fn debug(&self, context: &LogContext, message: &str, payload: Option<&serde_json::Value>) {
		self.emit(Level::Debug, context, message, payload);
	}

	/// Emits an info-level record.
	pub fn info(&self, context: &LogContext, message: &str, payload: Option<&serde_json::Value>) {
		self.emit(Level::Info, context, message, payload);
	}

	/// Emits a warn-level record.
	pub fn warn(&self, context: &LogContext, message: &str, payload: Option<&serde_json::Value>) {
		self.emit(Level::Warn, context, message, payload);
	}

	/// Emits an error-level record, optionally expanding a causing error into its
	/// name/message/stack-as-lines plus a JSON rendering of its own fields.
	pub fn error(&self, context: &LogContext, message: &str, source: Option<&(dyn StdError + 'static)>) {
		if !self.enabled_for(Level::Error) {
			return;
		}

		let payload = source.map(expand_error);
		let rendered = payload.as_ref().map(|value| redact::redact_value(value, MAX_SERIALIZE_DEPTH));

		self.write(Level::Error, context, message, rendered.as_ref());
	}

	fn emit(&self, level: Level, context: &LogContext, message: &str, payload: Option<&serde_json::Value>) {
		if !self.enabled_for(level) {
			return;
		}

		let redacted = payload.map(|value| redact::redact_value(value, MAX_SERIALIZE_DEPTH));

		self.write(level, context, message, redacted.as_ref());
	}

	fn write(&self, level: Level, context: &LogContext, message: &str, payload: Option<&serde_json::Value>) {
		let prefix = context.prefix(self.library);
		let request_id = context.request_id.as_deref().unwrap_or("-");

		#[cfg(feature = "tracing")]
		{
			match level {
				Level::Debug => tracing::debug!(request_id, payload = ?payload, "{prefix} {message}"),
				Level::Info => tracing::info!(request_id, payload = ?payload, "{prefix} {message}"),
				Level::Warn => tracing::warn!(request_id, payload = ?payload, "{prefix} {message}"),
				Level::Error => tracing::error!(request_id, payload = ?payload, "{prefix} {message}"),
			}
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (level, prefix, request_id, payload, message);
		}
	}
}

/// Expands a caught error into `{name, message, stack}`, the closest equivalent to a
/// host-language exception's own properties (spec §4.5).
fn expand_error(source: &(dyn StdError + 'static)) -> serde_json::Value {
	let mut stack = Vec::new();
	let mut cursor: Option<&(dyn StdError + 'static)> = Some(source);

	while let Some(err) = cursor {
		stack.push(err.to_string());
		cursor = err.source();
	}

	serde_json::json!({
		"name": "Error",
		"message": source.to_string(),
		"stack": stack,
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn silent_logger_never_enabled() {
		let logger = Logger::silent();

		assert!(!logger.enabled_for(Level::Error));
	}

	#[test]
	fn level_gate_filters_below_minimum() {
		let logger = Logger::new("bitrix24-client", Level::Warn);

		assert!(!logger.enabled_for(Level::Debug));
		assert!(!logger.enabled_for(Level::Info));
		assert!(logger.enabled_for(Level::Warn));
		assert!(logger.enabled_for(Level::Error));
	}

	#[test]
	fn context_prefix_includes_status_only_when_known() {
		let mut context = LogContext::new();

		context.domain = Some("t.bx".to_owned());
		context.api_method = Some("user.current".to_owned());

		assert_eq!(context.prefix("bitrix24-client"), "[bitrix24-client][t.bx][user.current]");

		context.http_status = Some(200);

		assert_eq!(context.prefix("bitrix24-client"), "[bitrix24-client][t.bx][user.current][200]");
	}

	#[test]
	fn expand_error_walks_the_source_chain() {
		#[derive(Debug, ThisError)]
		#[error("outer")]
		struct Outer(#[source] Inner);
		#[derive(Debug, ThisError)]
		#[error("inner")]
		struct Inner;

		let expanded = expand_error(&Outer(Inner));
		let stack = expanded["stack"].as_array().expect("stack should be an array.");

		assert_eq!(stack.len(), 2);
		assert_eq!(stack[0], "outer");
		assert_eq!(stack[1], "inner");
	}
}
