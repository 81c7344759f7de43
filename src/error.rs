//! Crate-wide error taxonomy shared across the transport, limiter, store, and
//! orchestrator.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Stable, `Copy` discriminant for [`Error`], useful for logging/metrics labels without
/// matching the full error payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// No valid credential record exists for the tenant.
	NoInstallApp,
	/// An internal invariant was violated or a host exception escaped into the orchestrator.
	ModuleError,
	/// The transport exhausted its attempts on retryable network failures.
	NetworkError,
	/// The server returned a 4xx response other than `expired_token`.
	ClientError,
	/// The server returned a 5xx response after retries were exhausted.
	ServerError,
	/// The redirect chain exceeded the attempt budget or a `Location` header was missing.
	RedirectError,
	/// The response body could not be decoded.
	ResponseParseError,
	/// The server returned a status code outside 2xx–5xx.
	UnexpectedStatus,
	/// The install handler failed or the payload shape was unrecognized.
	InstallError,
}
impl ErrorKind {
	/// Returns a stable label suitable for log lines and metric label values.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::NoInstallApp => "no_install_app",
			Self::ModuleError => "module_error",
			Self::NetworkError => "network_error",
			Self::ClientError => "client_error",
			Self::ServerError => "server_error",
			Self::RedirectError => "redirect_error",
			Self::ResponseParseError => "response_parse_error",
			Self::UnexpectedStatus => "unexpected_status",
			Self::InstallError => "install_error",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Canonical client error exposed by the public API.
///
/// Every variant maps onto one member of the taxonomy in spec §7; [`Error::kind`] returns
/// the stable tag without requiring callers to match the full payload.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The credential store returned no valid record for the tenant.
	#[error("No installed application found for domain {domain:?}.")]
	NoInstallApp {
		/// Domain the lookup was keyed by, when known.
		domain: Option<String>,
	},
	/// An internal invariant was violated, or a panic/host exception was caught at a boundary.
	#[error("Internal error: {description}.")]
	ModuleError {
		/// Human-readable description of the failure.
		description: String,
		/// Best-effort stack/backtrace representation, when available.
		stack: Option<String>,
	},
	/// Transport-layer failure (network, redirect, status, parsing).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Install-handler failure.
	#[error(transparent)]
	Install(#[from] InstallError),
	/// Storage-layer failure.
	#[error(transparent)]
	Storage(#[from] crate::store::StoreError),
}
impl Error {
	/// Returns the stable taxonomy tag for this error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::NoInstallApp { .. } => ErrorKind::NoInstallApp,
			Self::ModuleError { .. } => ErrorKind::ModuleError,
			Self::Transport(inner) => inner.kind(),
			Self::Install(_) => ErrorKind::InstallError,
			Self::Storage(_) => ErrorKind::ModuleError,
		}
	}

	/// Returns the HTTP status code carried by this error, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Transport(inner) => inner.status(),
			_ => None,
		}
	}

	/// Returns the raw response body captured alongside this error, if any.
	pub fn body(&self) -> Option<&serde_json::Value> {
		match self {
			Self::Transport(inner) => inner.body(),
			_ => None,
		}
	}

	/// Builds a [`Error::ModuleError`] from an arbitrary description, capturing no stack.
	pub fn module(description: impl Into<String>) -> Self {
		Self::ModuleError { description: description.into(), stack: None }
	}

	/// Builds a [`Error::ModuleError`] from a caught host error, capturing its `Display` as
	/// the stack representation (closest equivalent to a JS stack trace for a Rust panic
	/// payload or boxed error caught at a boundary).
	pub fn module_from(source: impl std::error::Error) -> Self {
		Self::ModuleError { description: source.to_string(), stack: Some(format!("{source:?}")) }
	}

	/// Builds a [`Error::NoInstallApp`] for the given domain hint.
	pub fn no_install_app(domain: impl Into<Option<String>>) -> Self {
		Self::NoInstallApp { domain: domain.into() }
	}
}

/// Transport-level failures returned by [`crate::transport::HttpTransport::fetch`].
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// The transport exhausted its attempt budget on retryable network failures.
	#[error("Network request failed after exhausting the attempt budget: {message}.")]
	Network {
		/// Human-readable description of the last failure observed.
		message: String,
		/// Underlying transport error, when the implementation can supply one.
		#[source]
		source: Option<BoxError>,
	},
	/// The server responded with a 4xx status other than `expired_token`.
	#[error("Server rejected the request with status {status}.")]
	Client {
		/// HTTP status code returned by the server.
		status: u16,
		/// Parsed response body, when decodable.
		body: Option<serde_json::Value>,
	},
	/// The server responded with a 5xx status after retries were exhausted.
	#[error("Server failed with status {status} after exhausting retries.")]
	Server {
		/// HTTP status code returned by the server.
		status: u16,
		/// Parsed response body, when decodable.
		body: Option<serde_json::Value>,
	},
	/// The redirect chain exceeded the attempt budget, or a response lacked `Location`.
	#[error("Redirect handling failed: {reason}.")]
	Redirect {
		/// Human-readable description of the failure.
		reason: String,
	},
	/// The response body could not be decoded given its `Content-Type`.
	#[error("Failed to parse response body (status {status:?}, content-type {content_type:?}).")]
	ResponseParse {
		/// HTTP status code returned by the server, when known.
		status: Option<u16>,
		/// `Content-Type` header value, when present.
		content_type: Option<String>,
		/// Underlying JSON decoding failure, when the body was expected to be JSON.
		#[source]
		source: Option<serde_path_to_error::Error<serde_json::Error>>,
	},
	/// The server returned a status code outside the 2xx–5xx range.
	#[error("Server returned unexpected status {status}.")]
	UnexpectedStatus {
		/// HTTP status code returned by the server.
		status: u16,
	},
}
impl TransportError {
	fn kind(&self) -> ErrorKind {
		match self {
			Self::Network { .. } => ErrorKind::NetworkError,
			Self::Client { .. } => ErrorKind::ClientError,
			Self::Server { .. } => ErrorKind::ServerError,
			Self::Redirect { .. } => ErrorKind::RedirectError,
			Self::ResponseParse { .. } => ErrorKind::ResponseParseError,
			Self::UnexpectedStatus { .. } => ErrorKind::UnexpectedStatus,
		}
	}

	fn status(&self) -> Option<u16> {
		match self {
			Self::Network { .. } | Self::Redirect { .. } => None,
			Self::Client { status, .. }
			| Self::Server { status, .. }
			| Self::UnexpectedStatus { status } => Some(*status),
			Self::ResponseParse { status, .. } => *status,
		}
	}

	fn body(&self) -> Option<&serde_json::Value> {
		match self {
			Self::Client { body, .. } | Self::Server { body, .. } => body.as_ref(),
			_ => None,
		}
	}

	/// Builds a [`TransportError::Network`] from a caught transport error.
	pub fn network(message: impl Into<String>, source: Option<BoxError>) -> Self {
		Self::Network { message: message.into(), source }
	}
}

/// Install-handler failures (spec §4.7).
#[derive(Debug, ThisError)]
#[error("Install handler failed: {description}.")]
pub struct InstallError {
	/// Human-readable description of the failure.
	pub description: String,
	/// Best-effort stack representation, only populated in debug profiles.
	pub stack: Option<String>,
}
impl InstallError {
	/// Builds an [`InstallError`] with no stack captured.
	pub fn new(description: impl Into<String>) -> Self {
		Self { description: description.into(), stack: None }
	}
}
