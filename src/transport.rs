//! HTTP Transport (spec §4.4) — one logical request: manual redirects, retries with
//! exponential backoff + jitter, per-attempt timeout, and content-type-driven body parsing.
//!
//! Grounded on the teacher's [`TokenHttpClient`] trait + `ReqwestHttpClient`/
//! `InstrumentedHandle` adapter in `src/http.rs`: a small trait abstracts the transport so
//! callers can swap in a mock or another HTTP stack, with a `reqwest`-backed implementation
//! behind the `reqwest` feature. Unlike the teacher, which hands a typed `oauth2::HttpRequest`
//! to an `AsyncHttpClient`, [`fetch`] owns the retry/redirect loop itself, since this wire
//! contract (manual redirects, bracket-notation bodies) has no standards-track equivalent.

pub mod body;

// std
use std::time::Duration;
// self
use crate::{
	_prelude::*,
	error::TransportError,
	logger::{LogContext, Logger},
};

/// HTTP verb used by a single transport attempt. This crate only ever issues `POST` (method
/// calls) and `GET` (OAuth refresh), so the set is closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
	/// `GET`.
	Get,
	/// `POST`.
	Post,
}
impl Method {
	const fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// One HTTP attempt's inputs, owned by [`fetch`] across redirects.
#[derive(Clone, Debug)]
pub struct RawRequest {
	/// HTTP verb.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Form-encoded body, present for `POST` requests.
	pub body: Option<String>,
}

/// One HTTP attempt's outputs, before status-class branching.
#[derive(Clone, Debug)]
pub struct RawResponse {
	/// HTTP status code.
	pub status: u16,
	/// `Location` header value, present on redirects.
	pub location: Option<String>,
	/// `Content-Type` header value.
	pub content_type: Option<String>,
	/// Raw response bytes.
	pub body: Vec<u8>,
}

/// Abstraction over the HTTP stack that sends one attempt and reports back its raw status,
/// headers of interest, and body, without following redirects itself — [`fetch`] owns that
/// decision so it can enforce the shared attempt budget.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Error raised by the underlying client (e.g. `reqwest::Error`).
	type Error: 'static + Send + Sync + StdError;

	/// Sends one attempt and returns its raw response, or a transport-native error.
	fn send<'a>(
		&'a self,
		request: &'a RawRequest,
	) -> Pin<Box<dyn Future<Output = std::result::Result<RawResponse, Self::Error>> + Send + 'a>>;
}

/// Tuning knobs for one [`fetch`] call (spec §4.4, §6 configuration surface).
#[derive(Clone, Debug)]
pub struct FetchOptions {
	/// Upper bound on transport attempts (total sends, including the first) per logical
	/// call; default 3.
	pub attempts: u32,
	/// Backoff base in milliseconds; default 1000.
	pub base_pause: Duration,
	/// Per-attempt timeout; default 15000ms.
	pub request_timeout: Duration,
	/// Short random token surfaced in every log line for this logical call.
	pub request_id: String,
	/// Logger this call's attempts are traced through.
	pub logger: Logger,
	/// Log context (domain, API method) merged into every record.
	pub context: LogContext,
}
impl Default for FetchOptions {
	fn default() -> Self {
		Self {
			attempts: 3,
			base_pause: Duration::from_millis(1000),
			request_timeout: Duration::from_millis(15_000),
			request_id: String::new(),
			logger: Logger::silent(),
			context: LogContext::new(),
		}
	}
}

/// Sends one logical request to completion: follows redirects, retries on 5xx and retryable
/// network failures with exponential backoff + jitter, and parses the final body.
///
/// A 4xx whose decoded `error` is exactly `expired_token` is returned as `Ok` unchanged — the
/// orchestrator, not the transport, is responsible for the refresh dance (spec §4.6).
pub async fn fetch<T: HttpTransport>(
	transport: &T,
	method: Method,
	url: Url,
	body: Option<String>,
	options: &FetchOptions,
) -> Result<serde_json::Value, TransportError> {
	let mut current_url = url;
	// One send is issued unconditionally below before this budget is ever checked, so it is
	// initialized to `attempts - 1` remaining retries — otherwise a logical call would issue
	// `attempts + 1` total sends (spec §6: `attempts` bounds total sends per logical call).
	let mut retries_left = options.attempts.saturating_sub(1);
	let mut attempt_index: u32 = 0;

	loop {
		options.logger.debug(
			&with_request_id(&options.context, &options.request_id),
			&format!("sending {method} {current_url} (attempt {attempt_index})"),
			None,
		);

		let request = RawRequest { method, url: current_url.clone(), body: body.clone() };
		let attempt = tokio::time::timeout(options.request_timeout, transport.send(&request)).await;

		let raw = match attempt {
			Ok(Ok(raw)) => raw,
			Ok(Err(source)) => {
				let message = source.to_string();

				if is_retryable_network_error(&message) && retries_left > 0 {
					retries_left -= 1;
					record_retry("network_error");
					backoff_sleep(options.base_pause, attempt_index).await;
					attempt_index += 1;
					continue;
				}

				return Err(TransportError::network(message, Some(Box::new(source))));
			},
			Err(_elapsed) =>
				if retries_left > 0 {
					retries_left -= 1;
					record_retry("timeout");
					backoff_sleep(options.base_pause, attempt_index).await;
					attempt_index += 1;
					continue;
				} else {
					return Err(TransportError::network(
						format!("request timed out after {:?}", options.request_timeout),
						None,
					));
				},
		};

		match raw.status / 100 {
			2 => return body::parse(raw.status, raw.content_type.as_deref(), &raw.body),
			3 => {
				let Some(location) = raw.location else {
					return Err(TransportError::Redirect { reason: "redirect missing Location header".into() });
				};

				if retries_left == 0 {
					return Err(TransportError::Redirect { reason: "redirect chain exceeded attempt budget".into() });
				}

				retries_left -= 1;
				record_retry("redirect");
				attempt_index += 1;
				current_url = current_url.join(&location).map_err(|source| TransportError::Redirect {
					reason: format!("invalid Location header {location:?}: {source}"),
				})?;

				continue;
			},
			4 => {
				let parsed = body::parse(raw.status, raw.content_type.as_deref(), &raw.body)?;

				if parsed.get("error").and_then(serde_json::Value::as_str) == Some("expired_token") {
					return Ok(parsed);
				}

				return Err(TransportError::Client { status: raw.status, body: Some(parsed) });
			},
			5 => {
				let parsed = body::parse(raw.status, raw.content_type.as_deref(), &raw.body).ok();

				if retries_left > 0 {
					retries_left -= 1;
					record_retry("server_error");
					backoff_sleep(options.base_pause, attempt_index).await;
					attempt_index += 1;
					continue;
				}

				return Err(TransportError::Server { status: raw.status, body: parsed });
			},
			_ => return Err(TransportError::UnexpectedStatus { status: raw.status }),
		}
	}
}

fn with_request_id(context: &LogContext, request_id: &str) -> LogContext {
	let mut context = context.clone();

	context.request_id = Some(request_id.to_owned());

	context
}

/// Delay before the `attempt_index`'th (0-based) retry: `base_pause * 2^n` plus uniform
/// jitter in `[0, 0.3 * base_pause * 2^n)` (spec §4.4 "Backoff").
fn backoff_delay(base_pause: Duration, attempt_index: u32) -> Duration {
	let factor = 2_f64.powi(attempt_index as i32);
	let base_ms = base_pause.as_secs_f64() * 1000.0 * factor;
	let jitter_ms = rand::random::<f64>() * 0.3 * base_ms;

	Duration::from_millis((base_ms + jitter_ms).round() as u64)
}

async fn backoff_sleep(base_pause: Duration, attempt_index: u32) {
	tokio::time::sleep(backoff_delay(base_pause, attempt_index)).await;
}

/// Counts one retried attempt, labeled by `reason` (spec.md §4.4's retry triggers).
#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
fn record_retry(reason: &'static str) {
	#[cfg(feature = "metrics")]
	metrics::counter!("bitrix24_client_transport_retries_total", "reason" => reason).increment(1);
}

/// Categorizes a transport error message by the system codes / substrings spec §4.4 lists as
/// retryable: connection reset, timed out, unreachable, broken pipe, aborted, not found,
/// refused, or the literal substrings "timeout" / "connection reset".
fn is_retryable_network_error(message: &str) -> bool {
	const RETRYABLE_SUBSTRINGS: &[&str] = &[
		"connection reset",
		"timed out",
		"timeout",
		"unreachable",
		"broken pipe",
		"aborted",
		"not found",
		"refused",
	];
	let lower = message.to_ascii_lowercase();

	RETRYABLE_SUBSTRINGS.iter().any(|needle| lower.contains(needle))
}

/// `reqwest`-backed [`HttpTransport`]. Redirects are disabled on the underlying client so
/// [`fetch`] can enforce its own manual redirect budget (spec §4.4, §6 `redirect: manual`).
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestTransport(ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps a caller-supplied [`ReqwestClient`]. The caller is responsible for disabling
	/// redirect following (`reqwest::redirect::Policy::none()`); [`fetch`] assumes it is.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl Default for ReqwestTransport {
	fn default() -> Self {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build default Reqwest client.");

		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	type Error = ReqwestError;

	fn send<'a>(
		&'a self,
		request: &'a RawRequest,
	) -> Pin<Box<dyn Future<Output = std::result::Result<RawResponse, Self::Error>> + Send + 'a>> {
		Box::pin(async move {
			let mut builder = match request.method {
				Method::Get => self.0.get(request.url.clone()),
				Method::Post => self.0.post(request.url.clone()),
			};

			if let Some(body) = &request.body {
				builder = builder
					.header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
					.body(body.clone());
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let location = response
				.headers()
				.get(reqwest::header::LOCATION)
				.and_then(|value| value.to_str().ok())
				.map(str::to_owned);
			let content_type = response
				.headers()
				.get(reqwest::header::CONTENT_TYPE)
				.and_then(|value| value.to_str().ok())
				.map(str::to_owned);
			let body = response.bytes().await?.to_vec();

			Ok(RawResponse { status, location, content_type, body })
		})
	}
}
