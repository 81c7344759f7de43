//! Call Orchestrator (spec §4.6) — the single public entry point tying credential load,
//! limiter admission, transport invocation, and OAuth refresh-on-expiry together.
//!
//! Grounded on the teacher's `Broker<C, M>` (`src/flows.rs`) generic-over-transport struct
//! with a dedicated `new`/`with_http_client` builder pair, and on `src/flows/refresh.rs`'s
//! orchestration shape (guard → fetch cached state → call → on failure rotate → persist →
//! retry once) — generalized here from token-rotation to spec §4.6's
//! method-call/refresh-once pipeline.

// std
use std::time::Duration;
// self
use crate::{
	_prelude::*,
	auth::{CredentialHint, CredentialRecord, Domain},
	encode::{Map, Value, to_query_string},
	error::{Error, TransportError},
	limiter::{Limiter, LimiterConfig},
	logger::{LogContext, Logger},
	oauth, response,
	store::CredentialStore,
	transport::{self, FetchOptions, HttpTransport, Method},
};

const LIBRARY_NAME: &str = env!("CARGO_PKG_NAME");
const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Process-wide, read-only configuration (spec §3 "Static Client Configuration").
///
/// Invariant: `client_id` and `client_secret` are required before any call — enforced by
/// [`ClientBuilder::build`], which is the only way to construct a [`Client`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// OAuth 2.0 client secret.
	pub client_secret: crate::auth::Secret,
	/// Upper bound on transport attempts per logical call (spec §6 `attempts`).
	pub attempts: u32,
	/// Backoff base (spec §6 `base pause`).
	pub base_pause: Duration,
	/// Per-attempt timeout (spec §6 `abort timeout`).
	pub request_timeout: Duration,
}

/// Builder for [`Client`]; the only way to construct one (spec §3 invariant: client id and
/// secret required before any call).
pub struct ClientBuilder<T> {
	client_id: String,
	client_secret: String,
	store: Arc<dyn CredentialStore>,
	transport: Option<T>,
	logger: Logger,
	limiter_config: LimiterConfig,
	attempts: u32,
	base_pause: Duration,
	request_timeout: Duration,
}
impl<T> ClientBuilder<T> {
	/// Starts building a client for `client_id`/`client_secret`, backed by `store`.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>, store: Arc<dyn CredentialStore>) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			store,
			transport: None,
			logger: Logger::new(LIBRARY_NAME, crate::logger::Level::Info),
			limiter_config: LimiterConfig::default(),
			attempts: 3,
			base_pause: Duration::from_millis(1000),
			request_timeout: Duration::from_millis(15_000),
		}
	}

	/// Supplies the transport this client sends requests through.
	pub fn transport(mut self, transport: T) -> Self {
		self.transport = Some(transport);

		self
	}

	/// Overrides the default logger (an enabled, info-level [`Logger`]).
	pub fn logger(mut self, logger: Logger) -> Self {
		self.logger = logger;

		self
	}

	/// Overrides the default [`LimiterConfig`].
	pub fn limiter_config(mut self, config: LimiterConfig) -> Self {
		self.limiter_config = config;

		self
	}

	/// Overrides the transport attempt budget (default 3).
	pub fn attempts(mut self, attempts: u32) -> Self {
		self.attempts = attempts;

		self
	}

	/// Overrides the backoff base pause (default 1000ms).
	pub fn base_pause(mut self, base_pause: Duration) -> Self {
		self.base_pause = base_pause;

		self
	}

	/// Overrides the per-attempt timeout (default 15000ms).
	pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
		self.request_timeout = request_timeout;

		self
	}
}
impl<T: HttpTransport> ClientBuilder<T> {
	/// Builds the [`Client`]. Panics if no transport was supplied via
	/// [`ClientBuilder::transport`] — omitted only as a caller bug, not a runtime condition.
	pub fn build(self) -> Client<T> {
		Client {
			config: ClientConfig {
				client_id: self.client_id,
				client_secret: crate::auth::Secret::new(self.client_secret),
				attempts: self.attempts,
				base_pause: self.base_pause,
				request_timeout: self.request_timeout,
			},
			store: self.store,
			transport: self.transport.expect("ClientBuilder::transport must be called before build()."),
			logger: self.logger,
			limiter: Limiter::new(self.limiter_config),
		}
	}
}

/// The orchestrator (spec §4.6). `T` is the HTTP transport this client sends requests
/// through; see [`crate::transport::ReqwestTransport`] for the default `reqwest`-backed one.
pub struct Client<T> {
	config: ClientConfig,
	store: Arc<dyn CredentialStore>,
	transport: T,
	logger: Logger,
	limiter: Limiter,
}
impl<T: HttpTransport> Client<T> {
	/// Invokes `method` with `params` on behalf of the tenant identified by `hint` (spec
	/// §4.6).
	///
	/// Contract: validates inputs, loads credentials, admits through the per-tenant limiter,
	/// invokes the transport, and on an `expired_token` response runs the refresh sub-call
	/// exactly once before re-issuing the original call.
	pub async fn call(&self, method: &str, params: Map, hint: CredentialHint) -> Result<serde_json::Value, Error> {
		if method.is_empty() {
			return Err(Error::module("Method name must not be empty."));
		}

		#[cfg(feature = "metrics")]
		metrics::counter!("bitrix24_client_calls_total", "method" => method.to_owned()).increment(1);

		let record = self.load_valid_record(&hint).await?;

		self.call_with_record(method, params, record, true).await
	}

	async fn load_valid_record(&self, hint: &CredentialHint) -> Result<CredentialRecord, Error> {
		let record = self.store.read(hint).await?;

		match record {
			Some(record) if record.is_valid() => Ok(record),
			_ => Err(Error::no_install_app(Some(hint.domain.to_string()))),
		}
	}

	fn fetch_options(&self, context: LogContext) -> FetchOptions {
		FetchOptions {
			attempts: self.config.attempts,
			base_pause: self.config.base_pause,
			request_timeout: self.config.request_timeout,
			request_id: random_request_id(),
			logger: self.logger.clone(),
			context,
		}
	}

	fn call_context(&self, domain: &Domain, method: &str) -> LogContext {
		let mut context = LogContext::new();

		context.domain = Some(domain.to_string());
		context.api_method = Some(method.to_owned());

		context
	}

	fn call_with_record(
		&self,
		method: &str,
		params: Map,
		record: CredentialRecord,
		allow_refresh: bool,
	) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, Error>> + Send + '_>> {
		let method = method.to_owned();

		Box::pin(async move {
			self.limiter.admit(&record.domain).await.map_err(|_| {
				Error::module(format!("Admission queue overflowed for tenant {}.", record.domain))
			})?;

			let url = Url::parse(&format!("{}{method}.json", record.client_endpoint))
				.map_err(|source| Error::module_from(source))?;
			let mut body_params = params.clone();

			body_params.insert("auth", record.access_token.expose());

			let body = to_query_string(&Value::Map(body_params));
			let context = self.call_context(&record.domain, &method);
			let options = self.fetch_options(context.clone());
			let outcome = transport::fetch(&self.transport, Method::Post, url, Some(body), &options).await;

			match outcome {
				Ok(envelope) => {
					if response::indicates_rate_limit_breach(&envelope, None) {
						self.limiter.observe(&record.domain);
					}

					if allow_refresh && response::is_expired_token(&envelope) {
						return self.refresh_and_retry(&method, params, record, context).await;
					}

					Ok(envelope)
				},
				Err(TransportError::Client { status, body }) => {
					if let Some(body) = &body {
						if response::indicates_rate_limit_breach(body, Some(status)) {
							self.limiter.observe(&record.domain);
						}
					}

					Err(Error::Transport(TransportError::Client { status, body }))
				},
				Err(TransportError::Server { status, body }) => {
					if status == 503 {
						self.limiter.observe(&record.domain);
					}

					Err(Error::Transport(TransportError::Server { status, body }))
				},
				Err(other) => Err(Error::Transport(other)),
			}
		})
	}

	async fn refresh_and_retry(
		&self,
		method: &str,
		params: Map,
		record: CredentialRecord,
		_context: LogContext,
	) -> Result<serde_json::Value, Error> {
		#[cfg(feature = "metrics")]
		metrics::counter!("bitrix24_client_refreshes_total").increment(1);

		self.limiter.admit(&record.domain).await.map_err(|_| {
			Error::module(format!("Admission queue overflowed for tenant {} during refresh.", record.domain))
		})?;

		let endpoint = oauth::derive_endpoint(record.server_endpoint.as_deref());
		let url = Url::parse(&endpoint).map_err(|source| Error::module_from(source))?;
		let refresh_params =
			oauth::refresh_request_params(&self.config.client_id, &self.config.client_secret, &record.refresh_token);
		let query = to_query_string(&Value::Map(refresh_params));
		let url = url
			.join(&format!("?{query}"))
			.map_err(|source| Error::module_from(source))?;
		let mut context = LogContext::new();

		context.domain = Some(record.domain.to_string());
		context.api_method = Some("oauth.refresh".to_owned());

		let options = self.fetch_options(context);
		let refreshed = transport::fetch(&self.transport, Method::Get, url, None, &options).await?;

		if response::error_code(&refreshed).is_some() {
			return Err(Error::module(format!(
				"OAuth refresh failed: {}",
				response::error_description(&refreshed).unwrap_or("no description provided")
			)));
		}

		let merged = merge_refresh_response(&record, &refreshed)?;

		self.store.write(merged.clone()).await?;

		self.call_with_record(method, params, merged, false).await
	}
}

fn merge_refresh_response(existing: &CredentialRecord, refreshed: &serde_json::Value) -> Result<CredentialRecord, Error> {
	let access_token = refreshed
		.get("access_token")
		.and_then(serde_json::Value::as_str)
		.ok_or_else(|| Error::module("Refresh response did not include access_token."))?;
	let refresh_token = refreshed
		.get("refresh_token")
		.and_then(serde_json::Value::as_str)
		.unwrap_or(existing.refresh_token.expose());
	let expires_in =
		refreshed.get("expires_in").and_then(serde_json::Value::as_i64).unwrap_or(existing.expires_in);

	let mut builder = CredentialRecord::builder(existing.domain.clone())
		.access_token(access_token)
		.refresh_token(refresh_token)
		.client_endpoint(existing.client_endpoint.clone())
		.expires_in(expires_in);

	if let Some(application_token) = &existing.application_token {
		builder = builder.application_token(application_token.expose());
	}
	if let Some(member_id) = &existing.member_id {
		builder = builder.member_id(member_id.clone());
	}
	if let Some(status) = &existing.status {
		builder = builder.status(status.clone());
	}
	if let Some(server_endpoint) = &existing.server_endpoint {
		builder = builder.server_endpoint(server_endpoint.clone());
	}

	builder.build().map_err(|source| Error::module_from(source))
}

fn random_request_id() -> String {
	use rand::Rng;

	let mut rng = rand::rng();

	(0..8).map(|_| rng.sample(rand::distr::Alphanumeric) as char).collect()
}
