#![cfg(feature = "reqwest")]

// std
use std::{
	sync::Mutex,
	time::{Duration, Instant},
};
// crates.io
use bitrix24_client::{
	_preludet::*,
	auth::{CredentialHint, CredentialRecord, Domain},
	client::ClientBuilder,
	encode::Map,
	error::{Error, ErrorKind},
	limiter::LimiterConfig,
	transport::{HttpTransport, Method, RawRequest, RawResponse},
};
use httpmock::prelude::*;

const CLIENT_ID: &str = "client-it";
const CLIENT_SECRET: &str = "secret-it";

fn domain_for(server: &MockServer) -> Domain {
	Domain::new(server.address().to_string()).expect("Mock server address should be a valid domain.")
}

async fn seed_record(store: &MemoryStore, domain: Domain, client_endpoint: String, access: &str, refresh: &str) {
	let record = CredentialRecord::builder(domain)
		.access_token(access)
		.refresh_token(refresh)
		.client_endpoint(client_endpoint)
		.build()
		.expect("Credential record fixture should build successfully.");

	store.write(record).await.expect("Failed to seed credential record into the store.");
}

#[tokio::test]
async fn happy_call_returns_result_verbatim() {
	let server = MockServer::start_async().await;
	let domain = domain_for(&server);
	let (client, store) = build_reqwest_test_client(CLIENT_ID, CLIENT_SECRET);

	seed_record(&store, domain.clone(), server.url("/rest/"), "T", "R").await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/rest/user.current.json").body("auth=T");
			then.status(200).header("content-type", "application/json").body(r#"{"result":{"ID":"1"}}"#);
		})
		.await;
	let result = client
		.call("user.current", Map::new(), bitrix24_client::auth::CredentialHint::new(domain))
		.await
		.expect("Happy-path call should succeed.");

	assert_eq!(result["result"]["ID"], "1");

	mock.assert_async().await;
}

/// Hand-scripted [`HttpTransport`] that replays canned responses in call order. The real
/// client always derives the OAuth refresh endpoint from a fixed, non-parameterizable host
/// (spec §4.6's literal `oauth.bitrix*.{tech,info}` contract), so a refresh round-trip can't be
/// exercised against a local mock server by URL matching — this stub ignores the request
/// entirely and answers strictly in sequence instead.
struct ScriptedTransport {
	responses: Mutex<Vec<RawResponse>>,
	sent_bodies: std::sync::Arc<Mutex<Vec<Option<String>>>>,
}
impl ScriptedTransport {
	fn new(responses: Vec<RawResponse>) -> Self {
		Self { responses: Mutex::new(responses), sent_bodies: std::sync::Arc::new(Mutex::new(Vec::new())) }
	}

	/// A shared handle onto the bodies sent so far (in call order), kept by the test after
	/// ownership of the transport itself moves into the [`Client`](bitrix24_client::client::Client).
	fn sent_bodies_handle(&self) -> std::sync::Arc<Mutex<Vec<Option<String>>>> {
		self.sent_bodies.clone()
	}
}
#[derive(Debug)]
struct ScriptedTransportExhausted;
impl std::fmt::Display for ScriptedTransportExhausted {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("ScriptedTransport ran out of canned responses")
	}
}
impl std::error::Error for ScriptedTransportExhausted {}
impl HttpTransport for ScriptedTransport {
	type Error = ScriptedTransportExhausted;

	fn send<'a>(
		&'a self,
		request: &'a RawRequest,
	) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<RawResponse, Self::Error>> + Send + 'a>> {
		self.sent_bodies.lock().unwrap().push(request.body.clone());

		let next = self.responses.lock().unwrap().pop();

		Box::pin(async move { next.ok_or(ScriptedTransportExhausted) })
	}
}

fn scripted_json_response(status: u16, body: &str) -> RawResponse {
	RawResponse { status, location: None, content_type: Some("application/json".to_owned()), body: body.as_bytes().to_vec() }
}

#[tokio::test]
async fn expired_token_triggers_single_refresh_and_retry() {
	let domain = Domain::new("t.bitrix24.com").expect("Domain fixture should be valid.");
	let store = std::sync::Arc::new(MemoryStore::default());

	seed_record(&store, domain.clone(), "https://t.bitrix24.com/rest/".to_owned(), "T-old", "R-old").await;

	// ScriptedTransport::send pops from the back, so responses are listed call-order-reversed:
	// retried call last, refresh second, initial expired-token call first.
	let transport = ScriptedTransport::new(vec![
		scripted_json_response(200, r#"{"result":{"ID":"1"}}"#),
		scripted_json_response(200, r#"{"access_token":"T-new","refresh_token":"R-new"}"#),
		scripted_json_response(401, r#"{"error":"expired_token"}"#),
	]);
	let sent_bodies = transport.sent_bodies_handle();
	let client = ClientBuilder::new(CLIENT_ID, CLIENT_SECRET, store.clone()).transport(transport).build();
	let mut params = Map::new();

	params.insert("ID", "42");

	let result = client
		.call("user.current", params, CredentialHint::new(domain.clone()))
		.await
		.expect("Call should succeed after a single transparent refresh.");

	assert_eq!(result["result"]["ID"], "1");

	let updated = store.peek(&domain).expect("Record should still be present after refresh.");

	assert_eq!(updated.access_token.expose(), "T-new");
	assert_eq!(updated.domain, domain);

	// The initial call, the OAuth refresh, and the retried call: exactly three sends, and the
	// retried call must carry the caller's original params alongside the refreshed auth token,
	// not just `auth=`.
	let sent_bodies = sent_bodies.lock().unwrap();

	assert_eq!(sent_bodies.len(), 3);
	assert_eq!(sent_bodies[0].as_deref(), Some("ID=42&auth=T-old"));

	let retried_body = sent_bodies[2].as_deref().expect("Retried call should have a body.");

	assert!(retried_body.contains("ID=42"), "Retried call must preserve the original params: {retried_body}");
	assert!(retried_body.contains("auth=T-new"), "Retried call must use the refreshed access token: {retried_body}");
}

#[tokio::test]
async fn redirect_is_followed_preserving_method_and_body() {
	let server = MockServer::start_async().await;
	let domain = domain_for(&server);
	let (client, store) = build_reqwest_test_client(CLIENT_ID, CLIENT_SECRET);

	seed_record(&store, domain.clone(), server.url("/rest/"), "T", "R").await;

	let redirect = server
		.mock_async(|when, then| {
			when.method(POST).path("/rest/user.current.json");
			then.status(302).header("location", &server.url("/rest2/user.current.json"));
		})
		.await;
	let target = server
		.mock_async(|when, then| {
			when.method(POST).path("/rest2/user.current.json").body("auth=T");
			then.status(200).header("content-type", "application/json").body(r#"{"result":true}"#);
		})
		.await;
	let result = client
		.call("user.current", Map::new(), bitrix24_client::auth::CredentialHint::new(domain))
		.await
		.expect("Call should follow the redirect and succeed.");

	assert_eq!(result["result"], true);

	redirect.assert_async().await;
	target.assert_async().await;
}

#[tokio::test]
async fn retries_on_500_until_success() {
	let server = MockServer::start_async().await;
	let domain = domain_for(&server);
	let (client, store) = build_reqwest_test_client(CLIENT_ID, CLIENT_SECRET);

	seed_record(&store, domain.clone(), server.url("/rest/"), "T", "R").await;

	let failing = server
		.mock_async(|when, then| {
			when.method(POST).path("/rest/user.current.json");
			then.status(500).header("content-type", "application/json").body(r#"{"error":"INTERNAL_SERVER_ERROR"}"#);
		})
		.await;

	let before = Instant::now();
	let error = client
		.call("user.current", Map::new(), bitrix24_client::auth::CredentialHint::new(domain))
		.await
		.expect_err("Exhausting retries against a persistently failing server should surface a server_error.");

	assert_eq!(error.kind(), ErrorKind::ServerError);
	assert!(before.elapsed() >= Duration::from_millis(20), "Retries should have backed off between attempts.");

	failing.assert_hits_async(3).await;
}

#[tokio::test]
async fn rate_limit_breach_blocks_subsequent_admission() {
	let server = MockServer::start_async().await;
	let domain = domain_for(&server);
	let store = std::sync::Arc::new(MemoryStore::default());
	let client = ClientBuilder::new(CLIENT_ID, CLIENT_SECRET, store.clone())
		.transport(test_reqwest_transport())
		.limiter_config(LimiterConfig {
			max_block_time: Duration::from_millis(150),
			min_request_interval: Duration::from_millis(1),
			..LimiterConfig::default()
		})
		.build();

	seed_record(&store, domain.clone(), server.url("/rest/"), "T", "R").await;

	let limited = server
		.mock_async(|when, then| {
			when.method(POST).path("/rest/user.current.json");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"error":"QUERY_LIMIT_EXCEEDED","error_description":"Method limit exceeded."}"#);
		})
		.await;

	client
		.call("user.current", Map::new(), bitrix24_client::auth::CredentialHint::new(domain.clone()))
		.await
		.expect("A QUERY_LIMIT_EXCEEDED envelope is returned as Ok, not an Error.");

	limited.delete();

	let recovered = server
		.mock_async(|when, then| {
			when.method(POST).path("/rest/user.current.json");
			then.status(200).header("content-type", "application/json").body(r#"{"result":true}"#);
		})
		.await;
	let before = Instant::now();

	client
		.call("user.current", Map::new(), bitrix24_client::auth::CredentialHint::new(domain))
		.await
		.expect("Second call should eventually be admitted once the hard block expires.");

	assert!(
		before.elapsed() >= Duration::from_millis(140),
		"Second admission must wait out the hard block imposed by the rate-limit breach."
	);

	recovered.assert_async().await;
}

#[tokio::test]
async fn no_install_app_for_unknown_domain() {
	let domain = Domain::new("unknown.bitrix24.com").expect("Domain fixture should be valid.");
	let (client, _store) = build_reqwest_test_client(CLIENT_ID, CLIENT_SECRET);
	let error = client
		.call("user.current", Map::new(), bitrix24_client::auth::CredentialHint::new(domain))
		.await
		.expect_err("A call for a domain with no stored credentials should fail.");

	assert!(matches!(error, Error::NoInstallApp { .. }));
}
