//! Demonstrates a single `user.current` call against a mocked portal: install a credential
//! record into an in-memory store, then invoke the orchestrator.

// std
use std::sync::Arc;
// crates.io
use bitrix24_client::{
	auth::{CredentialRecord, Domain},
	client::ClientBuilder,
	encode::Map,
	store::{CredentialStore, MemoryStore},
	transport::ReqwestTransport,
};
use color_eyre::Result;
use httpmock::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let domain = Domain::new(server.address().to_string())?;
	let client_endpoint = server.url("/rest/");

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/rest/user.current.json");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"result":{"ID":"1","NAME":"Demo User"}}"#);
		})
		.await;

	let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::default());
	let record = CredentialRecord::builder(domain.clone())
		.access_token("demo-access-token")
		.refresh_token("demo-refresh-token")
		.client_endpoint(client_endpoint)
		.build()?;

	store.write(record.clone()).await?;

	let client = ClientBuilder::new("demo-client-id", "demo-client-secret", store)
		.transport(ReqwestTransport::default())
		.build();
	let result = client.call("user.current", Map::new(), record.hint()).await?;

	println!("user.current -> {result}");

	mock.assert_async().await;

	Ok(())
}
