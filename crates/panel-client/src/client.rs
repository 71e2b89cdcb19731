use std::collections::HashMap;
use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::PanelClientError;
use crate::model::{
	Allocation, Egg, ListResponse, Location, Nest, Node, Server, ServerDatabase, Subuser, User,
	Wrapped,
};
use crate::pagination::with_page_param;

type Result<T> = std::result::Result<T, PanelClientError>;

/// Client id/secret sent as extra headers to an access gateway sitting in
/// front of the panel, when one is configured.
#[derive(Debug, Clone)]
pub struct AccessGatewayHeaders {
	pub client_id: String,
	pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct PanelClientConfig {
	pub base_url: String,
	pub application_key: String,
	/// Client API key, used for endpoints scoped to a single server (subuser
	/// listing, environment updates). Absent when the subuser step is
	/// disabled.
	pub client_key: Option<String>,
	pub access_gateway: Option<AccessGatewayHeaders>,
}

/// Typed HTTP client for the remote panel.
///
/// Handles authentication headers, optional access-gateway headers, and
/// pagination traversal. Does not retry; retries are owned by the queue
/// layer (see `spec.md` §4.1).
#[derive(Debug, Clone)]
pub struct PanelClient {
	http: reqwest::Client,
	base_url: Url,
	application_key: String,
	client_key: Option<String>,
	access_gateway: Option<AccessGatewayHeaders>,
}

impl PanelClient {
	pub fn new(cfg: PanelClientConfig) -> Result<Self> {
		let base_url = Url::parse(&cfg.base_url)
			.map_err(|_| PanelClientError::InvalidBaseUrl(cfg.base_url.clone()))?;
		let http = reqwest::Client::builder()
			.timeout(Duration::from_secs(30))
			.build()
			.expect("building the panel reqwest client should never fail");
		Ok(Self {
			http,
			base_url,
			application_key: cfg.application_key,
			client_key: cfg.client_key,
			access_gateway: cfg.access_gateway,
		})
	}

	fn request(&self, method: reqwest::Method, path: &str, client_scoped: bool) -> Result<reqwest::RequestBuilder> {
		let url = self
			.base_url
			.join(path.trim_start_matches('/'))
			.map_err(|_| PanelClientError::InvalidBaseUrl(path.to_string()))?;
		let key = if client_scoped {
			self.client_key.as_deref().unwrap_or(&self.application_key)
		} else {
			self.application_key.as_str()
		};
		let mut builder = self
			.http
			.request(method, url)
			.bearer_auth(key)
			.header("Accept", "application/json")
			.header("Content-Type", "application/json");
		if let Some(gateway) = &self.access_gateway {
			builder = builder
				.header("X-Access-Client-Id", &gateway.client_id)
				.header("X-Access-Client-Secret", &gateway.client_secret);
		}
		Ok(builder)
	}

	async fn send(&self, builder: reqwest::RequestBuilder, url: String) -> Result<bytes::Bytes> {
		let response = builder
			.send()
			.await
			.map_err(|source| PanelClientError::Transport { url: url.clone(), source })?;
		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(PanelClientError::Protocol { url, status, body });
		}
		response
			.bytes()
			.await
			.map_err(|source| PanelClientError::Transport { url, source })
	}

	/// Fetches every page of a list endpoint and merges all items, skipping
	/// (with a diagnostic) any single item that fails to decode.
	async fn paginate<T: DeserializeOwned>(&self, path: &str, client_scoped: bool) -> Result<Vec<T>> {
		let mut items = Vec::new();
		let mut page = 1;
		loop {
			let paged_path = with_page_param(path, page);
			let builder = self.request(reqwest::Method::GET, &paged_path, client_scoped)?;
			let url = builder
				.try_clone()
				.and_then(|b| b.build().ok())
				.map(|r| r.url().to_string())
				.unwrap_or_else(|| paged_path.clone());
			let bytes = self.send(builder, url.clone()).await?;
			let envelope: ListResponse<serde_json::Value> = serde_json::from_slice(&bytes)
				.map_err(|source| PanelClientError::Decode { url: url.clone(), source })?;
			for Wrapped { attributes } in envelope.data {
				match serde_json::from_value::<T>(attributes.clone()) {
					Ok(item) => items.push(item),
					Err(err) => warn!(%err, item = %attributes, "skipping undecodable panel item"),
				}
			}
			if envelope.meta.pagination.current_page >= envelope.meta.pagination.total_pages {
				break;
			}
			page += 1;
		}
		Ok(items)
	}

	pub async fn list_locations(&self) -> Result<Vec<Location>> {
		self.paginate("/api/application/locations", false).await
	}

	pub async fn list_nodes(&self) -> Result<Vec<Node>> {
		self.paginate("/api/application/nodes", false).await
	}

	pub async fn list_allocations_for_node(&self, node_id: i64) -> Result<Vec<Allocation>> {
		self.paginate(&format!("/api/application/nodes/{node_id}/allocations"), false)
			.await
	}

	pub async fn list_nests(&self) -> Result<Vec<Nest>> {
		self.paginate("/api/application/nests", false).await
	}

	pub async fn list_eggs_for_nest(&self, nest_id: i64, expand_variables: bool) -> Result<Vec<Egg>> {
		let path = if expand_variables {
			format!("/api/application/nests/{nest_id}/eggs?include=variables")
		} else {
			format!("/api/application/nests/{nest_id}/eggs")
		};
		self.paginate(&path, false).await
	}

	pub async fn list_users(&self) -> Result<Vec<User>> {
		self.paginate("/api/application/users", false).await
	}

	pub async fn list_servers(&self, expand_allocations: bool) -> Result<Vec<Server>> {
		let path = if expand_allocations {
			"/api/application/servers?include=allocations"
		} else {
			"/api/application/servers"
		};
		self.paginate(path, false).await
	}

	pub async fn get_server(&self, server_id: i64) -> Result<Server> {
		let builder = self.request(
			reqwest::Method::GET,
			&format!("/api/application/servers/{server_id}"),
			false,
		)?;
		let url = format!("{}/api/application/servers/{server_id}", self.base_url);
		let bytes = self.send(builder, url.clone()).await?;
		let envelope: crate::model::SingleResponse<Server> = serde_json::from_slice(&bytes)
			.map_err(|source| PanelClientError::Decode { url, source })?;
		Ok(envelope.attributes)
	}

	pub async fn list_server_databases(&self, expand_host: bool) -> Result<Vec<ServerDatabase>> {
		let path = if expand_host {
			"/api/application/databases?include=host"
		} else {
			"/api/application/databases"
		};
		self.paginate(path, false).await
	}

	/// Best-effort per-server subuser listing; requires a client API key.
	pub async fn list_subusers(&self, server_identifier: &str) -> Result<Vec<Subuser>> {
		self.paginate(
			&format!("/api/client/servers/{server_identifier}/users"),
			true,
		)
		.await
	}

	/// Idempotently sets named environment variables on a downstream server.
	#[tracing::instrument(skip(self, vars))]
	pub async fn update_environment(
		&self,
		server_identifier: &str,
		vars: HashMap<String, String>,
	) -> Result<()> {
		let body = serde_json::json!({ "environment": vars });
		let builder = self
			.request(
				reqwest::Method::PUT,
				&format!("/api/client/servers/{server_identifier}/startup/variable"),
				true,
			)?
			.json(&body);
		let url = format!(
			"{}/api/client/servers/{server_identifier}/startup/variable",
			self.base_url
		);
		self.send(builder, url).await?;
		Ok(())
	}
}
