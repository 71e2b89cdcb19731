//! Typed HTTP client for the remote game-server panel.
//!
//! Handles authentication headers, optional access-gateway headers, and
//! pagination traversal over the panel's paginated REST resources.

mod client;
mod error;
pub mod model;
mod pagination;

pub use client::{AccessGatewayHeaders, PanelClient, PanelClientConfig};
pub use error::PanelClientError;
pub use pagination::with_page_param;

#[cfg(test)]
mod test {
	use super::*;
	use serde_json::json;
	use wiremock::matchers::{method, path, query_param};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn client(base_url: String) -> PanelClient {
		PanelClient::new(PanelClientConfig {
			base_url,
			application_key: "app-key".into(),
			client_key: Some("client-key".into()),
			access_gateway: None,
		})
		.unwrap()
	}

	fn page(data: Vec<serde_json::Value>, current_page: u64, total_pages: u64) -> serde_json::Value {
		json!({
			"object": "list",
			"data": data.into_iter().map(|attrs| json!({"object": "location", "attributes": attrs})).collect::<Vec<_>>(),
			"meta": {
				"pagination": {
					"total": total_pages * 1,
					"count": 1,
					"per_page": 1,
					"current_page": current_page,
					"total_pages": total_pages,
				}
			}
		})
	}

	#[tokio::test]
	async fn paginates_until_current_page_reaches_total() {
		let server = MockServer::start().await;
		for p in 1..=3u64 {
			Mock::given(method("GET"))
				.and(path("/api/application/locations"))
				.and(query_param("page", p.to_string()))
				.respond_with(ResponseTemplate::new(200).set_body_json(page(
					vec![json!({"id": p, "short": format!("loc{p}"), "long": "Location"})],
					p,
					3,
				)))
				.expect(1)
				.mount(&server)
				.await;
		}

		let c = client(server.uri());
		let locations = c.list_locations().await.unwrap();
		assert_eq!(locations.len(), 3);
		assert_eq!(locations.iter().map(|l| l.id).collect::<Vec<_>>(), vec![1, 2, 3]);
	}

	#[tokio::test]
	async fn skips_undecodable_items_without_failing_the_page() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/application/locations"))
			.respond_with(ResponseTemplate::new(200).set_body_json(page(
				vec![
					json!({"id": 1, "short": "eu", "long": "Europe"}),
					json!({"id": "not-a-number", "short": "bad"}),
				],
				1,
				1,
			)))
			.mount(&server)
			.await;

		let c = client(server.uri());
		let locations = c.list_locations().await.unwrap();
		assert_eq!(locations.len(), 1);
		assert_eq!(locations[0].id, 1);
	}

	#[tokio::test]
	async fn non_2xx_is_a_protocol_error() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/application/locations"))
			.respond_with(ResponseTemplate::new(500).set_body_string("boom"))
			.mount(&server)
			.await;

		let c = client(server.uri());
		let err = c.list_locations().await.unwrap_err();
		assert!(matches!(err, PanelClientError::Protocol { .. }));
	}
}
