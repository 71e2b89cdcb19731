//! Scenarios E5 and E6 from `spec.md` §8, run against a real Postgres
//! instance. Skipped (not failed) when `DATABASE_URL` isn't set.

use identity_client::IdentityClient;
use panel_client::{PanelClient, PanelClientConfig};
use refresher::{refresh_due_sessions, refresh_due_tokens};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn test_pool() -> Option<PgPool> {
	let url = std::env::var("DATABASE_URL").ok()?;
	let pool = PgPoolOptions::new().max_connections(5).connect(&url).await.ok()?;
	sqlx::migrate!("../../apps/worker/migrations").run(&pool).await.ok()?;
	Some(pool)
}

#[tokio::test]
async fn e5_token_refresh_batch_skips_a_logical_refusal_and_updates_the_rest() {
	let Some(pool) = test_pool().await else { return };

	sqlx::query(
		"INSERT INTO oauth_tokens (account_id, access_token, refresh_token, access_expiry, scope, updated_at)
		 VALUES ('ok-account', 'old-access', 'good-refresh', now(), 'offline_access', now()),
		        ('bad-account', 'old-access-2', 'bad-refresh', now(), 'offline_access', now())",
	)
	.execute(&pool)
	.await
	.unwrap();

	let identity_server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/oauth/token/refresh"))
		.respond_with(|req: &wiremock::Request| {
			let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
			if body["refresh_token"] == "good-refresh" {
				ResponseTemplate::new(200).set_body_json(json!({
					"access_token": "new-access",
					"refresh_token": "new-refresh",
					"expires_in": 3600,
					"scope": "offline_access"
				}))
			} else {
				ResponseTemplate::new(200)
					.set_body_json(json!({ "error": "invalid_grant", "error_description": "token revoked" }))
			}
		})
		.mount(&identity_server)
		.await;

	let identity = IdentityClient::new(identity_server.uri()).unwrap();
	refresh_due_tokens(&pool, &identity).await.unwrap();

	let ok_access: String =
		sqlx::query_scalar("SELECT access_token FROM oauth_tokens WHERE account_id = 'ok-account'")
			.fetch_one(&pool)
			.await
			.unwrap();
	assert_eq!(ok_access, "new-access");

	let bad_access: String =
		sqlx::query_scalar("SELECT access_token FROM oauth_tokens WHERE account_id = 'bad-account'")
			.fetch_one(&pool)
			.await
			.unwrap();
	assert_eq!(bad_access, "old-access-2", "a logical refusal must leave the stored token untouched");

	sqlx::query("DELETE FROM oauth_tokens").execute(&pool).await.unwrap();
}

#[tokio::test]
async fn e6_session_refresh_survives_a_downstream_push_failure() {
	let Some(pool) = test_pool().await else { return };

	let identity_server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/session/refresh"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"session_token": "new-session",
			"identity_token": "new-identity"
		})))
		.mount(&identity_server)
		.await;
	let identity = IdentityClient::new(identity_server.uri()).unwrap();

	let panel_server = MockServer::start().await;
	Mock::given(method("PUT"))
		.respond_with(ResponseTemplate::new(500))
		.mount(&panel_server)
		.await;
	let panel = PanelClient::new(PanelClientConfig {
		base_url: panel_server.uri(),
		application_key: "app-key".into(),
		client_key: Some("client-key".into()),
		access_gateway: None,
	})
	.unwrap();

	let server_id = Uuid::new_v4();
	sqlx::query(
		"INSERT INTO nodes (id, uuid, name, fqdn, scheme, memory, disk, daemon_listen, daemon_sftp, updated_at)
		 VALUES (1, gen_random_uuid(), 'node-a', 'node-a.example.com', 'https', 8192, 81920, 8080, 2022, now())",
	)
	.execute(&pool)
	.await
	.unwrap();
	sqlx::query(
		"INSERT INTO servers (id, remote_id, uuid, identifier, name, status, suspended, node_id, memory, disk, cpu, updated_at)
		 VALUES ($1, 1, gen_random_uuid(), 'abcd1234', 'test-server', 'installed', false, 1, 1024, 10240, 100, now())",
	)
	.bind(server_id)
	.execute(&pool)
	.await
	.unwrap();
	sqlx::query(
		"INSERT INTO game_sessions (account_id, profile_uuid, session_token, identity_token, server_id, created_at, updated_at)
		 VALUES ('player-1', gen_random_uuid(), 'old-session', 'old-identity', $1, now() - interval '1 hour', now() - interval '1 hour')",
	)
	.bind(server_id)
	.execute(&pool)
	.await
	.unwrap();

	refresh_due_sessions(&pool, &identity, &panel).await.unwrap();

	let updated: (String, String) =
		sqlx::query_as("SELECT session_token, identity_token FROM game_sessions WHERE account_id = 'player-1'")
			.fetch_one(&pool)
			.await
			.unwrap();
	assert_eq!(updated.0, "new-session");
	assert_eq!(updated.1, "new-identity");

	sqlx::query("DELETE FROM game_sessions").execute(&pool).await.unwrap();
	sqlx::query("DELETE FROM servers").execute(&pool).await.unwrap();
	sqlx::query("DELETE FROM nodes").execute(&pool).await.unwrap();
}
