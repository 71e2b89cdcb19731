//! Covers the `sync:<entity>` task family (`spec.md` §6) via
//! `SyncEngine::run_single_entity`, run against a real Postgres instance.
//! Skipped (not failed) when `DATABASE_URL` isn't set.

use std::sync::Arc;

use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use sync_engine::{SyncEngine, SyncEngineConfig, SyncEntity};
use sync_log::{PgSyncLogRepository, SyncLogRepository};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn test_pool() -> Option<PgPool> {
	let url = std::env::var("DATABASE_URL").ok()?;
	let pool = PgPoolOptions::new().max_connections(5).connect(&url).await.ok()?;
	sqlx::migrate!("./migrations").run(&pool).await.ok()?;
	Some(pool)
}

fn databases_page(items: &[(i64, i64, &str, &str)]) -> serde_json::Value {
	json!({
		"object": "list",
		"data": items.iter().map(|(id, server, database, username)| json!({
			"object": "server_database",
			"attributes": {
				"id": id,
				"server": server,
				"database": database,
				"username": username,
				"max_connections": 10
			}
		})).collect::<Vec<_>>(),
		"meta": { "pagination": { "total": items.len(), "count": items.len(), "per_page": 50, "current_page": 1, "total_pages": 1 } }
	})
}

#[tokio::test]
async fn databases_task_links_to_an_already_synced_server_and_skips_orphans() {
	let Some(pool) = test_pool().await else { return };

	let server_id = sqlx::query_scalar::<_, uuid::Uuid>(
		r#"
		INSERT INTO servers (remote_id, uuid, identifier, name, status, suspended, memory, disk, cpu, panel_type)
		VALUES (100, gen_random_uuid(), 'abc123', 'test-server', 'installed', false, 1024, 1024, 100, 'pterodactyl')
		RETURNING id
		"#,
	)
	.fetch_one(&pool)
	.await
	.unwrap();

	let server = MockServer::start().await;
	// `path()` matches the URL path component only, so this also catches the
	// `?include=host` variant `sync_server_databases` actually requests.
	Mock::given(method("GET"))
		.and(path("/api/application/databases"))
		.respond_with(ResponseTemplate::new(200).set_body_json(databases_page(&[
			(1, 100, "db_one", "user_one"),
			(2, 999, "db_orphan", "user_orphan"),
		])))
		.mount(&server)
		.await;

	let panel = panel_client::PanelClient::new(panel_client::PanelClientConfig {
		base_url: server.uri(),
		application_key: "test-app-key".to_string(),
		client_key: None,
		access_gateway: None,
	})
	.unwrap();

	let repo: Arc<dyn SyncLogRepository> = Arc::new(PgSyncLogRepository::new(pool.clone()));
	repo.insert("databases-test").await.unwrap();
	let engine = SyncEngine::new(pool.clone(), panel, repo.clone(), SyncEngineConfig { subusers_enabled: false });

	engine.run_single_entity(SyncEntity::Databases, "databases-test").await.unwrap();

	let log = repo.get("databases-test").await.unwrap().unwrap();
	assert_eq!(log.status, sync_log::SyncStatus::Completed);

	let rows: Vec<(uuid::Uuid, String)> =
		sqlx::query_as("SELECT server_id, database_name FROM server_databases ORDER BY id")
			.fetch_all(&pool)
			.await
			.unwrap();
	assert_eq!(rows, vec![(server_id, "db_one".to_string())], "the orphaned database (server 999) must be skipped, not inserted");

	sqlx::query("DELETE FROM server_databases").execute(&pool).await.unwrap();
	sqlx::query("DELETE FROM servers WHERE id = $1").bind(server_id).execute(&pool).await.unwrap();
	sqlx::query("DELETE FROM sync_logs WHERE id = 'databases-test'").execute(&pool).await.unwrap();
}
