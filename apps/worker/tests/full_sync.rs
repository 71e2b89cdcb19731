//! End-to-end scenarios E1 and E2 from `spec.md` §8, run against a real
//! Postgres instance. Skipped (not failed) when `DATABASE_URL` isn't set,
//! since no Postgres fixture ships with this workspace.

use std::sync::Arc;

use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use sync_engine::{SyncEngine, SyncEngineConfig};
use sync_log::{PgSyncLogRepository, SyncLogRepository};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn test_pool() -> Option<PgPool> {
	let url = std::env::var("DATABASE_URL").ok()?;
	let pool = PgPoolOptions::new().max_connections(5).connect(&url).await.ok()?;
	sqlx::migrate!("./migrations").run(&pool).await.ok()?;
	Some(pool)
}

fn locations_page(items: &[(i64, &str, &str)]) -> serde_json::Value {
	json!({
		"object": "list",
		"data": items.iter().map(|(id, short, long)| json!({
			"object": "location",
			"attributes": { "id": id, "short": short, "long": long }
		})).collect::<Vec<_>>(),
		"meta": { "pagination": { "total": items.len(), "count": items.len(), "per_page": 50, "current_page": 1, "total_pages": 1 } }
	})
}

async fn mock_panel_with_locations(items: &[(i64, &str, &str)]) -> (MockServer, panel_client::PanelClient) {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/api/application/locations"))
		.respond_with(ResponseTemplate::new(200).set_body_json(locations_page(items)))
		.mount(&server)
		.await;
	for empty_path in [
		"/api/application/nodes",
		"/api/application/nests",
		"/api/application/users",
		"/api/application/servers",
	] {
		Mock::given(method("GET"))
			.and(path(empty_path))
			.respond_with(ResponseTemplate::new(200).set_body_json(locations_page(&[])))
			.mount(&server)
			.await;
	}

	let panel = panel_client::PanelClient::new(panel_client::PanelClientConfig {
		base_url: server.uri(),
		application_key: "test-app-key".to_string(),
		client_key: None,
		access_gateway: None,
	})
	.unwrap();
	(server, panel)
}

#[tokio::test]
async fn e1_clean_full_sync_persists_all_locations_and_completes() {
	let Some(pool) = test_pool().await else { return };
	let (_server, panel) =
		mock_panel_with_locations(&[(1, "EU", "Europe"), (2, "US", "United States")]).await;

	let repo: Arc<dyn SyncLogRepository> = Arc::new(PgSyncLogRepository::new(pool.clone()));
	repo.insert("e1-test").await.unwrap();
	let engine = SyncEngine::new(pool.clone(), panel, repo.clone(), SyncEngineConfig { subusers_enabled: false });

	engine.run_full_sync("e1-test", true).await.unwrap();

	let log = repo.get("e1-test").await.unwrap().unwrap();
	assert_eq!(log.status, sync_log::SyncStatus::Completed);

	let count: i64 = sqlx::query_scalar("SELECT count(*) FROM locations")
		.fetch_one(&pool)
		.await
		.unwrap();
	assert_eq!(count, 2);

	sqlx::query("DELETE FROM locations").execute(&pool).await.unwrap();
	sqlx::query("DELETE FROM sync_logs WHERE id = 'e1-test'").execute(&pool).await.unwrap();
}

#[tokio::test]
async fn e2_stale_prune_removes_rows_absent_from_remote() {
	let Some(pool) = test_pool().await else { return };

	sqlx::query("INSERT INTO locations (id, short_code, description) VALUES (1,'a','a'), (2,'b','b'), (3,'c','c')")
		.execute(&pool)
		.await
		.unwrap();

	let (_server, panel) = mock_panel_with_locations(&[(1, "a", "a"), (2, "b", "b")]).await;
	let repo: Arc<dyn SyncLogRepository> = Arc::new(PgSyncLogRepository::new(pool.clone()));
	let progress = sync_log::ProgressPublisher::new(repo.clone());
	repo.insert("e2-test").await.unwrap();

	sync_engine::reconcile::locations::sync_locations(&pool, &panel, &progress, "e2-test")
		.await
		.unwrap();

	let remaining: Vec<i64> = sqlx::query_scalar("SELECT id FROM locations ORDER BY id")
		.fetch_all(&pool)
		.await
		.unwrap();
	assert_eq!(remaining, vec![1, 2]);

	sqlx::query("DELETE FROM locations").execute(&pool).await.unwrap();
	sqlx::query("DELETE FROM sync_logs WHERE id = 'e2-test'").execute(&pool).await.unwrap();
}

#[tokio::test]
async fn e4_cancellation_observed_before_first_step_is_recorded_as_cancelled() {
	let Some(pool) = test_pool().await else { return };
	let (_server, panel) = mock_panel_with_locations(&[(1, "a", "a")]).await;

	let repo: Arc<dyn SyncLogRepository> = Arc::new(PgSyncLogRepository::new(pool.clone()));
	repo.insert("e4-test").await.unwrap();
	sqlx::query("UPDATE sync_logs SET cancel_requested = true WHERE id = 'e4-test'")
		.execute(&pool)
		.await
		.unwrap();

	let engine = SyncEngine::new(pool.clone(), panel, repo.clone(), SyncEngineConfig { subusers_enabled: false });
	let result = engine.run_full_sync("e4-test", true).await;

	assert!(matches!(result, Err(sync_engine::SyncEngineError::Cancelled(step)) if step == "locations"));
	let log = repo.get("e4-test").await.unwrap().unwrap();
	assert_eq!(log.status, sync_log::SyncStatus::Cancelled);

	let count: i64 = sqlx::query_scalar("SELECT count(*) FROM locations").fetch_one(&pool).await.unwrap();
	assert_eq!(count, 0, "a step observed as cancelled before entry must not have run");

	sqlx::query("DELETE FROM sync_logs WHERE id = 'e4-test'").execute(&pool).await.unwrap();
}
