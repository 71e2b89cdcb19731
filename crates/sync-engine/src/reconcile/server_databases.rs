use panel_client::PanelClient;
use sqlx::PgPool;
use sync_log::ProgressPublisher;
use uuid::Uuid;

use crate::error::SyncEngineError;

const STEP: &str = "databases";
const PROGRESS_EVERY: u64 = 50;

/// Syncs `server_databases`, keyed on the panel's own database id. Rows
/// whose owning server hasn't synced locally yet are skipped rather than
/// inserted with a dangling FK (`server_id` is `not null` in the schema,
/// unlike `allocations.server_id`).
pub async fn sync_server_databases(
	pool: &PgPool,
	panel: &PanelClient,
	progress: &ProgressPublisher,
	sync_log_id: &str,
) -> Result<u64, SyncEngineError> {
	let databases = panel
		.list_server_databases(true)
		.await
		.map_err(|source| SyncEngineError::Panel { step: STEP, source })?;
	let total = databases.len() as u64;

	let mut seen_ids = Vec::with_capacity(databases.len());
	let mut processed = 0u64;
	for db in databases {
		let server_id: Option<(Uuid,)> =
			sqlx::query_as("SELECT id FROM servers WHERE remote_id = $1")
				.bind(db.server)
				.fetch_optional(pool)
				.await
				.map_err(|source| SyncEngineError::Database { step: STEP, source })?;
		let Some((server_id,)) = server_id else {
			tracing::debug!(remote_server_id = db.server, "database's server not synced locally yet, skipping");
			continue;
		};

		sqlx::query(
			r#"
			INSERT INTO server_databases (id, server_id, database_name, database_user, database_host, max_connections, updated_at)
			VALUES ($1, $2, $3, $4, $5, $6, now())
			ON CONFLICT (id) DO UPDATE SET
				server_id = EXCLUDED.server_id,
				database_name = EXCLUDED.database_name,
				database_user = EXCLUDED.database_user,
				database_host = EXCLUDED.database_host,
				max_connections = EXCLUDED.max_connections,
				updated_at = now()
			"#,
		)
		.bind(db.id)
		.bind(server_id)
		.bind(&db.database)
		.bind(&db.username)
		.bind(db.host.as_ref().map(|h| &h.address))
		.bind(db.max_connections)
		.execute(pool)
		.await
		.map_err(|source| SyncEngineError::Database { step: STEP, source })?;

		seen_ids.push(db.id);
		processed += 1;
		if processed % PROGRESS_EVERY == 0 {
			progress.item_progress(sync_log_id, STEP, total, processed).await?;
		}
	}

	sqlx::query("DELETE FROM server_databases WHERE NOT (id = ANY($1))")
		.bind(&seen_ids)
		.execute(pool)
		.await
		.map_err(|source| SyncEngineError::Database { step: STEP, source })?;

	Ok(processed)
}
