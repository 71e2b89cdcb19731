use std::time::Duration;

use panel_client::PanelClient;
use sqlx::PgPool;
use sync_log::ProgressPublisher;
use tokio::time::sleep;
use uuid::Uuid;

use crate::error::SyncEngineError;
use crate::step::SyncStep;

const STEP: &str = "subusers";
const THROTTLE_BATCH: usize = 5;
const THROTTLE_DELAY: Duration = Duration::from_secs(2);

#[derive(sqlx::FromRow)]
struct ServerRow {
	id: Uuid,
	identifier: String,
	owner_id: Uuid,
}

/// Subusers require a client API key, so this step is skipped entirely
/// when one isn't configured, and is best-effort even when it runs: a
/// failure here never fails the overall sync (`spec.md` §4.5, §7). Only
/// servers whose owner is a panel admin are touched, to avoid reaching
/// into customer-owned servers. The owner is synthesized into the local
/// table with `["*"]` permissions, since the panel's subuser listing
/// never includes the owner itself.
pub async fn sync_subusers(
	pool: &PgPool,
	panel: &PanelClient,
	progress: &ProgressPublisher,
	sync_log_id: &str,
	enabled: bool,
) -> Result<u64, SyncEngineError> {
	if !enabled {
		tracing::debug!("subuser sync skipped: disabled or no client API key configured");
		return Ok(0);
	}

	let servers: Vec<ServerRow> = sqlx::query_as::<_, ServerRow>(
		r#"
		SELECT servers.id, servers.identifier, servers.owner_id
		FROM servers
		JOIN users ON users.id = servers.owner_id
		WHERE servers.panel_type = 'pterodactyl' AND users.root_admin = true
		"#,
	)
	.fetch_all(pool)
	.await
	.map_err(|source| SyncEngineError::Database { step: STEP, source })?;
	let total = servers.len() as u64;

	let mut processed = 0u64;
	for (index, server) in servers.iter().enumerate() {
		sqlx::query(
			r#"
			INSERT INTO server_subusers (server_id, user_id, permissions, is_owner, last_synced_at)
			VALUES ($1, $2, ARRAY['*'], true, now())
			ON CONFLICT (server_id, user_id) DO UPDATE SET
				permissions = EXCLUDED.permissions,
				is_owner = true,
				last_synced_at = now()
			"#,
		)
		.bind(server.id)
		.bind(server.owner_id)
		.execute(pool)
		.await
		.map_err(|source| SyncEngineError::Database { step: STEP, source })?;

		let subusers = panel
			.list_subusers(&server.identifier)
			.await
			.map_err(|source| SyncEngineError::Panel { step: STEP, source })?;

		let mut seen_user_ids = vec![server.owner_id];
		for subuser in subusers {
			let resolved: Option<(Uuid,)> =
				sqlx::query_as("SELECT id FROM users WHERE email = $1")
					.bind(&subuser.email)
					.fetch_optional(pool)
					.await
					.map_err(|source| SyncEngineError::Database { step: STEP, source })?;
			let Some((user_id,)) = resolved else {
				tracing::debug!(email = %subuser.email, "subuser has no matching local user yet, skipping");
				continue;
			};

			sqlx::query(
				r#"
				INSERT INTO server_subusers (server_id, user_id, permissions, is_owner, last_synced_at)
				VALUES ($1, $2, $3, false, now())
				ON CONFLICT (server_id, user_id) DO UPDATE SET
					permissions = EXCLUDED.permissions,
					is_owner = false,
					last_synced_at = now()
				"#,
			)
			.bind(server.id)
			.bind(user_id)
			.bind(&subuser.permissions)
			.execute(pool)
			.await
			.map_err(|source| SyncEngineError::Database { step: STEP, source })?;
			seen_user_ids.push(user_id);
		}

		sqlx::query("DELETE FROM server_subusers WHERE server_id = $1 AND NOT (user_id = ANY($2))")
			.bind(server.id)
			.bind(&seen_user_ids)
			.execute(pool)
			.await
			.map_err(|source| SyncEngineError::Database { step: STEP, source })?;

		processed += 1;
		if processed % SyncStep::Subusers.progress_every() == 0 {
			progress.item_progress(sync_log_id, STEP, total, processed).await?;
		}

		if (index + 1) % THROTTLE_BATCH == 0 {
			sleep(THROTTLE_DELAY).await;
		}
	}

	Ok(processed)
}
