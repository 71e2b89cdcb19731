use panel_client::PanelClient;
use sqlx::PgPool;
use sync_log::ProgressPublisher;

use crate::error::SyncEngineError;
use crate::step::SyncStep;

const STEP: &str = "servers";

/// Servers are keyed by `remote_id`. Owner resolution falls back to the
/// previously-known `owner_id` when the panel's reported owner has no
/// matching local user yet, rather than nulling out an established link
/// (`spec.md` §3, §4.5).
pub async fn sync_servers(
	pool: &PgPool,
	panel: &PanelClient,
	progress: &ProgressPublisher,
	sync_log_id: &str,
) -> Result<u64, SyncEngineError> {
	let servers = panel
		.list_servers(true)
		.await
		.map_err(|source| SyncEngineError::Panel { step: STEP, source })?;
	let total = servers.len() as u64;

	let mut seen_remote_ids = Vec::with_capacity(servers.len());
	let mut processed = 0u64;
	for server in servers {
		sqlx::query(
			r#"
			INSERT INTO servers
				(id, remote_id, uuid, identifier, name, status, suspended, owner_id,
				 node_id, egg_id, memory, disk, cpu, panel_type, updated_at)
			VALUES (
				gen_random_uuid(), $1, $2, $3, $4, $5, $6,
				(SELECT id FROM users WHERE remote_id = $7),
				$8, $9, $10, $11, $12, 'pterodactyl', now()
			)
			ON CONFLICT (remote_id) DO UPDATE SET
				uuid = EXCLUDED.uuid,
				identifier = EXCLUDED.identifier,
				name = EXCLUDED.name,
				status = EXCLUDED.status,
				suspended = EXCLUDED.suspended,
				owner_id = COALESCE((SELECT id FROM users WHERE remote_id = $7), servers.owner_id),
				node_id = EXCLUDED.node_id,
				egg_id = EXCLUDED.egg_id,
				memory = EXCLUDED.memory,
				disk = EXCLUDED.disk,
				cpu = EXCLUDED.cpu,
				updated_at = now()
			"#,
		)
		.bind(server.id)
		.bind(server.uuid)
		.bind(&server.identifier)
		.bind(&server.name)
		.bind(&server.status)
		.bind(server.suspended)
		.bind(server.user)
		.bind(server.node)
		.bind(server.egg)
		.bind(server.limits.memory)
		.bind(server.limits.disk)
		.bind(server.limits.cpu)
		.execute(pool)
		.await
		.map_err(|source| SyncEngineError::Database { step: STEP, source })?;

		if let Some(allocations) = server
			.relationships
			.as_ref()
			.and_then(|rel| rel.allocations.as_ref())
		{
			let allocation_ids: Vec<i64> =
				allocations.data.iter().map(|wrapped| wrapped.attributes.id).collect();
			sqlx::query(
				r#"
				UPDATE allocations
				SET server_id = (SELECT id FROM servers WHERE remote_id = $1)
				WHERE id = ANY($2)
				"#,
			)
			.bind(server.id)
			.bind(&allocation_ids)
			.execute(pool)
			.await
			.map_err(|source| SyncEngineError::Database { step: STEP, source })?;
		}

		seen_remote_ids.push(server.id);
		processed += 1;
		if processed % SyncStep::Servers.progress_every() == 0 {
			progress.item_progress(sync_log_id, STEP, total, processed).await?;
		}
	}

	// allocations.server_id is ON DELETE SET NULL, so a stale server that
	// still owns allocations is removed cleanly instead of raising an FK
	// violation; the allocation just reverts to unassigned.
	sqlx::query(
		"DELETE FROM servers WHERE panel_type = 'pterodactyl' AND NOT (remote_id = ANY($1))",
	)
	.bind(&seen_remote_ids)
	.execute(pool)
	.await
	.map_err(|source| SyncEngineError::Database { step: STEP, source })?;

	Ok(processed)
}
