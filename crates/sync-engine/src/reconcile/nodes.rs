use panel_client::PanelClient;
use sqlx::PgPool;
use sync_log::ProgressPublisher;

use crate::error::SyncEngineError;
use crate::step::SyncStep;

const STEP: &str = "nodes";

pub async fn sync_nodes(
	pool: &PgPool,
	panel: &PanelClient,
	progress: &ProgressPublisher,
	sync_log_id: &str,
) -> Result<u64, SyncEngineError> {
	let nodes = panel
		.list_nodes()
		.await
		.map_err(|source| SyncEngineError::Panel { step: STEP, source })?;
	let total = nodes.len() as u64;

	let mut seen_ids = Vec::with_capacity(nodes.len());
	let mut processed = 0u64;
	for node in nodes {
		sqlx::query(
			r#"
			INSERT INTO nodes (id, uuid, name, fqdn, scheme, memory, disk, daemon_listen,
				daemon_sftp, maintenance_mode, location_id, updated_at)
			VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, now())
			ON CONFLICT (id) DO UPDATE SET
				uuid = EXCLUDED.uuid,
				name = EXCLUDED.name,
				fqdn = EXCLUDED.fqdn,
				scheme = EXCLUDED.scheme,
				memory = EXCLUDED.memory,
				disk = EXCLUDED.disk,
				daemon_listen = EXCLUDED.daemon_listen,
				daemon_sftp = EXCLUDED.daemon_sftp,
				maintenance_mode = EXCLUDED.maintenance_mode,
				location_id = EXCLUDED.location_id,
				updated_at = now()
			"#,
		)
		.bind(node.id)
		.bind(node.uuid)
		.bind(&node.name)
		.bind(&node.fqdn)
		.bind(&node.scheme)
		.bind(node.memory)
		.bind(node.disk)
		.bind(node.daemon_listen)
		.bind(node.daemon_sftp)
		.bind(node.maintenance_mode)
		.bind(node.location_id)
		.execute(pool)
		.await
		.map_err(|source| SyncEngineError::Database { step: STEP, source })?;

		seen_ids.push(node.id);
		processed += 1;
		if processed % SyncStep::Nodes.progress_every() == 0 {
			progress.item_progress(sync_log_id, STEP, total, processed).await?;
		}
	}

	sqlx::query("DELETE FROM nodes WHERE NOT (id = ANY($1))")
		.bind(&seen_ids)
		.execute(pool)
		.await
		.map_err(|source| SyncEngineError::Database { step: STEP, source })?;

	Ok(processed)
}
