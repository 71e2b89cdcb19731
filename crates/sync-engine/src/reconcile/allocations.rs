use panel_client::PanelClient;
use sqlx::{PgPool, QueryBuilder};
use sync_log::ProgressPublisher;

use crate::error::SyncEngineError;

const STEP: &str = "allocations";
const BATCH_SIZE: usize = 500;

/// Allocations are fetched per-node and inserted in batches of
/// [`BATCH_SIZE`] as a single multi-row statement, so that one node's
/// worth of allocations stays within a single round trip (`spec.md` §4.5).
pub async fn sync_allocations(
	pool: &PgPool,
	panel: &PanelClient,
	progress: &ProgressPublisher,
	sync_log_id: &str,
) -> Result<u64, SyncEngineError> {
	let node_ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM nodes ORDER BY id")
		.fetch_all(pool)
		.await
		.map_err(|source| SyncEngineError::Database { step: STEP, source })?;

	let mut seen_ids: Vec<i64> = Vec::new();
	let mut processed = 0u64;
	let mut total = 0u64;

	for node_id in node_ids {
		let allocations = panel
			.list_allocations_for_node(node_id)
			.await
			.map_err(|source| SyncEngineError::Panel { step: STEP, source })?;
		total += allocations.len() as u64;

		for chunk in allocations.chunks(BATCH_SIZE) {
			// `remote_server_id` is the panel's own server id, carried as a plain
			// informational column. The local `server_id` FK is resolved later,
			// during the servers step, from each server's allocation expansion.
			let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
				"INSERT INTO allocations (id, node_id, ip, port, alias, notes, assigned, remote_server_id, updated_at) ",
			);
			builder.push_values(chunk, |mut row, allocation| {
				row.push_bind(allocation.id)
					.push_bind(node_id)
					.push_bind(&allocation.ip)
					.push_bind(allocation.port)
					.push_bind(&allocation.alias)
					.push_bind(&allocation.notes)
					.push_bind(allocation.assigned)
					.push_bind(allocation.server_id)
					.push("now()");
			});
			builder.push(
				r#" ON CONFLICT (id) DO UPDATE SET
					node_id = EXCLUDED.node_id,
					ip = EXCLUDED.ip,
					port = EXCLUDED.port,
					alias = EXCLUDED.alias,
					notes = EXCLUDED.notes,
					assigned = EXCLUDED.assigned,
					remote_server_id = EXCLUDED.remote_server_id,
					updated_at = now()"#,
			);
			builder
				.build()
				.execute(pool)
				.await
				.map_err(|source| SyncEngineError::Database { step: STEP, source })?;

			for allocation in chunk {
				seen_ids.push(allocation.id);
			}
			processed += chunk.len() as u64;
		}

		progress.item_progress(sync_log_id, STEP, total, processed).await?;
	}

	sqlx::query("DELETE FROM allocations WHERE NOT (id = ANY($1))")
		.bind(&seen_ids)
		.execute(pool)
		.await
		.map_err(|source| SyncEngineError::Database { step: STEP, source })?;

	Ok(processed)
}
