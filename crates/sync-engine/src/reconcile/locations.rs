use panel_client::PanelClient;
use sqlx::PgPool;
use sync_log::ProgressPublisher;

use crate::error::SyncEngineError;
use crate::step::SyncStep;

const STEP: &str = "locations";

pub async fn sync_locations(
	pool: &PgPool,
	panel: &PanelClient,
	progress: &ProgressPublisher,
	sync_log_id: &str,
) -> Result<u64, SyncEngineError> {
	let locations = panel
		.list_locations()
		.await
		.map_err(|source| SyncEngineError::Panel { step: STEP, source })?;
	let total = locations.len() as u64;

	let mut seen_ids = Vec::with_capacity(locations.len());
	let mut processed = 0u64;
	for location in locations {
		sqlx::query(
			r#"
			INSERT INTO locations (id, short_code, description, updated_at)
			VALUES ($1, $2, $3, now())
			ON CONFLICT (id) DO UPDATE SET
				short_code = EXCLUDED.short_code,
				description = EXCLUDED.description,
				updated_at = now()
			"#,
		)
		.bind(location.id)
		.bind(&location.short)
		.bind(&location.long)
		.execute(pool)
		.await
		.map_err(|source| SyncEngineError::Database { step: STEP, source })?;

		seen_ids.push(location.id);
		processed += 1;
		if processed % SyncStep::Locations.progress_every() == 0 {
			progress.item_progress(sync_log_id, STEP, total, processed).await?;
		}
	}

	sqlx::query("DELETE FROM locations WHERE NOT (id = ANY($1))")
		.bind(&seen_ids)
		.execute(pool)
		.await
		.map_err(|source| SyncEngineError::Database { step: STEP, source })?;

	Ok(processed)
}
