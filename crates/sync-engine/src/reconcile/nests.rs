use panel_client::PanelClient;
use sqlx::PgPool;
use sync_log::ProgressPublisher;

use crate::error::SyncEngineError;
use crate::step::SyncStep;

const STEP: &str = "nests";

/// Nests, their eggs, and each egg's variables are synced together since
/// eggs are only reachable through their owning nest (`spec.md` §3, §4.5).
pub async fn sync_nests(
	pool: &PgPool,
	panel: &PanelClient,
	progress: &ProgressPublisher,
	sync_log_id: &str,
) -> Result<u64, SyncEngineError> {
	let nests = panel
		.list_nests()
		.await
		.map_err(|source| SyncEngineError::Panel { step: STEP, source })?;
	let total = nests.len() as u64;

	let mut seen_nest_ids = Vec::with_capacity(nests.len());
	let mut seen_egg_ids: Vec<i64> = Vec::new();
	let mut seen_variable_ids: Vec<i64> = Vec::new();
	let mut processed = 0u64;

	for nest in nests {
		sqlx::query(
			r#"
			INSERT INTO nests (id, uuid, name, author, updated_at)
			VALUES ($1, $2, $3, $4, now())
			ON CONFLICT (id) DO UPDATE SET
				uuid = EXCLUDED.uuid,
				name = EXCLUDED.name,
				author = EXCLUDED.author,
				updated_at = now()
			"#,
		)
		.bind(nest.id)
		.bind(nest.uuid)
		.bind(&nest.name)
		.bind(&nest.author)
		.execute(pool)
		.await
		.map_err(|source| SyncEngineError::Database { step: STEP, source })?;
		seen_nest_ids.push(nest.id);

		let eggs = panel
			.list_eggs_for_nest(nest.id, true)
			.await
			.map_err(|source| SyncEngineError::Panel { step: STEP, source })?;

		for egg in eggs {
			sqlx::query(
				r#"
				INSERT INTO eggs (id, uuid, nest_id, name, updated_at)
				VALUES ($1, $2, $3, $4, now())
				ON CONFLICT (id) DO UPDATE SET
					uuid = EXCLUDED.uuid,
					nest_id = EXCLUDED.nest_id,
					name = EXCLUDED.name,
					updated_at = now()
				"#,
			)
			.bind(egg.id)
			.bind(egg.uuid)
			.bind(egg.nest)
			.bind(&egg.name)
			.execute(pool)
			.await
			.map_err(|source| SyncEngineError::Database { step: STEP, source })?;
			seen_egg_ids.push(egg.id);

			let variables = egg
				.relationships
				.and_then(|rel| rel.variables)
				.map(|list| list.data)
				.unwrap_or_default();

			for wrapped in variables {
				let variable = wrapped.attributes;
				sqlx::query(
					r#"
					INSERT INTO egg_variables
						(id, egg_id, env_variable, default_value, user_viewable, user_editable, rules, updated_at)
					VALUES ($1, $2, $3, $4, $5, $6, $7, now())
					ON CONFLICT (id) DO UPDATE SET
						egg_id = EXCLUDED.egg_id,
						env_variable = EXCLUDED.env_variable,
						default_value = EXCLUDED.default_value,
						user_viewable = EXCLUDED.user_viewable,
						user_editable = EXCLUDED.user_editable,
						rules = EXCLUDED.rules,
						updated_at = now()
					"#,
				)
				.bind(variable.id)
				.bind(variable.egg_id)
				.bind(&variable.env_variable)
				.bind(&variable.default_value)
				.bind(variable.user_viewable)
				.bind(variable.user_editable)
				.bind(&variable.rules)
				.execute(pool)
				.await
				.map_err(|source| SyncEngineError::Database { step: STEP, source })?;
				seen_variable_ids.push(variable.id);
			}
		}

		processed += 1;
		if processed % SyncStep::NestsEggsVariables.progress_every() == 0 {
			progress.item_progress(sync_log_id, STEP, total, processed).await?;
		}
	}

	sqlx::query("DELETE FROM egg_variables WHERE NOT (id = ANY($1))")
		.bind(&seen_variable_ids)
		.execute(pool)
		.await
		.map_err(|source| SyncEngineError::Database { step: STEP, source })?;

	sqlx::query("DELETE FROM eggs WHERE NOT (id = ANY($1))")
		.bind(&seen_egg_ids)
		.execute(pool)
		.await
		.map_err(|source| SyncEngineError::Database { step: STEP, source })?;

	sqlx::query("DELETE FROM nests WHERE NOT (id = ANY($1))")
		.bind(&seen_nest_ids)
		.execute(pool)
		.await
		.map_err(|source| SyncEngineError::Database { step: STEP, source })?;

	Ok(processed)
}
