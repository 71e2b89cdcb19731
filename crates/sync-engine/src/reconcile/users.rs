use panel_client::PanelClient;
use sqlx::PgPool;
use sync_log::ProgressPublisher;

use crate::error::SyncEngineError;
use crate::step::SyncStep;

const STEP: &str = "users";

/// Users are keyed by `email` (the table's unique column), so a
/// locally-created account later matched by a synced panel user converges
/// onto that row instead of colliding on `users_email_key`. Remote-origin
/// fields (names, admin flag) are overwritten on conflict; `remote_id` is
/// null-coalesced so a linkage already established here is never clobbered
/// (`spec.md` §3). Rows with no `remote_id` are locally-created accounts and
/// are never pruned by this step.
pub async fn sync_users(
	pool: &PgPool,
	panel: &PanelClient,
	progress: &ProgressPublisher,
	sync_log_id: &str,
) -> Result<u64, SyncEngineError> {
	let users = panel
		.list_users()
		.await
		.map_err(|source| SyncEngineError::Panel { step: STEP, source })?;
	let total = users.len() as u64;

	let mut seen_remote_ids = Vec::with_capacity(users.len());
	let mut processed = 0u64;
	for user in users {
		sqlx::query(
			r#"
			INSERT INTO users (id, remote_id, email, first_name, last_name, root_admin, updated_at)
			VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, now())
			ON CONFLICT (email) DO UPDATE SET
				remote_id = COALESCE(users.remote_id, EXCLUDED.remote_id),
				first_name = EXCLUDED.first_name,
				last_name = EXCLUDED.last_name,
				root_admin = EXCLUDED.root_admin,
				updated_at = now()
			"#,
		)
		.bind(user.id)
		.bind(&user.email)
		.bind(&user.first_name)
		.bind(&user.last_name)
		.bind(user.root_admin)
		.execute(pool)
		.await
		.map_err(|source| SyncEngineError::Database { step: STEP, source })?;

		seen_remote_ids.push(user.id);
		processed += 1;
		if processed % SyncStep::Users.progress_every() == 0 {
			progress.item_progress(sync_log_id, STEP, total, processed).await?;
		}
	}

	sqlx::query("DELETE FROM users WHERE remote_id IS NOT NULL AND NOT (remote_id = ANY($1))")
		.bind(&seen_remote_ids)
		.execute(pool)
		.await
		.map_err(|source| SyncEngineError::Database { step: STEP, source })?;

	Ok(processed)
}
