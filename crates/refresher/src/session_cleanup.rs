use chrono::{DateTime, Duration, Utc};
use identity_client::IdentityClient;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::RefresherError;

const STALE_AFTER: Duration = Duration::hours(2);

#[derive(sqlx::FromRow)]
struct SessionRow {
	account_id: String,
	profile_uuid: Uuid,
	session_token: String,
}

/// Deletes every session untouched for [`STALE_AFTER`]. Termination at the
/// identity service is attempted first but its failure never blocks the
/// local delete (`spec.md` §4.6, invariant 8).
#[tracing::instrument(skip_all)]
pub async fn cleanup_stale_sessions(
	pool: &PgPool,
	identity: &IdentityClient,
) -> Result<u64, RefresherError> {
	let cutoff: DateTime<Utc> = Utc::now() - STALE_AFTER;
	let rows: Vec<SessionRow> = sqlx::query_as::<_, SessionRow>(
		"SELECT account_id, profile_uuid, session_token FROM game_sessions WHERE updated_at < $1",
	)
	.bind(cutoff)
	.fetch_all(pool)
	.await?;

	let mut removed = 0u64;
	for row in rows {
		if let Err(error) = identity.terminate_session(&row.session_token).await {
			tracing::debug!(account_id = %row.account_id, %error, "best-effort session termination failed");
		}

		sqlx::query("DELETE FROM game_sessions WHERE account_id = $1 AND profile_uuid = $2")
			.bind(&row.account_id)
			.bind(row.profile_uuid)
			.execute(pool)
			.await?;
		removed += 1;
	}

	Ok(removed)
}
