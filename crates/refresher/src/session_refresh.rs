use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use identity_client::IdentityClient;
use panel_client::PanelClient;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::RefresherError;

const SESSION_LIFETIME: Duration = Duration::minutes(55);

#[derive(sqlx::FromRow)]
struct SessionRow {
	account_id: String,
	profile_uuid: Uuid,
	session_token: String,
	server_id: Option<Uuid>,
}

/// Refreshes every session whose age has reached [`SESSION_LIFETIME`]. A
/// downstream push to a linked server is best-effort: its failure is
/// logged but never undoes the local token update (`spec.md` §4.6).
#[tracing::instrument(skip_all)]
pub async fn refresh_due_sessions(
	pool: &PgPool,
	identity: &IdentityClient,
	panel: &PanelClient,
) -> Result<(), RefresherError> {
	let due_before: DateTime<Utc> = Utc::now() - SESSION_LIFETIME;
	let rows: Vec<SessionRow> = sqlx::query_as::<_, SessionRow>(
		r#"
		SELECT account_id, profile_uuid, session_token, server_id
		FROM game_sessions
		WHERE created_at <= $1
		"#,
	)
	.bind(due_before)
	.fetch_all(pool)
	.await?;

	for row in rows {
		let refreshed = match identity.refresh_session(&row.session_token).await {
			Ok(refreshed) => refreshed,
			Err(error) => {
				tracing::warn!(account_id = %row.account_id, %error, "session refresh failed");
				continue;
			}
		};

		let update = sqlx::query(
			r#"
			UPDATE game_sessions
			SET session_token = $3, identity_token = $4, updated_at = now()
			WHERE account_id = $1 AND profile_uuid = $2
			"#,
		)
		.bind(&row.account_id)
		.bind(row.profile_uuid)
		.bind(&refreshed.session_token)
		.bind(&refreshed.identity_token)
		.execute(pool)
		.await;
		if let Err(error) = update {
			tracing::warn!(account_id = %row.account_id, %error, "failed to persist refreshed session");
			continue;
		}

		let Some(server_id) = row.server_id else { continue };
		if let Err(error) =
			push_to_downstream(pool, panel, server_id, &refreshed.session_token, &refreshed.identity_token).await
		{
			tracing::warn!(account_id = %row.account_id, %server_id, %error, "downstream secret push failed");
		}
	}

	Ok(())
}

async fn push_to_downstream(
	pool: &PgPool,
	panel: &PanelClient,
	server_id: Uuid,
	session_token: &str,
	identity_token: &str,
) -> Result<(), RefresherError> {
	let identifier: Option<String> =
		sqlx::query_scalar("SELECT identifier FROM servers WHERE id = $1")
			.bind(server_id)
			.fetch_optional(pool)
			.await?;
	let Some(identifier) = identifier else { return Ok(()) };

	let mut vars = HashMap::with_capacity(2);
	vars.insert("SESSION_TOKEN".to_string(), session_token.to_string());
	vars.insert("IDENTITY_TOKEN".to_string(), identity_token.to_string());

	if let Err(error) = panel.update_environment(&identifier, vars).await {
		tracing::warn!(%identifier, %error, "panel update_environment call failed");
	}
	Ok(())
}
