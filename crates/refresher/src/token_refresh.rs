use chrono::{DateTime, Duration, Utc};
use identity_client::IdentityClient;
use sqlx::PgPool;

use crate::error::RefresherError;

const LOOKAHEAD: Duration = Duration::minutes(5);

#[derive(sqlx::FromRow)]
struct TokenRow {
	account_id: String,
	refresh_token: String,
	access_expiry: DateTime<Utc>,
}

/// Refreshes every OAuth token whose `access_expiry` falls within the next
/// five minutes. A single account's failure is logged and skipped; it must
/// never halt the batch (`spec.md` §4.6).
#[tracing::instrument(skip_all)]
pub async fn refresh_due_tokens(
	pool: &PgPool,
	identity: &IdentityClient,
) -> Result<(), RefresherError> {
	let due_before = Utc::now() + LOOKAHEAD;
	let rows: Vec<TokenRow> = sqlx::query_as::<_, TokenRow>(
		"SELECT account_id, refresh_token, access_expiry FROM oauth_tokens WHERE access_expiry <= $1",
	)
	.bind(due_before)
	.fetch_all(pool)
	.await?;

	for row in rows {
		match identity.refresh_token(&row.refresh_token).await {
			Ok(refreshed) => {
				let result = sqlx::query(
					r#"
					UPDATE oauth_tokens
					SET access_token = $2, refresh_token = $3, access_expiry = $4, scope = $5, updated_at = now()
					WHERE account_id = $1
					"#,
				)
				.bind(&row.account_id)
				.bind(&refreshed.access_token)
				.bind(&refreshed.refresh_token)
				.bind(Utc::now() + Duration::seconds(refreshed.expires_in))
				.bind(&refreshed.scope)
				.execute(pool)
				.await;
				if let Err(error) = result {
					tracing::warn!(account_id = %row.account_id, %error, "failed to persist refreshed token");
				}
			}
			Err(error) => {
				tracing::warn!(account_id = %row.account_id, %error, "token refresh failed, leaving stored token intact");
			}
		}
	}

	Ok(())
}
