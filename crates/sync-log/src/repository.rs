use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::Row;

use crate::error::SyncLogError;
use crate::model::{SyncLog, SyncLogUpdate, SyncStatus};

type Result<T> = std::result::Result<T, SyncLogError>;

/// Persistence for sync-run records (`spec.md` §4.4). Implementers must
/// expose `is_cancelled` directly so the Scheduler and Sync Engine can poll
/// it without round-tripping a full `SyncLog`.
#[async_trait]
pub trait SyncLogRepository: Send + Sync {
	async fn insert(&self, id: &str) -> Result<SyncLog>;
	async fn get(&self, id: &str) -> Result<Option<SyncLog>>;
	async fn update(&self, id: &str, patch: SyncLogUpdate) -> Result<()>;
	async fn is_cancelled(&self, id: &str) -> Result<bool>;
	/// Deletes sync-log rows older than `cutoff`, returning the count
	/// removed. Backs the `cleanup:logs` task (`spec.md` §6).
	async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

pub struct PgSyncLogRepository {
	pool: PgPool,
}

impl PgSyncLogRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	fn row_to_log(row: sqlx::postgres::PgRow) -> Result<SyncLog> {
		let status_raw: String = row.try_get("status")?;
		let status = SyncStatus::from_str(&status_raw)
			.map_err(|_| SyncLogError::Database(sqlx::Error::Decode(status_raw.into())))?;
		Ok(SyncLog {
			id: row.try_get("id")?,
			status,
			step: row.try_get("step")?,
			items_total: row.try_get("items_total")?,
			items_processed: row.try_get("items_processed")?,
			progress_pct: row.try_get("progress_pct")?,
			last_message: row.try_get("last_message")?,
			started_at: row.try_get("started_at")?,
			completed_at: row.try_get("completed_at")?,
			metadata: row.try_get("metadata")?,
			cancel_requested: row.try_get("cancel_requested")?,
			failed_step: row.try_get("failed_step")?,
			created_at: row.try_get("created_at")?,
		})
	}
}

#[async_trait]
impl SyncLogRepository for PgSyncLogRepository {
	async fn insert(&self, id: &str) -> Result<SyncLog> {
		let row = sqlx::query(
			r#"
			INSERT INTO sync_logs (id, status, metadata, cancel_requested)
			VALUES ($1, 'PENDING', '{}'::jsonb, false)
			ON CONFLICT (id) DO UPDATE SET id = sync_logs.id
			RETURNING id, status, step, items_total, items_processed, progress_pct,
				last_message, started_at, completed_at, metadata, cancel_requested,
				failed_step, created_at
			"#,
		)
		.bind(id)
		.fetch_one(&self.pool)
		.await?;
		Self::row_to_log(row)
	}

	async fn get(&self, id: &str) -> Result<Option<SyncLog>> {
		let row = sqlx::query(
			r#"
			SELECT id, status, step, items_total, items_processed, progress_pct,
				last_message, started_at, completed_at, metadata, cancel_requested,
				failed_step, created_at
			FROM sync_logs WHERE id = $1
			"#,
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;
		row.map(Self::row_to_log).transpose()
	}

	async fn update(&self, id: &str, patch: SyncLogUpdate) -> Result<()> {
		let now = Utc::now();
		let status_str = patch.status.map(|s| s.to_string());
		let started_at = matches!(patch.status, Some(SyncStatus::Running)).then_some(now);
		let completed_at = patch
			.status
			.filter(|s| s.is_terminal())
			.map(|_| now);
		let metadata_patch = patch.metadata_patch.unwrap_or_else(|| serde_json::json!({}));

		let result = sqlx::query(
			r#"
			UPDATE sync_logs SET
				status = COALESCE($2, status),
				step = COALESCE($3, step),
				items_total = COALESCE($4, items_total),
				items_processed = COALESCE($5, items_processed),
				last_message = COALESCE($6, last_message),
				failed_step = COALESCE($7, failed_step),
				started_at = COALESCE($8, started_at),
				completed_at = COALESCE($9, completed_at),
				metadata = metadata || $10::jsonb
			WHERE id = $1
			"#,
		)
		.bind(id)
		.bind(status_str)
		.bind(patch.step)
		.bind(patch.items_total)
		.bind(patch.items_processed)
		.bind(patch.error)
		.bind(patch.failed_step)
		.bind(started_at)
		.bind(completed_at)
		.bind(metadata_patch)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(SyncLogError::NotFound(id.to_string()));
		}
		Ok(())
	}

	async fn is_cancelled(&self, id: &str) -> Result<bool> {
		let row = sqlx::query("SELECT cancel_requested FROM sync_logs WHERE id = $1")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;
		match row {
			Some(row) => Ok(row.try_get("cancel_requested")?),
			None => Err(SyncLogError::NotFound(id.to_string())),
		}
	}

	async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
		let result = sqlx::query("DELETE FROM sync_logs WHERE created_at < $1")
			.bind(cutoff)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected())
	}
}
