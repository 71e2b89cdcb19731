use std::sync::Arc;

use serde_json::json;

use crate::error::SyncLogError;
use crate::model::SyncLogUpdate;
use crate::repository::SyncLogRepository;

type Result<T> = std::result::Result<T, SyncLogError>;

/// Merges step/percentage/message/counters into a sync-log row
/// (`spec.md` §4.5, metadata keys from §6).
pub struct ProgressPublisher {
	repo: Arc<dyn SyncLogRepository>,
}

impl ProgressPublisher {
	pub fn new(repo: Arc<dyn SyncLogRepository>) -> Self {
		Self { repo }
	}

	pub async fn step_entered(&self, sync_log_id: &str, step: &str) -> Result<()> {
		self.publish(sync_log_id, step, None, None, &format!("starting {step}")).await
	}

	pub async fn item_progress(
		&self,
		sync_log_id: &str,
		step: &str,
		items_total: u64,
		items_processed: u64,
	) -> Result<()> {
		self.publish(
			sync_log_id,
			step,
			Some(items_total),
			Some(items_processed),
			&format!("{items_processed}/{items_total} {step} processed"),
		)
		.await
	}

	pub async fn step_completed(&self, sync_log_id: &str, step: &str, items_processed: u64) -> Result<()> {
		self.publish(
			sync_log_id,
			step,
			Some(items_processed),
			Some(items_processed),
			&format!("\u{2713} {step} complete ({items_processed} items)"),
		)
		.await
	}

	async fn publish(
		&self,
		sync_log_id: &str,
		step: &str,
		items_total: Option<u64>,
		items_processed: Option<u64>,
		message: &str,
	) -> Result<()> {
		let percentage = match (items_total, items_processed) {
			(Some(total), Some(processed)) if total > 0 => {
				(processed as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
			}
			_ => 0.0,
		};
		let metadata_patch = json!({
			"step": step,
			"percentage": percentage,
			"itemsTotal": items_total,
			"itemsProcessed": items_processed,
			"lastMessage": message,
			"lastUpdated": chrono::Utc::now().timestamp(),
		});
		self.repo
			.update(
				sync_log_id,
				SyncLogUpdate {
					step: Some(step.to_string()),
					items_total: items_total.map(|v| v as i64),
					items_processed: items_processed.map(|v| v as i64),
					metadata_patch: Some(metadata_patch),
					..Default::default()
				},
			)
			.await
	}
}
