use std::sync::Arc;

use async_trait::async_trait;
use queue::{type_tags, CleanupLogsPayload, SyncEntityPayload, SyncFullPayload, Task, TaskHandler, TaskHandlerError};
use sync_engine::{SyncEngine, SyncEngineError, SyncEntity};
use sync_log::SyncLogRepository;

/// Routes a dequeued task to the sync engine or the log-cleanup query by
/// its type tag (`spec.md` §4.8).
pub struct SyncTaskHandler {
	pub engine: Arc<SyncEngine>,
	pub sync_log_repo: Arc<dyn SyncLogRepository>,
}

#[async_trait]
impl TaskHandler for SyncTaskHandler {
	async fn handle(&self, task: &Task) -> Result<(), TaskHandlerError> {
		if let Some(entity) = single_entity(&task.type_tag) {
			return self.handle_single_entity(task, entity).await;
		}
		match task.type_tag.as_str() {
			type_tags::SYNC_FULL => self.handle_full_sync(task).await,
			type_tags::CLEANUP_LOGS => self.handle_cleanup_logs(task).await,
			other => Err(TaskHandlerError::permanent(format!("unknown task type {other}"))),
		}
	}
}

impl SyncTaskHandler {
	async fn handle_full_sync(&self, task: &Task) -> Result<(), TaskHandlerError> {
		let payload: SyncFullPayload = serde_json::from_value(task.payload.clone())
			.map_err(|error| TaskHandlerError::permanent(format!("malformed sync:full payload: {error}")))?;

		if self.sync_log_repo.get(&payload.sync_log_id).await.map_err(transient)?.is_none() {
			self.sync_log_repo.insert(&payload.sync_log_id).await.map_err(transient)?;
		}

		match self.engine.run_full_sync(&payload.sync_log_id, payload.skip_users).await {
			Ok(()) => Ok(()),
			// Cancellation is a successful terminal state, not a failure to
			// retry (`sync_engine::SyncEngineError::Cancelled` doc comment).
			Err(SyncEngineError::Cancelled(_)) => Ok(()),
			Err(error) if error.is_retryable() => Err(TaskHandlerError::retryable(error.to_string())),
			Err(error) => Err(TaskHandlerError::permanent(error.to_string())),
		}
	}

	async fn handle_single_entity(&self, task: &Task, entity: SyncEntity) -> Result<(), TaskHandlerError> {
		let payload: SyncEntityPayload = serde_json::from_value(task.payload.clone())
			.map_err(|error| TaskHandlerError::permanent(format!("malformed {} payload: {error}", task.type_tag)))?;

		if self.sync_log_repo.get(&payload.sync_log_id).await.map_err(transient)?.is_none() {
			self.sync_log_repo.insert(&payload.sync_log_id).await.map_err(transient)?;
		}

		match self.engine.run_single_entity(entity, &payload.sync_log_id).await {
			Ok(()) => Ok(()),
			Err(error) if error.is_retryable() => Err(TaskHandlerError::retryable(error.to_string())),
			Err(error) => Err(TaskHandlerError::permanent(error.to_string())),
		}
	}

	async fn handle_cleanup_logs(&self, task: &Task) -> Result<(), TaskHandlerError> {
		let payload: CleanupLogsPayload = serde_json::from_value(task.payload.clone())
			.map_err(|error| TaskHandlerError::permanent(format!("malformed cleanup:logs payload: {error}")))?;
		let cutoff = chrono::Utc::now() - chrono::Duration::days(payload.older_than_days);
		let removed = self.sync_log_repo.delete_older_than(cutoff).await.map_err(transient)?;
		tracing::info!(removed, "log cleanup task complete");
		Ok(())
	}
}

fn transient(error: sync_log::SyncLogError) -> TaskHandlerError {
	TaskHandlerError::retryable(error.to_string())
}

fn single_entity(type_tag: &str) -> Option<SyncEntity> {
	match type_tag {
		type_tags::SYNC_LOCATIONS => Some(SyncEntity::Locations),
		type_tags::SYNC_NODES => Some(SyncEntity::Nodes),
		type_tags::SYNC_ALLOCATIONS => Some(SyncEntity::Allocations),
		type_tags::SYNC_NESTS => Some(SyncEntity::Nests),
		type_tags::SYNC_SERVERS => Some(SyncEntity::Servers),
		type_tags::SYNC_DATABASES => Some(SyncEntity::Databases),
		type_tags::SYNC_USERS => Some(SyncEntity::Users),
		_ => None,
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn recognizes_every_entity_tag_and_rejects_full_and_unknown() {
		assert_eq!(single_entity(type_tags::SYNC_LOCATIONS), Some(SyncEntity::Locations));
		assert_eq!(single_entity(type_tags::SYNC_NODES), Some(SyncEntity::Nodes));
		assert_eq!(single_entity(type_tags::SYNC_ALLOCATIONS), Some(SyncEntity::Allocations));
		assert_eq!(single_entity(type_tags::SYNC_NESTS), Some(SyncEntity::Nests));
		assert_eq!(single_entity(type_tags::SYNC_SERVERS), Some(SyncEntity::Servers));
		assert_eq!(single_entity(type_tags::SYNC_DATABASES), Some(SyncEntity::Databases));
		assert_eq!(single_entity(type_tags::SYNC_USERS), Some(SyncEntity::Users));
		assert_eq!(single_entity(type_tags::SYNC_FULL), None);
		assert_eq!(single_entity(type_tags::CLEANUP_LOGS), None);
		assert_eq!(single_entity("sync:unknown"), None);
	}
}
