use std::time::Duration;

use chrono::Utc;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::connection::normalize_broker_url;
use crate::error::QueueError;
use crate::task::{EnqueueOptions, QueuePriority, Task, TaskInfo, TaskState};

type Result<T> = std::result::Result<T, QueueError>;

const INFLIGHT_KEY: &str = "queue:inflight";
const FAILED_KEY: &str = "queue:failed";

/// Redis-backed durable queue. Uses one sorted set per priority queue
/// (scored by ready-at unix time), a sorted set of in-flight task ids
/// (scored by their execution deadline), and a hash per task holding its
/// serialized state.
#[derive(Clone)]
pub struct RedisQueue {
	pool: Pool,
}

impl RedisQueue {
	pub fn connect(broker_url: &str) -> Result<Self> {
		let url = normalize_broker_url(broker_url);
		let cfg = Config::from_url(url);
		let pool = cfg
			.create_pool(Some(Runtime::Tokio1))
			.map_err(|e| QueueError::PoolBuild(e.to_string()))?;
		Ok(Self { pool })
	}

	fn dedup_key(type_tag: &str, payload: &serde_json::Value) -> String {
		let mut hasher = Sha256::new();
		hasher.update(type_tag.as_bytes());
		hasher.update(payload.to_string().as_bytes());
		format!("queue:uniq:{:x}", hasher.finalize())
	}

	fn task_key(id: &str) -> String {
		format!("queue:task:{id}")
	}

	pub async fn enqueue(
		&self,
		type_tag: &str,
		payload: serde_json::Value,
		opts: EnqueueOptions,
	) -> Result<TaskInfo> {
		let mut conn = self.pool.get().await?;

		if let Some(window) = opts.unique_for {
			let key = Self::dedup_key(type_tag, &payload);
			let acquired: bool = redis::cmd("SET")
				.arg(&key)
				.arg(1)
				.arg("NX")
				.arg("EX")
				.arg(window.as_secs().max(1))
				.query_async::<Option<String>>(&mut conn)
				.await?
				.is_some();
			if !acquired {
				return Err(QueueError::DuplicateTask);
			}
		}

		let id = uuid::Uuid::new_v4().to_string();
		let ready_at = opts.ready_at.unwrap_or_else(Utc::now);
		let task = Task {
			id: id.clone(),
			type_tag: type_tag.to_string(),
			payload,
			queue: opts.queue,
			max_retry: opts.max_retry,
			retry_count: 0,
			timeout: opts.timeout,
			ready_at,
		};
		let data = serde_json::to_string(&task).map_err(QueueError::Encode)?;
		let () = conn.set(Self::task_key(&id), data).await?;
		let () = conn.zadd(task.queue.redis_key(), &id, ready_at.timestamp()).await?;
		debug!(task_id = %id, type_tag, queue = task.queue.as_str(), "enqueued task");
		Ok(TaskInfo {
			id,
			type_tag: task.type_tag,
			queue: task.queue,
			state: TaskState::Pending,
			enqueued_at: Utc::now(),
		})
	}

	/// Attempts to claim one ready task from `priority`. Uses a claim-by-ZREM
	/// pattern: candidates are read optimistically, but only the worker whose
	/// `ZREM` actually removes the member wins it, so concurrent workers
	/// racing the same queue never double-claim a task.
	pub async fn try_claim(&self, priority: QueuePriority) -> Result<Option<Task>> {
		let mut conn = self.pool.get().await?;
		let now = Utc::now().timestamp();
		let candidates: Vec<String> = conn
			.zrangebyscore_limit(priority.redis_key(), "-inf", now, 0, 5)
			.await?;
		for id in candidates {
			let removed: i64 = conn.zrem(priority.redis_key(), &id).await?;
			if removed != 1 {
				continue;
			}
			let Some(data): Option<String> = conn.get(Self::task_key(&id)).await? else {
				warn!(task_id = %id, "claimed task had no stored data, dropping");
				continue;
			};
			let task: Task = serde_json::from_str(&data).map_err(QueueError::Decode)?;
			let deadline = now + task.timeout.as_secs() as i64;
			let () = conn.zadd(INFLIGHT_KEY, &id, deadline).await?;
			return Ok(Some(task));
		}
		Ok(None)
	}

	/// Marks a task as successfully completed.
	pub async fn ack(&self, task_id: &str) -> Result<()> {
		let mut conn = self.pool.get().await?;
		let () = conn.zrem(INFLIGHT_KEY, task_id).await?;
		let () = conn.del(Self::task_key(task_id)).await?;
		Ok(())
	}

	/// Reports a task failure. Re-enqueues with exponential backoff if
	/// `retry_count < max_retry`; otherwise declares the task permanently
	/// failed (`spec.md` §4.3).
	pub async fn fail(&self, mut task: Task, error: &str) -> Result<TaskState> {
		let mut conn = self.pool.get().await?;
		let () = conn.zrem(INFLIGHT_KEY, &task.id).await?;

		if task.retry_count < task.max_retry {
			task.retry_count += 1;
			let backoff = Duration::from_secs(2u64.saturating_pow(task.retry_count).min(300));
			task.ready_at = Utc::now() + chrono::Duration::from_std(backoff).unwrap_or_default();
			let data = serde_json::to_string(&task).map_err(QueueError::Encode)?;
			let () = conn.set(Self::task_key(&task.id), data).await?;
			let () = conn.zadd(task.queue.redis_key(), &task.id, task.ready_at.timestamp()).await?;
			warn!(task_id = %task.id, retry_count = task.retry_count, %error, "task failed, retrying");
			Ok(TaskState::Pending)
		} else {
			let () = conn.del(Self::task_key(&task.id)).await?;
			let () = conn.hset(FAILED_KEY, &task.id, error).await?;
			warn!(task_id = %task.id, %error, "task permanently failed after exhausting retries");
			Ok(TaskState::Failed)
		}
	}

	/// Unconditionally marks a task permanently failed, skipping the retry
	/// ladder. Used for non-retryable failures (e.g. a logical refusal from
	/// the identity service) where re-attempting would never succeed.
	pub async fn dead_letter(&self, task: &Task, error: &str) -> Result<()> {
		let mut conn = self.pool.get().await?;
		let () = conn.zrem(INFLIGHT_KEY, &task.id).await?;
		let () = conn.del(Self::task_key(&task.id)).await?;
		let () = conn.hset(FAILED_KEY, &task.id, error).await?;
		warn!(task_id = %task.id, %error, "task dead-lettered without retrying");
		Ok(())
	}

	/// Scans for in-flight tasks whose execution deadline has passed and
	/// returns them so the caller can route them through `fail` (this is how
	/// a broker task timeout becomes a retry per `spec.md` §5).
	pub async fn reap_expired(&self) -> Result<Vec<Task>> {
		let mut conn = self.pool.get().await?;
		let now = Utc::now().timestamp();
		let expired: Vec<String> = conn.zrangebyscore(INFLIGHT_KEY, "-inf", now).await?;
		let mut tasks = Vec::new();
		for id in expired {
			let removed: i64 = conn.zrem(INFLIGHT_KEY, &id).await?;
			if removed != 1 {
				continue;
			}
			if let Some(data) = conn.get::<_, Option<String>>(Self::task_key(&id)).await? {
				if let Ok(task) = serde_json::from_str::<Task>(&data) {
					tasks.push(task);
				}
			}
		}
		Ok(tasks)
	}

	pub async fn task_info(&self, task_id: &str) -> Result<Option<TaskInfo>> {
		let mut conn = self.pool.get().await?;
		if let Some(data) = conn.get::<_, Option<String>>(Self::task_key(task_id)).await? {
			let task: Task = serde_json::from_str(&data).map_err(QueueError::Decode)?;
			let is_inflight: bool = conn.zscore::<_, _, Option<f64>>(INFLIGHT_KEY, task_id).await?.is_some();
			return Ok(Some(TaskInfo {
				id: task.id,
				type_tag: task.type_tag,
				queue: task.queue,
				state: if is_inflight { TaskState::Active } else { TaskState::Pending },
				enqueued_at: task.ready_at,
			}));
		}
		let failed: bool = conn.hexists(FAILED_KEY, task_id).await?;
		if failed {
			return Ok(Some(TaskInfo {
				id: task_id.to_string(),
				type_tag: String::new(),
				queue: QueuePriority::Default,
				state: TaskState::Failed,
				enqueued_at: Utc::now(),
			}));
		}
		Ok(None)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use serde_json::json;

	#[test]
	fn dedup_key_is_stable_for_identical_type_and_payload() {
		let payload = json!({"sync_log_id": "abc"});
		let a = RedisQueue::dedup_key("sync:full", &payload);
		let b = RedisQueue::dedup_key("sync:full", &payload);
		assert_eq!(a, b);
	}

	#[test]
	fn dedup_key_differs_when_payload_differs() {
		let a = RedisQueue::dedup_key("sync:full", &json!({"sync_log_id": "abc"}));
		let b = RedisQueue::dedup_key("sync:full", &json!({"sync_log_id": "def"}));
		assert_ne!(a, b);
	}
}
