use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three target queues a task can be submitted to, dispatched by the
/// worker host at a fixed 6:3:1 weight (`spec.md` §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueuePriority {
	Critical,
	Default,
	Low,
}

impl QueuePriority {
	pub const ALL: [QueuePriority; 3] = [Self::Critical, Self::Default, Self::Low];

	pub fn weight(self) -> u32 {
		match self {
			Self::Critical => 6,
			Self::Default => 3,
			Self::Low => 1,
		}
	}

	pub fn redis_key(self) -> &'static str {
		match self {
			Self::Critical => "queue:critical",
			Self::Default => "queue:default",
			Self::Low => "queue:low",
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Critical => "critical",
			Self::Default => "default",
			Self::Low => "low",
		}
	}
}

/// A task submitted for execution. `type_tag` and `payload` together are the
/// task's identity for uniqueness-window deduplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
	pub id: String,
	pub type_tag: String,
	pub payload: serde_json::Value,
	pub queue: QueuePriority,
	pub max_retry: u32,
	pub retry_count: u32,
	pub timeout: Duration,
	pub ready_at: DateTime<Utc>,
}

/// Options a caller supplies when enqueueing a task.
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
	pub queue: QueuePriority,
	pub max_retry: u32,
	pub timeout: Duration,
	/// Duplicate submissions of the same type+payload are rejected for this
	/// long. `None` disables deduplication.
	pub unique_for: Option<Duration>,
	/// Delays dispatch until this time. `None` means ready immediately.
	pub ready_at: Option<DateTime<Utc>>,
}

impl Default for EnqueueOptions {
	fn default() -> Self {
		Self {
			queue: QueuePriority::Default,
			max_retry: 3,
			timeout: Duration::from_secs(60),
			unique_for: None,
			ready_at: None,
		}
	}
}

/// Returned by `Queue::enqueue`, letting a caller inspect submission state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
	pub id: String,
	pub type_tag: String,
	pub queue: QueuePriority,
	pub state: TaskState,
	pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
	Pending,
	Active,
	Completed,
	Failed,
}

/// The `sync:full` task payload (`spec.md` §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncFullPayload {
	pub sync_log_id: String,
	#[serde(default)]
	pub requested_by: Option<String>,
	#[serde(default)]
	pub skip_users: bool,
}

/// The `sync:<entity>` task payload (`spec.md` §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEntityPayload {
	pub sync_log_id: String,
	#[serde(default)]
	pub parent_id: Option<String>,
}

/// The `cleanup:logs` task payload (`spec.md` §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupLogsPayload {
	pub older_than_days: i64,
}

pub mod type_tags {
	pub const SYNC_FULL: &str = "sync:full";
	pub const SYNC_LOCATIONS: &str = "sync:locations";
	pub const SYNC_NODES: &str = "sync:nodes";
	pub const SYNC_ALLOCATIONS: &str = "sync:allocations";
	pub const SYNC_NESTS: &str = "sync:nests";
	pub const SYNC_SERVERS: &str = "sync:servers";
	pub const SYNC_DATABASES: &str = "sync:databases";
	pub const SYNC_USERS: &str = "sync:users";
	pub const CLEANUP_LOGS: &str = "cleanup:logs";
}
