use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored as plain `text` in Postgres (no native enum type), converted at
/// the repository boundary via `FromStr`/`Display`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncStatus {
	Pending,
	Running,
	Completed,
	Failed,
	Cancelled,
}

impl fmt::Display for SyncStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Pending => "PENDING",
			Self::Running => "RUNNING",
			Self::Completed => "COMPLETED",
			Self::Failed => "FAILED",
			Self::Cancelled => "CANCELLED",
		})
	}
}

impl FromStr for SyncStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"PENDING" => Ok(Self::Pending),
			"RUNNING" => Ok(Self::Running),
			"COMPLETED" => Ok(Self::Completed),
			"FAILED" => Ok(Self::Failed),
			"CANCELLED" => Ok(Self::Cancelled),
			other => Err(format!("unknown sync status {other:?}")),
		}
	}
}

impl SyncStatus {
	/// Whether `self -> next` is a legal transition (`spec.md` §3: status
	/// transitions are monotone, PENDING -> RUNNING -> terminal).
	pub fn can_transition_to(self, next: SyncStatus) -> bool {
		use SyncStatus::*;
		matches!(
			(self, next),
			(Pending, Running)
				| (Pending, Cancelled)
				| (Running, Completed)
				| (Running, Failed)
				| (Running, Cancelled)
		)
	}

	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLog {
	pub id: String,
	pub status: SyncStatus,
	pub step: Option<String>,
	pub items_total: Option<i64>,
	pub items_processed: Option<i64>,
	pub progress_pct: Option<f32>,
	pub last_message: Option<String>,
	pub started_at: Option<DateTime<Utc>>,
	pub completed_at: Option<DateTime<Utc>>,
	pub metadata: serde_json::Value,
	pub cancel_requested: bool,
	pub failed_step: Option<String>,
	pub created_at: DateTime<Utc>,
}

/// Patch applied by `SyncLogRepository::update`. `None` fields leave the
/// stored value untouched; `metadata_patch` is merged (not replaced).
#[derive(Debug, Clone, Default)]
pub struct SyncLogUpdate {
	pub status: Option<SyncStatus>,
	pub step: Option<String>,
	pub items_total: Option<i64>,
	pub items_processed: Option<i64>,
	pub error: Option<String>,
	pub failed_step: Option<String>,
	pub metadata_patch: Option<serde_json::Value>,
}

impl SyncLogUpdate {
	pub fn status(status: SyncStatus) -> Self {
		Self { status: Some(status), ..Default::default() }
	}
}
