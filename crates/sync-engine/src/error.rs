#[derive(thiserror::Error, Debug)]
pub enum SyncEngineError {
	#[error("database error during {step}")]
	Database {
		step: &'static str,
		#[source]
		source: sqlx::Error,
	},

	#[error("panel client error during {step}")]
	Panel {
		step: &'static str,
		#[source]
		source: panel_client::PanelClientError,
	},

	#[error("sync log error")]
	SyncLog(#[from] sync_log::SyncLogError),

	/// Cancellation observed at a step checkpoint (`spec.md` §4.5, §8
	/// property 5). Callers that route this through a task queue should
	/// treat it as a successful terminal state, not a failure to retry.
	#[error("Cancelled before {0}")]
	Cancelled(String),
}

impl SyncEngineError {
	pub fn is_retryable(&self) -> bool {
		!matches!(self, Self::Cancelled(_))
	}

	pub fn step_name(&self) -> Option<&str> {
		match self {
			Self::Database { step, .. } => Some(step),
			Self::Panel { step, .. } => Some(step),
			_ => None,
		}
	}
}
