#[derive(thiserror::Error, Debug)]
pub enum SyncLogError {
	#[error("database error")]
	Database(#[from] sqlx::Error),

	#[error("sync log {0} was not found")]
	NotFound(String),

	#[error("illegal status transition for sync log {id}: {from} -> {to}")]
	IllegalTransition { id: String, from: String, to: String },
}
