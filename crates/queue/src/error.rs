#[derive(thiserror::Error, Debug)]
pub enum QueueError {
	#[error("failed to connect to broker")]
	Connection(#[from] deadpool_redis::PoolError),

	#[error("failed to build broker connection pool: {0}")]
	PoolBuild(String),

	#[error("broker command failed")]
	Redis(#[from] redis::RedisError),

	#[error("failed to encode task payload")]
	Encode(#[source] serde_json::Error),

	#[error("failed to decode task payload")]
	Decode(#[source] serde_json::Error),

	#[error("a task with the same type and payload was already submitted within the uniqueness window")]
	DuplicateTask,

	#[error("task {0} was not found (it may have already been acked or reaped)")]
	TaskNotFound(String),
}
