//! Abstraction over a Redis broker providing typed tasks with priority
//! queues, per-task retry bounds, per-task timeout, uniqueness windows, and
//! delayed dispatch (`spec.md` §4.3).

mod connection;
mod error;
mod redis_queue;
mod round_robin;
mod task;
mod worker;

pub use connection::normalize_broker_url;
pub use error::QueueError;
pub use redis_queue::RedisQueue;
pub use round_robin::WeightedDispatch;
pub use task::{
	type_tags, CleanupLogsPayload, EnqueueOptions, QueuePriority, SyncEntityPayload,
	SyncFullPayload, Task, TaskInfo, TaskState,
};
pub use worker::{TaskHandler, TaskHandlerError, WorkerHost};
