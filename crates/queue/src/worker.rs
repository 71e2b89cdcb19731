use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

use crate::redis_queue::RedisQueue;
use crate::round_robin::WeightedDispatch;
use crate::task::Task;

/// Outcome of routing a claimed task to its handler.
#[derive(Debug)]
pub struct TaskHandlerError {
	pub message: String,
	pub retryable: bool,
}

impl TaskHandlerError {
	pub fn retryable(message: impl Into<String>) -> Self {
		Self { message: message.into(), retryable: true }
	}

	pub fn permanent(message: impl Into<String>) -> Self {
		Self { message: message.into(), retryable: false }
	}
}

/// Implemented by whatever routes a task by its `type_tag` to the right
/// subsystem (the Sync Engine's full-sync/per-entity handlers, or log
/// cleanup). Kept as a trait so the worker host stays decoupled from the
/// sync engine crate.
#[async_trait]
pub trait TaskHandler: Send + Sync {
	async fn handle(&self, task: &Task) -> Result<(), TaskHandlerError>;
}

/// Pulls tasks from the durable queue and routes them by type, observing a
/// fixed concurrency limit and the priority queues' 6:3:1 dispatch weight
/// (`spec.md` §4.3, §5).
pub struct WorkerHost {
	queue: RedisQueue,
	handler: Arc<dyn TaskHandler>,
	concurrency: usize,
	poll_interval: Duration,
	reap_interval: Duration,
}

impl WorkerHost {
	pub fn new(queue: RedisQueue, handler: Arc<dyn TaskHandler>) -> Self {
		Self {
			queue,
			handler,
			concurrency: 10,
			poll_interval: Duration::from_millis(250),
			reap_interval: Duration::from_secs(30),
		}
	}

	pub fn with_concurrency(mut self, concurrency: usize) -> Self {
		self.concurrency = concurrency;
		self
	}

	/// Runs until `shutdown` resolves. Every in-flight task executor is
	/// awaited before returning, so a cancelled run never drops a task
	/// mid-execution without it being reaped later by another host.
	pub async fn run(self, shutdown: tokio::sync::watch::Receiver<bool>) {
		let dispatch = Arc::new(Mutex::new(WeightedDispatch::new()));
		let mut executors = Vec::with_capacity(self.concurrency);
		for worker_idx in 0..self.concurrency {
			let queue = self.queue.clone();
			let handler = Arc::clone(&self.handler);
			let dispatch = Arc::clone(&dispatch);
			let poll_interval = self.poll_interval;
			let mut shutdown = shutdown.clone();
			executors.push(tokio::spawn(async move {
				loop {
					if *shutdown.borrow() {
						return;
					}
					let priority = dispatch.lock().await.next();
					match queue.try_claim(priority).await {
						Ok(Some(task)) => {
							run_one(&queue, handler.as_ref(), task).await;
						}
						Ok(None) => {
							tokio::select! {
								_ = tokio::time::sleep(poll_interval) => {}
								_ = shutdown.changed() => {}
							}
						}
						Err(err) => {
							error!(worker_idx, %err, "failed to claim task");
							tokio::time::sleep(poll_interval).await;
						}
					}
				}
			}));
		}

		let reap_handle = {
			let queue = self.queue.clone();
			let reap_interval = self.reap_interval;
			let mut shutdown = shutdown.clone();
			tokio::spawn(async move {
				let mut ticker = tokio::time::interval(reap_interval);
				loop {
					tokio::select! {
						_ = ticker.tick() => {
							reap_once(&queue).await;
						}
						_ = shutdown.changed() => {
							if *shutdown.borrow() {
								return;
							}
						}
					}
				}
			})
		};

		for executor in executors {
			let _ = executor.await;
		}
		let _ = reap_handle.await;
	}
}

#[instrument(skip(queue, handler, task), fields(task_id = %task.id, type_tag = %task.type_tag))]
async fn run_one(queue: &RedisQueue, handler: &dyn TaskHandler, task: Task) {
	match handler.handle(&task).await {
		Ok(()) => {
			if let Err(err) = queue.ack(&task.id).await {
				error!(%err, "failed to ack completed task");
			}
			info!("task completed");
		}
		Err(outcome) if outcome.retryable => {
			if let Err(err) = queue.fail(task, &outcome.message).await {
				error!(%err, "failed to record task failure");
			}
		}
		Err(outcome) => {
			if let Err(err) = queue.dead_letter(&task, &outcome.message).await {
				error!(%err, "failed to dead-letter task");
			}
		}
	}
}

async fn reap_once(queue: &RedisQueue) {
	let expired = match queue.reap_expired().await {
		Ok(tasks) => tasks,
		Err(err) => {
			error!(%err, "failed to scan for expired in-flight tasks");
			return;
		}
	};
	for task in expired {
		if let Err(err) = queue.fail(task, "execution deadline exceeded").await {
			error!(%err, "failed to requeue timed-out task");
		}
	}
}
