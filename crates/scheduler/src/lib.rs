//! Registers the cron-driven jobs named in `spec.md` §4.7: auto-sync,
//! the three refresher loops, log cleanup, and a heartbeat. `Job::new_repeated_async`
//! covers the `@every <N>s` jobs; `Job::new_async` with a six-field cron
//! expression covers the two daily jobs.

mod config;
mod error;

use std::sync::Arc;
use std::time::Duration;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
use identity_client::IdentityClient;
use panel_client::PanelClient;
use queue::{type_tags, CleanupLogsPayload, EnqueueOptions, QueuePriority, RedisQueue, SyncFullPayload};
use sqlx::PgPool;
use sync_log::SyncLogRepository;
use tokio_cron_scheduler::{Job, JobScheduler};

const SESSION_CLEANUP_CRON: &str = "0 0 2 * * *";
const LOG_CLEANUP_CRON: &str = "0 0 3 * * *";
const LOG_RETENTION_DAYS: i64 = 30;

pub struct Scheduler {
	inner: JobScheduler,
	pool: PgPool,
	panel: PanelClient,
	identity: IdentityClient,
	queue: RedisQueue,
	sync_log_repo: Arc<dyn SyncLogRepository>,
	config: SchedulerConfig,
}

impl Scheduler {
	pub async fn new(
		pool: PgPool,
		panel: PanelClient,
		identity: IdentityClient,
		queue: RedisQueue,
		sync_log_repo: Arc<dyn SyncLogRepository>,
		config: SchedulerConfig,
	) -> Result<Self, SchedulerError> {
		let inner = JobScheduler::new().await.map_err(SchedulerError::Build)?;
		Ok(Self { inner, pool, panel, identity, queue, sync_log_repo, config })
	}

	/// Registers every job and begins ticking. Does not block.
	pub async fn start(&mut self) -> Result<(), SchedulerError> {
		if self.config.auto_sync_enabled {
			self.register_auto_sync().await?;
		}
		self.register_token_refresh().await?;
		self.register_session_refresh().await?;
		self.register_session_cleanup().await?;
		self.register_log_cleanup().await?;
		self.register_heartbeat().await?;

		self.inner.start().await.map_err(SchedulerError::Register)
	}

	/// Waits for in-flight job invocations to return, then tears the
	/// scheduler down. The queue client itself is owned by the caller and
	/// closed independently.
	pub async fn stop(&mut self) -> Result<(), SchedulerError> {
		self.inner.shutdown().await.map_err(SchedulerError::Register)
	}

	async fn register_auto_sync(&mut self) -> Result<(), SchedulerError> {
		let interval = self.config.auto_sync_interval_secs.max(1);
		let queue = self.queue.clone();
		let repo = Arc::clone(&self.sync_log_repo);

		let job = Job::new_repeated_async(Duration::from_secs(interval), move |_uuid, _lock| {
			let queue = queue.clone();
			let repo = Arc::clone(&repo);
			Box::pin(async move {
				let sync_log_id = format!("auto-{interval}s");
				if let Err(error) = repo.insert(&sync_log_id).await {
					tracing::warn!(%error, "failed to create sync log row for auto-sync tick");
					return;
				}
				let payload = SyncFullPayload {
					sync_log_id: sync_log_id.clone(),
					requested_by: Some("scheduler".to_string()),
					skip_users: false,
				};
				let opts = EnqueueOptions {
					queue: QueuePriority::Default,
					unique_for: Some(Duration::from_secs(600)),
					..Default::default()
				};
				match serde_json::to_value(&payload) {
					Ok(value) => {
						if let Err(error) = queue.enqueue(type_tags::SYNC_FULL, value, opts).await {
							tracing::debug!(%error, "auto-sync enqueue skipped (likely duplicate within window)");
						}
					}
					Err(error) => tracing::error!(%error, "failed to serialize auto-sync payload"),
				}
			})
		})
		.map_err(SchedulerError::Register)?;

		self.inner.add(job).await.map_err(SchedulerError::Register)?;
		Ok(())
	}

	async fn register_token_refresh(&mut self) -> Result<(), SchedulerError> {
		let pool = self.pool.clone();
		let identity = self.identity.clone();

		let job = Job::new_repeated_async(Duration::from_secs(300), move |_uuid, _lock| {
			let pool = pool.clone();
			let identity = identity.clone();
			Box::pin(async move {
				if let Err(error) = refresher::refresh_due_tokens(&pool, &identity).await {
					tracing::warn!(%error, "token refresh tick failed");
				}
			})
		})
		.map_err(SchedulerError::Register)?;

		self.inner.add(job).await.map_err(SchedulerError::Register)?;
		Ok(())
	}

	async fn register_session_refresh(&mut self) -> Result<(), SchedulerError> {
		let pool = self.pool.clone();
		let identity = self.identity.clone();
		let panel = self.panel.clone();
		let interval = self.config.session_refresh_interval_secs.max(1);

		let job = Job::new_repeated_async(Duration::from_secs(interval), move |_uuid, _lock| {
			let pool = pool.clone();
			let identity = identity.clone();
			let panel = panel.clone();
			Box::pin(async move {
				if let Err(error) = refresher::refresh_due_sessions(&pool, &identity, &panel).await {
					tracing::warn!(%error, "session refresh tick failed");
				}
			})
		})
		.map_err(SchedulerError::Register)?;

		self.inner.add(job).await.map_err(SchedulerError::Register)?;
		Ok(())
	}

	async fn register_session_cleanup(&mut self) -> Result<(), SchedulerError> {
		let pool = self.pool.clone();
		let identity = self.identity.clone();

		let job = Job::new_async(SESSION_CLEANUP_CRON, move |_uuid, _lock| {
			let pool = pool.clone();
			let identity = identity.clone();
			Box::pin(async move {
				match refresher::cleanup_stale_sessions(&pool, &identity).await {
					Ok(removed) => tracing::info!(removed, "session cleanup tick complete"),
					Err(error) => tracing::warn!(%error, "session cleanup tick failed"),
				}
			})
		})
		.map_err(SchedulerError::Register)?;

		self.inner.add(job).await.map_err(SchedulerError::Register)?;
		Ok(())
	}

	async fn register_log_cleanup(&mut self) -> Result<(), SchedulerError> {
		let queue = self.queue.clone();

		let job = Job::new_async(LOG_CLEANUP_CRON, move |_uuid, _lock| {
			let queue = queue.clone();
			Box::pin(async move {
				let payload = CleanupLogsPayload { older_than_days: LOG_RETENTION_DAYS };
				match serde_json::to_value(&payload) {
					Ok(value) => {
						if let Err(error) =
							queue.enqueue(type_tags::CLEANUP_LOGS, value, EnqueueOptions::default()).await
						{
							tracing::warn!(%error, "failed to enqueue log cleanup task");
						}
					}
					Err(error) => tracing::error!(%error, "failed to serialize log cleanup payload"),
				}
			})
		})
		.map_err(SchedulerError::Register)?;

		self.inner.add(job).await.map_err(SchedulerError::Register)?;
		Ok(())
	}

	async fn register_heartbeat(&mut self) -> Result<(), SchedulerError> {
		let job = Job::new_repeated_async(Duration::from_secs(60), move |_uuid, _lock| {
			Box::pin(async move {
				tracing::debug!("scheduler heartbeat");
			})
		})
		.map_err(SchedulerError::Register)?;

		self.inner.add(job).await.map_err(SchedulerError::Register)?;
		Ok(())
	}
}
