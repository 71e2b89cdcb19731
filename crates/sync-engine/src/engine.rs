use std::sync::Arc;
use std::time::Duration;

use panel_client::PanelClient;
use sqlx::PgPool;
use sync_log::{ProgressPublisher, SyncLogRepository, SyncLogUpdate, SyncStatus};

use crate::error::SyncEngineError;
use crate::reconcile::{allocations, locations, nests, nodes, server_databases, servers, subusers, users};
use crate::step::SyncStep;
use crate::webhook::{self, SyncOutcome, WebhookUrlCache};

/// A single reconciliation target for the `sync:<entity>` task family
/// (`spec.md` §6), run independently of the full-sync step ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEntity {
	Locations,
	Nodes,
	Allocations,
	Nests,
	Servers,
	Databases,
	Users,
}

impl SyncEntity {
	fn step_name(self) -> &'static str {
		match self {
			Self::Locations => "locations",
			Self::Nodes => "nodes",
			Self::Allocations => "allocations",
			Self::Nests => "nests",
			Self::Servers => "servers",
			Self::Databases => "databases",
			Self::Users => "users",
		}
	}
}

pub struct SyncEngineConfig {
	/// Gate for the subusers step: requires both a client API key on the
	/// panel client and this flag, per `spec.md` §4.5.
	pub subusers_enabled: bool,
}

/// Orchestrates the ordered full-sync state machine: per-entity
/// reconcilers, cancellation checkpoints between steps, and a terminal
/// webhook fan-out (`spec.md` §4.5).
pub struct SyncEngine {
	pool: PgPool,
	panel: PanelClient,
	repo: Arc<dyn SyncLogRepository>,
	progress: ProgressPublisher,
	webhook_http: reqwest::Client,
	webhook_cache: WebhookUrlCache,
	config: SyncEngineConfig,
}

impl SyncEngine {
	pub fn new(
		pool: PgPool,
		panel: PanelClient,
		repo: Arc<dyn SyncLogRepository>,
		config: SyncEngineConfig,
	) -> Self {
		let progress = ProgressPublisher::new(Arc::clone(&repo));
		let webhook_cache = WebhookUrlCache::new(pool.clone());
		let webhook_http = reqwest::Client::builder()
			.timeout(Duration::from_secs(10))
			.build()
			.expect("static client configuration is always valid");
		Self { pool, panel, repo, progress, webhook_http, webhook_cache, config }
	}

	/// Runs every step in `SyncStep::ORDER`, checking `cancel_requested`
	/// before each one. `skip_users` skips the users step only (per the
	/// `sync:full` payload in `spec.md` §6); owner resolution then falls
	/// back to whatever local users already exist.
	#[tracing::instrument(skip(self), fields(sync_log_id))]
	pub async fn run_full_sync(
		&self,
		sync_log_id: &str,
		skip_users: bool,
	) -> Result<(), SyncEngineError> {
		self.repo.update(sync_log_id, SyncLogUpdate::status(SyncStatus::Running)).await?;

		let mut items_processed_total: u64 = 0;
		let mut cancelled_before: Option<&'static str> = None;
		let mut failure: Option<(&'static str, SyncEngineError)> = None;

		for step in SyncStep::ORDER {
			if step == SyncStep::Users && skip_users {
				continue;
			}

			if self.repo.is_cancelled(sync_log_id).await? {
				cancelled_before = Some(step.name());
				break;
			}

			self.progress.step_entered(sync_log_id, step.name()).await?;

			match self.run_step(step, sync_log_id).await {
				Ok(processed) => {
					items_processed_total += processed;
					self.progress.step_completed(sync_log_id, step.name(), processed).await?;
				}
				Err(error) if step.is_best_effort() => {
					tracing::warn!(step = step.name(), %error, "best-effort step failed, run continues");
				}
				Err(error) => {
					failure = Some((step.name(), error));
					break;
				}
			}
		}

		let status = if failure.is_some() {
			SyncStatus::Failed
		} else if cancelled_before.is_some() {
			SyncStatus::Cancelled
		} else {
			SyncStatus::Completed
		};

		let mut update = SyncLogUpdate::status(status);
		update.items_processed = Some(items_processed_total as i64);
		if let Some((step_name, error)) = &failure {
			update.failed_step = Some(step_name.to_string());
			update.error = Some(error.to_string());
		}
		self.repo.update(sync_log_id, update).await?;

		webhook::fan_out(
			&self.webhook_http,
			&self.webhook_cache,
			SyncOutcome {
				sync_log_id,
				status: match status {
					SyncStatus::Completed => "COMPLETED",
					SyncStatus::Failed => "FAILED",
					_ => "CANCELLED",
				},
				items_processed: Some(items_processed_total as i64),
				failed_step: failure.as_ref().map(|(s, _)| *s),
			},
		)
		.await;

		if let Some((step_name, error)) = failure {
			tracing::error!(step = step_name, %error, "full sync ended FAILED");
			return Ok(());
		}
		if let Some(step_name) = cancelled_before {
			return Err(SyncEngineError::Cancelled(step_name.to_string()));
		}
		Ok(())
	}

	/// Runs one reconciler outside the full-sync ordering, for a
	/// `sync:<entity>` task. Updates the sync-log to RUNNING, then to
	/// COMPLETED/FAILED, but does not trigger the webhook fan-out — that's
	/// specified only for full-sync terminal states (`spec.md` §4.5).
	#[tracing::instrument(skip(self), fields(sync_log_id))]
	pub async fn run_single_entity(
		&self,
		entity: SyncEntity,
		sync_log_id: &str,
	) -> Result<(), SyncEngineError> {
		self.repo.update(sync_log_id, SyncLogUpdate::status(SyncStatus::Running)).await?;
		let step_name = entity.step_name();
		self.progress.step_entered(sync_log_id, step_name).await?;

		let result = match entity {
			SyncEntity::Locations => {
				locations::sync_locations(&self.pool, &self.panel, &self.progress, sync_log_id).await
			}
			SyncEntity::Nodes => nodes::sync_nodes(&self.pool, &self.panel, &self.progress, sync_log_id).await,
			SyncEntity::Allocations => {
				allocations::sync_allocations(&self.pool, &self.panel, &self.progress, sync_log_id).await
			}
			SyncEntity::Nests => nests::sync_nests(&self.pool, &self.panel, &self.progress, sync_log_id).await,
			SyncEntity::Servers => {
				servers::sync_servers(&self.pool, &self.panel, &self.progress, sync_log_id).await
			}
			SyncEntity::Databases => {
				server_databases::sync_server_databases(&self.pool, &self.panel, &self.progress, sync_log_id).await
			}
			SyncEntity::Users => users::sync_users(&self.pool, &self.panel, &self.progress, sync_log_id).await,
		};

		let mut update = match &result {
			Ok(processed) => {
				self.progress.step_completed(sync_log_id, step_name, *processed).await?;
				let mut update = SyncLogUpdate::status(SyncStatus::Completed);
				update.items_processed = Some(*processed as i64);
				update
			}
			Err(error) => {
				let mut update = SyncLogUpdate::status(SyncStatus::Failed);
				update.failed_step = Some(step_name.to_string());
				update.error = Some(error.to_string());
				update
			}
		};
		update.step = Some(step_name.to_string());
		self.repo.update(sync_log_id, update).await?;

		result.map(|_| ())
	}

	async fn run_step(&self, step: SyncStep, sync_log_id: &str) -> Result<u64, SyncEngineError> {
		match step {
			SyncStep::Locations => {
				locations::sync_locations(&self.pool, &self.panel, &self.progress, sync_log_id).await
			}
			SyncStep::Nodes => {
				nodes::sync_nodes(&self.pool, &self.panel, &self.progress, sync_log_id).await
			}
			SyncStep::Allocations => {
				allocations::sync_allocations(&self.pool, &self.panel, &self.progress, sync_log_id).await
			}
			SyncStep::NestsEggsVariables => {
				nests::sync_nests(&self.pool, &self.panel, &self.progress, sync_log_id).await
			}
			SyncStep::Users => {
				users::sync_users(&self.pool, &self.panel, &self.progress, sync_log_id).await
			}
			SyncStep::Servers => {
				servers::sync_servers(&self.pool, &self.panel, &self.progress, sync_log_id).await
			}
			SyncStep::Subusers => {
				subusers::sync_subusers(
					&self.pool,
					&self.panel,
					&self.progress,
					sync_log_id,
					self.config.subusers_enabled,
				)
				.await
			}
		}
	}
}
