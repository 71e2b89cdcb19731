mod cli;
mod handler;

use std::sync::Arc;

use clap::Parser as _;
use color_eyre::eyre::Context as _;
use cli::Cli;
use handler::SyncTaskHandler;
use identity_client::IdentityClient;
use panel_client::PanelClient;
use queue::{RedisQueue, WorkerHost};
use scheduler::{Scheduler, SchedulerConfig};
use sqlx::postgres::PgPoolOptions;
use sync_engine::{SyncEngine, SyncEngineConfig};
use sync_log::PgSyncLogRepository;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
		.with(tracing_subscriber::fmt::layer())
		.init();

	let cli = Cli::parse();

	let pool = PgPoolOptions::new()
		.max_connections(cli::DB_POOL_MAX)
		.min_connections(cli::DB_POOL_MIN)
		.max_lifetime(cli::DB_POOL_MAX_LIFETIME)
		.idle_timeout(cli::DB_POOL_IDLE_TIMEOUT)
		.connect(&cli.database_url)
		.await
		.wrap_err("failed to connect to postgres")?;

	sqlx::migrate!("./migrations")
		.run(&pool)
		.await
		.wrap_err("failed to apply database migrations")?;

	let panel_config = cli.panel_client_config();
	let subusers_enabled = cli.subuser_sync_enabled && panel_config.client_key.is_some();
	let panel = PanelClient::new(panel_config).wrap_err("failed to build panel client")?;
	let identity = IdentityClient::new(&cli.identity_base_url).wrap_err("failed to build identity client")?;
	let queue = RedisQueue::connect(&cli.broker_url).wrap_err("failed to connect to broker")?;
	let sync_log_repo: Arc<dyn sync_log::SyncLogRepository> =
		Arc::new(PgSyncLogRepository::new(pool.clone()));
	let engine = Arc::new(SyncEngine::new(
		pool.clone(),
		panel.clone(),
		Arc::clone(&sync_log_repo),
		SyncEngineConfig { subusers_enabled },
	));

	let mut scheduler = Scheduler::new(
		pool.clone(),
		panel.clone(),
		identity.clone(),
		queue.clone(),
		Arc::clone(&sync_log_repo),
		SchedulerConfig {
			auto_sync_enabled: cli.auto_sync_enabled,
			auto_sync_interval_secs: cli.auto_sync_interval_secs(),
			session_refresh_interval_secs: cli.session_refresh_interval_secs,
		},
	)
	.await
	.wrap_err("failed to build scheduler")?;
	scheduler.start().await.wrap_err("failed to start scheduler")?;

	let handler = Arc::new(SyncTaskHandler { engine, sync_log_repo });
	let host = WorkerHost::new(queue, handler).with_concurrency(cli.worker_concurrency);

	let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
	tokio::spawn(async move {
		let _ = tokio::signal::ctrl_c().await;
		tracing::info!("shutdown signal received");
		let _ = shutdown_tx.send(true);
	});

	host.run(shutdown_rx).await;
	scheduler.stop().await.wrap_err("failed to stop scheduler cleanly")?;

	Ok(())
}
