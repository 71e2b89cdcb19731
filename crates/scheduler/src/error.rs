#[derive(thiserror::Error, Debug)]
pub enum SchedulerError {
	#[error("failed to build job scheduler")]
	Build(#[source] tokio_cron_scheduler::JobSchedulerError),

	#[error("failed to register job")]
	Register(#[source] tokio_cron_scheduler::JobSchedulerError),

	#[error("invalid cron/interval configuration: {0}")]
	InvalidSchedule(String),
}
