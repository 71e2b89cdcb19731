use std::time::Duration;

/// Worker configuration, read from the environment (`spec.md` §6). Mirrors
/// the thin `clap::Parser` shape `identity_server::Cli` uses.
#[derive(clap::Parser, Debug)]
pub struct Cli {
	#[clap(long, env)]
	pub database_url: String,

	#[clap(long, env)]
	pub broker_url: String,

	#[clap(long, env)]
	pub panel_base_url: String,
	#[clap(long, env)]
	pub panel_application_key: String,
	#[clap(long, env)]
	pub panel_client_key: Option<String>,

	#[clap(long, env)]
	pub access_gateway_client_id: Option<String>,
	#[clap(long, env)]
	pub access_gateway_client_secret: Option<String>,

	#[clap(long, env)]
	pub identity_base_url: String,

	#[clap(long, env, default_value_t = false)]
	pub auto_sync_enabled: bool,
	/// Minutes, matching the source's env-as-minutes convention
	/// (`spec.md` §9 open question); converted to seconds at startup.
	#[clap(long, env, default_value_t = 60)]
	pub auto_sync_interval_minutes: u64,

	#[clap(long, env, default_value_t = false)]
	pub subuser_sync_enabled: bool,

	#[clap(long, env, default_value_t = 300)]
	pub session_refresh_interval_secs: u64,

	#[clap(long, env, default_value_t = 10)]
	pub worker_concurrency: usize,
}

impl Cli {
	pub fn auto_sync_interval_secs(&self) -> u64 {
		(self.auto_sync_interval_minutes * 60).max(1)
	}

	pub fn panel_client_config(&self) -> panel_client::PanelClientConfig {
		let access_gateway = match (&self.access_gateway_client_id, &self.access_gateway_client_secret) {
			(Some(client_id), Some(client_secret)) => Some(panel_client::AccessGatewayHeaders {
				client_id: client_id.clone(),
				client_secret: client_secret.clone(),
			}),
			_ => None,
		};
		panel_client::PanelClientConfig {
			base_url: self.panel_base_url.clone(),
			application_key: self.panel_application_key.clone(),
			client_key: self.panel_client_key.clone(),
			access_gateway,
		}
	}
}

// sqlx has no separate healthcheck-interval knob; `test_before_acquire`
// (on by default) pings a connection before handing it out, which covers
// the same concern named in `spec.md` §5 ("1m healthcheck").
pub const DB_POOL_MAX: u32 = 25;
pub const DB_POOL_MIN: u32 = 5;
pub const DB_POOL_MAX_LIFETIME: Duration = Duration::from_secs(3600);
pub const DB_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(1800);

#[cfg(test)]
mod test {
	use super::*;

	fn base_cli() -> Cli {
		Cli {
			database_url: "postgres://localhost/panel_sync".into(),
			broker_url: "localhost:6379".into(),
			panel_base_url: "https://panel.example.com".into(),
			panel_application_key: "app-key".into(),
			panel_client_key: None,
			access_gateway_client_id: None,
			access_gateway_client_secret: None,
			identity_base_url: "https://identity.example.com".into(),
			auto_sync_enabled: false,
			auto_sync_interval_minutes: 60,
			subuser_sync_enabled: false,
			session_refresh_interval_secs: 300,
			worker_concurrency: 10,
		}
	}

	#[test]
	fn auto_sync_interval_converts_minutes_to_seconds() {
		let cli = Cli { auto_sync_interval_minutes: 5, ..base_cli() };
		assert_eq!(cli.auto_sync_interval_secs(), 300);
	}

	#[test]
	fn auto_sync_interval_never_rounds_down_to_zero() {
		let cli = Cli { auto_sync_interval_minutes: 0, ..base_cli() };
		assert_eq!(cli.auto_sync_interval_secs(), 1);
	}

	#[test]
	fn access_gateway_requires_both_id_and_secret() {
		let cli = Cli {
			access_gateway_client_id: Some("id".into()),
			access_gateway_client_secret: None,
			..base_cli()
		};
		assert!(cli.panel_client_config().access_gateway.is_none());

		let cli = Cli {
			access_gateway_client_id: Some("id".into()),
			access_gateway_client_secret: Some("secret".into()),
			..base_cli()
		};
		assert!(cli.panel_client_config().access_gateway.is_some());
	}
}
