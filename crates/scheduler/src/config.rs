/// Scheduler job configuration (`spec.md` §4.7, §6).
///
/// **Open question resolution** (`spec.md` §9): the source carried both a
/// 5-minute and a 10-minute cadence for session refresh. Both are kept as
/// permissible, configurable values; this struct defaults to 5 minutes and
/// `session_refresh_interval_secs` is the knob that selects the 10-minute
/// variant when an operator configures it.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
	pub auto_sync_enabled: bool,
	/// Minimum 1s; enforced in [`crate::Scheduler::start`].
	pub auto_sync_interval_secs: u64,
	pub session_refresh_interval_secs: u64,
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		Self {
			auto_sync_enabled: false,
			auto_sync_interval_secs: 3600,
			session_refresh_interval_secs: 300,
		}
	}
}
