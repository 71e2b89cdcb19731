//! Persistence for sync-run records: status, step, counters, free-form
//! progress metadata, and the cancellation flag (`spec.md` §4.4).

mod error;
mod model;
mod progress;
mod repository;

pub use error::SyncLogError;
pub use model::{SyncLog, SyncLogUpdate, SyncStatus};
pub use progress::ProgressPublisher;
pub use repository::{PgSyncLogRepository, SyncLogRepository};

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn pending_can_only_move_to_running_or_cancelled() {
		assert!(SyncStatus::Pending.can_transition_to(SyncStatus::Running));
		assert!(SyncStatus::Pending.can_transition_to(SyncStatus::Cancelled));
		assert!(!SyncStatus::Pending.can_transition_to(SyncStatus::Completed));
	}

	#[test]
	fn running_can_reach_any_terminal_state() {
		assert!(SyncStatus::Running.can_transition_to(SyncStatus::Completed));
		assert!(SyncStatus::Running.can_transition_to(SyncStatus::Failed));
		assert!(SyncStatus::Running.can_transition_to(SyncStatus::Cancelled));
	}

	#[test]
	fn terminal_states_accept_no_further_transitions() {
		for terminal in [SyncStatus::Completed, SyncStatus::Failed, SyncStatus::Cancelled] {
			for next in [SyncStatus::Pending, SyncStatus::Running, SyncStatus::Completed, SyncStatus::Failed, SyncStatus::Cancelled] {
				assert!(!terminal.can_transition_to(next));
			}
		}
	}

	#[test]
	fn status_round_trips_through_display_and_from_str() {
		use std::str::FromStr;
		for status in [
			SyncStatus::Pending,
			SyncStatus::Running,
			SyncStatus::Completed,
			SyncStatus::Failed,
			SyncStatus::Cancelled,
		] {
			assert_eq!(SyncStatus::from_str(&status.to_string()).unwrap(), status);
		}
	}
}
