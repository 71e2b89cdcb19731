//! Three independent refresh loops against the secondary identity service
//! (`spec.md` §4.6). Each is invoked on its own cadence by the scheduler;
//! none are reentrant within a single cadence tick.

mod error;
mod session_cleanup;
mod session_refresh;
mod token_refresh;

pub use error::RefresherError;
pub use session_cleanup::cleanup_stale_sessions;
pub use session_refresh::refresh_due_sessions;
pub use token_refresh::refresh_due_tokens;
