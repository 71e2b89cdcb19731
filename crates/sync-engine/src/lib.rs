pub mod engine;
pub mod error;
pub mod reconcile;
pub mod step;
pub mod webhook;

pub use engine::{SyncEngine, SyncEngineConfig, SyncEntity};
pub use error::SyncEngineError;
pub use step::SyncStep;
