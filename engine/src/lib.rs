//! Civitas client engine.
//!
//! Wires the governance view to the action orchestrator:
//! - [`Engine`]: queries, refreshes, statistics, and `invoke`
//! - [`ActionOrchestrator`]: per-key locked action lifecycle
//! - [`EngineConfig`]: TOML configuration
//! - [`logging`]: tracing subscriber setup

pub mod config;
pub mod engine;
pub mod error;
pub mod lock;
pub mod logging;
pub mod orchestrator;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{ActionError, ConfigError};
pub use lock::{ActionLocks, ActionState, LockGuard};
pub use logging::{init_logging, LogFormat};
pub use orchestrator::{ActionOrchestrator, ActionOutcome, PendingAction, RefreshStatus};
