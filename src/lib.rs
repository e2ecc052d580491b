//! medicai-core — the engine behind the MedicAI health assistant.
//!
//! Local-first stores (chat threads, medications/reminders, settings)
//! persisted as whole JSON documents, remote data-access services over the
//! hosted backend, an assistant reply chain with tiered fallback, and the
//! bridge that turns reminders into platform alarm registrations. All
//! visual presentation lives in the host application.

pub mod config;
pub mod core_state;
pub mod models;
pub mod remote;
pub mod scheduler;
pub mod store;
pub mod validation;

pub use config::{AppConfig, ConfigError};
pub use core_state::CoreState;

use tracing_subscriber::EnvFilter;

/// Initialize structured logging for the host process. `RUST_LOG`
/// overrides the default filter.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}
