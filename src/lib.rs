//! casekit — parameterized, reusable units of investigative logic
//! ("notebooklets") for security analysts.
//!
//! Each notebooklet binds a YAML metadata document (options, keywords,
//! entity types, required providers, display text) to a single `run` entry
//! point. Callers discover notebooklets through the [`registry::Registry`],
//! instantiate them against an immutable [`notebooklet::NotebookEnv`]
//! (provider handles, run configuration, renderer), and receive typed
//! result objects.
//!
//! ```no_run
//! use std::sync::Arc;
//! use casekit::config::RunConfig;
//! use casekit::display::LogRenderer;
//! use casekit::notebooklet::{NotebookEnv, Notebooklet, RunRequest};
//! use casekit::providers::{DataProviders, LocalDataProvider};
//! use casekit::registry::Registry;
//! use casekit::timespan::TimeSpan;
//!
//! # fn main() -> casekit::error::Result<()> {
//! let providers = DataProviders::builder("LocalData", Arc::new(LocalDataProvider::new())).build();
//! let env = Arc::new(NotebookEnv::new(providers, RunConfig::default(), Arc::new(LogRenderer)));
//!
//! let registry = Registry::builtin();
//! let mut nb = registry.create("azsent.host.WinHostEvents", env)?;
//! let result = nb.run(
//!     RunRequest::new()
//!         .with_value("workstation-01")
//!         .with_timespan(TimeSpan::last_days(7)),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod display;
pub mod error;
pub mod metadata;
pub mod nb;
pub mod notebooklet;
pub mod options;
pub mod providers;
pub mod registry;
pub mod table;
pub mod timespan;

pub use config::RunConfig;
pub use error::{CasekitError, Result};
pub use metadata::NotebookletMetadata;
pub use notebooklet::{NotebookEnv, NotebookResult, Notebooklet, RunRequest};
pub use registry::Registry;
pub use table::Table;
pub use timespan::TimeSpan;

// Load env from .env if present; silently ignores a missing file.
pub fn load_env() {
    let _ = dotenvy::dotenv();
}

/// Install a tracing subscriber honoring `RUST_LOG`, for hosts and tests
/// that want log output. Safe to call more than once; later calls are
/// no-ops.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
