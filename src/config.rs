//! Run-time configuration for notebooklet execution.
//!
//! Configuration is an explicit value passed into the notebooklet
//! environment, not process-global state. The two switches mirror the
//! behaviors every notebooklet must honor: `silent` suppresses all display
//! output (enforced centrally by [`crate::display::DisplayHandle`]), and
//! `verbose` turns on progress messages.

use serde::{Deserialize, Serialize};

/// Execution switches shared by every notebooklet bound to one environment
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// Suppress all display-collaborator calls
    pub silent: bool,
    /// Emit progress messages while steps execute
    pub verbose: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            silent: false,
            verbose: true,
        }
    }
}

impl RunConfig {
    /// Load configuration from environment variables.
    ///
    /// - `CASEKIT_SILENT=1|true` enables silent mode
    /// - `CASEKIT_VERBOSE=0|false` disables progress messages
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(silent) = std::env::var("CASEKIT_SILENT")
            && (silent == "1" || silent.eq_ignore_ascii_case("true"))
        {
            config.silent = true;
        }
        if let Ok(verbose) = std::env::var("CASEKIT_VERBOSE") {
            if verbose == "0" || verbose.eq_ignore_ascii_case("false") {
                config.verbose = false;
            } else if verbose == "1" || verbose.eq_ignore_ascii_case("true") {
                config.verbose = true;
            }
        }
        config
    }

    /// Builder-style override for silent mode
    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Builder-style override for verbose mode
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_loud() {
        let config = RunConfig::default();
        assert!(!config.silent);
        assert!(config.verbose);
    }

    #[test]
    fn builder_overrides() {
        let config = RunConfig::default().with_silent(true).with_verbose(false);
        assert!(config.silent);
        assert!(!config.verbose);
    }
}
