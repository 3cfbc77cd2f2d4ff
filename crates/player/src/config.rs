/// Controls the verbose cache lifecycle logs (open, close, preload).
///
/// Warnings and errors are logged regardless of the policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogPolicy {
    #[default]
    Quiet,
    Verbose,
}

impl LogPolicy {
    pub fn cache_events(self) -> bool {
        matches!(self, Self::Verbose)
    }
}

/// Runtime options injected into the playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub log_policy: LogPolicy,
    /// Record a profile sample for every applied snapshot.
    pub profiling: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_policy: LogPolicy::Quiet,
            profiling: true,
        }
    }
}
