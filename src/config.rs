//! Editor session settings.

use std::time::Duration;

use crate::autosave::DEFAULT_QUIET_INTERVAL;
use crate::history::DEFAULT_MAX_HISTORY;

/// How long a notice stays up
pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(3);

/// Knobs for one editor session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorConfig {
    /// Quiet period before a debounced save runs
    pub quiet_interval: Duration,
    pub notice_ttl: Duration,
    /// Undo entries kept, baseline included
    pub max_history: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            quiet_interval: DEFAULT_QUIET_INTERVAL,
            notice_ttl: DEFAULT_NOTICE_TTL,
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

impl EditorConfig {
    pub fn with_quiet_interval(mut self, interval: Duration) -> Self {
        self.quiet_interval = interval;
        self
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history.max(1);
        self
    }
}
