//! Monitor configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PatternError;
use crate::selector::{read_patterns, verify_queue_patterns};

/// What to monitor and how.
///
/// Deserializes from partial documents; missing fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Queue pattern list, e.g. `APP*,!APP.TEMP*`.
    pub monitored_queues: String,
    /// File with one pattern per line, used when `monitored_queues` is empty.
    pub monitored_queues_file: Option<PathBuf>,
    /// Expand patterns through the command server. When false the list is
    /// taken as literal queue names.
    pub check_queue_list: bool,
    /// Replaces `$SYS/MQ` at the start of metadata topics.
    pub meta_prefix: Option<String>,
    /// Locale for translated element descriptions, e.g. `fr_FR`.
    pub locale: Option<String>,
    /// Inquire max depth and usage of monitored queues.
    pub use_status: bool,
    /// Seconds between queue rediscoveries; 0 disables rediscovery.
    pub rediscovery_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            monitored_queues: String::new(),
            monitored_queues_file: None,
            check_queue_list: true,
            meta_prefix: None,
            locale: None,
            use_status: false,
            rediscovery_interval_secs: 0,
        }
    }
}

impl MonitorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_monitored_queues(mut self, patterns: impl Into<String>) -> Self {
        self.monitored_queues = patterns.into();
        self
    }

    pub fn with_monitored_queues_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.monitored_queues_file = Some(path.into());
        self
    }

    pub fn with_check_queue_list(mut self, check: bool) -> Self {
        self.check_queue_list = check;
        self
    }

    pub fn with_meta_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.meta_prefix = Some(prefix.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_use_status(mut self, use_status: bool) -> Self {
        self.use_status = use_status;
        self
    }

    pub fn with_rediscovery_interval(mut self, interval: Duration) -> Self {
        self.rediscovery_interval_secs = interval.as_secs();
        self
    }

    /// Metadata prefix, ignoring an empty string.
    pub fn meta_prefix(&self) -> Option<&str> {
        self.meta_prefix.as_deref().filter(|p| !p.is_empty())
    }

    /// Locale, ignoring an empty string.
    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref().filter(|l| !l.is_empty())
    }

    pub fn rediscovery_interval(&self) -> Option<Duration> {
        (self.rediscovery_interval_secs > 0)
            .then(|| Duration::from_secs(self.rediscovery_interval_secs))
    }

    /// Returns the effective queue pattern list after checking its syntax.
    ///
    /// Reads the pattern file when no list was given inline.
    pub fn validate(&self) -> Result<String, PatternError> {
        let patterns = match &self.monitored_queues_file {
            Some(path) if self.monitored_queues.trim().is_empty() => read_patterns(path)?,
            _ => self.monitored_queues.clone(),
        };
        verify_queue_patterns(&patterns)?;
        Ok(patterns)
    }
}
