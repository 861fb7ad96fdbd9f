//! The set of monitored queues and how it is resolved from patterns.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::error::{MonitorError, Result};
use crate::inquire::{inquire_objects, inquire_queue_attributes};
use crate::pcf::constants::MQOT_Q;
use crate::selector::{filter_patterns, split_patterns};
use crate::transport::{PcfCodec, Transport};

/// Max depth assumed until the queue's real attributes are inquired.
pub const DEFAULT_MAX_DEPTH: i32 = 5000;

/// What is known about one monitored queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityInfo {
    pub max_depth: i32,
    pub usage: i32,
    /// Cleared at the start of a rediscovery pass, set again if still selected.
    pub(crate) exists: bool,
    /// Set when a subscription was just (re)created for this queue.
    pub(crate) first_collection: bool,
}

impl Default for EntityInfo {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            usage: 0,
            exists: false,
            first_collection: false,
        }
    }
}

impl EntityInfo {
    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn first_collection(&self) -> bool {
        self.first_collection
    }
}

/// Monitored queues by name.
#[derive(Debug, Clone, Default)]
pub struct TrackedQueues {
    entries: BTreeMap<String, EntityInfo>,
}

impl TrackedQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&EntityInfo> {
        self.entries.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut EntityInfo> {
        self.entries.get_mut(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntityInfo)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Marks a queue as selected, creating its entry on first sight.
    pub(crate) fn track(&mut self, name: &str) -> &mut EntityInfo {
        let info = self.entries.entry(name.to_string()).or_default();
        info.exists = true;
        info
    }

    pub(crate) fn mark_all_absent(&mut self) {
        for info in self.entries.values_mut() {
            info.exists = false;
        }
    }

    /// Undoes [`Self::mark_all_absent`] after a failed resolution.
    pub(crate) fn mark_all_present(&mut self) {
        for info in self.entries.values_mut() {
            info.exists = true;
        }
    }

    /// Drops queues that were not selected again, returning their names.
    pub(crate) fn remove_absent(&mut self) -> Vec<String> {
        let absent: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, info)| !info.exists)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &absent {
            self.entries.remove(name);
        }
        absent
    }

    pub(crate) fn clear_first_collection(&mut self) {
        for info in self.entries.values_mut() {
            info.first_collection = false;
        }
    }
}

/// Expands the monitored-queue pattern list into tracked queues.
///
/// A list containing `!` is resolved by inquiring every local queue and
/// filtering locally; otherwise each pattern is sent to the server. With
/// `check_queue_list == false` the names are taken as given.
pub fn resolve_monitored_queues<T: Transport, C: PcfCodec>(
    transport: &mut T,
    codec: &C,
    queues: &mut TrackedQueues,
    patterns: &str,
    check_queue_list: bool,
    use_status: bool,
) -> Result<()> {
    if !check_queue_list {
        for name in split_patterns(patterns) {
            queues.track(name);
        }
        return Ok(());
    }

    let using_negation = patterns.contains('!');
    let selected = if using_negation {
        let all = inquire_objects(transport, codec, "*", MQOT_Q)?;
        let selected = filter_patterns(patterns, &all.names);
        if selected.is_empty() {
            warn!(patterns = %patterns, "No queues match the monitored queue patterns");
        }
        selected
    } else {
        let inquiry = inquire_objects(transport, codec, patterns, MQOT_Q)?;
        if !inquiry.missing.is_empty() {
            let missing = inquiry.missing.join(", ");
            if inquiry.names.is_empty() {
                return Err(MonitorError::NoMatchingObjects {
                    patterns: missing,
                    object_type: MQOT_Q,
                });
            }
            warn!(patterns = %missing, "No queues match some monitored queue patterns");
        }
        inquiry.names
    };

    for name in &selected {
        queues.track(name);
    }
    info!(queues = selected.len(), "Resolved monitored queues");

    if use_status && !selected.is_empty() {
        let lookups: Vec<&str> = if using_negation {
            selected.iter().map(String::as_str).collect()
        } else {
            split_patterns(patterns).collect()
        };
        for pattern in lookups {
            refresh_attributes(transport, codec, queues, pattern);
        }
    }

    Ok(())
}

fn refresh_attributes<T: Transport, C: PcfCodec>(
    transport: &mut T,
    codec: &C,
    queues: &mut TrackedQueues,
    pattern: &str,
) {
    match inquire_queue_attributes(transport, codec, pattern) {
        Ok(attrs) => {
            for attr in attrs {
                if let Some(info) = queues.get_mut(&attr.name) {
                    info.max_depth = attr.max_depth;
                    info.usage = attr.usage;
                    debug!(queue = %attr.name, max_depth = attr.max_depth, "Queue attributes");
                }
            }
        }
        Err(e) => warn!(pattern = %pattern, error = %e, "Queue attribute inquiry failed"),
    }
}
