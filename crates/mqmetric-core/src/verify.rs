//! Checks of the reply queue that publications are delivered to.

use std::fmt;

use tracing::warn;

use crate::error::{MonitorError, Result};
use crate::transport::{DefinitionType, Transport};

/// Topics published per queue manager, rounded up.
const QMGR_TOPIC_ALLOWANCE: usize = 20;
/// Topics published per monitored queue, rounded up.
const QUEUE_TOPIC_ALLOWANCE: usize = 5;
/// Publication intervals held per collection interval (10s vs one minute).
const INTERVALS_PER_COLLECTION: usize = 6;

/// Non-fatal outcome of [`verify_reply_queue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigStatus {
    Ok,
    /// The reply queue may fill up before it is drained.
    Warning {
        queue: String,
        max_depth: i32,
        recommended: usize,
    },
}

impl fmt::Display for ConfigStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigStatus::Ok => write!(f, "OK"),
            ConfigStatus::Warning {
                queue,
                max_depth,
                recommended,
            } => write!(
                f,
                "Maximum queue depth on {} may be too low. Current value = {}, recommended = {}",
                queue, max_depth, recommended
            ),
        }
    }
}

/// Depth needed to hold one collection interval of publications.
pub fn recommended_depth(tracked_queues: usize) -> usize {
    (QMGR_TOPIC_ALLOWANCE + tracked_queues * QUEUE_TOPIC_ALLOWANCE) * INTERVALS_PER_COLLECTION
}

/// Checks the reply queue's depth and definition type.
///
/// A predefined reply queue is an error: it would mix command replies with
/// publications.
pub fn verify_reply_queue<T: Transport>(
    transport: &mut T,
    tracked_queues: usize,
) -> Result<ConfigStatus> {
    let attrs = transport.reply_queue_attributes()?;

    if attrs.definition_type == DefinitionType::Predefined {
        return Err(MonitorError::PredefinedReplyQueue(attrs.name));
    }

    let recommended = recommended_depth(tracked_queues);
    let too_shallow = usize::try_from(attrs.max_depth).map_or(true, |d| d < recommended);
    if too_shallow && transport.supports_publications() {
        warn!(
            queue = %attrs.name,
            max_depth = attrs.max_depth,
            recommended,
            "Reply queue depth may be too low"
        );
        return Ok(ConfigStatus::Warning {
            queue: attrs.name,
            max_depth: attrs.max_depth,
            recommended,
        });
    }

    Ok(ConfigStatus::Ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockQueueManager, ReplyQueueSpec};

    fn reply_queue(max_depth: i32, predefined: bool) -> ReplyQueueSpec {
        ReplyQueueSpec {
            name: "MQMETRIC.REPLY".to_string(),
            max_depth,
            predefined,
        }
    }

    #[test]
    fn recommendation_scales_with_queues() {
        assert_eq!(recommended_depth(0), 120);
        assert_eq!(recommended_depth(10), 420);
    }

    #[test]
    fn deep_enough_queue_is_ok() {
        let mut qm = MockQueueManager::typical_queue_manager();
        qm.set_reply_queue(reply_queue(420, false));
        assert_eq!(verify_reply_queue(&mut qm, 10).unwrap(), ConfigStatus::Ok);
    }

    #[test]
    fn shallow_queue_is_a_warning() {
        let mut qm = MockQueueManager::typical_queue_manager();
        qm.set_reply_queue(reply_queue(419, false));

        let status = verify_reply_queue(&mut qm, 10).unwrap();
        assert_eq!(
            status,
            ConfigStatus::Warning {
                queue: "MQMETRIC.REPLY".to_string(),
                max_depth: 419,
                recommended: 420
            }
        );
        assert!(status.to_string().contains("Current value = 419"));
    }

    #[test]
    fn shallow_queue_without_publications_is_ok() {
        let mut qm = MockQueueManager::without_publications();
        qm.set_reply_queue(reply_queue(10, false));
        assert_eq!(verify_reply_queue(&mut qm, 10).unwrap(), ConfigStatus::Ok);
    }

    #[test]
    fn predefined_queue_is_fatal() {
        let mut qm = MockQueueManager::typical_queue_manager();
        qm.set_reply_queue(reply_queue(10, true));

        let err = verify_reply_queue(&mut qm, 10).unwrap_err();
        assert!(matches!(err, MonitorError::PredefinedReplyQueue(name) if name == "MQMETRIC.REPLY"));
    }
}
