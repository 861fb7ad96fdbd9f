//! Draining resource publications into the catalog.
//!
//! A publication carries a few context parameters (queue manager, object
//! name, class, type, interval) followed by integer parameters whose
//! parameter number is the element index.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, trace, warn};

use crate::catalog::{MetricCatalog, ObjectKey};
use crate::error::Result;
use crate::pcf::constants::*;
use crate::pcf::{Response, parse_response};
use crate::queues::TrackedQueues;
use crate::transport::{PcfCodec, ReplySource, Transport};

/// Counters for one drain of the notification queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub messages: usize,
    pub samples_applied: usize,
    /// Samples dropped for first collection or for queues no longer tracked.
    pub samples_discarded: usize,
    /// Messages that could not be decoded and were skipped.
    pub malformed: usize,
}

#[derive(Debug, Default)]
struct Publication {
    object: Option<String>,
    class: Option<i32>,
    type_index: Option<i32>,
    samples: BTreeMap<i32, i64>,
}

impl Publication {
    fn read(response: &Response) -> Self {
        let mut publication = Publication::default();
        for scalar in response.scalars() {
            match scalar.parameter {
                MQCA_Q_MGR_NAME
                | MQIACF_OBJECT_TYPE
                | MQIAMO64_MONITOR_INTERVAL
                | MQIAMO_MONITOR_FLAGS => {}
                MQCA_Q_NAME | MQCA_TOPIC_NAME => {
                    publication.object = scalar
                        .string()
                        .filter(|name| !name.is_empty())
                        .map(String::from);
                }
                MQIAMO_MONITOR_CLASS => publication.class = scalar.int().map(|v| v as i32),
                MQIAMO_MONITOR_TYPE => publication.type_index = scalar.int().map(|v| v as i32),
                element => {
                    if let Some(value) = scalar.int() {
                        publication.samples.insert(element, value);
                    }
                }
            }
        }
        publication
    }
}

/// Reads every waiting publication and folds its samples into the catalog.
///
/// Ends when the notification queue is empty; first-collection flags are
/// cleared only after such a clean drain. A message that does not decode is
/// skipped and counted. Any other receive failure aborts the cycle.
pub fn process_publications<T: Transport, C: PcfCodec>(
    transport: &mut T,
    codec: &C,
    catalog: &mut MetricCatalog,
    queues: &mut TrackedQueues,
) -> Result<CycleStats> {
    let mut stats = CycleStats::default();
    if !transport.supports_publications() {
        return Ok(stats);
    }

    let mut discarded_types = HashSet::new();
    loop {
        let data = match transport.receive(ReplySource::Notifications, false) {
            Ok(data) => data,
            Err(e) if e.is_no_message() => break,
            Err(e) => return Err(e.into()),
        };
        stats.messages += 1;

        let response = match parse_response(codec, &data) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, bytes = data.len(), "Skipping malformed publication");
                stats.malformed += 1;
                continue;
            }
        };
        apply(
            Publication::read(&response),
            catalog,
            queues,
            &mut discarded_types,
            &mut stats,
        );
    }

    queues.clear_first_collection();
    debug!(
        messages = stats.messages,
        applied = stats.samples_applied,
        discarded = stats.samples_discarded,
        malformed = stats.malformed,
        "Processed publications"
    );
    Ok(stats)
}

fn apply(
    publication: Publication,
    catalog: &mut MetricCatalog,
    queues: &TrackedQueues,
    discarded_types: &mut HashSet<(String, i32, i32)>,
    stats: &mut CycleStats,
) {
    let Publication {
        object,
        class,
        type_index,
        samples,
    } = publication;

    let (Some(class), Some(type_index)) = (class, type_index) else {
        trace!("Publication without class or type");
        return;
    };
    let Some(type_node) = catalog
        .classes
        .get_mut(&class)
        .and_then(|c| c.types.get_mut(&type_index))
    else {
        trace!(class, type_index, "Publication for unknown type");
        return;
    };

    let key = match object {
        None => ObjectKey::QueueManager,
        Some(name) => match queues.get(&name) {
            Some(info) if info.exists => {
                // One discard per queue and type after (re)subscribing: the
                // first message may hold a running total.
                if info.first_collection
                    && discarded_types.insert((name.clone(), class, type_index))
                {
                    stats.samples_discarded += samples.len();
                    return;
                }
                ObjectKey::Object(name)
            }
            _ => {
                trace!(queue = %name, "Publication for untracked queue");
                stats.samples_discarded += samples.len();
                return;
            }
        },
    };

    for (index, value) in samples {
        if let Some(element) = type_node.elements.get_mut(&index) {
            element.merge(key.clone(), value);
            stats.samples_applied += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::discover_catalog;
    use crate::error::{MonitorError, MqReturn};
    use crate::pcf::{PcfHeader, RawParameter};
    use crate::queues::resolve_monitored_queues;
    use crate::subscription::reconcile_subscriptions;
    use crate::transport::mock::{MockCodec, MockQueueManager, PublicationSpec};

    struct Fixture {
        qm: MockQueueManager,
        catalog: MetricCatalog,
        queues: TrackedQueues,
    }

    impl Fixture {
        fn new(patterns: &str) -> Self {
            let mut qm = MockQueueManager::typical_queue_manager();
            let mut catalog = discover_catalog(&mut qm, &MockCodec, None, None).unwrap();
            let mut queues = TrackedQueues::new();
            resolve_monitored_queues(&mut qm, &MockCodec, &mut queues, patterns, true, false)
                .unwrap();
            reconcile_subscriptions(&mut qm, &mut catalog, &mut queues).unwrap();
            Self {
                qm,
                catalog,
                queues,
            }
        }

        /// Fixture whose queues have already been through one cycle.
        fn settled(patterns: &str) -> Self {
            let mut fixture = Self::new(patterns);
            fixture.queues.clear_first_collection();
            fixture
        }

        fn publish(&mut self, publication: PublicationSpec) {
            assert!(self.qm.publish(&publication), "not subscribed");
        }

        fn process(&mut self) -> Result<CycleStats> {
            process_publications(&mut self.qm, &MockCodec, &mut self.catalog, &mut self.queues)
        }

        fn value(&self, class: i32, type_index: i32, element: i32, key: &ObjectKey) -> Option<i64> {
            self.catalog.element(class, type_index, element)?.value(key)
        }
    }

    #[test]
    fn delta_samples_accumulate_within_a_cycle() {
        let mut f = Fixture::settled("APP*");
        f.publish(PublicationSpec::qmgr("STATMQI", "PUT", &[(0, 5)]));
        f.publish(PublicationSpec::qmgr("STATMQI", "PUT", &[(0, 7)]));
        f.process().unwrap();

        assert_eq!(f.value(2, 0, 0, &ObjectKey::QueueManager), Some(12));
    }

    #[test]
    fn absolute_samples_keep_the_latest() {
        let mut f = Fixture::settled("APP*");
        f.publish(PublicationSpec::qmgr("CPU", "SystemSummary", &[(0, 5)]));
        f.publish(PublicationSpec::qmgr("CPU", "SystemSummary", &[(0, 7)]));
        let stats = f.process().unwrap();

        assert_eq!(f.value(0, 0, 0, &ObjectKey::QueueManager), Some(7));
        assert_eq!(stats.messages, 2);
        assert_eq!(stats.samples_applied, 2);
    }

    #[test]
    fn first_message_after_subscribe_is_discarded_once() {
        let mut f = Fixture::new("APP.ORDERS");
        let key = ObjectKey::object("APP.ORDERS");

        f.publish(PublicationSpec::queue("APP.ORDERS", "STATQ", "PUT", &[(0, 100)]));
        f.publish(PublicationSpec::queue("APP.ORDERS", "STATQ", "PUT", &[(0, 3)]));
        let stats = f.process().unwrap();

        assert_eq!(f.value(3, 1, 0, &key), Some(3));
        assert_eq!(stats.samples_discarded, 1);
        assert!(!f.queues.get("APP.ORDERS").unwrap().first_collection());

        f.publish(PublicationSpec::queue("APP.ORDERS", "STATQ", "PUT", &[(0, 4)]));
        f.process().unwrap();
        assert_eq!(f.value(3, 1, 0, &key), Some(7));
    }

    #[test]
    fn queue_manager_data_is_never_discarded() {
        let mut f = Fixture::new("APP*");
        f.publish(PublicationSpec::qmgr("DISK", "Log", &[(0, 4096)]));
        f.process().unwrap();
        assert_eq!(f.value(1, 0, 0, &ObjectKey::QueueManager), Some(4096));
    }

    #[test]
    fn untracked_and_unknown_data_is_ignored() {
        let mut f = Fixture::settled("APP*");
        let untracked = f.qm.encode_publication(3, 0, Some("DEV.QUEUE.1"), &[(0, 9)]);
        let unknown_class = f.qm.encode_publication(42, 0, None, &[(0, 9)]);
        let unknown_element = f.qm.encode_publication(0, 0, None, &[(77, 9)]);
        f.qm.inject_notification(untracked);
        f.qm.inject_notification(unknown_class);
        f.qm.inject_notification(unknown_element);

        let stats = f.process().unwrap();
        assert_eq!(stats.messages, 3);
        assert_eq!(stats.samples_applied, 0);
        assert_eq!(stats.samples_discarded, 1);
        assert!(f.catalog.elements().all(|e| e.element.values().is_empty()));
    }

    #[test]
    fn publication_without_type_is_skipped() {
        let mut f = Fixture::settled("APP*");
        let message = MockCodec.encode_message(
            &PcfHeader::response(0, 2),
            &[
                RawParameter::integer(MQIAMO_MONITOR_CLASS, 0),
                RawParameter::integer64(0, 50),
            ],
        );
        f.qm.inject_notification(message);

        let stats = f.process().unwrap();
        assert_eq!(stats.messages, 1);
        assert_eq!(f.value(0, 0, 0, &ObjectKey::QueueManager), None);
    }

    #[test]
    fn repeated_element_in_one_message_keeps_last() {
        let mut f = Fixture::settled("APP*");
        let message = f.qm.encode_publication(2, 0, None, &[(0, 5), (0, 9)]);
        f.qm.inject_notification(message);
        f.process().unwrap();

        assert_eq!(f.value(2, 0, 0, &ObjectKey::QueueManager), Some(9));
    }

    #[test]
    fn receive_failure_aborts_without_clearing_flags() {
        let mut f = Fixture::new("APP*");
        f.qm.fail_next_receive(MqReturn::failed(MQRC_CONNECTION_BROKEN));

        let err = f.process().unwrap_err();
        assert!(matches!(err, MonitorError::Transport(rc) if rc.reason == MQRC_CONNECTION_BROKEN));
        assert!(f.queues.get("APP.ORDERS").unwrap().first_collection());
    }

    #[test]
    fn undecodable_message_is_skipped() {
        let mut f = Fixture::new("APP*");
        f.qm.inject_notification(vec![0xff; 3]);
        f.publish(PublicationSpec::qmgr("CPU", "SystemSummary", &[(0, 5)]));

        let stats = f.process().unwrap();
        assert_eq!(stats.messages, 2);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.samples_applied, 1);
        assert_eq!(f.value(0, 0, 0, &ObjectKey::QueueManager), Some(5));
        assert!(!f.queues.get("APP.ORDERS").unwrap().first_collection());
        assert_eq!(f.qm.pending_notifications(), 0);
    }

    #[test]
    fn unsupported_platform_is_a_no_op() {
        let mut f = Fixture::settled("APP*");
        f.publish(PublicationSpec::qmgr("CPU", "SystemSummary", &[(0, 5)]));
        f.qm.set_publications_supported(false);

        assert_eq!(f.process().unwrap(), CycleStats::default());
        assert_eq!(f.qm.pending_notifications(), 1);
    }
}
