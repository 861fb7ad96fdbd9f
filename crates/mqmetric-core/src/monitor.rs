//! The monitor: one queue manager connection and everything learned from it.
//!
//! ```ignore
//! let mut monitor = Monitor::new(transport, codec, config)?;
//! monitor.discover_and_subscribe()?;
//! if let ConfigStatus::Warning { .. } = monitor.verify_config()? { /* log it */ }
//! loop {
//!     monitor.collect()?;
//!     for e in monitor.catalog().elements() { /* export */ }
//!     monitor.reset_values();
//! }
//! ```

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::catalog::MetricCatalog;
use crate::config::MonitorConfig;
use crate::discovery::discover_catalog;
use crate::error::{MonitorError, Result};
use crate::publication::{CycleStats, process_publications};
use crate::queues::{EntityInfo, TrackedQueues, resolve_monitored_queues};
use crate::subscription::{close_all_subscriptions, reconcile_subscriptions};
use crate::transport::{PcfCodec, Transport};
use crate::verify::{ConfigStatus, verify_reply_queue};

/// Discovery, subscriptions and the live metric store for one queue manager.
///
/// All operations take `&mut self`; share a monitor between threads behind
/// a lock.
pub struct Monitor<T: Transport, C: PcfCodec> {
    transport: T,
    codec: C,
    config: MonitorConfig,
    /// Validated queue pattern list.
    patterns: String,
    catalog: MetricCatalog,
    queues: TrackedQueues,
    discovered: bool,
    last_rediscovery: Option<Instant>,
}

impl<T: Transport, C: PcfCodec> Monitor<T, C> {
    /// Creates a monitor, checking the configured queue patterns.
    pub fn new(transport: T, codec: C, config: MonitorConfig) -> Result<Self> {
        let patterns = config.validate()?;
        Ok(Self {
            transport,
            codec,
            config,
            patterns,
            catalog: MetricCatalog::new(),
            queues: TrackedQueues::new(),
            discovered: false,
            last_rediscovery: None,
        })
    }

    /// Discovers the available statistics and the monitored queues, then
    /// subscribes to everything.
    ///
    /// Calling it again starts over with a fresh catalog.
    pub fn discover_and_subscribe(&mut self) -> Result<()> {
        self.discovered = true;
        close_all_subscriptions(&mut self.transport, &mut self.catalog);
        self.catalog = MetricCatalog::new();
        self.queues = TrackedQueues::new();

        self.catalog = discover_catalog(
            &mut self.transport,
            &self.codec,
            self.config.meta_prefix(),
            self.config.locale(),
        )?;
        self.resolve_queues()?;
        reconcile_subscriptions(&mut self.transport, &mut self.catalog, &mut self.queues)?;
        self.last_rediscovery = Some(Instant::now());

        info!(
            qmgr = %self.transport.resolved_qmgr_name(),
            queues = self.queues.len(),
            subscriptions = self.catalog.subscription_count(),
            "Discovery complete"
        );
        Ok(())
    }

    /// Re-resolves the monitored queues and adjusts subscriptions.
    ///
    /// Queues that no longer match lose their subscriptions and values.
    /// The catalog itself is not rediscovered. If resolution fails for any
    /// reason other than nothing matching, the tracked queues are kept as
    /// they were and the error is returned.
    pub fn rediscover_and_subscribe(&mut self) -> Result<()> {
        if !self.discovered {
            return Err(MonitorError::NotDiscovered);
        }
        self.last_rediscovery = Some(Instant::now());

        self.queues.mark_all_absent();
        let resolved = match self.resolve_queues() {
            Err(e) if !matches!(e, MonitorError::NoMatchingObjects { .. }) => {
                warn!(error = %e, "Queue rediscovery failed, keeping current queues");
                self.queues.mark_all_present();
                return Err(e);
            }
            other => other,
        };
        let reconciled =
            reconcile_subscriptions(&mut self.transport, &mut self.catalog, &mut self.queues);

        for name in self.queues.remove_absent() {
            debug!(queue = %name, "Queue no longer monitored");
            self.catalog.forget_object(&name);
        }

        resolved.and(reconciled)
    }

    fn resolve_queues(&mut self) -> Result<()> {
        resolve_monitored_queues(
            &mut self.transport,
            &self.codec,
            &mut self.queues,
            &self.patterns,
            self.config.check_queue_list,
            self.config.use_status,
        )
    }

    /// Drains all waiting publications into the catalog.
    pub fn process_publications(&mut self) -> Result<CycleStats> {
        process_publications(
            &mut self.transport,
            &self.codec,
            &mut self.catalog,
            &mut self.queues,
        )
    }

    /// One poll-loop iteration: rediscover if due, then drain publications.
    pub fn collect(&mut self) -> Result<CycleStats> {
        if !self.discovered {
            return Err(MonitorError::NotDiscovered);
        }
        if self.rediscovery_due(Instant::now()) {
            self.rediscover_and_subscribe()?;
        }
        self.process_publications()
    }

    /// Whether the configured rediscovery interval has elapsed at `now`.
    pub fn rediscovery_due(&self, now: Instant) -> bool {
        match (self.config.rediscovery_interval(), self.last_rediscovery) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            _ => false,
        }
    }

    /// Checks the reply queue. Needs discovery to have run.
    pub fn verify_config(&mut self) -> Result<ConfigStatus> {
        if !self.discovered {
            return Err(MonitorError::NotDiscovered);
        }
        verify_reply_queue(&mut self.transport, self.queues.len())
    }

    /// Names of the monitored queues.
    pub fn discovered_queues(&self) -> Vec<String> {
        self.queues.names().map(String::from).collect()
    }

    pub fn queue(&self, name: &str) -> Option<&EntityInfo> {
        self.queues.get(name)
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Clears every stored value, typically after an export.
    pub fn reset_values(&mut self) {
        self.catalog.reset_values();
    }

    /// Closes every data subscription.
    pub fn end_subscriptions(&mut self) {
        close_all_subscriptions(&mut self.transport, &mut self.catalog);
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ObjectKey;
    use crate::error::PatternError;
    use crate::pcf::constants::MQRC_NOT_AUTHORIZED;
    use crate::transport::mock::{MockCodec, MockQueueManager, PublicationSpec, QueueSpec};
    use std::time::Duration;

    fn monitor(patterns: &str) -> Monitor<MockQueueManager, MockCodec> {
        let config = MonitorConfig::new().with_monitored_queues(patterns);
        Monitor::new(MockQueueManager::typical_queue_manager(), MockCodec, config).unwrap()
    }

    #[test]
    fn operations_need_discovery_first() {
        let mut m = monitor("APP*");
        assert!(matches!(m.verify_config(), Err(MonitorError::NotDiscovered)));
        assert!(matches!(m.collect(), Err(MonitorError::NotDiscovered)));
        assert!(matches!(
            m.rediscover_and_subscribe(),
            Err(MonitorError::NotDiscovered)
        ));
    }

    #[test]
    fn bad_patterns_are_rejected_up_front() {
        let config = MonitorConfig::new().with_monitored_queues("APP!*");
        let result = Monitor::new(MockQueueManager::typical_queue_manager(), MockCodec, config);
        assert!(matches!(
            result,
            Err(MonitorError::Pattern(PatternError::Negation(_)))
        ));
    }

    #[test]
    fn discovery_subscribes_and_verifies() {
        let mut m = monitor("APP*,!APP.PAYMENTS");
        m.discover_and_subscribe().unwrap();

        assert_eq!(m.discovered_queues(), vec!["APP.ORDERS"]);
        assert_eq!(m.catalog().classes.len(), 4);
        assert_eq!(m.transport().open_subscription_count(), 3 + 2);
        assert_eq!(m.verify_config().unwrap(), ConfigStatus::Ok);
    }

    #[test]
    fn repeated_discovery_does_not_leak_subscriptions() {
        let mut m = monitor("APP*");
        m.discover_and_subscribe().unwrap();
        let open = m.transport().open_subscription_count();

        m.discover_and_subscribe().unwrap();
        assert_eq!(m.transport().open_subscription_count(), open);
    }

    #[test]
    fn rediscovery_prunes_deleted_queues() {
        let mut m = monitor("APP*");
        m.discover_and_subscribe().unwrap();
        m.process_publications().unwrap();

        m.transport_mut()
            .publish(&PublicationSpec::queue("APP.ORDERS", "STATQ", "GENERAL", &[(0, 8)]));
        m.transport_mut()
            .publish(&PublicationSpec::queue("APP.PAYMENTS", "STATQ", "PUT", &[(0, 3)]));
        m.process_publications().unwrap();
        let depth = ObjectKey::object("APP.ORDERS");
        let payments = ObjectKey::object("APP.PAYMENTS");
        assert_eq!(m.catalog().element(3, 0, 0).unwrap().value(&depth), Some(8));
        assert_eq!(m.catalog().element(3, 1, 0).unwrap().value(&payments), Some(3));

        m.transport_mut().remove_queue("APP.ORDERS");
        m.transport_mut().add_queue(QueueSpec::local("APP.REFUNDS"));
        m.rediscover_and_subscribe().unwrap();

        assert_eq!(m.discovered_queues(), vec!["APP.PAYMENTS", "APP.REFUNDS"]);
        assert_eq!(m.catalog().element(3, 0, 0).unwrap().value(&depth), None);
        assert_eq!(m.catalog().element(3, 1, 0).unwrap().value(&payments), Some(3));
        assert!(
            !m.transport()
                .open_topics()
                .iter()
                .any(|t| t.contains("APP.ORDERS"))
        );
        assert!(m.queue("APP.REFUNDS").unwrap().first_collection());
        assert!(!m.queue("APP.PAYMENTS").unwrap().first_collection());
    }

    #[test]
    fn rediscovery_with_nothing_left_reports_and_unsubscribes() {
        let mut m = monitor("APP.ORDERS");
        m.discover_and_subscribe().unwrap();

        m.transport_mut().remove_queue("APP.ORDERS");
        let err = m.rediscover_and_subscribe().unwrap_err();

        assert!(matches!(err, MonitorError::NoMatchingObjects { .. }));
        assert!(m.discovered_queues().is_empty());
        assert_eq!(m.transport().open_subscription_count(), 3);
    }

    #[test]
    fn failed_rediscovery_inquiry_keeps_queues_and_values() {
        let mut m = monitor("APP*");
        m.discover_and_subscribe().unwrap();
        m.process_publications().unwrap();

        m.transport_mut()
            .publish(&PublicationSpec::queue("APP.PAYMENTS", "STATQ", "GENERAL", &[(0, 8)]));
        m.process_publications().unwrap();
        let open = m.transport().open_subscription_count();
        let payments = ObjectKey::object("APP.PAYMENTS");

        m.transport_mut().fail_next_command(MQRC_NOT_AUTHORIZED);
        let err = m.rediscover_and_subscribe().unwrap_err();

        assert!(matches!(
            err,
            MonitorError::CommandFailed {
                reason: MQRC_NOT_AUTHORIZED,
                ..
            }
        ));
        assert_eq!(m.discovered_queues(), vec!["APP.ORDERS", "APP.PAYMENTS"]);
        assert!(m.queue("APP.PAYMENTS").unwrap().exists());
        assert_eq!(m.catalog().element(3, 0, 0).unwrap().value(&payments), Some(8));
        assert_eq!(m.transport().open_subscription_count(), open);

        m.rediscover_and_subscribe().unwrap();
        assert_eq!(m.discovered_queues(), vec!["APP.ORDERS", "APP.PAYMENTS"]);
        assert!(!m.queue("APP.PAYMENTS").unwrap().first_collection());
        assert_eq!(m.transport().open_subscription_count(), open);
    }

    #[test]
    fn rediscovery_due_follows_interval() {
        let config = MonitorConfig::new()
            .with_monitored_queues("APP*")
            .with_rediscovery_interval(Duration::from_secs(60));
        let mut m =
            Monitor::new(MockQueueManager::typical_queue_manager(), MockCodec, config).unwrap();
        let now = Instant::now();
        assert!(!m.rediscovery_due(now));

        m.discover_and_subscribe().unwrap();
        assert!(!m.rediscovery_due(Instant::now()));
        assert!(m.rediscovery_due(Instant::now() + Duration::from_secs(61)));
    }

    #[test]
    fn end_subscriptions_closes_everything() {
        let mut m = monitor("APP*");
        m.discover_and_subscribe().unwrap();
        m.end_subscriptions();
        assert_eq!(m.transport().open_subscription_count(), 0);
    }
}
