//! Keeps data subscriptions in line with the catalog and the tracked queues.
//!
//! Queue-manager-wide types get one subscription for the lifetime of the
//! catalog. Per-object types get one subscription per tracked queue; queues
//! that disappeared lose theirs, and new ones are flagged for a
//! first-collection discard.

use tracing::{debug, warn};

use crate::catalog::{MetricCatalog, ObjectKey, TypeNode};
use crate::error::{MonitorError, Result};
use crate::queues::TrackedQueues;
use crate::transport::{SubHandle, Subscription, Transport};

/// Brings every type's subscriptions in line with the tracked queues.
///
/// Stops at the first failed subscribe; subscriptions already made are kept.
pub fn reconcile_subscriptions<T: Transport>(
    transport: &mut T,
    catalog: &mut MetricCatalog,
    queues: &mut TrackedQueues,
) -> Result<()> {
    for class in catalog.classes.values_mut() {
        for type_node in class.types.values_mut() {
            if type_node.object_topic.is_empty() {
                debug!(class = %class.name, type_name = %type_node.name, "Type has no data topic");
                continue;
            }

            if type_node.is_per_object() {
                reconcile_per_object(transport, type_node, queues)?;
            } else if type_node.subscription(&ObjectKey::QueueManager).is_none() {
                let sub = subscribe(transport, &type_node.object_topic)?;
                type_node.insert_subscription(ObjectKey::QueueManager, sub.handle);
            }
        }
    }
    Ok(())
}

fn reconcile_per_object<T: Transport>(
    transport: &mut T,
    type_node: &mut TypeNode,
    queues: &mut TrackedQueues,
) -> Result<()> {
    let stale: Vec<ObjectKey> = type_node
        .subscribed_keys()
        .filter(|key| match key.object_name() {
            Some(name) => !queues.get(name).is_some_and(|info| info.exists),
            None => false,
        })
        .cloned()
        .collect();

    for key in stale {
        if let Some(handle) = type_node.remove_subscription(&key) {
            close(transport, handle, &key);
        }
    }

    let wanted: Vec<String> = queues
        .iter()
        .filter(|(_, info)| info.exists)
        .map(|(name, _)| name.to_string())
        .collect();

    for name in wanted {
        let key = ObjectKey::object(name.as_str());
        if type_node.subscription(&key).is_some() {
            continue;
        }

        let topic = type_node.object_topic_for(&name);
        let sub = subscribe(transport, &topic)?;
        type_node.insert_subscription(key, sub.handle);
        if let Some(info) = queues.get_mut(&name) {
            info.first_collection = true;
        }
    }
    Ok(())
}

fn subscribe<T: Transport>(transport: &mut T, topic: &str) -> Result<Subscription> {
    let sub = transport
        .subscribe(topic, false)
        .map_err(|source| MonitorError::Subscribe {
            topic: topic.to_string(),
            source,
        })?;
    debug!(topic = %topic, "Subscribed");
    Ok(sub)
}

fn close<T: Transport>(transport: &mut T, handle: SubHandle, key: &ObjectKey) {
    match transport.close_subscription(handle) {
        Ok(()) => debug!(object = %key, "Closed subscription"),
        Err(e) => warn!(object = %key, error = %e, "Failed to close subscription"),
    }
}

/// Closes every data subscription, e.g. before disconnecting.
pub fn close_all_subscriptions<T: Transport>(transport: &mut T, catalog: &mut MetricCatalog) {
    for class in catalog.classes.values_mut() {
        for type_node in class.types.values_mut() {
            let keys: Vec<ObjectKey> = type_node.subscribed_keys().cloned().collect();
            for key in keys {
                if let Some(handle) = type_node.remove_subscription(&key) {
                    close(transport, handle, &key);
                }
            }
        }
    }
}
