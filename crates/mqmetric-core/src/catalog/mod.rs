//! In-memory tree of discovered statistics and their live values.
//!
//! ```text
//! MetricCatalog
//!   └─ ClassNode      (e.g. CPU, DISK, STATQ)
//!        └─ TypeNode  (e.g. SystemSummary, GENERAL; owns subscriptions)
//!             └─ ElementNode (one metric; values keyed by ObjectKey)
//! ```
//!
//! The tree is built once by discovery. Afterwards only subscription handles
//! and element values change.

pub mod datatype;
pub mod naming;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use crate::error::MonitorError;
use crate::transport::SubHandle;
pub use datatype::{Datatype, normalise};
pub use naming::metric_name;

/// Text form of [`ObjectKey::QueueManager`]; never a valid queue name.
pub const QMGR_MAP_KEY: &str = "@self";

/// Placeholder in per-object topics that is replaced by the object name.
pub const OBJECT_PLACEHOLDER: &str = "%s";

/// Prefix that keeps per-object metric names apart from queue manager ones.
pub const OBJECT_METRIC_PREFIX: &str = "object_";

/// Identifies whose value an element holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKey {
    /// Queue-manager-wide statistics.
    QueueManager,
    /// Statistics of a single monitored object.
    Object(String),
}

impl ObjectKey {
    pub fn object(name: impl Into<String>) -> Self {
        ObjectKey::Object(name.into())
    }

    /// Object name, or `None` for the queue manager.
    pub fn object_name(&self) -> Option<&str> {
        match self {
            ObjectKey::QueueManager => None,
            ObjectKey::Object(name) => Some(name),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKey::QueueManager => f.write_str(QMGR_MAP_KEY),
            ObjectKey::Object(name) => f.write_str(name),
        }
    }
}

/// One metric.
#[derive(Debug, Clone)]
pub struct ElementNode {
    /// English description as published by the queue manager.
    pub description: String,
    /// Translated description, when a locale was requested and available.
    pub description_nls: Option<String>,
    pub metric_name: String,
    pub datatype: Datatype,
    values: BTreeMap<ObjectKey, i64>,
}

impl ElementNode {
    pub fn new(description: impl Into<String>, datatype: Datatype) -> Self {
        let description = description.into();
        Self {
            metric_name: metric_name(&description, datatype),
            description,
            description_nls: None,
            datatype,
            values: BTreeMap::new(),
        }
    }

    pub fn values(&self) -> &BTreeMap<ObjectKey, i64> {
        &self.values
    }

    pub fn value(&self, key: &ObjectKey) -> Option<i64> {
        self.values.get(key).copied()
    }

    /// Stored value converted to base units.
    pub fn normalised(&self, key: &ObjectKey) -> Option<f64> {
        self.value(key).map(|v| normalise(self.datatype, v))
    }

    /// Folds a new sample in: deltas accumulate, everything else overwrites.
    pub(crate) fn merge(&mut self, key: ObjectKey, sample: i64) -> i64 {
        let delta = self.datatype.is_delta();
        let stored = self
            .values
            .entry(key)
            .and_modify(|v| {
                if delta {
                    *v = v.saturating_add(sample);
                } else {
                    *v = sample;
                }
            })
            .or_insert(sample);
        *stored
    }

    pub fn clear_values(&mut self) {
        self.values.clear();
    }
}

/// A category of data within a class.
#[derive(Debug, Clone)]
pub struct TypeNode {
    pub name: String,
    pub description: String,
    /// Topic that publishes this type's element metadata.
    pub element_topic: String,
    /// Topic that publishes the data, possibly containing [`OBJECT_PLACEHOLDER`].
    pub object_topic: String,
    pub elements: BTreeMap<i32, ElementNode>,
    subscriptions: HashMap<ObjectKey, SubHandle>,
}

impl TypeNode {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        element_topic: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            element_topic: element_topic.into(),
            object_topic: String::new(),
            elements: BTreeMap::new(),
            subscriptions: HashMap::new(),
        }
    }

    /// Whether data arrives per monitored object rather than per queue manager.
    pub fn is_per_object(&self) -> bool {
        self.object_topic.contains(OBJECT_PLACEHOLDER)
    }

    /// Data topic for one object.
    pub fn object_topic_for(&self, name: &str) -> String {
        self.object_topic.replacen(OBJECT_PLACEHOLDER, name, 1)
    }

    /// Element metric name made unique across scopes.
    pub fn scoped_metric_name(&self, element: &ElementNode) -> String {
        if self.is_per_object() {
            format!("{}{}", OBJECT_METRIC_PREFIX, element.metric_name)
        } else {
            element.metric_name.clone()
        }
    }

    pub fn subscription(&self, key: &ObjectKey) -> Option<SubHandle> {
        self.subscriptions.get(key).copied()
    }

    pub fn subscribed_keys(&self) -> impl Iterator<Item = &ObjectKey> {
        self.subscriptions.keys()
    }

    pub(crate) fn insert_subscription(&mut self, key: ObjectKey, handle: SubHandle) {
        self.subscriptions.insert(key, handle);
    }

    pub(crate) fn remove_subscription(&mut self, key: &ObjectKey) -> Option<SubHandle> {
        self.subscriptions.remove(key)
    }
}

/// A top-level grouping of statistics.
#[derive(Debug, Clone)]
pub struct ClassNode {
    pub name: String,
    pub description: String,
    pub flags: i64,
    /// Topic that publishes this class's type metadata.
    pub types_topic: String,
    pub types: BTreeMap<i32, TypeNode>,
}

impl ClassNode {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            flags: 0,
            types_topic: String::new(),
            types: BTreeMap::new(),
        }
    }
}

/// Borrowed view of one element together with its parents.
#[derive(Debug, Clone, Copy)]
pub struct ElementRef<'a> {
    pub class_index: i32,
    pub class: &'a ClassNode,
    pub type_index: i32,
    pub type_node: &'a TypeNode,
    pub element_index: i32,
    pub element: &'a ElementNode,
}

impl ElementRef<'_> {
    pub fn scoped_metric_name(&self) -> String {
        self.type_node.scoped_metric_name(self.element)
    }
}

/// Root of the discovered schema.
#[derive(Debug, Clone, Default)]
pub struct MetricCatalog {
    pub classes: BTreeMap<i32, ClassNode>,
}

impl MetricCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn element(&self, class: i32, type_index: i32, element: i32) -> Option<&ElementNode> {
        self.classes
            .get(&class)?
            .types
            .get(&type_index)?
            .elements
            .get(&element)
    }

    pub fn element_mut(
        &mut self,
        class: i32,
        type_index: i32,
        element: i32,
    ) -> Option<&mut ElementNode> {
        self.classes
            .get_mut(&class)?
            .types
            .get_mut(&type_index)?
            .elements
            .get_mut(&element)
    }

    /// Iterates over every element in index order.
    pub fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.classes.iter().flat_map(|(&class_index, class)| {
            class.types.iter().flat_map(move |(&type_index, type_node)| {
                type_node
                    .elements
                    .iter()
                    .map(move |(&element_index, element)| ElementRef {
                        class_index,
                        class,
                        type_index,
                        type_node,
                        element_index,
                        element,
                    })
            })
        })
    }

    /// Finds an element by its scoped metric name.
    pub fn find_metric(&self, scoped_name: &str) -> Option<ElementRef<'_>> {
        self.elements().find(|e| e.scoped_metric_name() == scoped_name)
    }

    /// Fails if two elements share a scoped metric name.
    pub fn check_unique_names(&self) -> Result<(), MonitorError> {
        let mut seen = HashSet::new();
        for e in self.elements() {
            if !seen.insert(e.scoped_metric_name()) {
                return Err(MonitorError::DuplicateMetricName(
                    e.element.metric_name.clone(),
                ));
            }
        }
        Ok(())
    }

    /// Drops every stored value of an object that is no longer monitored.
    pub fn forget_object(&mut self, name: &str) {
        let key = ObjectKey::object(name);
        for class in self.classes.values_mut() {
            for type_node in class.types.values_mut() {
                for element in type_node.elements.values_mut() {
                    element.values.remove(&key);
                }
            }
        }
    }

    /// Clears all stored values, e.g. after an exporter has read them.
    pub fn reset_values(&mut self) {
        for class in self.classes.values_mut() {
            for type_node in class.types.values_mut() {
                for element in type_node.elements.values_mut() {
                    element.clear_values();
                }
            }
        }
    }

    /// Total number of open subscriptions across all types.
    pub fn subscription_count(&self) -> usize {
        self.classes
            .values()
            .flat_map(|c| c.types.values())
            .map(|t| t.subscriptions.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_with(types: Vec<(&str, Vec<(&str, Datatype)>)>) -> MetricCatalog {
        let mut class = ClassNode::new("STATQ", "Queue statistics");
        for (i, (object_topic, elements)) in types.into_iter().enumerate() {
            let mut t = TypeNode::new(format!("T{}", i), "", "");
            t.object_topic = object_topic.to_string();
            for (j, (desc, dt)) in elements.into_iter().enumerate() {
                t.elements.insert(j as i32, ElementNode::new(desc, dt));
            }
            class.types.insert(i as i32, t);
        }
        let mut catalog = MetricCatalog::new();
        catalog.classes.insert(0, class);
        catalog
    }

    #[test]
    fn delta_merge_accumulates() {
        let mut e = ElementNode::new("MQPUT count", Datatype::Delta);
        let key = ObjectKey::QueueManager;
        e.merge(key.clone(), 5);
        e.merge(key.clone(), 7);
        assert_eq!(e.value(&key), Some(12));
    }

    #[test]
    fn absolute_merge_overwrites() {
        let mut e = ElementNode::new("Queue depth", Datatype::Unit);
        let key = ObjectKey::object("APP.1");
        e.merge(key.clone(), 5);
        e.merge(key.clone(), 7);
        assert_eq!(e.value(&key), Some(7));
        assert_eq!(e.value(&ObjectKey::QueueManager), None);
    }

    #[test]
    fn self_key_is_distinct_from_any_object_name() {
        assert_ne!(ObjectKey::QueueManager, ObjectKey::object(QMGR_MAP_KEY));
        assert_eq!(ObjectKey::QueueManager.to_string(), "@self");
        assert_eq!(ObjectKey::object("Q1").object_name(), Some("Q1"));
    }

    #[test]
    fn per_object_topic_substitution() {
        let mut t = TypeNode::new("GENERAL", "", "");
        t.object_topic = "$SYS/MQ/INFO/QMGR/QM1/Monitor/STATQ/%s/GENERAL".to_string();
        assert!(t.is_per_object());
        assert_eq!(
            t.object_topic_for("APP.1"),
            "$SYS/MQ/INFO/QMGR/QM1/Monitor/STATQ/APP.1/GENERAL"
        );
    }

    #[test]
    fn object_scope_prefix_avoids_collision() {
        let catalog = catalog_with(vec![
            ("QM/Monitor/STATMQI/PUT", vec![("MQPUT count", Datatype::Delta)]),
            ("QM/Monitor/STATQ/%s/PUT", vec![("MQPUT count", Datatype::Delta)]),
        ]);
        assert!(catalog.check_unique_names().is_ok());
        assert!(catalog.find_metric("object_mqput_count").is_some());
        assert!(catalog.find_metric("mqput_count").is_some());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let catalog = catalog_with(vec![
            ("QM/Monitor/A", vec![("Queue depth", Datatype::Unit)]),
            ("QM/Monitor/B", vec![("Queue-depth", Datatype::Unit)]),
        ]);
        let err = catalog.check_unique_names().unwrap_err();
        assert!(matches!(err, MonitorError::DuplicateMetricName(name) if name == "queue_depth"));
    }

    #[test]
    fn forget_object_keeps_other_values() {
        let mut catalog = catalog_with(vec![(
            "QM/Monitor/STATQ/%s/GET",
            vec![("MQGET count", Datatype::Delta)],
        )]);
        let e = catalog.element_mut(0, 0, 0).unwrap();
        e.merge(ObjectKey::object("A"), 1);
        e.merge(ObjectKey::object("B"), 2);

        catalog.forget_object("A");

        let e = catalog.element(0, 0, 0).unwrap();
        assert_eq!(e.value(&ObjectKey::object("A")), None);
        assert_eq!(e.value(&ObjectKey::object("B")), Some(2));
    }
}
