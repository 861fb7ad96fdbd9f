//! Discovery of the statistics a queue manager publishes.
//!
//! The server describes itself through retained metadata publications:
//! the classes topic lists classes, each class points at a topic listing its
//! types, and each type points at a topic listing its elements and the topic
//! its data is published on. Every metadata topic is read through a managed
//! subscription that is closed as soon as the message has been read.

use tracing::{debug, info, warn};

use crate::catalog::{ClassNode, Datatype, ElementNode, MetricCatalog, TypeNode};
use crate::error::{DiscoveryStage, MonitorError, MqReturn, Result};
use crate::pcf::constants::*;
use crate::pcf::{Response, Scalar, parse_response};
use crate::transport::{PcfCodec, Transport};

const DEFAULT_META_ROOT: &str = "$SYS/MQ";

/// Topic listing the classes of a queue manager.
pub fn classes_topic(qmgr: &str, meta_prefix: Option<&str>) -> String {
    let root = meta_prefix.unwrap_or(DEFAULT_META_ROOT);
    format!("{}/INFO/QMGR/{}/Monitor/METADATA/CLASSES", root, qmgr)
}

/// Builds the full catalog: classes, their types and their elements.
///
/// Returns an empty catalog when the platform does not publish statistics
/// and no metadata prefix points elsewhere.
pub fn discover_catalog<T: Transport, C: PcfCodec>(
    transport: &mut T,
    codec: &C,
    meta_prefix: Option<&str>,
    locale: Option<&str>,
) -> Result<MetricCatalog> {
    let mut catalog = MetricCatalog::new();

    if meta_prefix.is_none() && !transport.supports_publications() {
        info!("Resource publications not supported, skipping metadata discovery");
        return Ok(catalog);
    }

    let topic = classes_topic(transport.resolved_qmgr_name(), meta_prefix);
    let response = fetch_metadata(transport, codec, &topic)?;
    parse_classes(&mut catalog, &response)?;

    for class in catalog.classes.values_mut() {
        let response = fetch_metadata(transport, codec, &class.types_topic)?;
        parse_types(class, &response)?;

        for type_node in class.types.values_mut() {
            let response = fetch_metadata(transport, codec, &type_node.element_topic)?;
            parse_elements(type_node, &response)?;

            if let Some(locale) = locale {
                discover_translations(transport, codec, type_node, locale)?;
            }
        }
    }

    catalog.check_unique_names()?;

    info!(
        classes = catalog.classes.len(),
        elements = catalog.elements().count(),
        "Discovered resource statistics"
    );
    Ok(catalog)
}

/// Reads the retained message of a metadata topic, waiting for it.
fn fetch_metadata<T: Transport, C: PcfCodec>(
    transport: &mut T,
    codec: &C,
    topic: &str,
) -> Result<Response> {
    debug!(topic = %topic, "Reading metadata");
    read_once(transport, codec, topic, true)?
        .ok_or(MonitorError::Transport(MqReturn::no_message()))
}

/// Subscribes, reads at most one message and closes the subscription.
///
/// Without `wait`, an empty topic yields `Ok(None)`.
fn read_once<T: Transport, C: PcfCodec>(
    transport: &mut T,
    codec: &C,
    topic: &str,
    wait: bool,
) -> Result<Option<Response>> {
    let sub = transport
        .subscribe(topic, true)
        .map_err(|source| MonitorError::Subscribe {
            topic: topic.to_string(),
            source,
        })?;

    let result = match transport.receive(sub.source, wait) {
        Ok(data) => parse_response(codec, &data).map(Some).map_err(MonitorError::from),
        Err(e) if e.is_no_message() && !wait => Ok(None),
        Err(e) => Err(e.into()),
    };

    if let Err(e) = transport.close_subscription(sub.handle) {
        warn!(topic = %topic, error = %e, "Failed to close metadata subscription");
    }

    result
}

fn int_value(stage: DiscoveryStage, scalar: &Scalar) -> Result<i64> {
    scalar.int().ok_or(MonitorError::MissingValue {
        stage,
        parameter: scalar.parameter,
    })
}

fn string_value(stage: DiscoveryStage, scalar: &Scalar) -> Result<String> {
    scalar
        .string()
        .map(str::to_string)
        .ok_or(MonitorError::MissingValue {
            stage,
            parameter: scalar.parameter,
        })
}

pub(crate) fn parse_classes(catalog: &mut MetricCatalog, response: &Response) -> Result<()> {
    let stage = DiscoveryStage::Classes;
    for group in response.groups() {
        let mut index = 0;
        let mut class = ClassNode::new("", "");
        for scalar in group {
            match scalar.parameter {
                MQIAMO_MONITOR_CLASS => index = int_value(stage, scalar)? as i32,
                MQIAMO_MONITOR_FLAGS => class.flags = int_value(stage, scalar)?,
                MQCAMO_MONITOR_CLASS => class.name = string_value(stage, scalar)?,
                MQCAMO_MONITOR_DESC => class.description = string_value(stage, scalar)?,
                MQCA_TOPIC_STRING => class.types_topic = string_value(stage, scalar)?,
                parameter => return Err(MonitorError::UnknownParameter { stage, parameter }),
            }
        }
        debug!(index, class = %class.name, "Discovered class");
        catalog.classes.insert(index, class);
    }
    Ok(())
}

pub(crate) fn parse_types(class: &mut ClassNode, response: &Response) -> Result<()> {
    let stage = DiscoveryStage::Types;
    for group in response.groups() {
        let mut index = 0;
        let mut type_node = TypeNode::new("", "", "");
        for scalar in group {
            match scalar.parameter {
                MQIAMO_MONITOR_TYPE => index = int_value(stage, scalar)? as i32,
                MQCAMO_MONITOR_TYPE => type_node.name = string_value(stage, scalar)?,
                MQCAMO_MONITOR_DESC => type_node.description = string_value(stage, scalar)?,
                MQCA_TOPIC_STRING => type_node.element_topic = string_value(stage, scalar)?,
                parameter => return Err(MonitorError::UnknownParameter { stage, parameter }),
            }
        }
        class.types.insert(index, type_node);
    }
    Ok(())
}

pub(crate) fn parse_elements(type_node: &mut TypeNode, response: &Response) -> Result<()> {
    let stage = DiscoveryStage::Elements;

    if let Some(topic) = response
        .scalars()
        .find(|s| s.kind == MQCFT_STRING && s.parameter == MQCA_TOPIC_STRING)
    {
        type_node.object_topic = string_value(stage, topic)?;
    }

    for group in response.groups() {
        let mut index = 0;
        let mut datatype = Datatype::Unit;
        let mut description = String::new();
        for scalar in group {
            match scalar.parameter {
                MQIAMO_MONITOR_ELEMENT => index = int_value(stage, scalar)? as i32,
                MQIAMO_MONITOR_DATATYPE => {
                    datatype = Datatype::from_raw(int_value(stage, scalar)? as i32)
                }
                MQCAMO_MONITOR_DESC => description = string_value(stage, scalar)?,
                parameter => return Err(MonitorError::UnknownParameter { stage, parameter }),
            }
        }
        type_node
            .elements
            .insert(index, ElementNode::new(description, datatype));
    }
    Ok(())
}

/// Reads translated element descriptions for one type, if the server has any.
fn discover_translations<T: Transport, C: PcfCodec>(
    transport: &mut T,
    codec: &C,
    type_node: &mut TypeNode,
    locale: &str,
) -> Result<()> {
    let topic = format!("{}/{}", type_node.element_topic, locale);
    let Some(response) = read_once(transport, codec, &topic, false)? else {
        debug!(topic = %topic, "No translated descriptions");
        return Ok(());
    };
    apply_translations(type_node, &response);
    Ok(())
}

pub(crate) fn apply_translations(type_node: &mut TypeNode, response: &Response) {
    for group in response.groups() {
        let mut index = None;
        let mut description = None;
        for scalar in group {
            match scalar.parameter {
                MQIAMO_MONITOR_ELEMENT => index = scalar.int().map(|i| i as i32),
                MQCAMO_MONITOR_DESC => description = scalar.string().filter(|d| !d.is_empty()),
                _ => {}
            }
        }
        if let (Some(index), Some(description)) = (index, description) {
            if let Some(element) = type_node.elements.get_mut(&index) {
                element.description_nls = Some(description.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcf::{PcfHeader, RawParameter};
    use crate::transport::mock::{ClassSpec, ElementSpec, MockCodec, MockQueueManager, TypeSpec};

    fn response(count: u32, params: &[RawParameter]) -> Response {
        let buf = MockCodec.encode_message(&PcfHeader::response(0, count), params);
        parse_response(&MockCodec, &buf).unwrap()
    }

    #[test]
    fn builds_full_tree_and_closes_subscriptions() {
        let mut qm = MockQueueManager::typical_queue_manager();
        let catalog = discover_catalog(&mut qm, &MockCodec, None, None).unwrap();

        assert_eq!(catalog.classes.len(), 4);
        let statq = &catalog.classes[&3];
        assert_eq!(statq.name, "STATQ");
        let general = &statq.types[&0];
        assert_eq!(
            general.object_topic,
            "$SYS/MQ/INFO/QMGR/QM1/Monitor/STATQ/%s/GENERAL"
        );
        assert!(general.is_per_object());
        assert!(!catalog.classes[&0].types[&0].is_per_object());

        let depth = catalog.element(3, 0, 0).unwrap();
        assert_eq!(depth.metric_name, "queue_depth");
        assert_eq!(depth.datatype, Datatype::Unit);
        assert!(depth.description_nls.is_none());
        assert_eq!(catalog.element(2, 0, 0).unwrap().datatype, Datatype::Delta);

        // classes, 4 types topics, 5 element topics
        assert_eq!(qm.closed_subscription_count(), 10);
        assert_eq!(qm.open_subscription_count(), 0);
    }

    #[test]
    fn locale_adds_translations_only_where_available() {
        let mut qm = MockQueueManager::typical_queue_manager();
        let catalog = discover_catalog(&mut qm, &MockCodec, None, Some("fr_FR")).unwrap();

        let depth = catalog.element(3, 0, 0).unwrap();
        assert_eq!(depth.description, "Queue depth");
        assert_eq!(depth.description_nls.as_deref(), Some("Profondeur de la file"));
        assert!(catalog.element(3, 0, 1).unwrap().description_nls.is_none());
        assert_eq!(qm.open_subscription_count(), 0);
    }

    #[test]
    fn unknown_locale_is_not_an_error() {
        let mut qm = MockQueueManager::typical_queue_manager();
        let catalog = discover_catalog(&mut qm, &MockCodec, None, Some("xx_XX")).unwrap();
        assert!(catalog.elements().all(|e| e.element.description_nls.is_none()));
    }

    #[test]
    fn no_publications_without_prefix_yields_empty_catalog() {
        let mut qm = MockQueueManager::without_publications();
        let catalog = discover_catalog(&mut qm, &MockCodec, None, None).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(qm.closed_subscription_count(), 0);

        let catalog = discover_catalog(&mut qm, &MockCodec, Some("MYPREFIX"), None).unwrap();
        assert_eq!(catalog.classes.len(), 4);
        assert!(
            catalog.classes[&0]
                .types_topic
                .starts_with("MYPREFIX/INFO/QMGR/QM1/")
        );
    }

    #[test]
    fn unknown_class_parameter_aborts() {
        let mut catalog = MetricCatalog::new();
        let response = response(
            1,
            &[
                RawParameter::group(MQGACF_MONITOR_CLASS, 2),
                RawParameter::integer(MQIAMO_MONITOR_CLASS, 0),
                RawParameter::integer(9999, 1),
            ],
        );

        let err = parse_classes(&mut catalog, &response).unwrap_err();
        assert!(matches!(
            err,
            MonitorError::UnknownParameter {
                stage: DiscoveryStage::Classes,
                parameter: 9999
            }
        ));
    }

    #[test]
    fn element_member_without_value_aborts() {
        let mut type_node = TypeNode::new("GENERAL", "", "t");
        let response = response(
            1,
            &[
                RawParameter::group(MQGACF_MONITOR_ELEMENT, 1),
                RawParameter::integer_list(MQIAMO_MONITOR_ELEMENT, Vec::new()),
            ],
        );

        let err = parse_elements(&mut type_node, &response).unwrap_err();
        assert!(matches!(
            err,
            MonitorError::MissingValue {
                stage: DiscoveryStage::Elements,
                ..
            }
        ));
    }

    #[test]
    fn translations_for_unknown_elements_are_ignored() {
        let mut type_node = TypeNode::new("GENERAL", "", "t");
        type_node
            .elements
            .insert(0, ElementNode::new("Queue depth", Datatype::Unit));
        let response = response(
            2,
            &[
                RawParameter::group(MQGACF_MONITOR_ELEMENT, 2),
                RawParameter::integer(MQIAMO_MONITOR_ELEMENT, 0),
                RawParameter::string(MQCAMO_MONITOR_DESC, "Profondeur"),
                RawParameter::group(MQGACF_MONITOR_ELEMENT, 2),
                RawParameter::integer(MQIAMO_MONITOR_ELEMENT, 7),
                RawParameter::string(MQCAMO_MONITOR_DESC, "Inconnu"),
            ],
        );

        apply_translations(&mut type_node, &response);
        assert_eq!(
            type_node.elements[&0].description_nls.as_deref(),
            Some("Profondeur")
        );
        assert_eq!(type_node.elements.len(), 1);
    }

    #[test]
    fn duplicate_metric_names_abort() {
        let mut qm = MockQueueManager::new("QM1");
        qm.add_class(ClassSpec {
            index: 0,
            name: "DISK".to_string(),
            description: String::new(),
            flags: 0,
            types: vec![TypeSpec {
                index: 0,
                name: "Log".to_string(),
                description: String::new(),
                per_object: false,
                elements: vec![
                    ElementSpec {
                        index: 0,
                        datatype: MQIAMO_MONITOR_UNIT,
                        description: "Log - bytes in use".to_string(),
                        translations: Default::default(),
                    },
                    ElementSpec {
                        index: 1,
                        datatype: MQIAMO_MONITOR_UNIT,
                        description: "Log bytes in use".to_string(),
                        translations: Default::default(),
                    },
                ],
            }],
        });

        let err = discover_catalog(&mut qm, &MockCodec, None, None).unwrap_err();
        assert!(matches!(err, MonitorError::DuplicateMetricName(name) if name == "log_in_use_bytes"));
    }

    #[test]
    fn subscribe_failure_names_topic() {
        let mut qm = MockQueueManager::typical_queue_manager();
        let topic = "$SYS/MQ/INFO/QMGR/QM1/Monitor/METADATA/STATQ/TYPES";
        qm.fail_subscriptions_to(topic);

        let err = discover_catalog(&mut qm, &MockCodec, None, None).unwrap_err();
        assert!(matches!(err, MonitorError::Subscribe { topic: ref t, .. } if t == topic));
        assert_eq!(qm.open_subscription_count(), 0);
    }
}
