//! Serializable description of a scripted queue manager.
//!
//! A [`Scenario`] is what the replay tool loads from JSON: the server's
//! schema, its queues, and a list of collection cycles with queue churn and
//! publications.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

fn default_max_depth() -> i32 {
    5000
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub qmgr: String,
    #[serde(default = "default_true")]
    pub publications_supported: bool,
    #[serde(default)]
    pub reply_queue: ReplyQueueSpec,
    #[serde(default)]
    pub queues: Vec<QueueSpec>,
    #[serde(default)]
    pub schema: Vec<ClassSpec>,
    #[serde(default)]
    pub cycles: Vec<CycleSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyQueueSpec {
    pub name: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: i32,
    /// Opened from a predefined local queue rather than a model queue.
    #[serde(default)]
    pub predefined: bool,
}

impl Default for ReplyQueueSpec {
    fn default() -> Self {
        Self {
            name: "MQMETRIC.REPLY.MODEL".to_string(),
            max_depth: default_max_depth(),
            predefined: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSpec {
    pub name: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: i32,
    #[serde(default)]
    pub usage: i32,
}

impl QueueSpec {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_depth: default_max_depth(),
            usage: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSpec {
    pub index: i32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub flags: i64,
    #[serde(default)]
    pub types: Vec<TypeSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSpec {
    pub index: i32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Published once per queue rather than once per queue manager.
    #[serde(default)]
    pub per_object: bool,
    #[serde(default)]
    pub elements: Vec<ElementSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSpec {
    pub index: i32,
    /// Server datatype code, e.g. 1 for a unit, 2 for a delta.
    pub datatype: i32,
    pub description: String,
    /// Descriptions by locale.
    #[serde(default)]
    pub translations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleSpec {
    #[serde(default)]
    pub add_queues: Vec<QueueSpec>,
    #[serde(default)]
    pub remove_queues: Vec<String>,
    /// Ask the driver to rediscover queues before this cycle's publications.
    #[serde(default)]
    pub rediscover: bool,
    #[serde(default)]
    pub publications: Vec<PublicationSpec>,
}

/// One resource publication, addressed by class and type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationSpec {
    /// Queue the data belongs to; `None` for queue-manager-wide types.
    #[serde(default)]
    pub queue: Option<String>,
    pub class: String,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Element index to raw sample.
    pub samples: BTreeMap<i32, i64>,
}

impl PublicationSpec {
    pub fn qmgr(class: &str, type_name: &str, samples: &[(i32, i64)]) -> Self {
        Self {
            queue: None,
            class: class.to_string(),
            type_name: type_name.to_string(),
            samples: samples.iter().copied().collect(),
        }
    }

    pub fn queue(queue: &str, class: &str, type_name: &str, samples: &[(i32, i64)]) -> Self {
        Self {
            queue: Some(queue.to_string()),
            ..Self::qmgr(class, type_name, samples)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_scenario_uses_defaults() {
        let scenario: Scenario = serde_json::from_str(r#"{ "qmgr": "QM1" }"#).unwrap();
        assert!(scenario.publications_supported);
        assert_eq!(scenario.reply_queue.max_depth, 5000);
        assert!(!scenario.reply_queue.predefined);
        assert!(scenario.cycles.is_empty());
    }

    #[test]
    fn publication_type_field_is_renamed() {
        let json = r#"{ "queue": "APP.1", "class": "STATQ", "type": "GENERAL",
                        "samples": { "0": 12, "3": -1 } }"#;
        let p: PublicationSpec = serde_json::from_str(json).unwrap();
        assert_eq!(p.type_name, "GENERAL");
        assert_eq!(p.samples.get(&3), Some(&-1));
    }
}
