//! Pre-built queue manager scenarios for testing.

use std::collections::BTreeMap;

use super::queue_manager::MockQueueManager;
use super::script::{ClassSpec, ElementSpec, QueueSpec, ReplyQueueSpec, Scenario, TypeSpec};
use crate::pcf::constants::{
    MQIAMO_MONITOR_DELTA, MQIAMO_MONITOR_MB, MQIAMO_MONITOR_MICROSEC, MQIAMO_MONITOR_PERCENT,
    MQIAMO_MONITOR_UNIT,
};

fn element(index: i32, datatype: i32, description: &str) -> ElementSpec {
    ElementSpec {
        index,
        datatype,
        description: description.to_string(),
        translations: BTreeMap::new(),
    }
}

fn typ(index: i32, name: &str, per_object: bool, elements: Vec<ElementSpec>) -> TypeSpec {
    TypeSpec {
        index,
        name: name.to_string(),
        description: String::new(),
        per_object,
        elements,
    }
}

fn class(index: i32, name: &str, description: &str, types: Vec<TypeSpec>) -> ClassSpec {
    ClassSpec {
        index,
        name: name.to_string(),
        description: description.to_string(),
        flags: 0,
        types,
    }
}

impl Scenario {
    /// A distributed queue manager with platform, log, API and per-queue statistics.
    ///
    /// Queues: `APP.ORDERS`, `APP.PAYMENTS`, `DEV.QUEUE.1`, `DEV.QUEUE.2`,
    /// `SYSTEM.ADMIN.COMMAND.QUEUE`, `SYSTEM.DEFAULT.LOCAL.QUEUE`.
    pub fn typical() -> Self {
        let mut queue_depth = element(0, MQIAMO_MONITOR_UNIT, "Queue depth");
        queue_depth
            .translations
            .insert("fr_FR".to_string(), "Profondeur de la file".to_string());

        let schema = vec![
            class(
                0,
                "CPU",
                "Platform central processing units",
                vec![typ(
                    0,
                    "SystemSummary",
                    false,
                    vec![
                        element(0, MQIAMO_MONITOR_PERCENT, "User CPU time percentage"),
                        element(1, MQIAMO_MONITOR_PERCENT, "System CPU time percentage"),
                        element(2, MQIAMO_MONITOR_MB, "RAM total bytes"),
                    ],
                )],
            ),
            class(
                1,
                "DISK",
                "Platform persistent data stores",
                vec![typ(
                    0,
                    "Log",
                    false,
                    vec![
                        element(0, MQIAMO_MONITOR_UNIT, "Log - bytes in use"),
                        element(1, MQIAMO_MONITOR_MICROSEC, "Log - write latency"),
                    ],
                )],
            ),
            class(
                2,
                "STATMQI",
                "API usage statistics",
                vec![typ(
                    0,
                    "PUT",
                    false,
                    vec![
                        element(0, MQIAMO_MONITOR_DELTA, "Interval total MQPUT/MQPUT1 count"),
                        element(
                            1,
                            MQIAMO_MONITOR_DELTA,
                            "Interval total MQPUT/MQPUT1 byte count",
                        ),
                    ],
                )],
            ),
            class(
                3,
                "STATQ",
                "API per-queue usage statistics",
                vec![
                    typ(
                        0,
                        "GENERAL",
                        true,
                        vec![
                            queue_depth,
                            element(1, MQIAMO_MONITOR_DELTA, "Messages expired"),
                        ],
                    ),
                    typ(
                        1,
                        "PUT",
                        true,
                        vec![
                            element(0, MQIAMO_MONITOR_DELTA, "MQPUT/MQPUT1 count"),
                            element(1, MQIAMO_MONITOR_DELTA, "MQPUT byte count"),
                        ],
                    ),
                ],
            ),
        ];

        let queues = vec![
            QueueSpec::local("APP.ORDERS"),
            QueueSpec {
                max_depth: 20000,
                ..QueueSpec::local("APP.PAYMENTS")
            },
            QueueSpec::local("DEV.QUEUE.1"),
            QueueSpec::local("DEV.QUEUE.2"),
            QueueSpec::local("SYSTEM.ADMIN.COMMAND.QUEUE"),
            QueueSpec::local("SYSTEM.DEFAULT.LOCAL.QUEUE"),
        ];

        Scenario {
            qmgr: "QM1".to_string(),
            publications_supported: true,
            reply_queue: ReplyQueueSpec::default(),
            queues,
            schema,
            cycles: Vec::new(),
        }
    }
}

impl MockQueueManager {
    /// Queue manager built from [`Scenario::typical`].
    pub fn typical_queue_manager() -> Self {
        Self::from_scenario(Scenario::typical())
    }

    /// A platform that publishes no resource statistics but can still
    /// answer object inquiries.
    pub fn without_publications() -> Self {
        let mut qm = Self::typical_queue_manager();
        qm.set_publications_supported(false);
        qm
    }

    /// Typical queue manager with `count` extra generated queues, enough to
    /// overflow a small reply buffer.
    pub fn with_many_queues(count: usize) -> Self {
        let mut qm = Self::typical_queue_manager();
        for i in 0..count {
            qm.add_queue(QueueSpec::local(format!("BULK.QUEUE.{:06}", i)));
        }
        qm
    }
}
