//! Scripted queue manager implementing [`Transport`].
//!
//! Metadata topics are answered from the scenario's schema the moment they
//! are subscribed, commands are answered synchronously, and publications are
//! only delivered to topics that currently have an unmanaged subscription.

use std::collections::{BTreeMap, HashMap, VecDeque};

use tracing::debug;

use super::codec::MockCodec;
use super::script::{
    ClassSpec, CycleSpec, PublicationSpec, QueueSpec, ReplyQueueSpec, Scenario, TypeSpec,
};
use crate::error::MqReturn;
use crate::pcf::constants::*;
use crate::pcf::{PcfHeader, RawParameter, parse_response};
use crate::selector::pattern_match;
use crate::transport::{
    DefinitionType, ReplyQueueAttributes, ReplySource, SubHandle, Subscription, Transport,
};

const DEFAULT_META_ROOT: &str = "$SYS/MQ";
const PUBLICATION_INTERVAL_MICROS: i64 = 10_000_000;

#[derive(Debug, Clone)]
struct OpenSubscription {
    topic: String,
    managed: bool,
}

/// Publications delivered and dropped by one call to [`MockQueueManager::publish_cycle`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    pub delivered: usize,
    /// Publications nobody was subscribed to.
    pub dropped: usize,
}

/// In-memory queue manager driven by a [`Scenario`].
#[derive(Debug, Clone)]
pub struct MockQueueManager {
    scenario: Scenario,
    queues: BTreeMap<String, QueueSpec>,
    meta_root: String,
    next_handle: u64,
    open: HashMap<u64, OpenSubscription>,
    managed: HashMap<u64, VecDeque<Vec<u8>>>,
    notifications: VecDeque<Vec<u8>>,
    command_replies: VecDeque<Vec<u8>>,
    commands: Vec<i32>,
    failing_topics: Vec<String>,
    pending_receive_error: Option<MqReturn>,
    pending_command_failure: Option<i32>,
    truncated_replies: usize,
    closed: usize,
}

impl MockQueueManager {
    /// Creates a queue manager with no schema and no queues.
    pub fn new(qmgr: impl Into<String>) -> Self {
        Self::from_scenario(Scenario {
            qmgr: qmgr.into(),
            publications_supported: true,
            reply_queue: ReplyQueueSpec::default(),
            queues: Vec::new(),
            schema: Vec::new(),
            cycles: Vec::new(),
        })
    }

    pub fn from_scenario(scenario: Scenario) -> Self {
        let queues = scenario
            .queues
            .iter()
            .map(|q| (q.name.clone(), q.clone()))
            .collect();
        Self {
            scenario,
            queues,
            meta_root: DEFAULT_META_ROOT.to_string(),
            next_handle: 1,
            open: HashMap::new(),
            managed: HashMap::new(),
            notifications: VecDeque::new(),
            command_replies: VecDeque::new(),
            commands: Vec::new(),
            failing_topics: Vec::new(),
            pending_receive_error: None,
            pending_command_failure: None,
            truncated_replies: 0,
            closed: 0,
        }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    // ===== Script manipulation =====

    pub fn add_queue(&mut self, queue: QueueSpec) {
        self.queues.insert(queue.name.clone(), queue);
    }

    /// Deletes a queue. Existing subscriptions stay open, as on a real server.
    pub fn remove_queue(&mut self, name: &str) -> bool {
        self.queues.remove(name).is_some()
    }

    pub fn queue_names(&self) -> Vec<&str> {
        self.queues.keys().map(String::as_str).collect()
    }

    pub fn set_publications_supported(&mut self, supported: bool) {
        self.scenario.publications_supported = supported;
    }

    pub fn set_reply_queue(&mut self, reply_queue: ReplyQueueSpec) {
        self.scenario.reply_queue = reply_queue;
    }

    /// Adds or replaces a class in the schema.
    pub fn add_class(&mut self, class: ClassSpec) {
        self.scenario.schema.retain(|c| c.index != class.index);
        self.scenario.schema.push(class);
    }

    /// Makes every later subscription to `topic` fail with `MQRC_NOT_AUTHORIZED`.
    pub fn fail_subscriptions_to(&mut self, topic: impl Into<String>) {
        self.failing_topics.push(topic.into());
    }

    /// Makes the next receive from the notification queue fail.
    pub fn fail_next_receive(&mut self, error: MqReturn) {
        self.pending_receive_error = Some(error);
    }

    /// Makes the next command get a failed reply with the given reason.
    pub fn fail_next_command(&mut self, reason: i32) {
        self.pending_command_failure = Some(reason);
    }

    /// Puts an arbitrary message on the notification queue.
    pub fn inject_notification(&mut self, message: Vec<u8>) {
        self.notifications.push_back(message);
    }

    // ===== Inspection =====

    /// Topics of all open subscriptions, sorted.
    pub fn open_topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = self.open.values().map(|s| s.topic.as_str()).collect();
        topics.sort_unstable();
        topics
    }

    pub fn open_subscription_count(&self) -> usize {
        self.open.len()
    }

    pub fn closed_subscription_count(&self) -> usize {
        self.closed
    }

    pub fn pending_notifications(&self) -> usize {
        self.notifications.len()
    }

    /// Command codes received so far, in order.
    pub fn commands_sent(&self) -> &[i32] {
        &self.commands
    }

    /// Number of reply receives that failed because the buffer was too small.
    pub fn truncated_replies(&self) -> usize {
        self.truncated_replies
    }

    // ===== Cycles =====

    pub fn cycle_count(&self) -> usize {
        self.scenario.cycles.len()
    }

    /// Applies the queue churn of cycle `index`.
    ///
    /// Returns whether the cycle asks the driver to rediscover queues.
    pub fn apply_churn(&mut self, index: usize) -> bool {
        let Some(cycle) = self.scenario.cycles.get(index).cloned() else {
            return false;
        };
        let CycleSpec {
            add_queues,
            remove_queues,
            rediscover,
            ..
        } = cycle;

        for queue in add_queues {
            self.add_queue(queue);
        }
        for name in &remove_queues {
            self.remove_queue(name);
        }
        rediscover
    }

    /// Delivers the publications of cycle `index`.
    pub fn publish_cycle(&mut self, index: usize) -> PublishOutcome {
        let publications = self
            .scenario
            .cycles
            .get(index)
            .map(|c| c.publications.clone())
            .unwrap_or_default();

        let mut outcome = PublishOutcome::default();
        for publication in &publications {
            if self.publish(publication) {
                outcome.delivered += 1;
            } else {
                outcome.dropped += 1;
            }
        }
        outcome
    }

    /// Delivers one publication if its topic is subscribed.
    pub fn publish(&mut self, publication: &PublicationSpec) -> bool {
        let Some((class, type_spec)) = self.find_type(&publication.class, &publication.type_name)
        else {
            return false;
        };

        let template = self.object_topic(class, type_spec);
        let topic = match (&publication.queue, type_spec.per_object) {
            (Some(queue), true) => template.replacen("%s", queue, 1),
            (None, false) => template,
            _ => return false,
        };

        let subscribed = self
            .open
            .values()
            .any(|s| !s.managed && s.topic == topic);
        if !subscribed {
            return false;
        }

        let samples: Vec<(i32, i64)> = publication.samples.iter().map(|(&k, &v)| (k, v)).collect();
        let message = self.encode_publication(
            class.index,
            type_spec.index,
            publication.queue.as_deref(),
            &samples,
        );
        self.notifications.push_back(message);
        true
    }

    /// Encodes a resource publication the way the server lays it out.
    pub fn encode_publication(
        &self,
        class: i32,
        type_index: i32,
        queue: Option<&str>,
        samples: &[(i32, i64)],
    ) -> Vec<u8> {
        let mut params = vec![
            RawParameter::string(MQCA_Q_MGR_NAME, self.scenario.qmgr.as_str()),
            RawParameter::integer(MQIAMO_MONITOR_CLASS, class as i64),
            RawParameter::integer(MQIAMO_MONITOR_TYPE, type_index as i64),
            RawParameter::integer64(MQIAMO64_MONITOR_INTERVAL, PUBLICATION_INTERVAL_MICROS),
        ];
        if let Some(queue) = queue {
            params.push(RawParameter::string(MQCA_Q_NAME, queue));
        }
        for &(element, value) in samples {
            params.push(RawParameter::integer64(element, value));
        }

        let header = PcfHeader {
            kind: MQCFT_STATISTICS,
            ..PcfHeader::response(0, params.len() as u32)
        };
        MockCodec.encode_message(&header, &params)
    }

    // ===== Topics and metadata =====

    fn monitor_root(&self) -> String {
        format!("{}/INFO/QMGR/{}/Monitor", self.meta_root, self.scenario.qmgr)
    }

    fn types_topic(&self, class: &ClassSpec) -> String {
        format!("{}/METADATA/{}/TYPES", self.monitor_root(), class.name)
    }

    fn elements_topic(&self, class: &ClassSpec, type_spec: &TypeSpec) -> String {
        format!(
            "{}/METADATA/{}/{}",
            self.monitor_root(),
            class.name,
            type_spec.name
        )
    }

    fn object_topic(&self, class: &ClassSpec, type_spec: &TypeSpec) -> String {
        if type_spec.per_object {
            format!("{}/{}/%s/{}", self.monitor_root(), class.name, type_spec.name)
        } else {
            format!("{}/{}/{}", self.monitor_root(), class.name, type_spec.name)
        }
    }

    fn find_type(&self, class: &str, type_name: &str) -> Option<(&ClassSpec, &TypeSpec)> {
        let class = self.scenario.schema.iter().find(|c| c.name == class)?;
        let type_spec = class.types.iter().find(|t| t.name == type_name)?;
        Some((class, type_spec))
    }

    /// Builds the retained metadata message for a topic, if there is one.
    fn metadata_message(&mut self, topic: &str) -> Option<Vec<u8>> {
        let classes_suffix = format!(
            "/INFO/QMGR/{}/Monitor/METADATA/CLASSES",
            self.scenario.qmgr
        );
        if let Some(root) = topic.strip_suffix(&classes_suffix) {
            self.meta_root = root.to_string();
            return Some(self.classes_message());
        }

        for class in &self.scenario.schema {
            if topic == self.types_topic(class) {
                return Some(self.types_message(class));
            }
            for type_spec in &class.types {
                let elements_topic = self.elements_topic(class, type_spec);
                if topic == elements_topic {
                    return self.elements_message(class, type_spec, None);
                }
                if let Some(locale) = topic
                    .strip_prefix(elements_topic.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
                {
                    return self.elements_message(class, type_spec, Some(locale));
                }
            }
        }
        None
    }

    fn classes_message(&self) -> Vec<u8> {
        let mut params = vec![RawParameter::string(
            MQCA_Q_MGR_NAME,
            self.scenario.qmgr.as_str(),
        )];
        for class in &self.scenario.schema {
            params.extend([
                RawParameter::group(MQGACF_MONITOR_CLASS, 5),
                RawParameter::integer(MQIAMO_MONITOR_CLASS, class.index as i64),
                RawParameter::integer(MQIAMO_MONITOR_FLAGS, class.flags),
                RawParameter::string(MQCAMO_MONITOR_CLASS, class.name.as_str()),
                RawParameter::string(MQCAMO_MONITOR_DESC, class.description.as_str()),
                RawParameter::string(MQCA_TOPIC_STRING, self.types_topic(class)),
            ]);
        }
        let count = 1 + self.scenario.schema.len();
        MockCodec.encode_message(&PcfHeader::response(0, count as u32), &params)
    }

    fn types_message(&self, class: &ClassSpec) -> Vec<u8> {
        let mut params = Vec::new();
        for type_spec in &class.types {
            params.extend([
                RawParameter::group(MQGACF_MONITOR_TYPE, 4),
                RawParameter::integer(MQIAMO_MONITOR_TYPE, type_spec.index as i64),
                RawParameter::string(MQCAMO_MONITOR_TYPE, type_spec.name.as_str()),
                RawParameter::string(MQCAMO_MONITOR_DESC, type_spec.description.as_str()),
                RawParameter::string(MQCA_TOPIC_STRING, self.elements_topic(class, type_spec)),
            ]);
        }
        let header = PcfHeader::response(0, class.types.len() as u32);
        MockCodec.encode_message(&header, &params)
    }

    /// English element metadata, or the translations for `locale`.
    ///
    /// A locale without any translation has no retained message.
    fn elements_message(
        &self,
        class: &ClassSpec,
        type_spec: &TypeSpec,
        locale: Option<&str>,
    ) -> Option<Vec<u8>> {
        let mut params = vec![RawParameter::string(
            MQCA_TOPIC_STRING,
            self.object_topic(class, type_spec),
        )];
        let mut groups = 0;
        for element in &type_spec.elements {
            let description = match locale {
                None => element.description.as_str(),
                Some(locale) => match element.translations.get(locale) {
                    Some(text) => text.as_str(),
                    None => continue,
                },
            };
            params.extend([
                RawParameter::group(MQGACF_MONITOR_ELEMENT, 3),
                RawParameter::integer(MQIAMO_MONITOR_ELEMENT, element.index as i64),
                RawParameter::integer(MQIAMO_MONITOR_DATATYPE, element.datatype as i64),
                RawParameter::string(MQCAMO_MONITOR_DESC, description),
            ]);
            groups += 1;
        }

        if locale.is_some() && groups == 0 {
            return None;
        }
        let header = PcfHeader::response(0, 1 + groups);
        Some(MockCodec.encode_message(&header, &params))
    }

    // ===== Commands =====

    fn answer_command(&mut self, command: i32, pattern: &str) {
        if let Some(reason) = self.pending_command_failure.take() {
            self.push_failed_reply(command, reason);
            return;
        }

        match command {
            MQCMD_INQUIRE_Q_NAMES => {
                let names: Vec<String> = self
                    .queues
                    .keys()
                    .filter(|name| pattern_match(name, pattern))
                    .cloned()
                    .collect();
                self.push_names_reply(command, MQCACF_Q_NAMES, names);
            }
            MQCMD_INQUIRE_CHANNEL_NAMES => {
                self.push_names_reply(command, MQCACH_CHANNEL_NAMES, Vec::new());
            }
            MQCMD_INQUIRE_Q => {
                let matching: Vec<QueueSpec> = self
                    .queues
                    .values()
                    .filter(|q| pattern_match(&q.name, pattern))
                    .cloned()
                    .collect();
                if matching.is_empty() {
                    self.push_failed_reply(command, MQRC_UNKNOWN_OBJECT_NAME);
                    return;
                }
                let last = matching.len() - 1;
                for (i, queue) in matching.into_iter().enumerate() {
                    let params = [
                        RawParameter::string(MQCA_Q_NAME, queue.name),
                        RawParameter::integer(MQIA_Q_TYPE, MQQT_LOCAL as i64),
                        RawParameter::integer(MQIA_MAX_Q_DEPTH, queue.max_depth as i64),
                        RawParameter::integer(MQIA_USAGE, queue.usage as i64),
                    ];
                    let header = PcfHeader {
                        control: if i == last { MQCFC_LAST } else { MQCFC_NOT_LAST },
                        ..PcfHeader::response(command, params.len() as u32)
                    };
                    self.command_replies
                        .push_back(MockCodec.encode_message(&header, &params));
                }
            }
            other => self.push_failed_reply(other, MQRC_UNEXPECTED_ERROR),
        }
    }

    fn push_names_reply(&mut self, command: i32, parameter: i32, names: Vec<String>) {
        let message = if names.is_empty() {
            MockCodec.encode_message(&PcfHeader::response(command, 0), &[])
        } else {
            MockCodec.encode_message(
                &PcfHeader::response(command, 1),
                &[RawParameter::string_list(parameter, names)],
            )
        };
        self.command_replies.push_back(message);
    }

    fn push_failed_reply(&mut self, command: i32, reason: i32) {
        let header = PcfHeader {
            comp_code: MQCC_FAILED,
            reason,
            ..PcfHeader::response(command, 0)
        };
        self.command_replies
            .push_back(MockCodec.encode_message(&header, &[]));
    }
}

impl Transport for MockQueueManager {
    fn resolved_qmgr_name(&self) -> &str {
        &self.scenario.qmgr
    }

    fn supports_publications(&self) -> bool {
        self.scenario.publications_supported
    }

    fn subscribe(&mut self, topic: &str, managed: bool) -> Result<Subscription, MqReturn> {
        if self.failing_topics.iter().any(|t| t == topic) {
            return Err(MqReturn::failed(MQRC_NOT_AUTHORIZED));
        }

        let id = self.next_handle;
        self.next_handle += 1;
        self.open.insert(
            id,
            OpenSubscription {
                topic: topic.to_string(),
                managed,
            },
        );
        debug!(topic = %topic, managed, handle = id, "mock subscription opened");

        let source = if managed {
            let mut queue = VecDeque::new();
            if let Some(message) = self.metadata_message(topic) {
                queue.push_back(message);
            }
            self.managed.insert(id, queue);
            ReplySource::Managed(id)
        } else {
            ReplySource::Notifications
        };

        Ok(Subscription {
            handle: SubHandle(id),
            source,
        })
    }

    fn close_subscription(&mut self, handle: SubHandle) -> Result<(), MqReturn> {
        if self.open.remove(&handle.0).is_none() {
            return Err(MqReturn::failed(MQRC_HOBJ_ERROR));
        }
        self.managed.remove(&handle.0);
        self.closed += 1;
        Ok(())
    }

    fn receive(&mut self, source: ReplySource, _wait: bool) -> Result<Vec<u8>, MqReturn> {
        match source {
            ReplySource::Notifications => {
                if let Some(error) = self.pending_receive_error.take() {
                    return Err(error);
                }
                self.notifications.pop_front().ok_or_else(MqReturn::no_message)
            }
            ReplySource::Managed(id) => self
                .managed
                .get_mut(&id)
                .ok_or(MqReturn::failed(MQRC_HOBJ_ERROR))?
                .pop_front()
                .ok_or_else(MqReturn::no_message),
        }
    }

    fn send_command(&mut self, request: &[u8]) -> Result<(), MqReturn> {
        let request = parse_response(&MockCodec, request)
            .map_err(|_| MqReturn::failed(MQRC_UNEXPECTED_ERROR))?;
        let command = request.header.command;
        self.commands.push(command);

        let pattern = request
            .scalars()
            .find(|s| s.parameter == MQCA_Q_NAME || s.parameter == MQCACH_CHANNEL_NAME)
            .and_then(|s| s.string())
            .unwrap_or("*")
            .to_string();

        self.answer_command(command, &pattern);
        Ok(())
    }

    fn receive_command_reply(&mut self, buffer_size: usize) -> Result<Vec<u8>, MqReturn> {
        let Some(front) = self.command_replies.front() else {
            return Err(MqReturn::no_message());
        };
        if front.len() > buffer_size {
            self.truncated_replies += 1;
            return Err(MqReturn::truncated());
        }
        self.command_replies.pop_front().ok_or_else(MqReturn::no_message)
    }

    fn clear_command_replies(&mut self) {
        self.command_replies.clear();
    }

    fn reply_queue_attributes(&mut self) -> Result<ReplyQueueAttributes, MqReturn> {
        let spec = &self.scenario.reply_queue;
        Ok(ReplyQueueAttributes {
            name: spec.name.clone(),
            max_depth: spec.max_depth,
            definition_type: if spec.predefined {
                DefinitionType::Predefined
            } else {
                DefinitionType::TemporaryDynamic
            },
        })
    }
}
