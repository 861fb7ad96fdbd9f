//! Abstractions over the queue manager connection and the PCF codec.
//!
//! The core never opens queues or lays out bytes itself. A production build
//! plugs in an implementation backed by the messaging client library; tests
//! and the replay tool use [`mock::MockQueueManager`] with [`mock::MockCodec`].

pub mod mock;

use std::fmt;

use crate::error::{MqReturn, PcfError};
use crate::pcf::constants::{
    MQQDT_PERMANENT_DYNAMIC, MQQDT_PREDEFINED, MQQDT_SHARED_DYNAMIC, MQQDT_TEMPORARY_DYNAMIC,
};
use crate::pcf::{PcfHeader, RawParameter};

/// Opaque handle of an open subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubHandle(pub u64);

/// Where messages for a subscription are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplySource {
    /// The shared reply queue that carries all resource publications.
    Notifications,
    /// A private queue created by the queue manager for a managed subscription.
    Managed(u64),
}

/// Result of a successful subscribe call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub handle: SubHandle,
    pub source: ReplySource,
}

/// How a queue was defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionType {
    Predefined,
    PermanentDynamic,
    TemporaryDynamic,
    SharedDynamic,
    Other(i32),
}

impl DefinitionType {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            MQQDT_PREDEFINED => DefinitionType::Predefined,
            MQQDT_PERMANENT_DYNAMIC => DefinitionType::PermanentDynamic,
            MQQDT_TEMPORARY_DYNAMIC => DefinitionType::TemporaryDynamic,
            MQQDT_SHARED_DYNAMIC => DefinitionType::SharedDynamic,
            other => DefinitionType::Other(other),
        }
    }
}

impl fmt::Display for DefinitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionType::Predefined => write!(f, "PREDEFINED"),
            DefinitionType::PermanentDynamic => write!(f, "PERMANENT_DYNAMIC"),
            DefinitionType::TemporaryDynamic => write!(f, "TEMPORARY_DYNAMIC"),
            DefinitionType::SharedDynamic => write!(f, "SHARED_DYNAMIC"),
            DefinitionType::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// Attributes of the reply queue that publications are delivered to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyQueueAttributes {
    pub name: String,
    pub max_depth: i32,
    pub definition_type: DefinitionType,
}

/// Operations the core needs from an open queue manager connection.
pub trait Transport {
    /// Name of the connected queue manager, as resolved at connect time.
    fn resolved_qmgr_name(&self) -> &str;

    /// Whether the platform publishes resource statistics at all.
    fn supports_publications(&self) -> bool;

    /// Subscribes to a topic.
    ///
    /// A managed subscription gets its own reply queue; an unmanaged one
    /// delivers onto [`ReplySource::Notifications`].
    fn subscribe(&mut self, topic: &str, managed: bool) -> Result<Subscription, MqReturn>;

    /// Closes a subscription. Messages already delivered stay on their queue.
    fn close_subscription(&mut self, handle: SubHandle) -> Result<(), MqReturn>;

    /// Gets the next message from a reply source.
    ///
    /// With `wait == false` an empty source returns `MQRC_NO_MSG_AVAILABLE`
    /// immediately.
    fn receive(&mut self, source: ReplySource, wait: bool) -> Result<Vec<u8>, MqReturn>;

    /// Puts an encoded command on the command server's input queue.
    fn send_command(&mut self, request: &[u8]) -> Result<(), MqReturn>;

    /// Gets the next command reply into a buffer of `buffer_size` bytes.
    ///
    /// A reply longer than the buffer fails with `MQRC_TRUNCATED_MSG_FAILED`
    /// and stays on the queue.
    fn receive_command_reply(&mut self, buffer_size: usize) -> Result<Vec<u8>, MqReturn>;

    /// Discards stale replies left from an earlier command.
    fn clear_command_replies(&mut self);

    /// Inquires the reply queue's maximum depth and definition type.
    fn reply_queue_attributes(&mut self) -> Result<ReplyQueueAttributes, MqReturn>;
}

/// Byte-level PCF encoding, provided alongside the transport.
pub trait PcfCodec {
    /// Decodes the header at the start of `buf`, returning it and its length.
    fn decode_header(&self, buf: &[u8]) -> Result<(PcfHeader, usize), PcfError>;

    /// Decodes the parameter at the start of `buf`, returning it and its length.
    fn decode_parameter(&self, buf: &[u8]) -> Result<(RawParameter, usize), PcfError>;

    /// Encodes a command request with the given parameters.
    fn encode_command(&self, command: i32, parameters: &[RawParameter]) -> Vec<u8>;
}
