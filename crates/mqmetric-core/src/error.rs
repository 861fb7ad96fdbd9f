//! Error types for discovery, subscription and publication processing.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::pcf::constants::{
    MQCC_FAILED, MQCC_OK, MQCC_WARNING, MQRC_NO_MSG_AVAILABLE, MQRC_TRUNCATED_MSG_FAILED,
};

/// Completion code of a transport call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompCode {
    Ok,
    Warning,
    Failed,
}

impl CompCode {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            MQCC_OK => CompCode::Ok,
            MQCC_WARNING => CompCode::Warning,
            _ => CompCode::Failed,
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            CompCode::Ok => MQCC_OK,
            CompCode::Warning => MQCC_WARNING,
            CompCode::Failed => MQCC_FAILED,
        }
    }
}

impl fmt::Display for CompCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompCode::Ok => write!(f, "MQCC_OK"),
            CompCode::Warning => write!(f, "MQCC_WARNING"),
            CompCode::Failed => write!(f, "MQCC_FAILED"),
        }
    }
}

/// Failure reported by the transport, as a completion/reason code pair.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{comp_code} [{}] RC [{reason}]", .comp_code.as_raw())]
pub struct MqReturn {
    pub comp_code: CompCode,
    pub reason: i32,
}

impl MqReturn {
    pub fn failed(reason: i32) -> Self {
        Self {
            comp_code: CompCode::Failed,
            reason,
        }
    }

    pub fn no_message() -> Self {
        Self::failed(MQRC_NO_MSG_AVAILABLE)
    }

    pub fn truncated() -> Self {
        Self::failed(MQRC_TRUNCATED_MSG_FAILED)
    }

    pub fn is_no_message(&self) -> bool {
        self.reason == MQRC_NO_MSG_AVAILABLE
    }

    pub fn is_truncated(&self) -> bool {
        self.comp_code != CompCode::Ok && self.reason == MQRC_TRUNCATED_MSG_FAILED
    }
}

/// A message could not be decoded.
#[derive(Error, Debug)]
pub enum PcfError {
    #[error("message ends at {len} bytes, expected more data at offset {offset}")]
    Truncated { offset: usize, len: usize },

    #[error("group nested inside a group (parameter {parameter})")]
    NestedGroup { parameter: i32 },

    #[error("decode failed: {0}")]
    Decode(String),
}

/// An object name pattern list is malformed or could not be read.
#[derive(Error, Debug)]
pub enum PatternError {
    #[error("Object pattern '{0}' is not valid. '*' must be last character in a pattern")]
    Wildcard(String),

    #[error("Object pattern '{0}' is not valid. '!' must be first character in a pattern")]
    Negation(String),

    #[error("Error reading pattern file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Discovery stage, used to locate protocol errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStage {
    Classes,
    Types,
    Elements,
}

impl fmt::Display for DiscoveryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryStage::Classes => write!(f, "class"),
            DiscoveryStage::Types => write!(f, "type"),
            DiscoveryStage::Elements => write!(f, "element"),
        }
    }
}

/// Main error type for monitor operations.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Transport call failed.
    #[error("transport error: {0}")]
    Transport(#[from] MqReturn),

    /// Message could not be decoded.
    #[error("malformed message: {0}")]
    Pcf(#[from] PcfError),

    /// Invalid object pattern.
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// The server sent a metadata field this schema version does not know.
    #[error("Unknown parameter {parameter} in {stage} discovery")]
    UnknownParameter {
        stage: DiscoveryStage,
        parameter: i32,
    },

    /// A known metadata field arrived without a value.
    #[error("Parameter {parameter} in {stage} discovery carries no value")]
    MissingValue {
        stage: DiscoveryStage,
        parameter: i32,
    },

    /// Two discovered elements map to the same metric name.
    #[error("Non-unique metric description '{0}'")]
    DuplicateMetricName(String),

    /// Subscribing to a topic failed.
    #[error("Error subscribing to {topic}: {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: MqReturn,
    },

    /// The command server rejected an inquiry.
    #[error("PCF command failed with CC {comp_code} RC {reason}")]
    CommandFailed { comp_code: i32, reason: i32 },

    /// An inquiry reply did not fit in the largest permitted buffer.
    #[error("Reply message exceeds the maximum buffer size of {max} bytes")]
    ReplyTooLarge { max: usize },

    /// Object inquiry matched nothing.
    #[error("No objects matching {patterns} of type {object_type} exist")]
    NoMatchingObjects { patterns: String, object_type: i32 },

    /// Object inquiry for an unsupported object type.
    #[error("Object type {0} is not valid")]
    InvalidObjectType(i32),

    /// An operation needs discovery to have run first.
    #[error("Need to call discover_and_subscribe first")]
    NotDiscovered,

    /// The reply queue is a predefined queue instead of a model-derived one.
    #[error("ReplyQ parameter {0} must refer to a MODEL queue")]
    PredefinedReplyQueue(String),
}

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mq_return_classifies_reason_codes() {
        assert!(MqReturn::no_message().is_no_message());
        assert!(!MqReturn::no_message().is_truncated());
        assert!(MqReturn::truncated().is_truncated());

        let warning = MqReturn {
            comp_code: CompCode::Warning,
            reason: MQRC_TRUNCATED_MSG_FAILED,
        };
        assert!(warning.is_truncated());
    }

    #[test]
    fn comp_code_round_trips_raw_values() {
        for cc in [CompCode::Ok, CompCode::Warning, CompCode::Failed] {
            assert_eq!(CompCode::from_raw(cc.as_raw()), cc);
        }
        assert_eq!(CompCode::from_raw(42), CompCode::Failed);
    }

    #[test]
    fn subscribe_error_names_topic() {
        let err = MonitorError::Subscribe {
            topic: "$SYS/MQ/INFO/QMGR/QM1/Monitor/STATQ/APP.1/GENERAL".to_string(),
            source: MqReturn::failed(2035),
        };
        assert!(err.to_string().contains("STATQ/APP.1/GENERAL"));
    }
}
