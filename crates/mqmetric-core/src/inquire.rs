//! Command server inquiries: object names and queue attributes.
//!
//! Replies are read into a buffer that starts at [`INITIAL_BUF_SIZE`] and
//! doubles every time the transport reports a truncated message, up to
//! [`MAX_BUF_SIZE`]. A reply set ends with the message flagged `MQCFC_LAST`.

use tracing::debug;

use crate::error::{MonitorError, PatternError, Result};
use crate::pcf::constants::*;
use crate::pcf::{RawParameter, Response, parse_response};
use crate::selector::{split_patterns, valid_wildcard};
use crate::transport::{PcfCodec, Transport};

pub const INITIAL_BUF_SIZE: usize = 32 * 1024;
pub const MAX_BUF_SIZE: usize = 100 * 1024 * 1024;

/// Outcome of an object name inquiry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectInquiry {
    /// Matching object names, in reply order.
    pub names: Vec<String>,
    /// Patterns that matched no object at all.
    pub missing: Vec<String>,
}

/// Attributes of one local queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueAttributes {
    pub name: String,
    pub max_depth: i32,
    pub usage: i32,
}

/// Sends a command and collects every reply message up to the last one.
pub fn execute_command<T: Transport, C: PcfCodec>(
    transport: &mut T,
    codec: &C,
    command: i32,
    parameters: &[RawParameter],
) -> Result<Vec<Response>> {
    execute_with_limits(
        transport,
        codec,
        command,
        parameters,
        INITIAL_BUF_SIZE,
        MAX_BUF_SIZE,
    )
}

pub(crate) fn execute_with_limits<T: Transport, C: PcfCodec>(
    transport: &mut T,
    codec: &C,
    command: i32,
    parameters: &[RawParameter],
    initial_size: usize,
    max_size: usize,
) -> Result<Vec<Response>> {
    let request = codec.encode_command(command, parameters);
    transport.send_command(&request)?;

    let mut replies = Vec::new();
    let mut buffer_size = initial_size;
    loop {
        let data = match transport.receive_command_reply(buffer_size) {
            Ok(data) => data,
            Err(e) if e.is_truncated() => {
                if buffer_size >= max_size {
                    return Err(MonitorError::ReplyTooLarge { max: max_size });
                }
                buffer_size = buffer_size.saturating_mul(2).min(max_size);
                debug!(command, buffer_size, "Reply truncated, retrying with larger buffer");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let response = parse_response(codec, &data)?;
        let last = response.header.is_last();
        replies.push(response);
        if last {
            return Ok(replies);
        }
    }
}

fn check_reply(reply: &Response) -> Result<()> {
    if reply.header.comp_code != MQCC_OK {
        return Err(MonitorError::CommandFailed {
            comp_code: reply.header.comp_code,
            reason: reply.header.reason,
        });
    }
    Ok(())
}

/// Expands a pattern list into object names, one inquiry per pattern.
///
/// Only `MQOT_Q` (local queues) and `MQOT_CHANNEL` are supported.
pub fn inquire_objects<T: Transport, C: PcfCodec>(
    transport: &mut T,
    codec: &C,
    patterns: &str,
    object_type: i32,
) -> Result<ObjectInquiry> {
    let (command, attribute, returned) = match object_type {
        MQOT_Q => (MQCMD_INQUIRE_Q_NAMES, MQCA_Q_NAME, MQCACF_Q_NAMES),
        MQOT_CHANNEL => (
            MQCMD_INQUIRE_CHANNEL_NAMES,
            MQCACH_CHANNEL_NAME,
            MQCACH_CHANNEL_NAMES,
        ),
        other => return Err(MonitorError::InvalidObjectType(other)),
    };

    transport.clear_command_replies();

    let mut inquiry = ObjectInquiry::default();
    for pattern in split_patterns(patterns) {
        if !valid_wildcard(pattern) {
            return Err(PatternError::Wildcard(pattern.to_string()).into());
        }

        let mut params = vec![RawParameter::string(attribute, pattern)];
        if command == MQCMD_INQUIRE_Q_NAMES {
            params.push(RawParameter::integer(MQIA_Q_TYPE, MQQT_LOCAL as i64));
        }

        let before = inquiry.names.len();
        for reply in execute_command(transport, codec, command, &params)? {
            check_reply(&reply)?;
            let names = reply
                .scalars()
                .filter(|s| s.parameter == returned)
                .flat_map(|s| s.strings.iter())
                .map(|n| n.trim())
                .filter(|n| !n.is_empty());
            inquiry.names.extend(names.map(String::from));
        }

        if inquiry.names.len() == before {
            inquiry.missing.push(pattern.to_string());
        }
    }

    Ok(inquiry)
}

/// Inquires max depth and usage of the local queues matching one pattern.
pub fn inquire_queue_attributes<T: Transport, C: PcfCodec>(
    transport: &mut T,
    codec: &C,
    pattern: &str,
) -> Result<Vec<QueueAttributes>> {
    transport.clear_command_replies();

    let params = [
        RawParameter::string(MQCA_Q_NAME, pattern),
        RawParameter::integer(MQIA_Q_TYPE, MQQT_LOCAL as i64),
        RawParameter::integer_list(
            MQIACF_Q_ATTRS,
            vec![
                MQCA_Q_NAME as i64,
                MQIA_MAX_Q_DEPTH as i64,
                MQIA_USAGE as i64,
            ],
        ),
    ];

    let mut queues = Vec::new();
    for reply in execute_command(transport, codec, MQCMD_INQUIRE_Q, &params)? {
        check_reply(&reply)?;

        let mut attrs = QueueAttributes {
            name: String::new(),
            max_depth: 0,
            usage: 0,
        };
        for scalar in reply.scalars() {
            match scalar.parameter {
                MQCA_Q_NAME => attrs.name = scalar.string().unwrap_or_default().to_string(),
                MQIA_MAX_Q_DEPTH => attrs.max_depth = scalar.int().unwrap_or_default() as i32,
                MQIA_USAGE => attrs.usage = scalar.int().unwrap_or_default() as i32,
                _ => {}
            }
        }
        if !attrs.name.is_empty() {
            queues.push(attrs);
        }
    }
    Ok(queues)
}
