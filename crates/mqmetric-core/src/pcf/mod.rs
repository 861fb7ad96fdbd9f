//! Decoded form of the queue manager's programmable command format (PCF).
//!
//! The byte layout belongs to the codec (see [`crate::transport::PcfCodec`]);
//! this module only assembles what the codec yields into a flat list of
//! [`Parameter`]s. Groups carry exactly one level of scalar children, the
//! server never nests groups inside groups.

pub mod constants;

use serde::{Deserialize, Serialize};

use crate::error::PcfError;
use crate::transport::PcfCodec;
use constants::*;

/// Header of a PCF message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcfHeader {
    /// Structure type (`MQCFT_COMMAND`, `MQCFT_RESPONSE`, ...).
    pub kind: i32,
    pub command: i32,
    /// `MQCFC_LAST` on the final message of a reply set.
    pub control: i32,
    pub comp_code: i32,
    pub reason: i32,
    /// Number of top-level parameters. Group children are not counted.
    pub parameter_count: u32,
}

impl PcfHeader {
    /// Header for a command request.
    pub fn command(command: i32, parameter_count: u32) -> Self {
        Self {
            kind: MQCFT_COMMAND_XR,
            command,
            control: MQCFC_LAST,
            comp_code: MQCC_OK,
            reason: MQRC_NONE,
            parameter_count,
        }
    }

    /// Header for a successful, final response.
    pub fn response(command: i32, parameter_count: u32) -> Self {
        Self {
            kind: MQCFT_RESPONSE,
            command,
            control: MQCFC_LAST,
            comp_code: MQCC_OK,
            reason: MQRC_NONE,
            parameter_count,
        }
    }

    pub fn is_last(&self) -> bool {
        self.control == MQCFC_LAST
    }
}

/// A parameter exactly as the codec decodes it, before group assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawParameter {
    pub kind: i32,
    pub parameter: i32,
    pub strings: Vec<String>,
    pub ints: Vec<i64>,
    /// For groups: how many of the following parameters belong to the group.
    pub group_count: u32,
}

impl RawParameter {
    pub fn integer(parameter: i32, value: i64) -> Self {
        Self::with_kind(MQCFT_INTEGER, parameter, Vec::new(), vec![value])
    }

    pub fn integer64(parameter: i32, value: i64) -> Self {
        Self::with_kind(MQCFT_INTEGER64, parameter, Vec::new(), vec![value])
    }

    pub fn integer_list(parameter: i32, values: Vec<i64>) -> Self {
        Self::with_kind(MQCFT_INTEGER_LIST, parameter, Vec::new(), values)
    }

    pub fn string(parameter: i32, value: impl Into<String>) -> Self {
        Self::with_kind(MQCFT_STRING, parameter, vec![value.into()], Vec::new())
    }

    pub fn string_list(parameter: i32, values: Vec<String>) -> Self {
        Self::with_kind(MQCFT_STRING_LIST, parameter, values, Vec::new())
    }

    pub fn group(parameter: i32, group_count: u32) -> Self {
        Self {
            kind: MQCFT_GROUP,
            parameter,
            strings: Vec::new(),
            ints: Vec::new(),
            group_count,
        }
    }

    fn with_kind(kind: i32, parameter: i32, strings: Vec<String>, ints: Vec<i64>) -> Self {
        Self {
            kind,
            parameter,
            strings,
            ints,
            group_count: 0,
        }
    }

    fn into_scalar(self) -> Scalar {
        Scalar {
            kind: self.kind,
            parameter: self.parameter,
            strings: self.strings,
            ints: self.ints,
        }
    }
}

/// A non-group parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar {
    pub kind: i32,
    pub parameter: i32,
    pub strings: Vec<String>,
    pub ints: Vec<i64>,
}

impl Scalar {
    /// First integer value, if the parameter carries any.
    pub fn int(&self) -> Option<i64> {
        self.ints.first().copied()
    }

    /// First string value with the server's blank padding removed.
    pub fn string(&self) -> Option<&str> {
        self.strings.first().map(|s| s.trim())
    }
}

/// A decoded top-level parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameter {
    Scalar(Scalar),
    Group { parameter: i32, children: Vec<Scalar> },
}

/// A fully decoded PCF message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub header: PcfHeader,
    pub parameters: Vec<Parameter>,
}

impl Response {
    /// Iterates over the children of every top-level group.
    pub fn groups(&self) -> impl Iterator<Item = &[Scalar]> {
        self.parameters.iter().filter_map(|p| match p {
            Parameter::Group { children, .. } => Some(children.as_slice()),
            Parameter::Scalar(_) => None,
        })
    }

    /// Iterates over top-level scalars, skipping groups.
    pub fn scalars(&self) -> impl Iterator<Item = &Scalar> {
        self.parameters.iter().filter_map(|p| match p {
            Parameter::Scalar(s) => Some(s),
            Parameter::Group { .. } => None,
        })
    }
}

/// Decodes a complete message into a header and a flat parameter list.
pub fn parse_response<C: PcfCodec + ?Sized>(codec: &C, buf: &[u8]) -> Result<Response, PcfError> {
    let (header, mut offset) = codec.decode_header(buf)?;
    let mut parameters = Vec::with_capacity(header.parameter_count as usize);

    for _ in 0..header.parameter_count {
        let (raw, read) = codec.decode_parameter(remaining(buf, offset)?)?;
        offset += read;

        if raw.kind != MQCFT_GROUP {
            parameters.push(Parameter::Scalar(raw.into_scalar()));
            continue;
        }

        let mut children = Vec::with_capacity(raw.group_count as usize);
        for _ in 0..raw.group_count {
            let (child, read) = codec.decode_parameter(remaining(buf, offset)?)?;
            offset += read;
            if child.kind == MQCFT_GROUP {
                return Err(PcfError::NestedGroup {
                    parameter: child.parameter,
                });
            }
            children.push(child.into_scalar());
        }
        parameters.push(Parameter::Group {
            parameter: raw.parameter,
            children,
        });
    }

    Ok(Response { header, parameters })
}

fn remaining(buf: &[u8], offset: usize) -> Result<&[u8], PcfError> {
    buf.get(offset..).ok_or(PcfError::Truncated {
        offset,
        len: buf.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockCodec;

    #[test]
    fn parse_assembles_groups_one_level_deep() {
        let codec = MockCodec;
        let buf = codec.encode_message(
            &PcfHeader::response(0, 2),
            &[
                RawParameter::string(MQCA_TOPIC_STRING, "a/b/%s"),
                RawParameter::group(MQIAMO_MONITOR_ELEMENT, 2),
                RawParameter::integer(MQIAMO_MONITOR_ELEMENT, 3),
                RawParameter::string(MQCAMO_MONITOR_DESC, "Queue depth  "),
            ],
        );

        let response = parse_response(&codec, &buf).unwrap();
        assert!(response.header.is_last());
        assert_eq!(response.parameters.len(), 2);
        assert_eq!(response.scalars().count(), 1);

        let groups: Vec<_> = response.groups().collect();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0][0].int(), Some(3));
        assert_eq!(groups[0][1].string(), Some("Queue depth"));
    }

    #[test]
    fn parse_rejects_nested_group() {
        let codec = MockCodec;
        let buf = codec.encode_message(
            &PcfHeader::response(0, 1),
            &[
                RawParameter::group(1, 1),
                RawParameter::group(2, 0),
            ],
        );

        let err = parse_response(&codec, &buf).unwrap_err();
        assert!(matches!(err, PcfError::NestedGroup { parameter: 2 }));
    }

    #[test]
    fn parse_reports_short_message() {
        let codec = MockCodec;
        let buf = codec.encode_message(&PcfHeader::response(0, 3), &[RawParameter::integer(1, 1)]);

        assert!(parse_response(&codec, &buf).is_err());
    }
}
