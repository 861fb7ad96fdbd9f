//! `postcard`-based stand-in for the binary PCF layout.
//!
//! Each header and parameter is a separate postcard record, so messages can
//! be decoded record by record exactly like the real format.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::PcfError;
use crate::pcf::{PcfHeader, RawParameter};
use crate::transport::PcfCodec;

/// Codec used with [`super::MockQueueManager`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MockCodec;

impl MockCodec {
    /// Encodes a header followed by parameters.
    ///
    /// `header.parameter_count` is written as given; group children must be
    /// listed right after their group and are not counted.
    pub fn encode_message(&self, header: &PcfHeader, parameters: &[RawParameter]) -> Vec<u8> {
        let mut buf = Vec::new();
        append(&mut buf, header);
        for parameter in parameters {
            append(&mut buf, parameter);
        }
        buf
    }
}

impl PcfCodec for MockCodec {
    fn decode_header(&self, buf: &[u8]) -> Result<(PcfHeader, usize), PcfError> {
        take(buf)
    }

    fn decode_parameter(&self, buf: &[u8]) -> Result<(RawParameter, usize), PcfError> {
        take(buf)
    }

    fn encode_command(&self, command: i32, parameters: &[RawParameter]) -> Vec<u8> {
        let header = PcfHeader::command(command, parameters.len() as u32);
        self.encode_message(&header, parameters)
    }
}

fn append<T: Serialize>(buf: &mut Vec<u8>, value: &T) {
    // Plain structs into a growable Vec: the only failure mode is OOM.
    let bytes = postcard::to_allocvec(value).unwrap_or_default();
    buf.extend_from_slice(&bytes);
}

fn take<T: DeserializeOwned>(buf: &[u8]) -> Result<(T, usize), PcfError> {
    let (value, rest) =
        postcard::take_from_bytes::<T>(buf).map_err(|e| PcfError::Decode(e.to_string()))?;
    Ok((value, buf.len() - rest.len()))
}
