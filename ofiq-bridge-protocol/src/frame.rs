//! Frame header.
//!
//! Every frame, request or reply, starts with the same 9-byte header:
//!
//! ```text
//! +----------------+---------+---------------------------+
//! | format_version | command | payload (command-specific) |
//! | 8 bytes (u64)  | 1 byte  |                           |
//! +----------------+---------+---------------------------+
//! ```

use crate::codec::{Decoder, Encoder};
use crate::error::ProtocolError;
use crate::MESSAGE_FORMAT_VERSION;

/// Size of the frame header in bytes (8 + 1).
pub const HEADER_SIZE: usize = 9;

/// Command type carried in every frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandType {
    /// Liveness check, header only in both directions.
    Ping = 0,
    /// Asks the engine to exit, header only in both directions.
    Shutdown = 1,
    /// Image assessment request and its reply.
    ProcessImage = 2,
    /// Sent by the engine when it could not parse a request.
    ProcessingFailed = 255,
}

impl TryFrom<u8> for CommandType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CommandType::Ping),
            1 => Ok(CommandType::Shutdown),
            2 => Ok(CommandType::ProcessImage),
            255 => Ok(CommandType::ProcessingFailed),
            _ => Err(ProtocolError::unknown("command type", value)),
        }
    }
}

/// A parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub format_version: u64,
    pub command: CommandType,
}

impl Header {
    /// Creates a header for the current format version.
    pub fn new(command: CommandType) -> Self {
        Self {
            format_version: MESSAGE_FORMAT_VERSION,
            command,
        }
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.put(self.format_version);
        enc.put(self.command as u8);
    }

    /// Decodes a header, rejecting any format version but the current one.
    pub fn decode(dec: &mut Decoder) -> Result<Self, ProtocolError> {
        let format_version = dec.get::<u64>()?;
        if format_version != MESSAGE_FORMAT_VERSION {
            return Err(ProtocolError::UnsupportedVersion {
                expected: MESSAGE_FORMAT_VERSION,
                actual: format_version,
            });
        }
        let command = CommandType::try_from(dec.get::<u8>()?)?;
        Ok(Self {
            format_version,
            command,
        })
    }

    /// Decodes a header and checks it carries `expected`.
    pub fn decode_expecting(
        dec: &mut Decoder,
        expected: CommandType,
    ) -> Result<Self, ProtocolError> {
        let header = Self::decode(dec)?;
        if header.command != expected {
            return Err(ProtocolError::UnexpectedCommand {
                expected,
                actual: header.command,
            });
        }
        Ok(header)
    }
}
