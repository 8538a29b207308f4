//! Protocol error types.

use crate::frame::CommandType;
use thiserror::Error;

/// Protocol-level errors that can occur while encoding or decoding frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unsupported message format version: {actual} (expected {expected})")]
    UnsupportedVersion { expected: u64, actual: u64 },

    #[error("unexpected command type: {actual:?} (expected {expected:?})")]
    UnexpectedCommand {
        expected: CommandType,
        actual: CommandType,
    },

    #[error("unknown {kind} value: {value}")]
    UnknownVariant { kind: &'static str, value: i64 },

    #[error("truncated message: need {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("image id mismatch: sent {sent}, reply carries {received}")]
    ImageIdMismatch { sent: u32, received: u32 },

    #[error("scalar score {0} does not represent an integer")]
    InexactScore(f64),

    #[error("invalid matrix shape: {rows}x{cols}x{channels}")]
    InvalidMatrixShape { rows: i32, cols: i32, channels: i32 },

    #[error("unsupported image channel count: {0}")]
    UnsupportedChannels(i32),

    #[error("sequence too long: {len} elements (max {max})")]
    SequenceTooLong { len: usize, max: usize },

    #[error("pixel buffer size mismatch: expected {expected} bytes, got {actual}")]
    PixelBufferSize { expected: usize, actual: usize },
}

impl ProtocolError {
    pub(crate) fn unknown(kind: &'static str, value: impl Into<i64>) -> Self {
        ProtocolError::UnknownVariant {
            kind,
            value: value.into(),
        }
    }
}
