//! Protocol-level error types.

use thiserror::Error;

/// Errors that can occur while interpreting CQL frame data.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame body is truncated or incomplete.
    #[error("incomplete frame body: expected {expected} bytes, got {actual}")]
    IncompleteBody {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes available.
        actual: usize,
    },

    /// Invalid opcode value.
    #[error("invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// ERROR body inspected on a frame that is not an ERROR frame.
    #[error("frame is not an ERROR frame (opcode {0})")]
    NotAnError(crate::frame::Opcode),

    /// String in a frame body is not valid UTF-8.
    #[error("invalid string encoding in frame body")]
    InvalidString,
}
