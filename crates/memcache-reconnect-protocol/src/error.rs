//! Error types for response decoding.

/// A fatal decoding error.
///
/// Needing more bytes is not an error: decoders return `Ok(None)` in that
/// case. Every variant here means the byte stream can no longer be trusted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// A line the client does not understand, including `ERROR` and
    /// `CLIENT_ERROR` replies.
    #[error("Unexpected line: {0}")]
    UnexpectedLine(String),

    /// Invalid number format.
    #[error("invalid number in response")]
    InvalidNumber,

    /// A response line exceeded the maximum accepted length.
    #[error("response line too long")]
    LineTooLong,

    /// A binary frame body exceeded the maximum accepted length.
    #[error("response frame too large: {0} bytes")]
    FrameTooLarge(usize),

    /// Invalid structure (static message).
    #[error("malformed response: {0}")]
    Malformed(&'static str),

    /// Invalid magic byte in binary protocol.
    #[error("invalid magic byte: {0:#04x}")]
    InvalidMagic(u8),

    /// Unknown opcode in binary protocol.
    #[error("unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),
}

/// A [`ParseError`] together with the request id of the frame it was found
/// in.
///
/// `opaque` is set when the binary header was readable, so the request the
/// broken frame answers can be failed on its own. It is always `None` for
/// the ascii protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{error}")]
pub struct DecodeError {
    /// Request id from the frame header, if one was read.
    pub opaque: Option<u32>,
    /// What was wrong with the frame.
    pub error: ParseError,
}

impl DecodeError {
    /// Attaches the request id of the offending frame.
    pub fn in_frame(opaque: u32, error: ParseError) -> Self {
        Self {
            opaque: Some(opaque),
            error,
        }
    }
}

impl From<ParseError> for DecodeError {
    fn from(error: ParseError) -> Self {
        Self {
            opaque: None,
            error,
        }
    }
}
