use crate::error::DecodeError;
use crate::request::Request;
use crate::response::Response;
use crate::{ascii, binary};
use bytes::BytesMut;

/// Largest value payload the decoder accepts by default.
pub const DEFAULT_MAX_VALUE_LEN: usize = 16 * 1024 * 1024;

/// Wire protocol spoken on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    /// Text protocol. Responses arrive in request order.
    #[default]
    Ascii,
    /// Binary protocol. Responses carry the request id.
    Binary,
}

impl Protocol {
    /// Whether responses are matched to requests by id rather than by order.
    pub fn correlates_by_id(self) -> bool {
        matches!(self, Protocol::Binary)
    }

    /// Protocol name for logging.
    pub fn name(self) -> &'static str {
        match self {
            Protocol::Ascii => "ascii",
            Protocol::Binary => "binary",
        }
    }
}

/// A decoded response together with the request id it answers, if the
/// protocol carries one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Echoed request id. Always `None` for the ascii protocol.
    pub opaque: Option<u32>,
    /// The decoded response.
    pub response: Response,
}

/// Encoder and decoder for one connection.
///
/// The codec holds no per-stream state; partial input stays in the caller's
/// buffer until a full response is available.
#[derive(Debug, Clone)]
pub struct Codec {
    protocol: Protocol,
    max_value_len: usize,
}

impl Codec {
    /// Creates a codec for the given protocol.
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            max_value_len: DEFAULT_MAX_VALUE_LEN,
        }
    }

    /// Sets the largest value payload accepted in a response.
    pub fn with_max_value_len(mut self, max_value_len: usize) -> Self {
        self.max_value_len = max_value_len;
        self
    }

    /// Protocol this codec speaks.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Appends the wire form of `request` to `dst`.
    ///
    /// `id` is written into the binary header and ignored by the ascii
    /// protocol.
    pub fn encode(&self, id: u32, request: &Request, dst: &mut BytesMut) {
        match self.protocol {
            Protocol::Ascii => ascii::encode(request, dst),
            Protocol::Binary => binary::encode(id, request, dst),
        }
    }

    /// Decodes the next complete response from `src`.
    ///
    /// A binary frame whose header was readable reports its opaque in the
    /// error.
    pub fn decode(&self, src: &mut BytesMut) -> Result<Option<Frame>, DecodeError> {
        match self.protocol {
            Protocol::Ascii => Ok(ascii::decode(src, self.max_value_len)?.map(|response| Frame {
                opaque: None,
                response,
            })),
            Protocol::Binary => Ok(binary::decode(src, self.max_value_len)?.map(
                |(opaque, response)| Frame {
                    opaque: Some(opaque),
                    response,
                },
            )),
        }
    }
}
