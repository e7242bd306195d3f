//! Memcache binary protocol.
//!
//! Every frame starts with a 24 byte header. The request id travels in the
//! header's opaque field and is echoed back by the server, so responses can
//! be matched to requests regardless of arrival order.

use crate::error::{DecodeError, ParseError};
use crate::request::{Request, StoreMode, MAX_KEY_LEN};
use crate::response::{Response, Value};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of a binary protocol header.
pub const HEADER_LEN: usize = 24;

/// Largest value a storage request can carry: the body length field is 32
/// bits and also covers the key and extras.
pub const MAX_VALUE_LEN: usize = u32::MAX as usize - MAX_KEY_LEN - 8;

const REQUEST_MAGIC: u8 = 0x80;
const RESPONSE_MAGIC: u8 = 0x81;

/// Binary protocol opcodes used by this client.
pub mod opcode {
    pub const GET: u8 = 0x00;
    pub const SET: u8 = 0x01;
    pub const ADD: u8 = 0x02;
    pub const REPLACE: u8 = 0x03;
    pub const DELETE: u8 = 0x04;
    pub const INCREMENT: u8 = 0x05;
    pub const DECREMENT: u8 = 0x06;
    pub const VERSION: u8 = 0x0b;
    pub const TOUCH: u8 = 0x1c;
}

const STATUS_OK: u16 = 0x0000;
const STATUS_KEY_NOT_FOUND: u16 = 0x0001;
const STATUS_KEY_EXISTS: u16 = 0x0002;
const STATUS_NOT_STORED: u16 = 0x0005;

// Incr/decr on a missing key must fail rather than create it.
const NO_AUTO_CREATE: u32 = 0xffff_ffff;

/// Appends the binary form of `request` to `dst`, tagged with `opaque`.
pub fn encode(opaque: u32, request: &Request, dst: &mut BytesMut) {
    match request {
        Request::Get { key } => {
            put_header(dst, opcode::GET, key.len(), 0, 0, opaque);
            dst.put_slice(key);
        }
        Request::Store {
            mode,
            key,
            value,
            flags,
            ttl,
        } => {
            let op = match mode {
                StoreMode::Set => opcode::SET,
                StoreMode::Add => opcode::ADD,
                StoreMode::Replace => opcode::REPLACE,
            };
            put_header(dst, op, key.len(), 8, value.len(), opaque);
            dst.put_u32(*flags);
            dst.put_u32(*ttl);
            dst.put_slice(key);
            dst.put_slice(value);
        }
        Request::Delete { key } => {
            put_header(dst, opcode::DELETE, key.len(), 0, 0, opaque);
            dst.put_slice(key);
        }
        Request::Incr { key, delta } => put_counter(dst, opcode::INCREMENT, key, *delta, opaque),
        Request::Decr { key, delta } => put_counter(dst, opcode::DECREMENT, key, *delta, opaque),
        Request::Touch { key, ttl } => {
            put_header(dst, opcode::TOUCH, key.len(), 4, 0, opaque);
            dst.put_u32(*ttl);
            dst.put_slice(key);
        }
        Request::Version => {
            put_header(dst, opcode::VERSION, 0, 0, 0, opaque);
        }
    }
}

fn put_counter(dst: &mut BytesMut, op: u8, key: &[u8], delta: u64, opaque: u32) {
    put_header(dst, op, key.len(), 20, 0, opaque);
    dst.put_u64(delta);
    dst.put_u64(0);
    dst.put_u32(NO_AUTO_CREATE);
    dst.put_slice(key);
}

fn put_header(
    dst: &mut BytesMut,
    op: u8,
    key_len: usize,
    extras_len: u8,
    value_len: usize,
    opaque: u32,
) {
    let body_len = key_len + usize::from(extras_len) + value_len;
    debug_assert!(key_len <= MAX_KEY_LEN && value_len <= MAX_VALUE_LEN);
    dst.reserve(HEADER_LEN + body_len);
    dst.put_u8(REQUEST_MAGIC);
    dst.put_u8(op);
    dst.put_u16(key_len as u16);
    dst.put_u8(extras_len);
    dst.put_u8(0); // data type
    dst.put_u16(0); // vbucket
    dst.put_u32(body_len as u32);
    dst.put_u32(opaque);
    dst.put_u64(0); // cas
}

/// Decodes one complete response frame from the front of `src`, returning
/// the echoed opaque together with the response.
///
/// Returns `Ok(None)` and leaves `src` untouched when more bytes are needed.
/// Errors found after the header was read carry its opaque.
pub fn decode(
    src: &mut BytesMut,
    max_value_len: usize,
) -> Result<Option<(u32, Response)>, DecodeError> {
    if src.len() < HEADER_LEN {
        // Reject garbage early instead of waiting for a full header.
        if let Some(&magic) = src.first() {
            if magic != RESPONSE_MAGIC {
                return Err(ParseError::InvalidMagic(magic).into());
            }
        }
        return Ok(None);
    }

    let mut header = &src[..HEADER_LEN];
    let magic = header.get_u8();
    if magic != RESPONSE_MAGIC {
        return Err(ParseError::InvalidMagic(magic).into());
    }
    let op = header.get_u8();
    let key_len = usize::from(header.get_u16());
    let extras_len = usize::from(header.get_u8());
    let _data_type = header.get_u8();
    let status = header.get_u16();
    let body_len = header.get_u32() as usize;
    let opaque = header.get_u32();
    let cas = header.get_u64();

    if body_len > max_value_len + extras_len + key_len {
        return Err(DecodeError::in_frame(opaque, ParseError::FrameTooLarge(body_len)));
    }
    if extras_len + key_len > body_len {
        return Err(DecodeError::in_frame(
            opaque,
            ParseError::Malformed("extras and key exceed body length"),
        ));
    }
    if src.len() < HEADER_LEN + body_len {
        return Ok(None);
    }

    let mut body = src.split_to(HEADER_LEN + body_len).freeze();
    body.advance(HEADER_LEN);
    let extras = body.split_to(extras_len);
    body.advance(key_len);

    let response = interpret(op, status, &extras, body, cas)
        .map_err(|error| DecodeError::in_frame(opaque, error))?;
    Ok(Some((opaque, response)))
}

fn interpret(
    op: u8,
    status: u16,
    extras: &[u8],
    value: Bytes,
    cas: u64,
) -> Result<Response, ParseError> {
    if !matches!(
        op,
        opcode::GET
            | opcode::SET
            | opcode::ADD
            | opcode::REPLACE
            | opcode::DELETE
            | opcode::INCREMENT
            | opcode::DECREMENT
            | opcode::VERSION
            | opcode::TOUCH
    ) {
        return Err(ParseError::UnknownOpcode(op));
    }

    let response = match status {
        STATUS_OK => match op {
            opcode::GET => {
                let mut extras = extras;
                if extras.len() < 4 {
                    return Err(ParseError::Malformed("GET response without flags"));
                }
                Response::Hit(Value {
                    data: value,
                    flags: extras.get_u32(),
                    cas: (cas != 0).then_some(cas),
                })
            }
            opcode::SET | opcode::ADD | opcode::REPLACE => Response::Stored,
            opcode::DELETE => Response::Deleted,
            opcode::INCREMENT | opcode::DECREMENT => {
                let mut value = value;
                if value.len() != 8 {
                    return Err(ParseError::Malformed("counter response is not 8 bytes"));
                }
                Response::Numeric(value.get_u64())
            }
            opcode::TOUCH => Response::Touched,
            _ => Response::Version(String::from_utf8_lossy(&value).into_owned()),
        },
        STATUS_KEY_NOT_FOUND => match op {
            opcode::GET => Response::Miss,
            opcode::REPLACE => Response::NotStored,
            _ => Response::NotFound,
        },
        STATUS_KEY_EXISTS => match op {
            opcode::ADD => Response::NotStored,
            _ => Response::Exists,
        },
        STATUS_NOT_STORED => Response::NotStored,
        _ => Response::ServerError(String::from_utf8_lossy(&value).into_owned()),
    };
    Ok(response)
}
