//! Memcache text protocol.
//!
//! Text responses carry no correlation id: the n-th response answers the
//! n-th request written on the connection. Decoding is therefore stateless
//! and a response is only consumed from the buffer once it is complete.

use crate::error::ParseError;
use crate::request::Request;
use crate::response::{Response, Value};
use bytes::{Buf, BufMut, BytesMut};

/// Longest response line accepted before the stream is considered broken.
pub const MAX_LINE_LEN: usize = 8 * 1024;

const CRLF: &[u8] = b"\r\n";
const END: &[u8] = b"END\r\n";

/// Appends the text form of `request` to `dst`.
pub fn encode(request: &Request, dst: &mut BytesMut) {
    match request {
        Request::Get { key } => {
            put_command(dst, "get", key);
        }
        Request::Store {
            mode,
            key,
            value,
            flags,
            ttl,
        } => {
            dst.reserve(key.len() + value.len() + 48);
            dst.put_slice(mode.command().as_bytes());
            dst.put_u8(b' ');
            dst.put_slice(key);
            dst.put_slice(format!(" {} {} {}", flags, ttl, value.len()).as_bytes());
            dst.put_slice(CRLF);
            dst.put_slice(value);
            dst.put_slice(CRLF);
        }
        Request::Delete { key } => {
            put_command(dst, "delete", key);
        }
        Request::Incr { key, delta } => {
            put_command_with_arg(dst, "incr", key, *delta);
        }
        Request::Decr { key, delta } => {
            put_command_with_arg(dst, "decr", key, *delta);
        }
        Request::Touch { key, ttl } => {
            put_command_with_arg(dst, "touch", key, u64::from(*ttl));
        }
        Request::Version => {
            dst.put_slice(b"version\r\n");
        }
    }
}

fn put_command(dst: &mut BytesMut, command: &str, key: &[u8]) {
    dst.reserve(command.len() + key.len() + 3);
    dst.put_slice(command.as_bytes());
    dst.put_u8(b' ');
    dst.put_slice(key);
    dst.put_slice(CRLF);
}

fn put_command_with_arg(dst: &mut BytesMut, command: &str, key: &[u8], arg: u64) {
    dst.reserve(command.len() + key.len() + 24);
    dst.put_slice(command.as_bytes());
    dst.put_u8(b' ');
    dst.put_slice(key);
    dst.put_slice(format!(" {}", arg).as_bytes());
    dst.put_slice(CRLF);
}

/// Decodes one complete response from the front of `src`.
///
/// Returns `Ok(None)` and leaves `src` untouched when more bytes are needed.
pub fn decode(src: &mut BytesMut, max_value_len: usize) -> Result<Option<Response>, ParseError> {
    let Some(line_end) = find_crlf(src) else {
        if src.len() > MAX_LINE_LEN {
            return Err(ParseError::LineTooLong);
        }
        return Ok(None);
    };
    if line_end > MAX_LINE_LEN {
        return Err(ParseError::LineTooLong);
    }

    let line = std::str::from_utf8(&src[..line_end])
        .map_err(|_| ParseError::Malformed("response line is not utf-8"))?;

    if let Some(header) = line.strip_prefix("VALUE ") {
        let (flags, len, cas) = parse_value_header(header)?;
        if len > max_value_len {
            return Err(ParseError::FrameTooLarge(len));
        }
        return decode_value(src, line_end + CRLF.len(), flags, len, cas);
    }

    let response = parse_line(line)?;
    src.advance(line_end + CRLF.len());
    Ok(Some(response))
}

fn decode_value(
    src: &mut BytesMut,
    data_start: usize,
    flags: u32,
    len: usize,
    cas: Option<u64>,
) -> Result<Option<Response>, ParseError> {
    let data_end = data_start + len;
    let end_start = data_end + CRLF.len();
    let total = end_start + END.len();

    if src.len() >= end_start && &src[data_end..end_start] != CRLF {
        return Err(ParseError::Malformed("value not terminated by CRLF"));
    }
    if src.len() < total {
        // A partial terminator must still be a prefix of END.
        if src.len() > end_start && !END.starts_with(&src[end_start..]) {
            return Err(ParseError::Malformed("expected END after value"));
        }
        return Ok(None);
    }
    if &src[end_start..total] != END {
        return Err(ParseError::Malformed("expected END after value"));
    }

    let mut frame = src.split_to(total);
    frame.advance(data_start);
    let data = frame.split_to(len).freeze();
    Ok(Some(Response::Hit(Value { data, flags, cas })))
}

fn parse_value_header(header: &str) -> Result<(u32, usize, Option<u64>), ParseError> {
    let mut parts = header.split(' ');
    let _key = parts.next().filter(|k| !k.is_empty()).ok_or(ParseError::Malformed("VALUE without key"))?;
    let flags = parse_number(parts.next())?;
    let len = parse_number(parts.next())?;
    let cas = match parts.next() {
        Some(cas) => Some(cas.parse().map_err(|_| ParseError::InvalidNumber)?),
        None => None,
    };
    if parts.next().is_some() {
        return Err(ParseError::Malformed("too many fields in VALUE line"));
    }
    Ok((flags, len, cas))
}

fn parse_number<T: std::str::FromStr>(field: Option<&str>) -> Result<T, ParseError> {
    field
        .ok_or(ParseError::Malformed("missing field in VALUE line"))?
        .parse()
        .map_err(|_| ParseError::InvalidNumber)
}

fn parse_line(line: &str) -> Result<Response, ParseError> {
    let response = match line {
        "END" => Response::Miss,
        "STORED" => Response::Stored,
        "NOT_STORED" => Response::NotStored,
        "EXISTS" => Response::Exists,
        "DELETED" => Response::Deleted,
        "NOT_FOUND" => Response::NotFound,
        "TOUCHED" => Response::Touched,
        _ => {
            if let Some(version) = line.strip_prefix("VERSION ") {
                Response::Version(version.to_string())
            } else if let Some(message) = line.strip_prefix("SERVER_ERROR") {
                Response::ServerError(message.trim_start().to_string())
            } else {
                let digits = line.trim_end();
                if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                    Response::Numeric(digits.parse().map_err(|_| ParseError::InvalidNumber)?)
                } else {
                    return Err(ParseError::UnexpectedLine(line.to_string()));
                }
            }
        }
    };
    Ok(response)
}

fn find_crlf(src: &[u8]) -> Option<usize> {
    src.windows(2).position(|w| w == CRLF)
}
