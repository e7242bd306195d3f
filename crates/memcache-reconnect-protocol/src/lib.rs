//! Memcache wire codec.
//!
//! Turns typed [`Request`]s into wire bytes and wire bytes into typed
//! [`Response`]s, for both the ascii and the binary protocol. The connection
//! layer only talks to [`Codec`]; everything below it is protocol detail.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use memcache_reconnect_protocol::{Codec, Protocol, Request, Response};
//!
//! let codec = Codec::new(Protocol::Ascii);
//!
//! let mut out = BytesMut::new();
//! codec.encode(7, &Request::get("mykey"), &mut out);
//! assert_eq!(&out[..], b"get mykey\r\n");
//!
//! let mut incoming = BytesMut::from(&b"END\r\n"[..]);
//! let frame = codec.decode(&mut incoming).unwrap().unwrap();
//! assert_eq!(frame.response, Response::Miss);
//! assert_eq!(frame.opaque, None);
//! ```

pub mod ascii;
pub mod binary;
mod codec;
mod error;
mod request;
mod response;

pub use codec::{Codec, Frame, Protocol};
pub use error::{DecodeError, ParseError};
pub use request::{validate_key, Charset, Request, StoreMode, MAX_KEY_LEN};
pub use response::{Response, Value};
