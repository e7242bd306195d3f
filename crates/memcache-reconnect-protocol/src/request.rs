//! Typed memcache requests.

use crate::response::Response;
use bytes::Bytes;
use memcache_reconnect_core::MemcacheError;

/// Longest key memcached accepts.
pub const MAX_KEY_LEN: usize = 250;

/// Character set allowed in keys of text commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    /// Any UTF-8 byte sequence without whitespace or control bytes.
    #[default]
    Utf8,
    /// Printable ASCII only.
    Ascii,
}

/// Storage command variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Store unconditionally.
    Set,
    /// Store only if the key does not exist.
    Add,
    /// Store only if the key exists.
    Replace,
}

impl StoreMode {
    pub(crate) fn command(self) -> &'static str {
        match self {
            StoreMode::Set => "set",
            StoreMode::Add => "add",
            StoreMode::Replace => "replace",
        }
    }
}

/// A request to a single memcache server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Fetch a single key.
    Get {
        /// Item key.
        key: Bytes,
    },
    /// Store a value.
    Store {
        /// Which storage command to use.
        mode: StoreMode,
        /// Item key.
        key: Bytes,
        /// Item payload.
        value: Bytes,
        /// Opaque client flags stored with the item.
        flags: u32,
        /// Expiration in seconds, 0 for none.
        ttl: u32,
    },
    /// Delete a key.
    Delete {
        /// Item key.
        key: Bytes,
    },
    /// Increment a numeric value.
    Incr {
        /// Item key.
        key: Bytes,
        /// Amount to add.
        delta: u64,
    },
    /// Decrement a numeric value.
    Decr {
        /// Item key.
        key: Bytes,
        /// Amount to subtract.
        delta: u64,
    },
    /// Update the expiration of a key.
    Touch {
        /// Item key.
        key: Bytes,
        /// New expiration in seconds.
        ttl: u32,
    },
    /// Ask the server for its version.
    Version,
}

impl Request {
    /// Creates a GET request.
    pub fn get(key: impl Into<Bytes>) -> Self {
        Request::Get { key: key.into() }
    }

    /// Creates a SET request with no flags and no expiration.
    pub fn set(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self::store(StoreMode::Set, key, value, 0, 0)
    }

    /// Creates an ADD request with no flags and no expiration.
    pub fn add(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self::store(StoreMode::Add, key, value, 0, 0)
    }

    /// Creates a REPLACE request with no flags and no expiration.
    pub fn replace(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self::store(StoreMode::Replace, key, value, 0, 0)
    }

    /// Creates a storage request.
    pub fn store(
        mode: StoreMode,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
        flags: u32,
        ttl: u32,
    ) -> Self {
        Request::Store {
            mode,
            key: key.into(),
            value: value.into(),
            flags,
            ttl,
        }
    }

    /// Creates a DELETE request.
    pub fn delete(key: impl Into<Bytes>) -> Self {
        Request::Delete { key: key.into() }
    }

    /// Creates an INCR request.
    pub fn incr(key: impl Into<Bytes>, delta: u64) -> Self {
        Request::Incr {
            key: key.into(),
            delta,
        }
    }

    /// Creates a DECR request.
    pub fn decr(key: impl Into<Bytes>, delta: u64) -> Self {
        Request::Decr {
            key: key.into(),
            delta,
        }
    }

    /// Creates a TOUCH request.
    pub fn touch(key: impl Into<Bytes>, ttl: u32) -> Self {
        Request::Touch {
            key: key.into(),
            ttl,
        }
    }

    /// Creates a VERSION request.
    pub fn version() -> Self {
        Request::Version
    }

    /// The key this request addresses, if any.
    pub fn key(&self) -> Option<&Bytes> {
        match self {
            Request::Get { key }
            | Request::Store { key, .. }
            | Request::Delete { key }
            | Request::Incr { key, .. }
            | Request::Decr { key, .. }
            | Request::Touch { key, .. } => Some(key),
            Request::Version => None,
        }
    }

    /// Length of the payload this request carries.
    pub fn value_len(&self) -> usize {
        match self {
            Request::Store { value, .. } => value.len(),
            _ => 0,
        }
    }

    /// Command name, used for logging and metrics.
    pub fn command(&self) -> &'static str {
        match self {
            Request::Get { .. } => "get",
            Request::Store { mode, .. } => mode.command(),
            Request::Delete { .. } => "delete",
            Request::Incr { .. } => "incr",
            Request::Decr { .. } => "decr",
            Request::Touch { .. } => "touch",
            Request::Version => "version",
        }
    }

    /// Returns true if `response` is a valid reply to this request.
    ///
    /// A reply of the wrong kind means request and response streams are no
    /// longer aligned. Server errors are valid replies to anything.
    pub fn accepts(&self, response: &Response) -> bool {
        if matches!(response, Response::ServerError(_)) {
            return true;
        }
        match self {
            Request::Get { .. } => matches!(response, Response::Hit(_) | Response::Miss),
            Request::Store { .. } => matches!(
                response,
                Response::Stored | Response::NotStored | Response::Exists | Response::NotFound
            ),
            Request::Delete { .. } => matches!(response, Response::Deleted | Response::NotFound),
            Request::Incr { .. } | Request::Decr { .. } => {
                matches!(response, Response::Numeric(_) | Response::NotFound)
            }
            Request::Touch { .. } => matches!(response, Response::Touched | Response::NotFound),
            Request::Version => matches!(response, Response::Version(_)),
        }
    }

    /// Checks key validity and payload size before the request is admitted.
    pub fn validate(&self, charset: Charset, max_value_len: usize) -> Result<(), MemcacheError> {
        if let Some(key) = self.key() {
            validate_key(key, charset)?;
        }
        let len = self.value_len();
        if len > max_value_len {
            return Err(MemcacheError::ValueTooLarge {
                len,
                max: max_value_len,
            });
        }
        Ok(())
    }
}

/// Checks that a key can be sent in a text command.
pub fn validate_key(key: &[u8], charset: Charset) -> Result<(), MemcacheError> {
    if key.is_empty() {
        return Err(MemcacheError::InvalidKey("key is empty".to_string()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(MemcacheError::InvalidKey(format!(
            "key is {} bytes, maximum is {}",
            key.len(),
            MAX_KEY_LEN
        )));
    }
    if let Some(b) = key.iter().find(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
        return Err(MemcacheError::InvalidKey(format!(
            "key contains forbidden byte {:#04x}",
            b
        )));
    }
    match charset {
        Charset::Ascii if !key.is_ascii() => Err(MemcacheError::InvalidKey(
            "key contains non-ascii bytes".to_string(),
        )),
        Charset::Utf8 if std::str::from_utf8(key).is_err() => Err(MemcacheError::InvalidKey(
            "key is not valid utf-8".to_string(),
        )),
        _ => Ok(()),
    }
}
