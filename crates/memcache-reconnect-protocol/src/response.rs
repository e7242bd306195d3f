use bytes::Bytes;

/// An item returned by a successful GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    /// Item payload.
    pub data: Bytes,
    /// Client flags stored with the item.
    pub flags: u32,
    /// CAS token, when the server reports one.
    pub cas: Option<u64>,
}

impl Value {
    /// Creates a value without a CAS token.
    pub fn new(data: impl Into<Bytes>, flags: u32) -> Self {
        Self {
            data: data.into(),
            flags,
            cas: None,
        }
    }
}

/// A decoded server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// GET found the key.
    Hit(Value),
    /// GET did not find the key.
    Miss,
    /// The item was stored.
    Stored,
    /// A conditional store did not apply.
    NotStored,
    /// A CAS conflict.
    Exists,
    /// The item was deleted.
    Deleted,
    /// The key does not exist.
    NotFound,
    /// The expiration was updated.
    Touched,
    /// New value after INCR or DECR.
    Numeric(u64),
    /// Server version string.
    Version(String),
    /// The server failed to handle an otherwise valid request.
    ServerError(String),
}

impl Response {
    /// Short label used for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Hit(_) => "hit",
            Response::Miss => "miss",
            Response::Stored => "stored",
            Response::NotStored => "not_stored",
            Response::Exists => "exists",
            Response::Deleted => "deleted",
            Response::NotFound => "not_found",
            Response::Touched => "touched",
            Response::Numeric(_) => "numeric",
            Response::Version(_) => "version",
            Response::ServerError(_) => "server_error",
        }
    }
}
