/// Result alias that carries the custom [`CueSyncError`] type.
pub type Result<T> = std::result::Result<T, CueSyncError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum CueSyncError {
    /// A cue file or timestamp could not be understood. `line` is 1-based and
    /// refers to the offending line of the parsed text (0 for free-standing
    /// timestamp arguments).
    #[error("format error at line {line}: {message}")]
    Format { line: usize, message: String },
    /// A ripple operation could not locate the cue it pivots on. Callers treat
    /// this as a no-op rather than a failure.
    #[error("{0}")]
    NotFound(String),
    /// An argument was rejected before any work was done.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Failure reported by an audio decoder.
    #[error("decode failed: {0}")]
    Decode(String),
    /// Failure reported by the playback transport.
    #[error("transport failed: {0}")]
    Transport(String),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl CueSyncError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn format<T: Into<String>>(line: usize, message: T) -> Self {
        Self::Format {
            line,
            message: message.into(),
        }
    }

    /// Returns true for errors that downgrade an operation to a no-op.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<hound::Error> for CueSyncError {
    fn from(value: hound::Error) -> Self {
        match value {
            hound::Error::IoError(err) => Self::Io(err),
            other => Self::Decode(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CueSyncError {
    fn from(value: serde_json::Error) -> Self {
        Self::Message(format!("invalid JSON: {value}"))
    }
}
