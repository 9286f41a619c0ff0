use std::fmt;

/// Errors surfaced by storage backends.
///
/// Adapters map their native failures onto this taxonomy; callers decide
/// recovery (retry, fallback, or surface).
#[derive(Debug)]
pub enum ServiceError {
    /// The requested object was not found.
    NotFound(String),
    /// Uploaded bytes do not match the declared checksum. The write was
    /// rejected and no object was stored.
    ChecksumMismatch { expected: String, actual: String },
    /// The backend could not be reached or refused the request. Transient;
    /// never silently swallowed on primary writes.
    Unavailable(String),
    /// The provided checksum string is malformed.
    InvalidChecksum(String),
    /// The storage key is malformed or unsafe.
    InvalidKey(String),
    /// An I/O error occurred.
    Io(std::io::Error),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(key) => write!(f, "object not found: {key}"),
            Self::ChecksumMismatch { expected, actual } => {
                write!(f, "checksum mismatch: expected {expected}, got {actual}")
            }
            Self::Unavailable(detail) => write!(f, "storage backend unavailable: {detail}"),
            Self::InvalidChecksum(msg) => write!(f, "invalid checksum: {msg}"),
            Self::InvalidKey(msg) => write!(f, "invalid storage key: {msg}"),
            Self::Io(err) => write!(f, "storage IO error: {err}"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl ServiceError {
    /// Whether retrying the operation could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}
