use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Top-level error type for filter-mirror-rs operations.
///
/// Every fatal condition the pipeline can hit maps onto one of these
/// variants; the binary prints the `Display` form as a single line and
/// exits with status 1.
#[derive(Debug)]
pub enum MirrorError {
    /// Wrapper around lower-level I/O failures.
    Io(io::Error),
    /// Bad flags or arguments supplied by the caller.
    Usage(String),
    /// Missing prerequisite tool or insufficient tool version.
    Environment(String),
    /// Rewrite-filter spec rejected by validation.
    InvalidFilter(String),
    /// Mutually incompatible run options.
    ConfigConflict(String),
    /// Source mirror could not be cloned or refreshed, or has no branches.
    SourceUnavailable(String),
    /// Worker repository unusable and the rebuild failed too.
    WorkerCorrupt(String),
    /// The rewrite engine failed for a branch.
    Rewrite(String),
    /// Publishing or pruning refs on the destination failed.
    Push(String),
}

impl fmt::Display for MirrorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorError::Io(err) => write!(f, "{err}"),
            MirrorError::Usage(msg) => write!(f, "usage error: {msg}"),
            MirrorError::Environment(msg) => write!(f, "environment error: {msg}"),
            MirrorError::InvalidFilter(msg) => write!(f, "invalid filter spec: {msg}"),
            MirrorError::ConfigConflict(msg) => write!(f, "conflicting options: {msg}"),
            MirrorError::SourceUnavailable(msg) => write!(f, "source unavailable: {msg}"),
            MirrorError::WorkerCorrupt(msg) => write!(f, "worker repository corrupt: {msg}"),
            MirrorError::Rewrite(msg) => write!(f, "history rewrite failed: {msg}"),
            MirrorError::Push(msg) => write!(f, "push failed: {msg}"),
        }
    }
}

impl StdError for MirrorError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            MirrorError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for MirrorError {
    fn from(err: io::Error) -> Self {
        MirrorError::Io(err)
    }
}

impl From<MirrorError> for io::Error {
    fn from(err: MirrorError) -> Self {
        match err {
            MirrorError::Io(inner) => inner,
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}

impl MirrorError {
    /// Convenience constructor for usage failures.
    pub fn usage(msg: impl Into<String>) -> Self {
        MirrorError::Usage(msg.into())
    }
}

/// Convenience result alias using [`MirrorError`].
pub type Result<T> = std::result::Result<T, MirrorError>;
