//! Error types for romlink-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate. A source that runs dry before the requested length
//! and a filename that matches no classification rule are normal outcomes,
//! not errors.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Transport errors
    /// Underlying channel read/write or select line change failed
    TransferFailed,
    /// A blocking transport call did not complete within its time bound
    Timeout,
    /// Select was requested while a session was already open
    SessionActive,

    // Stream errors
    /// Reading from the local image source failed
    SourceRead,
    /// Writing to the local image sink failed
    SinkWrite,

    // Request errors
    /// Block size must be greater than zero
    InvalidBlockSize,
    /// Requested length exceeds the configured bound or the address space
    LengthExceedsBound,
    /// Provided buffer is too small for the operation
    BufferTooSmall,

    // Protocol errors
    /// Bytes do not form a valid control frame
    MalformedFrame,

    // Configuration errors
    /// Configuration could not be read, parsed or validated
    ConfigError,
    /// Rule table has no room for another rule
    RuleTableFull,
    /// Rule pattern is longer than the pattern storage allows
    PatternTooLong,
}

impl Error {
    /// Whether this error originated in the transport rather than the request
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::TransferFailed | Self::Timeout | Self::SessionActive
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransferFailed => write!(f, "link transfer failed"),
            Self::Timeout => write!(f, "link operation timed out"),
            Self::SessionActive => write!(f, "a session is already open on this link"),
            Self::SourceRead => write!(f, "failed to read image source"),
            Self::SinkWrite => write!(f, "failed to write image sink"),
            Self::InvalidBlockSize => write!(f, "block size must be greater than zero"),
            Self::LengthExceedsBound => write!(f, "transfer length exceeds configured bound"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::MalformedFrame => write!(f, "malformed control frame"),
            Self::ConfigError => write!(f, "invalid configuration"),
            Self::RuleTableFull => write!(f, "classification rule table is full"),
            Self::PatternTooLong => write!(f, "classification pattern too long"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
