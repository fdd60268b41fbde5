//! # Ember Error Handling
//!
//! Error types for discovery and handle lifecycle.
//!
//! - `Status` is what a driver reports back across the platform boundary
//! - `Error` is what callers of the engine see
//! - Release paths never produce either; they are total

use core::fmt;

// =============================================================================
// RESULT TYPE
// =============================================================================

/// Ember Result type alias
pub type Result<T> = core::result::Result<T, Error>;

// =============================================================================
// DRIVER STATUS
// =============================================================================

/// Status codes returned by a platform driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Status {
    /// Invalid parameter supplied
    InvalidParam,
    /// Resource is busy
    Busy,
    /// Unexpected driver-side failure
    Exception,
    /// No catalog entry with this identity
    NotFound,
    /// Not enough memory
    NoMemory,
    /// Operation not supported
    NotSupported,
    /// Driver not available
    NoDriver,
    /// Insufficient privileges
    NoAccess,
    /// Device was removed
    NoDevice,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParam => write!(f, "invalid parameter"),
            Self::Busy => write!(f, "resource busy"),
            Self::Exception => write!(f, "driver exception"),
            Self::NotFound => write!(f, "not found"),
            Self::NoMemory => write!(f, "out of memory"),
            Self::NotSupported => write!(f, "not supported"),
            Self::NoDriver => write!(f, "driver not available"),
            Self::NoAccess => write!(f, "insufficient privileges"),
            Self::NoDevice => write!(f, "device removed"),
        }
    }
}

// =============================================================================
// ERROR ENUM
// =============================================================================

/// Ember unified error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The catalog query itself failed
    DiscoveryFailure(Status),
    /// Descriptor no longer maps to a live resource
    InvalidDescriptor,
    /// Open conflicts with an existing session on the same resource
    AlreadyOpenExclusive,
    /// Caller lacks rights to open the resource
    PermissionDenied,
    /// Resource already holds a live handle
    ResourceAlreadyOpen,
    /// Any other driver failure on the open path
    Driver(Status),
}

impl Error {
    /// Map a driver status reported while opening a session
    pub const fn from_open_status(status: Status) -> Self {
        match status {
            Status::Busy => Self::AlreadyOpenExclusive,
            Status::NotFound | Status::NoDevice => Self::InvalidDescriptor,
            Status::NoAccess => Self::PermissionDenied,
            other => Self::Driver(other),
        }
    }

    /// Check if the caller may reasonably retry later
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::AlreadyOpenExclusive)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DiscoveryFailure(s) => write!(f, "resource discovery failed: {}", s),
            Self::InvalidDescriptor => write!(f, "descriptor does not map to a live resource"),
            Self::AlreadyOpenExclusive => write!(f, "resource is open with a conflicting mode"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::ResourceAlreadyOpen => write!(f, "resource already holds an open handle"),
            Self::Driver(s) => write!(f, "driver error: {}", s),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for Status {}
