//! # Driver Boundary
//!
//! The three operations the engine needs from a platform.

use alloc::vec::Vec;
use core::fmt;

use ember_core::{Attributes, ObjectId, OpenMode, Status};

/// One resource as reported by the platform catalog
pub type CatalogEntry = Attributes;

// =============================================================================
// SESSION TOKEN
// =============================================================================

/// Opaque driver-side identity of one open session
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SessionToken(u64);

impl SessionToken {
    /// Create a new session token
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw value
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken(0x{:x})", self.0)
    }
}

// =============================================================================
// DRIVER TRAIT
// =============================================================================

/// Platform driver interface
///
/// Implementations do the blocking work of talking to the hardware. The
/// engine serialises nothing on their behalf beyond its own session table,
/// so implementations must be internally synchronised.
pub trait Driver: Send + Sync {
    /// Get driver name
    fn name(&self) -> &'static str;

    /// Snapshot the current resource catalog, in discovery order
    fn query(&self) -> Result<Vec<CatalogEntry>, Status>;

    /// Open a session on a catalog entry
    fn open(&self, object: ObjectId, mode: OpenMode) -> Result<SessionToken, Status>;

    /// Close a session
    ///
    /// Drivers may report an error for an unknown or already-closed token;
    /// the engine never calls this twice for the same token.
    fn close(&self, session: SessionToken) -> Result<(), Status>;
}

static_assertions::assert_impl_all!(SessionToken: Send, Sync, Copy);
static_assertions::assert_obj_safe!(Driver);
