//! # Handles
//!
//! An open session on one resource. A handle is opened from a token, keeps
//! that token alive, and releases its session exactly once: on the first
//! `close`, or on drop if never closed.
//!
//! Failures on the release path are never reported to the caller. They are
//! logged and counted in the enumerator's session statistics.

use ember_core::{Error, ObjectId, OpenMode, Result};
use ember_hal::SessionToken;

use crate::token::Token;

/// Lifecycle state of a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Session live in the given mode
    Open(OpenMode),
    /// Session released
    Closed,
}

/// Open session on one resource
#[derive(Debug)]
pub struct Handle {
    token: Token,
    mode: OpenMode,
    session: SessionToken,
    state: HandleState,
}

impl Handle {
    /// Open a session on the resource `token` describes
    ///
    /// # Errors
    ///
    /// - `AlreadyOpenExclusive` if the mode conflicts with a live session
    /// - `InvalidDescriptor` if the resource is gone
    /// - `PermissionDenied` if the platform refuses access
    /// - `DiscoveryFailure` if the catalog cannot be re-queried
    /// - `Driver` for any other platform failure
    ///
    /// On failure nothing is held and no state changes.
    pub fn open(token: &Token, mode: OpenMode) -> Result<Self> {
        let ctx = token.context();
        let object = token.object_id();

        ctx.sessions().reserve(object, mode)?;

        let session = match ctx.acquire(object, mode) {
            Ok(session) => session,
            Err(err) => {
                ctx.sessions().rollback(object, mode);
                if err == Error::AlreadyOpenExclusive {
                    ctx.sessions().note_rejection();
                }
                log::debug!("{}: open {} on {} failed: {}", ctx.driver_name(), mode, object, err);
                return Err(err);
            }
        };

        ctx.sessions().commit(mode);
        log::debug!(
            "{}: opened {} {} as {:?}",
            ctx.driver_name(),
            object,
            mode,
            session
        );

        Ok(Self {
            token: token.clone(),
            mode,
            session,
            state: HandleState::Open(mode),
        })
    }

    /// Release the session
    ///
    /// Idempotent. Driver failures are swallowed.
    pub fn close(&mut self) {
        if self.state == HandleState::Closed {
            return;
        }
        self.state = HandleState::Closed;

        let ctx = self.token.context();
        ctx.discard(self.session);
        ctx.sessions().release(self.token.object_id(), self.mode);
        log::debug!("{}: closed {:?}", ctx.driver_name(), self.session);
    }

    /// Mode the handle was opened in
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Current state
    pub fn state(&self) -> HandleState {
        self.state
    }

    /// Check if the session is live
    pub fn is_open(&self) -> bool {
        matches!(self.state, HandleState::Open(_))
    }

    /// Token the handle was opened from
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Catalog identity of the opened resource
    pub fn object_id(&self) -> ObjectId {
        self.token.object_id()
    }

    /// Driver-side session identity
    pub fn session(&self) -> SessionToken {
        self.session
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.close();
    }
}

static_assertions::assert_impl_all!(Handle: Send, Sync);
