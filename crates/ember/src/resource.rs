//! # Resources
//!
//! A resource pairs a descriptor with at most one live handle. It is the
//! composite that callers usually hold: enumerate, open, use, close.
//!
//! Opening a resource that already holds a live handle is an error
//! (`ResourceAlreadyOpen`); the existing handle is left untouched.

use alloc::vec::Vec;
use core::fmt;

use ember_core::{Error, OpenMode, PropertyFilter, Result};

use crate::enumerator::Enumerator;
use crate::handle::Handle;
use crate::token::Token;

/// Descriptor plus optional live handle
#[derive(Debug)]
pub struct Resource {
    token: Token,
    handle: Option<Handle>,
}

impl Resource {
    /// Wrap a descriptor; nothing is opened
    pub fn new(token: Token) -> Self {
        Self {
            token,
            handle: None,
        }
    }

    /// Enumerate resources matching any of `filters`
    pub fn enumerate(enumerator: &Enumerator, filters: &[PropertyFilter]) -> Result<Vec<Self>> {
        Ok(enumerator
            .enumerate(filters)?
            .into_iter()
            .map(Self::new)
            .collect())
    }

    /// Open a session in `mode`
    ///
    /// Fails with `ResourceAlreadyOpen` if a handle is already live, and
    /// with any `Handle::open` error otherwise. A failed open leaves the
    /// resource as it was.
    pub fn open(&mut self, mode: OpenMode) -> Result<()> {
        if self.is_open() {
            log::warn!("{} already open, refusing second open", self.token.object_id());
            return Err(Error::ResourceAlreadyOpen);
        }
        self.handle = Some(Handle::open(&self.token, mode)?);
        Ok(())
    }

    /// Release the handle, if any
    ///
    /// Idempotent. The descriptor stays usable for a later `open`.
    pub fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
    }

    /// Check if a handle is live
    pub fn is_open(&self) -> bool {
        self.handle.as_ref().is_some_and(Handle::is_open)
    }

    /// Mode of the live handle
    pub fn mode(&self) -> Option<OpenMode> {
        self.handle.as_ref().filter(|h| h.is_open()).map(Handle::mode)
    }

    /// Live handle, if any
    pub fn handle(&self) -> Option<&Handle> {
        self.handle.as_ref()
    }

    /// Descriptor
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Close and give back the descriptor
    pub fn into_token(mut self) -> Token {
        self.close();
        self.token.clone()
    }
}

impl Drop for Resource {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode() {
            Some(mode) => write!(f, "{} [{}]", self.token, mode),
            None => write!(f, "{} [closed]", self.token),
        }
    }
}

static_assertions::assert_impl_all!(Resource: Send, Sync);
