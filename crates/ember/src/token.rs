//! # Tokens
//!
//! A token is the descriptor of one discoverable resource: an immutable,
//! reference-counted attribute record. Holding a token never implies an
//! open session. Clones share the record; the record is freed when the
//! last clone is dropped.

use alloc::sync::Arc;
use core::fmt;

use ember_core::{Attributes, ObjectId, ResourceKind, Result};

use crate::enumerator::{Context, Enumerator};

struct TokenInner {
    attrs: Attributes,
    ctx: Arc<Context>,
}

/// Descriptor of one discoverable resource
#[derive(Clone)]
pub struct Token {
    inner: Arc<TokenInner>,
}

impl Token {
    pub(crate) fn new(attrs: Attributes, ctx: Arc<Context>) -> Self {
        Self {
            inner: Arc::new(TokenInner { attrs, ctx }),
        }
    }

    pub(crate) fn context(&self) -> &Arc<Context> {
        &self.inner.ctx
    }

    /// Attribute record
    pub fn properties(&self) -> &Attributes {
        &self.inner.attrs
    }

    /// Catalog identity
    pub fn object_id(&self) -> ObjectId {
        self.inner.attrs.object_id
    }

    /// Resource kind
    pub fn kind(&self) -> ResourceKind {
        self.inner.attrs.kind
    }

    /// Check if two tokens describe the same catalog entry
    pub fn same_object(&self, other: &Token) -> bool {
        self.object_id() == other.object_id()
    }

    /// Check if two tokens are the same instance
    pub fn ptr_eq(a: &Token, b: &Token) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Number of live references to this instance
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Enumerator this token was produced by
    pub fn enumerator(&self) -> Enumerator {
        Enumerator::from_context(Arc::clone(&self.inner.ctx))
    }

    /// Fresh token for the parent resource
    ///
    /// `Ok(None)` if the resource has no parent or the parent is no longer
    /// in the catalog.
    pub fn parent(&self) -> Result<Option<Token>> {
        match self.inner.attrs.parent {
            Some(parent) => self.enumerator().lookup(parent),
            None => Ok(None),
        }
    }

    /// Drop this reference
    pub fn release(self) {
        log::trace!("release token {} ({} refs)", self.object_id(), self.ref_count());
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("object", &self.inner.attrs.object_id)
            .field("kind", &self.inner.attrs.kind)
            .field("location", &self.inner.attrs.location)
            .finish()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner.attrs, f)
    }
}

static_assertions::assert_impl_all!(Token: Send, Sync, Clone);
