//! # Ember Core
//!
//! Identifiers, attribute records, filters and error types shared by every
//! layer of the Ember accelerator access stack.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ember-core                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │   Types     │  │ Properties  │  │     Error           │  │
//! │  │ (ObjectId,  │  │ (Attributes,│  │   (Error, Status)   │  │
//! │  │  PciAddr)   │  │  Filter)    │  │                     │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![no_std]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod error;
pub mod filter;
pub mod properties;
pub mod types;

// Re-exports for convenience
pub use error::{Error, Result, Status};
pub use filter::PropertyFilter;
pub use properties::Attributes;
pub use types::*;
