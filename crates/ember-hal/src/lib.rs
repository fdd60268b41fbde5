//! # Ember HAL
//!
//! The boundary between the lifecycle engine and whatever actually knows
//! about the hardware: a kernel driver, sysfs, or a simulated platform.
//!
//! ## Platforms
//!
//! ```text
//!            ┌───────────────────────┐
//!            │     Driver (trait)    │  query / open / close
//!            └───────────┬───────────┘
//!          ┌─────────────┴─────────────┐
//! ┌────────▼────────┐         ┌────────▼────────┐
//! │    SimDriver    │         │   SysfsDriver   │
//! │  (in-memory)    │         │ (feature sysfs) │
//! └─────────────────┘         └─────────────────┘
//! ```

#![no_std]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod driver;
pub mod sim;
#[cfg(feature = "sysfs")]
pub mod sysfs;

pub use driver::{CatalogEntry, Driver, SessionToken};
pub use sim::{SimBuilder, SimDriver};
#[cfg(feature = "sysfs")]
pub use sysfs::{SysfsConfig, SysfsDriver};
