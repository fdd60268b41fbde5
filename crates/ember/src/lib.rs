//! # Ember
//!
//! Discovery and handle lifecycle for hardware accelerators.
//!
//! Resources are found by enumerating the platform catalog with property
//! filters. Each match is returned as a [`Token`], a shareable descriptor
//! that carries no session. Opening a token yields a [`Handle`] in either
//! exclusive or shared mode; the handle releases its session on `close` or
//! on drop. A [`Resource`] bundles a token with at most one live handle.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         ember                               │
//! │  ┌────────────┐  ┌───────────┐  ┌──────────┐  ┌──────────┐  │
//! │  │ Enumerator │─▶│   Token   │─▶│  Handle  │◀─│ Resource │  │
//! │  └─────┬──────┘  └───────────┘  └────┬─────┘  └──────────┘  │
//! │        │          SessionTable ◀─────┘                      │
//! ├────────┼────────────────────────────────────────────────────┤
//! │        ▼               ember-hal                            │
//! │  Driver (query / open / close): SimDriver, SysfsDriver      │
//! ├─────────────────────────────────────────────────────────────┤
//! │                        ember-core                           │
//! │  ObjectId, PciAddr, Attributes, PropertyFilter, Error       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use ember::{Enumerator, OpenMode, PropertyFilter, SimDriver};
//!
//! let en = Enumerator::new(Arc::new(SimDriver::reference_platform()));
//! let mut accels = ember::accelerator::enumerate(&en, &[PropertyFilter::new().socket_id(0)])?;
//! accels[0].open(OpenMode::Exclusive)?;
//! # Ok::<(), ember::Error>(())
//! ```

#![no_std]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod accelerator;
pub mod enumerator;
pub mod handle;
pub mod resource;
pub mod session;
pub mod token;

pub use enumerator::{default_enumerator, enumerate, install, uninstall};
pub use enumerator::{Enumerator, EnumeratorConfig};
pub use handle::{Handle, HandleState};
pub use resource::Resource;
pub use session::{Occupancy, SessionStats};
pub use token::Token;

pub use ember_core::{
    Attributes, Capabilities, DeviceId, Error, Guid, ObjectId, OpenMode, PciAddr,
    PropertyFilter, ResourceKind, Result, Status,
};
pub use ember_hal::{Driver, SimDriver};

#[cfg(feature = "sysfs")]
pub use ember_hal::{SysfsConfig, SysfsDriver};

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;

    #[test]
    fn test_open_exclusive_then_retry() {
        let driver = Arc::new(SimDriver::reference_platform());
        let en = Enumerator::new(driver.clone());

        let tokens = en
            .enumerate(&[PropertyFilter::new().kind(ResourceKind::Accelerator)])
            .expect("enumerate");
        assert!(!tokens.is_empty());
        let token = &tokens[0];

        let mut first = Handle::open(token, OpenMode::Exclusive).expect("first open");
        let second = Handle::open(token, OpenMode::Exclusive);
        assert_eq!(second.map(|_| ()), Err(Error::AlreadyOpenExclusive));

        first.close();
        let mut second = Handle::open(token, OpenMode::Exclusive).expect("after close");
        second.close();

        drop(tokens);
        assert_eq!(driver.live_sessions(), 0);
        let stats = en.stats();
        assert_eq!(stats.opened_exclusive, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.active(), 0);
    }

    #[test]
    fn test_accelerator_open_per_socket() {
        let driver = Arc::new(SimDriver::reference_platform());
        let en = Enumerator::new(driver.clone());

        for socket in 0..2u8 {
            let mut found = accelerator::enumerate(&en, &[PropertyFilter::new().socket_id(socket)])
                .expect("enumerate");
            assert_eq!(found.len(), 1);

            let accel = &mut found[0];
            assert_eq!(accel.token().properties().socket_id, socket);
            accel.open(OpenMode::Shared).expect("open");
            assert_eq!(accel.open(OpenMode::Shared), Err(Error::ResourceAlreadyOpen));
            accel.close();
        }

        assert_eq!(driver.live_sessions(), 0);
    }

    #[test]
    fn test_hot_unplug_with_open_handle() {
        let driver = Arc::new(SimDriver::reference_platform());
        let en = Enumerator::new(driver.clone());
        let token = en.lookup(ObjectId::new(1)).expect("lookup").expect("present");

        let mut h = Handle::open(&token, OpenMode::Exclusive).expect("open");
        driver.remove(ObjectId::new(1));

        assert_eq!(en.enumerate_accelerators(&[]).expect("enumerate").len(), 1);
        h.close();
        assert_eq!(driver.live_sessions(), 0);
        assert_eq!(
            Handle::open(&token, OpenMode::Exclusive).map(|_| ()),
            Err(Error::InvalidDescriptor)
        );
    }
}
