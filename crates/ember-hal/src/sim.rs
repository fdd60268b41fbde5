//! # Simulated Platform
//!
//! An in-memory resource catalog with driver-side session tracking.
//!
//! Used wherever real hardware is not available: unit tests, bring-up of
//! higher layers, and fault injection (hot-unplug, offline driver,
//! permission denial, failing close).

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use ember_core::{
    Attributes, Capabilities, DeviceId, Guid, ObjectId, OpenMode, PciAddr, ResourceKind, Status,
};
use hashbrown::{HashMap, HashSet};
use spin::Mutex;

use crate::driver::{CatalogEntry, Driver, SessionToken};

/// Interface GUID of the loopback test accelerator
pub const NLB_GUID: Guid = Guid::from_u128(0xd842_4dc4_a4a3_c413_f89e_4336_83f9_040b);

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug)]
struct SimState {
    /// Catalog in discovery order
    entries: Vec<CatalogEntry>,
    /// Live sessions
    sessions: HashMap<SessionToken, (ObjectId, OpenMode)>,
    /// Objects that refuse to open
    denied: HashSet<ObjectId>,
    /// Driver reachable
    online: bool,
    /// Report failure from every close
    fail_close: bool,
}

impl SimState {
    fn conflicts(&self, object: ObjectId, mode: OpenMode) -> bool {
        self.sessions
            .values()
            .any(|(o, existing)| *o == object && !mode.compatible_with(*existing))
    }
}

// =============================================================================
// SIM DRIVER
// =============================================================================

/// Simulated platform driver
#[derive(Debug)]
pub struct SimDriver {
    state: Mutex<SimState>,
    next_session: AtomicU64,
    queries: AtomicU64,
}

impl SimDriver {
    /// Create a driver over an initial catalog
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self {
            state: Mutex::new(SimState {
                entries,
                sessions: HashMap::new(),
                denied: HashSet::new(),
                online: true,
                fail_close: false,
            }),
            next_session: AtomicU64::new(1),
            queries: AtomicU64::new(0),
        }
    }

    /// Create a driver with an empty catalog
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Start building a catalog
    pub fn builder() -> SimBuilder {
        SimBuilder::default()
    }

    /// Two loopback accelerators and one generic PCI function
    pub fn reference_platform() -> Self {
        Self::builder()
            .accelerator(PciAddr::new(0, 0x5e, 0, 0), 0)
            .accelerator(PciAddr::new(0, 0xbe, 0, 0), 1)
            .generic(DeviceId::new(0x8086, 0x1572), PciAddr::new(0, 0x3b, 0, 0), "eth0")
            .build()
    }

    /// Add a resource (hot-plug)
    pub fn insert(&self, entry: CatalogEntry) {
        log::debug!("sim: hot-plug {}", entry);
        self.state.lock().entries.push(entry);
    }

    /// Remove a resource (hot-unplug); existing sessions stay until closed
    pub fn remove(&self, object: ObjectId) -> bool {
        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.retain(|e| e.object_id != object);
        let removed = state.entries.len() != before;
        if removed {
            log::debug!("sim: hot-unplug {}", object);
        }
        removed
    }

    /// Make the driver reachable or unreachable
    pub fn set_online(&self, online: bool) {
        self.state.lock().online = online;
    }

    /// Refuse (or stop refusing) opens on an object
    pub fn deny_access(&self, object: ObjectId, deny: bool) {
        let mut state = self.state.lock();
        if deny {
            state.denied.insert(object);
        } else {
            state.denied.remove(&object);
        }
    }

    /// Make every close report a failure
    pub fn fail_close(&self, fail: bool) {
        self.state.lock().fail_close = fail;
    }

    /// Number of sessions the driver still considers open
    pub fn live_sessions(&self) -> usize {
        self.state.lock().sessions.len()
    }

    /// Number of sessions open on one object
    pub fn open_count(&self, object: ObjectId) -> usize {
        self.state
            .lock()
            .sessions
            .values()
            .filter(|(o, _)| *o == object)
            .count()
    }

    /// Number of catalog queries served
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }
}

impl Driver for SimDriver {
    fn name(&self) -> &'static str {
        "sim"
    }

    fn query(&self) -> Result<Vec<CatalogEntry>, Status> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        let state = self.state.lock();
        if !state.online {
            return Err(Status::NoDriver);
        }
        Ok(state.entries.clone())
    }

    fn open(&self, object: ObjectId, mode: OpenMode) -> Result<SessionToken, Status> {
        let mut state = self.state.lock();
        if !state.online {
            return Err(Status::NoDriver);
        }
        if !state.entries.iter().any(|e| e.object_id == object) {
            return Err(Status::NoDevice);
        }
        if state.denied.contains(&object) {
            return Err(Status::NoAccess);
        }
        if state.conflicts(object, mode) {
            return Err(Status::Busy);
        }

        let token = SessionToken::new(self.next_session.fetch_add(1, Ordering::Relaxed));
        state.sessions.insert(token, (object, mode));
        Ok(token)
    }

    fn close(&self, session: SessionToken) -> Result<(), Status> {
        let mut state = self.state.lock();
        if state.sessions.remove(&session).is_none() {
            return Err(Status::NotFound);
        }
        if state.fail_close {
            return Err(Status::Exception);
        }
        Ok(())
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Catalog builder for [`SimDriver`]
///
/// Generated object ids start at 1 and always exceed every id already in
/// the catalog.
#[derive(Debug, Default)]
pub struct SimBuilder {
    entries: Vec<CatalogEntry>,
    accelerators: usize,
    devices: usize,
}

impl SimBuilder {
    fn next_id(&self) -> ObjectId {
        let max = self.entries.iter().map(|e| e.object_id.raw()).max().unwrap_or(0);
        ObjectId::new(max + 1)
    }

    /// Add a loopback accelerator
    pub fn accelerator(mut self, location: PciAddr, socket_id: u8) -> Self {
        let entry = Attributes::new(self.next_id(), ResourceKind::Accelerator)
            .with_id(DeviceId::INTEL_VENDOR_ID, 0x09c4)
            .at(location)
            .on_socket(socket_id)
            .with_guid(NLB_GUID)
            .with_capabilities(
                Capabilities::MMIO | Capabilities::INTERRUPTS | Capabilities::RESETTABLE,
            )
            .named(alloc::format!("nlb{}", self.accelerators));
        self.accelerators += 1;
        self.entry(entry)
    }

    /// Add an accelerator card, the parent of the accelerators that follow
    /// it until the next card
    pub fn device(mut self, location: PciAddr, socket_id: u8) -> Self {
        let entry = Attributes::new(self.next_id(), ResourceKind::Device)
            .with_id(DeviceId::INTEL_VENDOR_ID, 0x0b30)
            .at(location)
            .on_socket(socket_id)
            .with_capabilities(Capabilities::MMIO | Capabilities::RECONFIGURABLE)
            .named(alloc::format!("fme{}", self.devices));
        self.devices += 1;
        self.entry(entry)
    }

    /// Add a non-accelerator PCI function
    pub fn generic(self, id: DeviceId, location: PciAddr, name: &str) -> Self {
        let entry = Attributes::new(self.next_id(), ResourceKind::Generic)
            .with_id(id.vendor, id.device)
            .at(location)
            .named(name);
        self.entry(entry)
    }

    /// Add a fully specified entry
    ///
    /// Its object id is kept unless null or already taken, in which case a
    /// fresh one is assigned.
    pub fn entry(mut self, mut entry: CatalogEntry) -> Self {
        let taken = self.entries.iter().any(|e| e.object_id == entry.object_id);
        if taken || entry.object_id.is_null() {
            let fresh = self.next_id();
            log::warn!("sim: object id {} unavailable, using {}", entry.object_id, fresh);
            entry.object_id = fresh;
        }
        if entry.kind == ResourceKind::Accelerator && entry.parent.is_none() {
            entry.parent = self
                .entries
                .iter()
                .rev()
                .find(|e| e.kind == ResourceKind::Device)
                .map(|e| e.object_id);
        }
        self.entries.push(entry);
        self
    }

    /// Finish the catalog
    pub fn build(self) -> SimDriver {
        SimDriver::new(self.entries)
    }
}
