//! # Session Table
//!
//! Open-mode bookkeeping keyed by catalog identity.
//!
//! Every token produced by one enumerator shares one table, so handles
//! opened independently on the same object always see each other. A slot
//! is reserved before the driver is asked to open and rolled back if the
//! driver refuses; the lock is never held across a driver call.

use core::sync::atomic::{AtomicU64, Ordering};

use ember_core::{Error, ObjectId, OpenMode, Result};
use hashbrown::HashMap;
use spin::Mutex;

// =============================================================================
// OCCUPANCY
// =============================================================================

/// Sessions currently holding one object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Occupancy {
    /// Number of shared sessions
    pub shared: u32,
    /// An exclusive session is held
    pub exclusive: bool,
}

impl Occupancy {
    /// Check if nothing holds the object
    pub fn is_idle(&self) -> bool {
        self.shared == 0 && !self.exclusive
    }

    /// Check if a new session in `mode` may join
    pub fn admits(&self, mode: OpenMode) -> bool {
        match mode {
            OpenMode::Exclusive => self.is_idle(),
            OpenMode::Shared => !self.exclusive,
        }
    }

    fn enter(&mut self, mode: OpenMode) {
        match mode {
            OpenMode::Exclusive => self.exclusive = true,
            OpenMode::Shared => self.shared += 1,
        }
    }

    fn leave(&mut self, mode: OpenMode) -> bool {
        match mode {
            OpenMode::Exclusive if self.exclusive => {
                self.exclusive = false;
                true
            }
            OpenMode::Shared if self.shared > 0 => {
                self.shared -= 1;
                true
            }
            _ => false,
        }
    }
}

// =============================================================================
// STATISTICS
// =============================================================================

/// Session statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Exclusive sessions opened
    pub opened_exclusive: u64,
    /// Shared sessions opened
    pub opened_shared: u64,
    /// Sessions closed
    pub closed: u64,
    /// Opens refused because of a mode conflict, in this table or in the
    /// driver
    pub rejected: u64,
    /// Driver failures swallowed on the release path
    pub release_failures: u64,
}

impl SessionStats {
    /// Sessions opened and not yet closed
    pub fn active(&self) -> u64 {
        (self.opened_exclusive + self.opened_shared).saturating_sub(self.closed)
    }
}

#[derive(Debug, Default)]
struct Counters {
    opened_exclusive: AtomicU64,
    opened_shared: AtomicU64,
    closed: AtomicU64,
    rejected: AtomicU64,
    release_failures: AtomicU64,
}

// =============================================================================
// SESSION TABLE
// =============================================================================

/// Open-mode table shared by all handles of one enumerator
#[derive(Debug, Default)]
pub struct SessionTable {
    slots: Mutex<HashMap<ObjectId, Occupancy>>,
    counters: Counters,
}

impl SessionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a slot for a new session
    pub fn reserve(&self, object: ObjectId, mode: OpenMode) -> Result<()> {
        let mut slots = self.slots.lock();
        let held = slots.get(&object).copied().unwrap_or_default();

        if !held.admits(mode) {
            drop(slots);
            self.note_rejection();
            log::warn!(
                "open {} on {} rejected: {} shared, exclusive={}",
                mode,
                object,
                held.shared,
                held.exclusive
            );
            return Err(Error::AlreadyOpenExclusive);
        }

        slots.entry(object).or_default().enter(mode);
        Ok(())
    }

    /// Count an open refused because of a mode conflict
    ///
    /// Conflicts found by the table are counted by `reserve`; the driver may
    /// also report one held by a session outside this table.
    pub(crate) fn note_rejection(&self) {
        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Undo a reservation whose open failed
    pub fn rollback(&self, object: ObjectId, mode: OpenMode) {
        self.leave(object, mode);
    }

    /// Record a successful open
    pub(crate) fn commit(&self, mode: OpenMode) {
        let counter = match mode {
            OpenMode::Exclusive => &self.counters.opened_exclusive,
            OpenMode::Shared => &self.counters.opened_shared,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Release the slot of a closed session
    pub fn release(&self, object: ObjectId, mode: OpenMode) {
        if self.leave(object, mode) {
            self.counters.closed.fetch_add(1, Ordering::Relaxed);
        } else {
            log::warn!("release of unknown {} session on {}", mode, object);
        }
    }

    /// Count a driver failure swallowed while releasing
    pub(crate) fn note_release_failure(&self) {
        self.counters.release_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Current occupancy of one object
    pub fn occupancy(&self, object: ObjectId) -> Occupancy {
        self.slots
            .lock()
            .get(&object)
            .copied()
            .unwrap_or_default()
    }

    /// Number of objects with at least one session
    pub fn busy_objects(&self) -> usize {
        self.slots.lock().len()
    }

    /// Snapshot statistics
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            opened_exclusive: self.counters.opened_exclusive.load(Ordering::Relaxed),
            opened_shared: self.counters.opened_shared.load(Ordering::Relaxed),
            closed: self.counters.closed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            release_failures: self.counters.release_failures.load(Ordering::Relaxed),
        }
    }

    fn leave(&self, object: ObjectId, mode: OpenMode) -> bool {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(&object) else {
            return false;
        };
        let left = slot.leave(mode);
        if slot.is_idle() {
            slots.remove(&object);
        }
        left
    }
}
