//! # Enumerator
//!
//! Queries the platform catalog and hands out descriptors.
//!
//! An enumerator owns the shared context (driver, session table,
//! configuration) that every token it produces carries with it. Cloning an
//! enumerator shares that context.

use alloc::sync::Arc;
use alloc::vec::Vec;

use ember_core::{Error, ObjectId, OpenMode, PropertyFilter, Result, Status};
use ember_hal::{Driver, SessionToken};
use spin::RwLock;

use crate::accelerator;
use crate::session::{SessionStats, SessionTable};
use crate::token::Token;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Enumerator configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumeratorConfig {
    /// Re-query the catalog before opening, so a descriptor whose resource
    /// has disappeared fails with `InvalidDescriptor` even if the driver
    /// would still accept the open
    pub revalidate_on_open: bool,
}

impl Default for EnumeratorConfig {
    fn default() -> Self {
        Self {
            revalidate_on_open: true,
        }
    }
}

// =============================================================================
// SHARED CONTEXT
// =============================================================================

pub(crate) struct Context {
    driver: Arc<dyn Driver>,
    sessions: SessionTable,
    config: EnumeratorConfig,
}

impl Context {
    pub(crate) fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub(crate) fn driver_name(&self) -> &'static str {
        self.driver.name()
    }

    /// Ask the driver for a session; the caller holds a table reservation
    pub(crate) fn acquire(&self, object: ObjectId, mode: OpenMode) -> Result<SessionToken> {
        if self.config.revalidate_on_open {
            let catalog = self.driver.query().map_err(Error::DiscoveryFailure)?;
            if !catalog.iter().any(|e| e.object_id == object) {
                return Err(Error::InvalidDescriptor);
            }
        }

        self.driver
            .open(object, mode)
            .map_err(Error::from_open_status)
    }

    /// Close a driver session, swallowing failures
    pub(crate) fn discard(&self, session: SessionToken) {
        if let Err(status) = self.driver.close(session) {
            self.sessions.note_release_failure();
            log::warn!(
                "{}: close of {:?} failed ({}), ignored",
                self.driver.name(),
                session,
                status
            );
        }
    }
}

impl core::fmt::Debug for Context {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Context")
            .field("driver", &self.driver.name())
            .field("sessions", &self.sessions)
            .field("config", &self.config)
            .finish()
    }
}

// =============================================================================
// ENUMERATOR
// =============================================================================

/// Resource enumerator bound to one platform driver
#[derive(Debug, Clone)]
pub struct Enumerator {
    ctx: Arc<Context>,
}

impl Enumerator {
    /// Create an enumerator with default configuration
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self::with_config(driver, EnumeratorConfig::default())
    }

    /// Create an enumerator with explicit configuration
    pub fn with_config(driver: Arc<dyn Driver>, config: EnumeratorConfig) -> Self {
        Self {
            ctx: Arc::new(Context {
                driver,
                sessions: SessionTable::new(),
                config,
            }),
        }
    }

    /// Create an enumerator over the host PCI sysfs tree
    #[cfg(feature = "sysfs")]
    pub fn system() -> Self {
        Self::new(Arc::new(ember_hal::SysfsDriver::new()))
    }

    pub(crate) fn from_context(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Get driver name
    pub fn driver_name(&self) -> &'static str {
        self.ctx.driver_name()
    }

    /// Get configuration
    pub fn config(&self) -> EnumeratorConfig {
        self.ctx.config
    }

    /// Enumerate descriptors matching any of `filters`
    ///
    /// An empty filter list matches every resource. Results follow catalog
    /// order. No match is an empty vector, not an error.
    pub fn enumerate(&self, filters: &[PropertyFilter]) -> Result<Vec<Token>> {
        let catalog = self.ctx.driver.query().map_err(|status| {
            log::warn!("{}: catalog query failed: {}", self.driver_name(), status);
            Error::DiscoveryFailure(status)
        })?;
        let total = catalog.len();

        let tokens: Vec<Token> = catalog
            .into_iter()
            .filter(|attrs| PropertyFilter::any_match(filters, attrs))
            .map(|attrs| Token::new(attrs, Arc::clone(&self.ctx)))
            .collect();

        log::debug!(
            "{}: {} of {} resources matched {} filter(s)",
            self.driver_name(),
            tokens.len(),
            total,
            filters.len()
        );
        Ok(tokens)
    }

    /// Enumerate accelerator descriptors matching any of `filters`
    pub fn enumerate_accelerators(&self, filters: &[PropertyFilter]) -> Result<Vec<Token>> {
        self.enumerate(&accelerator::scope(filters))
    }

    /// Fresh descriptor for one catalog entry, if still present
    pub fn lookup(&self, object: ObjectId) -> Result<Option<Token>> {
        Ok(self
            .enumerate(&[])?
            .into_iter()
            .find(|t| t.object_id() == object))
    }

    /// Session statistics
    pub fn stats(&self) -> SessionStats {
        self.ctx.sessions.stats()
    }

    /// Number of sessions currently open on one object
    pub fn open_sessions(&self, object: ObjectId) -> usize {
        let occ = self.ctx.sessions.occupancy(object);
        occ.shared as usize + usize::from(occ.exclusive)
    }
}

// =============================================================================
// DEFAULT ENUMERATOR
// =============================================================================

/// Process-wide default enumerator
static DEFAULT: RwLock<Option<Enumerator>> = RwLock::new(None);

/// Install the process-wide default driver, replacing any previous one
///
/// Tokens and handles from a replaced enumerator stay valid; they keep
/// their own context alive.
pub fn install(driver: Arc<dyn Driver>) -> Enumerator {
    let enumerator = Enumerator::new(driver);
    log::info!("default accelerator driver: {}", enumerator.driver_name());
    *DEFAULT.write() = Some(enumerator.clone());
    enumerator
}

/// Remove the process-wide default driver
pub fn uninstall() -> Option<Enumerator> {
    DEFAULT.write().take()
}

/// Get the process-wide default enumerator
pub fn default_enumerator() -> Option<Enumerator> {
    DEFAULT.read().clone()
}

/// Enumerate through the process-wide default driver
///
/// Fails with `DiscoveryFailure(NoDriver)` if none is installed.
pub fn enumerate(filters: &[PropertyFilter]) -> Result<Vec<Token>> {
    default_enumerator()
        .ok_or(Error::DiscoveryFailure(Status::NoDriver))?
        .enumerate(filters)
}

static_assertions::assert_impl_all!(Enumerator: Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::{PciAddr, ResourceKind};
    use ember_hal::SimDriver;

    fn sim() -> (Arc<SimDriver>, Enumerator) {
        let driver = Arc::new(SimDriver::reference_platform());
        let en = Enumerator::new(driver.clone());
        (driver, en)
    }

    #[test]
    fn test_empty_filters_match_all() {
        let (_, en) = sim();
        assert_eq!(en.enumerate(&[]).expect("enumerate").len(), 3);
    }

    #[test]
    fn test_repeated_enumeration_is_stable() {
        let (_, en) = sim();
        let a = en.enumerate(&[]).expect("first");
        let b = en.enumerate(&[]).expect("second");
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.properties(), y.properties());
            assert!(x.same_object(y));
            assert!(!Token::ptr_eq(x, y));
        }
    }

    #[test]
    fn test_kind_filter() {
        let (_, en) = sim();
        let accels = en
            .enumerate(&[ResourceKind::Accelerator.into()])
            .expect("enumerate");
        assert_eq!(accels.len(), 2);
        assert!(accels.iter().all(|t| t.kind() == ResourceKind::Accelerator));

        let generic = en.enumerate(&[ResourceKind::Generic.into()]).expect("enumerate");
        assert_eq!(generic.len(), 1);
    }

    #[test]
    fn test_no_match_is_empty_success() {
        let (_, en) = sim();
        let none = en
            .enumerate(&[PropertyFilter::new().vendor_id(0x10de)])
            .expect("enumerate");
        assert!(none.is_empty());
    }

    #[test]
    fn test_or_of_filters() {
        let (_, en) = sim();
        let filters = [
            PropertyFilter::new().location(PciAddr::new(0, 0x5e, 0, 0)),
            PropertyFilter::new().kind(ResourceKind::Generic),
        ];
        let found = en.enumerate(&filters).expect("enumerate");
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_refined_filter_yields_subset() {
        let (_, en) = sim();
        let wide = en
            .enumerate(&[PropertyFilter::new().vendor_id(0x8086)])
            .expect("wide");
        let narrow = en
            .enumerate(&[PropertyFilter::new().vendor_id(0x8086).socket_id(1)])
            .expect("narrow");
        assert!(narrow.len() <= wide.len());
        for t in &narrow {
            assert!(wide.iter().any(|w| w.same_object(t)));
        }
    }

    #[test]
    fn test_offline_driver_is_discovery_failure() {
        let (driver, en) = sim();
        driver.set_online(false);
        assert_eq!(
            en.enumerate(&[]).map(|v| v.len()),
            Err(Error::DiscoveryFailure(Status::NoDriver))
        );
    }

    #[test]
    fn test_accelerator_scope_is_conjoined() {
        let (_, en) = sim();
        assert_eq!(en.enumerate_accelerators(&[]).expect("all").len(), 2);
        let on_socket_1 = en
            .enumerate_accelerators(&[PropertyFilter::new().socket_id(1)])
            .expect("socket 1");
        assert_eq!(on_socket_1.len(), 1);
        let generic = en
            .enumerate_accelerators(&[ResourceKind::Generic.into()])
            .expect("contradiction");
        assert!(generic.is_empty());
    }

    #[test]
    fn test_lookup() {
        let (driver, en) = sim();
        assert!(en.lookup(ObjectId::new(2)).expect("lookup").is_some());
        driver.remove(ObjectId::new(2));
        assert!(en.lookup(ObjectId::new(2)).expect("lookup").is_none());
    }

    #[cfg(feature = "sysfs")]
    #[test]
    fn test_exclusive_across_sysfs_enumerators() {
        use crate::handle::Handle;
        use ember_core::OpenMode;
        use ember_hal::{SysfsConfig, SysfsDriver};
        use std::fs;

        let root = std::env::temp_dir().join(std::format!(
            "ember-enum-sysfs-{}",
            std::process::id()
        ));
        let func = root.join("0000:5e:00.0");
        fs::create_dir_all(&func).expect("create fake function");
        fs::write(func.join("vendor"), "0x8086\n").expect("vendor");
        fs::write(func.join("device"), "0x09c4\n").expect("device");
        fs::write(func.join("class"), "0x120000\n").expect("class");
        fs::write(func.join("config"), [0u8; 64]).expect("config");

        let system = |root: &std::path::Path| {
            Enumerator::new(Arc::new(SysfsDriver::with_config(SysfsConfig {
                root: root.to_path_buf(),
            })))
        };
        let a = system(&root);
        let b = system(&root);
        let ta = a.enumerate_accelerators(&[]).expect("enumerate a").remove(0);
        let tb = b.enumerate_accelerators(&[]).expect("enumerate b").remove(0);

        let mut held = Handle::open(&ta, OpenMode::Exclusive).expect("first exclusive");
        assert_eq!(
            Handle::open(&tb, OpenMode::Exclusive).map(|_| ()),
            Err(Error::AlreadyOpenExclusive)
        );
        assert_eq!(b.stats().rejected, 1);

        held.close();
        assert!(Handle::open(&tb, OpenMode::Exclusive).is_ok());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_default_enumerator_lifecycle() {
        install(Arc::new(SimDriver::reference_platform()));
        assert_eq!(enumerate(&[]).expect("installed").len(), 3);
        assert!(uninstall().is_some());
        assert_eq!(
            enumerate(&[]).map(|v| v.len()),
            Err(Error::DiscoveryFailure(Status::NoDriver))
        );
    }
}
