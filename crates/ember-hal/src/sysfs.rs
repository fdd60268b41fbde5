//! # Linux sysfs Platform
//!
//! Discovers PCI functions under `/sys/bus/pci/devices` and classifies
//! processing accelerators (class 0x12) and co-processors (class 0x0b40) as
//! accelerator resources. Opening a function holds its `config` file open
//! for the lifetime of the session, so removal and permission problems
//! surface at open time.
//!
//! Open modes are tracked per canonical function directory in one
//! process-wide map, so every `SysfsDriver` instance sees the sessions of
//! every other.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use ember_core::{Attributes, Capabilities, ObjectId, OpenMode, PciAddr, ResourceKind, Status};
use hashbrown::HashMap;
use spin::Mutex;

use crate::driver::{CatalogEntry, Driver, SessionToken};

/// PCI base class for processing accelerators
const PCI_CLASS_ACCELERATOR: u32 = 0x12;
/// PCI class/subclass for co-processors
const PCI_CLASS_COPROCESSOR: u32 = 0x0b40;

/// Open modes held on each function directory, across all driver instances
static HOLDERS: Mutex<Option<HashMap<PathBuf, Vec<OpenMode>>>> = Mutex::new(None);

// =============================================================================
// CONFIGURATION
// =============================================================================

/// sysfs platform configuration
#[derive(Debug, Clone)]
pub struct SysfsConfig {
    /// Directory holding one entry per PCI function
    pub root: PathBuf,
}

impl Default for SysfsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/sys/bus/pci/devices"),
        }
    }
}

// =============================================================================
// SYSFS DRIVER
// =============================================================================

#[derive(Debug)]
struct Session {
    key: PathBuf,
    mode: OpenMode,
    _config: File,
}

/// PCI sysfs platform driver
#[derive(Debug)]
pub struct SysfsDriver {
    config: SysfsConfig,
    sessions: Mutex<HashMap<SessionToken, Session>>,
    next_session: AtomicU64,
}

impl SysfsDriver {
    /// Create a driver over the default sysfs root
    pub fn new() -> Self {
        Self::with_config(SysfsConfig::default())
    }

    /// Create a driver with explicit configuration
    pub fn with_config(config: SysfsConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
            next_session: AtomicU64::new(1),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &SysfsConfig {
        &self.config
    }

    fn function_dir(&self, addr: PciAddr) -> PathBuf {
        self.config.root.join(alloc::format!("{}", addr))
    }

    fn read_entry(&self, addr: PciAddr, dir: &Path) -> Option<CatalogEntry> {
        let vendor = read_hex(&dir.join("vendor"))? as u16;
        let device = read_hex(&dir.join("device"))? as u16;
        let class = read_hex(&dir.join("class")).unwrap_or(0);

        let kind = if class >> 16 == PCI_CLASS_ACCELERATOR || class >> 8 == PCI_CLASS_COPROCESSOR {
            ResourceKind::Accelerator
        } else {
            ResourceKind::Generic
        };

        let socket_id = fs::read_to_string(dir.join("numa_node"))
            .ok()
            .and_then(|s| s.trim().parse::<i32>().ok())
            .filter(|n| *n >= 0)
            .map_or(0, |n| u8::try_from(n).unwrap_or(0));

        let mut caps = Capabilities::empty();
        if dir.join("resource0").exists() {
            caps |= Capabilities::MMIO;
        }
        if dir.join("msi_irqs").is_dir() || dir.join("irq").exists() {
            caps |= Capabilities::INTERRUPTS;
        }
        if dir.join("reset").exists() {
            caps |= Capabilities::RESETTABLE;
        }

        let mut attrs = Attributes::new(object_id_for(addr), kind)
            .with_id(vendor, device)
            .at(addr)
            .on_socket(socket_id)
            .with_capabilities(caps)
            .named(alloc::format!("{}", addr));

        if let Some(pf) = physfn_of(dir) {
            attrs.capabilities |= Capabilities::VIRTUAL_FUNCTION;
            attrs.parent = Some(object_id_for(pf));
        }

        Some(attrs)
    }
}

impl Default for SysfsDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for SysfsDriver {
    fn name(&self) -> &'static str {
        "sysfs"
    }

    fn query(&self) -> Result<Vec<CatalogEntry>, Status> {
        let dir = fs::read_dir(&self.config.root).map_err(|e| {
            log::warn!("sysfs: cannot read {}: {}", self.config.root.display(), e);
            Status::NoDriver
        })?;

        let mut entries: Vec<CatalogEntry> = dir
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                let addr = PciAddr::parse(name.to_str()?)?;
                self.read_entry(addr, &entry.path())
            })
            .collect();

        // read_dir order is unspecified; bus order is stable across calls
        entries.sort_by_key(|e| e.location);
        Ok(entries)
    }

    fn open(&self, object: ObjectId, mode: OpenMode) -> Result<SessionToken, Status> {
        let addr = addr_for(object).ok_or(Status::InvalidParam)?;
        let dir = self.function_dir(addr);
        if !dir.is_dir() {
            return Err(Status::NoDevice);
        }

        let config = File::open(dir.join("config")).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => Status::NoAccess,
            ErrorKind::NotFound => Status::NoDevice,
            _ => Status::Exception,
        })?;

        let key = fs::canonicalize(&dir).unwrap_or(dir);
        hold(&key, mode)?;

        let token = SessionToken::new(self.next_session.fetch_add(1, Ordering::Relaxed));
        self.sessions.lock().insert(
            token,
            Session {
                key,
                mode,
                _config: config,
            },
        );
        log::debug!("sysfs: opened {} ({}) as {:?}", addr, mode, token);
        Ok(token)
    }

    fn close(&self, session: SessionToken) -> Result<(), Status> {
        let closed = self
            .sessions
            .lock()
            .remove(&session)
            .ok_or(Status::NotFound)?;
        unhold(&closed.key, closed.mode);
        Ok(())
    }
}

impl Drop for SysfsDriver {
    fn drop(&mut self) {
        let sessions = core::mem::take(self.sessions.get_mut());
        if !sessions.is_empty() {
            log::warn!("sysfs: dropping driver with {} open session(s)", sessions.len());
        }
        for session in sessions.values() {
            unhold(&session.key, session.mode);
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Stable object id for a PCI function (never zero)
fn object_id_for(addr: PciAddr) -> ObjectId {
    let raw = (u64::from(addr.segment) << 16)
        | (u64::from(addr.bus) << 8)
        | (u64::from(addr.device) << 3)
        | u64::from(addr.function);
    ObjectId::new(raw + 1)
}

fn addr_for(object: ObjectId) -> Option<PciAddr> {
    let raw = object.raw().checked_sub(1)?;
    if raw > 0xFFFF_FFFF {
        return None;
    }
    Some(PciAddr::new(
        (raw >> 16) as u16,
        (raw >> 8) as u8,
        ((raw >> 3) & 0x1F) as u8,
        (raw & 0x07) as u8,
    ))
}

fn hold(key: &Path, mode: OpenMode) -> Result<(), Status> {
    let mut holders = HOLDERS.lock();
    let held = holders
        .get_or_insert_with(HashMap::new)
        .entry(key.to_path_buf())
        .or_default();
    if held.iter().any(|existing| !mode.compatible_with(*existing)) {
        return Err(Status::Busy);
    }
    held.push(mode);
    Ok(())
}

fn unhold(key: &Path, mode: OpenMode) {
    let mut holders = HOLDERS.lock();
    let Some(map) = holders.as_mut() else {
        return;
    };
    if let Some(held) = map.get_mut(key) {
        if let Some(pos) = held.iter().position(|m| *m == mode) {
            held.swap_remove(pos);
        }
        if held.is_empty() {
            map.remove(key);
        }
    }
}

fn read_hex(path: &Path) -> Option<u32> {
    let text = fs::read_to_string(path).ok()?;
    let text = text.trim();
    let digits = text.strip_prefix("0x").unwrap_or(text);
    u32::from_str_radix(digits, 16).ok()
}

fn physfn_of(dir: &Path) -> Option<PciAddr> {
    let target = fs::read_link(dir.join("physfn")).ok()?;
    PciAddr::parse(target.file_name()?.to_str()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::format;

    struct FakeSysfs {
        root: PathBuf,
    }

    impl FakeSysfs {
        fn new(tag: &str) -> Self {
            let root = std::env::temp_dir().join(format!(
                "ember-sysfs-{}-{}",
                std::process::id(),
                tag
            ));
            let _ = fs::remove_dir_all(&root);
            fs::create_dir_all(&root).expect("create fake sysfs root");
            Self { root }
        }

        fn add(&self, addr: &str, vendor: u16, device: u16, class: u32) -> PathBuf {
            let dir = self.root.join(addr);
            fs::create_dir_all(&dir).expect("create function dir");
            fs::write(dir.join("vendor"), format!("0x{:04x}\n", vendor)).expect("vendor");
            fs::write(dir.join("device"), format!("0x{:04x}\n", device)).expect("device");
            fs::write(dir.join("class"), format!("0x{:06x}\n", class)).expect("class");
            fs::write(dir.join("numa_node"), "-1\n").expect("numa_node");
            fs::write(dir.join("config"), [0u8; 64]).expect("config");
            dir
        }

        fn driver(&self) -> SysfsDriver {
            SysfsDriver::with_config(SysfsConfig {
                root: self.root.clone(),
            })
        }
    }

    impl Drop for FakeSysfs {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.root);
        }
    }

    #[test]
    fn test_object_id_roundtrip() {
        let addr = PciAddr::new(1, 0x5e, 0x1f, 7);
        assert_eq!(addr_for(object_id_for(addr)), Some(addr));
        assert_eq!(addr_for(ObjectId::new(0)), None);
    }

    #[test]
    fn test_query_classifies_and_sorts() {
        let fake = FakeSysfs::new("classify");
        fake.add("0000:be:00.0", 0x8086, 0x0b30, 0x120000);
        fake.add("0000:3b:00.0", 0x8086, 0x1572, 0x020000);
        let accel = fake.add("0000:5e:00.0", 0x8086, 0x09c4, 0x0b4000);
        fs::write(accel.join("resource0"), b"").expect("resource0");
        fs::write(accel.join("numa_node"), "1\n").expect("numa_node");

        let entries = fake.driver().query().expect("query");
        let buses: Vec<u8> = entries.iter().map(|e| e.location.bus).collect();
        assert_eq!(buses, [0x3b, 0x5e, 0xbe]);

        assert_eq!(entries[0].kind, ResourceKind::Generic);
        assert_eq!(entries[1].kind, ResourceKind::Accelerator);
        assert_eq!(entries[2].kind, ResourceKind::Accelerator);
        assert!(entries[1].has(Capabilities::MMIO));
        assert_eq!(entries[1].socket_id, 1);
        assert_eq!(entries[0].socket_id, 0);
    }

    #[test]
    fn test_missing_root_is_discovery_failure() {
        let driver = SysfsDriver::with_config(SysfsConfig {
            root: PathBuf::from("/nonexistent/ember/sysfs"),
        });
        assert_eq!(driver.query(), Err(Status::NoDriver));
    }

    #[test]
    fn test_open_close_and_exclusivity() {
        let fake = FakeSysfs::new("open");
        fake.add("0000:5e:00.0", 0x8086, 0x09c4, 0x120000);
        let driver = fake.driver();
        let id = driver.query().expect("query")[0].object_id;

        let t = driver.open(id, OpenMode::Exclusive).expect("open");
        assert_eq!(driver.open(id, OpenMode::Shared), Err(Status::Busy));
        driver.close(t).expect("close");
        assert_eq!(driver.close(t), Err(Status::NotFound));
        assert!(driver.open(id, OpenMode::Shared).is_ok());
    }

    #[test]
    fn test_exclusivity_spans_driver_instances() {
        let fake = FakeSysfs::new("instances");
        fake.add("0000:5e:00.0", 0x8086, 0x09c4, 0x120000);
        let first = fake.driver();
        let second = fake.driver();
        let id = first.query().expect("query")[0].object_id;

        let t = first.open(id, OpenMode::Exclusive).expect("open");
        assert_eq!(second.open(id, OpenMode::Exclusive), Err(Status::Busy));
        assert_eq!(second.open(id, OpenMode::Shared), Err(Status::Busy));

        first.close(t).expect("close");
        let s = second.open(id, OpenMode::Shared).expect("shared after close");
        assert!(first.open(id, OpenMode::Shared).is_ok());
        assert_eq!(first.open(id, OpenMode::Exclusive), Err(Status::Busy));
        second.close(s).expect("close shared");
    }

    #[test]
    fn test_dropped_driver_releases_its_sessions() {
        let fake = FakeSysfs::new("dropped");
        fake.add("0000:5e:00.0", 0x8086, 0x09c4, 0x120000);
        let survivor = fake.driver();
        let id = survivor.query().expect("query")[0].object_id;

        {
            let doomed = fake.driver();
            doomed.open(id, OpenMode::Exclusive).expect("open");
            assert_eq!(survivor.open(id, OpenMode::Shared), Err(Status::Busy));
        }
        assert!(survivor.open(id, OpenMode::Exclusive).is_ok());
    }

    #[test]
    fn test_out_of_range_numa_node_maps_to_socket_zero() {
        let fake = FakeSysfs::new("numa");
        let dir = fake.add("0000:5e:00.0", 0x8086, 0x09c4, 0x120000);
        fs::write(dir.join("numa_node"), "300\n").expect("numa_node");

        let entries = fake.driver().query().expect("query");
        assert_eq!(entries[0].socket_id, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_config_is_no_access() {
        use std::os::unix::fs::PermissionsExt;

        let fake = FakeSysfs::new("noaccess");
        let dir = fake.add("0000:5e:00.0", 0x8086, 0x09c4, 0x120000);
        let config = dir.join("config");
        fs::set_permissions(&config, fs::Permissions::from_mode(0o000)).expect("chmod");

        // root ignores file modes
        if File::open(&config).is_ok() {
            return;
        }

        let driver = fake.driver();
        let id = driver.query().expect("query")[0].object_id;
        assert_eq!(driver.open(id, OpenMode::Shared), Err(Status::NoAccess));
    }

    #[test]
    fn test_open_after_removal_reports_no_device() {
        let fake = FakeSysfs::new("removed");
        let dir = fake.add("0000:5e:00.0", 0x8086, 0x09c4, 0x120000);
        let driver = fake.driver();
        let id = driver.query().expect("query")[0].object_id;

        fs::remove_dir_all(dir).expect("unplug");
        assert_eq!(driver.open(id, OpenMode::Shared), Err(Status::NoDevice));
    }
}
