//! # Ember Core Types
//!
//! Strongly typed identifiers for discoverable accelerator resources.

use core::fmt;

// =============================================================================
// OBJECT ID
// =============================================================================

/// Identity of one entry in the platform resource catalog
///
/// Object ids are assigned by the driver and stay stable while the
/// resource is present. Zero is never a valid id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Create a new object id
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw u64 value
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Check if null
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId(0x{:x})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

// =============================================================================
// PCI ADDRESS (BDF)
// =============================================================================

/// PCI Segment:Bus:Device.Function address
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PciAddr {
    /// Segment (domain)
    pub segment: u16,
    /// Bus number
    pub bus: u8,
    /// Device number (0-31)
    pub device: u8,
    /// Function number (0-7)
    pub function: u8,
}

impl PciAddr {
    /// Create a new PCI address
    #[inline]
    pub const fn new(segment: u16, bus: u8, device: u8, function: u8) -> Self {
        Self {
            segment,
            bus,
            device,
            function,
        }
    }

    /// Parse the sysfs form `ssss:bb:dd.f`
    pub fn parse(s: &str) -> Option<Self> {
        let (segment, rest) = s.split_once(':')?;
        let (bus, rest) = rest.split_once(':')?;
        let (device, function) = rest.split_once('.')?;

        let device = u8::from_str_radix(device, 16).ok()?;
        let function = u8::from_str_radix(function, 16).ok()?;
        if device > 0x1F || function > 0x07 {
            return None;
        }

        Some(Self {
            segment: u16::from_str_radix(segment, 16).ok()?,
            bus: u8::from_str_radix(bus, 16).ok()?,
            device,
            function,
        })
    }
}

impl fmt::Debug for PciAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PCI({:04x}:{:02x}:{:02x}.{:x})",
            self.segment, self.bus, self.device, self.function
        )
    }
}

impl fmt::Display for PciAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{:x}",
            self.segment, self.bus, self.device, self.function
        )
    }
}

// =============================================================================
// DEVICE ID
// =============================================================================

/// PCI vendor/device identifier pair
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceId {
    /// PCI Vendor ID
    pub vendor: u16,
    /// PCI Device ID
    pub device: u16,
}

impl DeviceId {
    /// Intel vendor ID
    pub const INTEL_VENDOR_ID: u16 = 0x8086;

    /// Create a new device id
    #[inline]
    pub const fn new(vendor: u16, device: u16) -> Self {
        Self { vendor, device }
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({:04x}:{:04x})", self.vendor, self.device)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor, self.device)
    }
}

// =============================================================================
// GUID
// =============================================================================

/// 128-bit interface identifier (accelerator function id)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Guid(u128);

impl Guid {
    /// The all-zero GUID
    pub const NIL: Self = Self(0);

    /// Create from raw value
    #[inline]
    pub const fn from_u128(raw: u128) -> Self {
        Self(raw)
    }

    /// Get the raw value
    #[inline]
    pub const fn as_u128(self) -> u128 {
        self.0
    }

    /// Parse the canonical `8-4-4-4-12` hex form
    pub fn parse(s: &str) -> Option<Self> {
        let mut groups = s.split('-');
        let widths = [8, 4, 4, 4, 12];
        let mut raw: u128 = 0;

        for width in widths {
            let group = groups.next()?;
            if group.len() != width {
                return None;
            }
            let value = u64::from_str_radix(group, 16).ok()?;
            raw = (raw << (width * 4)) | u128::from(value);
        }

        if groups.next().is_some() {
            return None;
        }
        Some(Self(raw))
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xFFFF_FFFF_FFFF
        )
    }
}

// =============================================================================
// RESOURCE KIND
// =============================================================================

/// Category of a discoverable resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ResourceKind {
    /// Accelerator function (AFU) that can be opened for work
    Accelerator = 0,
    /// Accelerator card / FPGA device hosting accelerator functions
    Device      = 1,
    /// Any other PCI function
    Generic     = 2,
}

impl ResourceKind {
    /// Short lowercase label
    pub const fn label(self) -> &'static str {
        match self {
            Self::Accelerator => "accelerator",
            Self::Device => "device",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// OPEN MODE
// =============================================================================

/// Mutual-exclusion policy requested when opening a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// Sole session on the resource
    Exclusive,
    /// May coexist with other shared sessions
    Shared,
}

impl OpenMode {
    /// Check if this mode can coexist with an existing session in `other`
    #[inline]
    pub const fn compatible_with(self, other: OpenMode) -> bool {
        matches!((self, other), (Self::Shared, Self::Shared))
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exclusive => f.write_str("exclusive"),
            Self::Shared => f.write_str("shared"),
        }
    }
}

// =============================================================================
// CAPABILITIES
// =============================================================================

bitflags::bitflags! {
    /// Capability flags advertised by a resource
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u32 {
        /// Memory-mapped register space is exposed
        const MMIO = 1 << 0;
        /// Interrupt delivery supported
        const INTERRUPTS = 1 << 1;
        /// Host memory can be shared with the device
        const SHARED_MEMORY = 1 << 2;
        /// Function can be partially reconfigured
        const RECONFIGURABLE = 1 << 3;
        /// Function can be reset independently
        const RESETTABLE = 1 << 4;
        /// SR-IOV virtual function
        const VIRTUAL_FUNCTION = 1 << 5;
    }
}

// =============================================================================
// STATIC ASSERTIONS
// =============================================================================

static_assertions::assert_impl_all!(ObjectId: Send, Sync, Copy);
static_assertions::assert_impl_all!(PciAddr: Send, Sync, Copy);
static_assertions::assert_impl_all!(Guid: Send, Sync, Copy);

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn test_pci_addr_parse_roundtrip() {
        let addr = PciAddr::parse("0000:5e:00.1").expect("valid address");
        assert_eq!(addr, PciAddr::new(0, 0x5e, 0, 1));
        assert_eq!(format!("{}", addr), "0000:5e:00.1");
    }

    #[test]
    fn test_pci_addr_rejects_malformed() {
        assert!(PciAddr::parse("5e:00.1").is_none());
        assert!(PciAddr::parse("0000:5e:20.0").is_none());
        assert!(PciAddr::parse("0000:5e:00.8").is_none());
        assert!(PciAddr::parse("zzzz:5e:00.0").is_none());
    }

    #[test]
    fn test_guid_parse_and_display() {
        let text = "d8424dc4-a4a3-c413-f89e-433683f9040b";
        let guid = Guid::parse(text).expect("valid guid");
        assert_eq!(format!("{}", guid), text);
        assert!(Guid::parse("d8424dc4-a4a3-c413-f89e-433683f9040").is_none());
        assert!(Guid::parse("d8424dc4-a4a3-c413-f89e-433683f9040b-00").is_none());
    }

    #[test]
    fn test_open_mode_compatibility() {
        assert!(OpenMode::Shared.compatible_with(OpenMode::Shared));
        assert!(!OpenMode::Shared.compatible_with(OpenMode::Exclusive));
        assert!(!OpenMode::Exclusive.compatible_with(OpenMode::Shared));
        assert!(!OpenMode::Exclusive.compatible_with(OpenMode::Exclusive));
    }

    #[test]
    fn test_object_id_null() {
        assert!(ObjectId::new(0).is_null());
        assert!(!ObjectId::new(7).is_null());
    }
}
