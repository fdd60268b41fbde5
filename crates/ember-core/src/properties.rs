//! # Resource Properties
//!
//! The attribute record a driver reports for each catalog entry.

use alloc::string::String;
use core::fmt;

use crate::types::*;

/// Read-only attributes of one discoverable resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
    /// Catalog identity
    pub object_id: ObjectId,
    /// Resource category
    pub kind: ResourceKind,
    /// PCI vendor/device id
    pub id: DeviceId,
    /// Physical location
    pub location: PciAddr,
    /// Socket / NUMA node the device is attached to
    pub socket_id: u8,
    /// Interface GUID (accelerator function id), NIL if none
    pub guid: Guid,
    /// Advertised capabilities
    pub capabilities: Capabilities,
    /// Owning resource (an accelerator's device)
    pub parent: Option<ObjectId>,
    /// Human-readable name
    pub name: String,
}

impl Attributes {
    /// Minimal record with everything but identity and kind defaulted
    pub fn new(object_id: ObjectId, kind: ResourceKind) -> Self {
        Self {
            object_id,
            kind,
            id: DeviceId::default(),
            location: PciAddr::default(),
            socket_id: 0,
            guid: Guid::NIL,
            capabilities: Capabilities::empty(),
            parent: None,
            name: String::new(),
        }
    }

    /// Set PCI vendor/device id
    pub fn with_id(mut self, vendor: u16, device: u16) -> Self {
        self.id = DeviceId::new(vendor, device);
        self
    }

    /// Set physical location
    pub fn at(mut self, location: PciAddr) -> Self {
        self.location = location;
        self
    }

    /// Set socket id
    pub fn on_socket(mut self, socket_id: u8) -> Self {
        self.socket_id = socket_id;
        self
    }

    /// Set interface GUID
    pub fn with_guid(mut self, guid: Guid) -> Self {
        self.guid = guid;
        self
    }

    /// Set capability flags
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set parent object
    pub fn child_of(mut self, parent: ObjectId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set display name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Check if the resource advertises every flag in `caps`
    #[inline]
    pub fn has(&self, caps: Capabilities) -> bool {
        self.capabilities.contains(caps)
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {} @ {}", self.object_id, self.kind, self.id, self.location)?;
        if !self.name.is_empty() {
            write!(f, " \"{}\"", self.name)?;
        }
        Ok(())
    }
}
