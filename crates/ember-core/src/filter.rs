//! # Property Filters
//!
//! Sparse partial-match predicates over [`Attributes`].
//!
//! Unset fields are ignored. Set fields within one filter must all match
//! (AND). A list of filters matches if any one filter matches (OR), and an
//! empty list matches everything.

use crate::properties::Attributes;
use crate::types::*;

/// Partial-match predicate over resource attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PropertyFilter {
    /// Required resource kind
    pub kind: Option<ResourceKind>,
    /// Required PCI vendor id
    pub vendor_id: Option<u16>,
    /// Required PCI device id
    pub device_id: Option<u16>,
    /// Required exact location
    pub location: Option<PciAddr>,
    /// Required PCI segment
    pub segment: Option<u16>,
    /// Required PCI bus
    pub bus: Option<u8>,
    /// Required socket id
    pub socket_id: Option<u8>,
    /// Required interface GUID
    pub guid: Option<Guid>,
    /// Required parent object
    pub parent: Option<ObjectId>,
    /// Flags that must all be advertised
    pub capabilities: Option<Capabilities>,
    /// Set when conjoining contradictory filters
    unsatisfiable: bool,
}

impl PropertyFilter {
    /// Filter with every field unset (matches everything)
    pub const fn new() -> Self {
        Self {
            kind: None,
            vendor_id: None,
            device_id: None,
            location: None,
            segment: None,
            bus: None,
            socket_id: None,
            guid: None,
            parent: None,
            capabilities: None,
            unsatisfiable: false,
        }
    }

    /// Require a resource kind
    pub fn kind(mut self, kind: ResourceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Require a vendor id
    pub fn vendor_id(mut self, vendor: u16) -> Self {
        self.vendor_id = Some(vendor);
        self
    }

    /// Require a device id
    pub fn device_id(mut self, device: u16) -> Self {
        self.device_id = Some(device);
        self
    }

    /// Require an exact PCI location
    pub fn location(mut self, location: PciAddr) -> Self {
        self.location = Some(location);
        self
    }

    /// Require a PCI segment
    pub fn segment(mut self, segment: u16) -> Self {
        self.segment = Some(segment);
        self
    }

    /// Require a PCI bus
    pub fn bus(mut self, bus: u8) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Require a socket id
    pub fn socket_id(mut self, socket_id: u8) -> Self {
        self.socket_id = Some(socket_id);
        self
    }

    /// Require an interface GUID
    pub fn guid(mut self, guid: Guid) -> Self {
        self.guid = Some(guid);
        self
    }

    /// Require a parent object
    pub fn parent(mut self, parent: ObjectId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Require capability flags
    pub fn capabilities(mut self, caps: Capabilities) -> Self {
        self.capabilities = Some(caps);
        self
    }

    /// Check if no field is set
    pub fn is_empty(&self) -> bool {
        !self.unsatisfiable && *self == Self::new()
    }

    /// Check if the filter can never match
    pub const fn is_unsatisfiable(&self) -> bool {
        self.unsatisfiable
    }

    /// Conjoin two filters
    ///
    /// Conflicting concrete values for the same field produce a filter that
    /// matches nothing. Capability requirements are unioned.
    pub fn and(self, other: Self) -> Self {
        let mut conflict = self.unsatisfiable || other.unsatisfiable;

        let out = Self {
            kind: conjoin(self.kind, other.kind, &mut conflict),
            vendor_id: conjoin(self.vendor_id, other.vendor_id, &mut conflict),
            device_id: conjoin(self.device_id, other.device_id, &mut conflict),
            location: conjoin(self.location, other.location, &mut conflict),
            segment: conjoin(self.segment, other.segment, &mut conflict),
            bus: conjoin(self.bus, other.bus, &mut conflict),
            socket_id: conjoin(self.socket_id, other.socket_id, &mut conflict),
            guid: conjoin(self.guid, other.guid, &mut conflict),
            parent: conjoin(self.parent, other.parent, &mut conflict),
            capabilities: match (self.capabilities, other.capabilities) {
                (Some(a), Some(b)) => Some(a | b),
                (a, b) => a.or(b),
            },
            unsatisfiable: false,
        };

        Self {
            unsatisfiable: conflict,
            ..out
        }
    }

    /// Check a single attribute record against this filter
    pub fn matches(&self, attrs: &Attributes) -> bool {
        if self.unsatisfiable {
            return false;
        }

        field_matches(self.kind, attrs.kind)
            && field_matches(self.vendor_id, attrs.id.vendor)
            && field_matches(self.device_id, attrs.id.device)
            && field_matches(self.location, attrs.location)
            && field_matches(self.segment, attrs.location.segment)
            && field_matches(self.bus, attrs.location.bus)
            && field_matches(self.socket_id, attrs.socket_id)
            && field_matches(self.guid, attrs.guid)
            && self.parent.map_or(true, |p| attrs.parent == Some(p))
            && self.capabilities.map_or(true, |c| attrs.has(c))
    }

    /// Check a record against a filter list (OR over filters)
    pub fn any_match(filters: &[PropertyFilter], attrs: &Attributes) -> bool {
        filters.is_empty() || filters.iter().any(|f| f.matches(attrs))
    }
}

impl From<ResourceKind> for PropertyFilter {
    fn from(kind: ResourceKind) -> Self {
        Self::new().kind(kind)
    }
}

fn conjoin<T: PartialEq>(a: Option<T>, b: Option<T>, conflict: &mut bool) -> Option<T> {
    match (a, b) {
        (Some(x), Some(y)) => {
            if x != y {
                *conflict = true;
            }
            Some(x)
        }
        (x, y) => x.or(y),
    }
}

#[inline]
fn field_matches<T: PartialEq>(wanted: Option<T>, actual: T) -> bool {
    wanted.map_or(true, |w| w == actual)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accel(id: u64, bus: u8) -> Attributes {
        Attributes::new(ObjectId::new(id), ResourceKind::Accelerator)
            .with_id(0x8086, 0x09c4)
            .at(PciAddr::new(0, bus, 0, 0))
            .with_capabilities(Capabilities::MMIO | Capabilities::INTERRUPTS)
            .child_of(ObjectId::new(100))
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let f = PropertyFilter::new();
        assert!(f.is_empty());
        assert!(f.matches(&accel(1, 0x5e)));
        assert!(f.matches(&Attributes::new(ObjectId::new(2), ResourceKind::Generic)));
    }

    #[test]
    fn test_fields_are_conjunctive() {
        let f = PropertyFilter::new().kind(ResourceKind::Accelerator).bus(0x5e);
        assert!(f.matches(&accel(1, 0x5e)));
        assert!(!f.matches(&accel(1, 0xbe)));
    }

    #[test]
    fn test_filter_list_is_disjunctive() {
        let filters = [
            PropertyFilter::new().bus(0x5e),
            PropertyFilter::new().bus(0xbe),
        ];
        assert!(PropertyFilter::any_match(&filters, &accel(1, 0x5e)));
        assert!(PropertyFilter::any_match(&filters, &accel(2, 0xbe)));
        assert!(!PropertyFilter::any_match(&filters, &accel(3, 0x3b)));
        assert!(PropertyFilter::any_match(&[], &accel(3, 0x3b)));
    }

    #[test]
    fn test_capabilities_are_a_required_subset() {
        let a = accel(1, 0x5e);
        assert!(PropertyFilter::new().capabilities(Capabilities::MMIO).matches(&a));
        assert!(!PropertyFilter::new()
            .capabilities(Capabilities::MMIO | Capabilities::RESETTABLE)
            .matches(&a));
    }

    #[test]
    fn test_parent_filter() {
        let a = accel(1, 0x5e);
        assert!(PropertyFilter::new().parent(ObjectId::new(100)).matches(&a));
        assert!(!PropertyFilter::new().parent(ObjectId::new(101)).matches(&a));
    }

    #[test]
    fn test_and_merges_disjoint_fields() {
        let f = PropertyFilter::from(ResourceKind::Accelerator).and(PropertyFilter::new().bus(0x5e));
        assert_eq!(f.kind, Some(ResourceKind::Accelerator));
        assert_eq!(f.bus, Some(0x5e));
        assert!(f.matches(&accel(1, 0x5e)));
    }

    #[test]
    fn test_and_with_conflict_matches_nothing() {
        let f = PropertyFilter::from(ResourceKind::Accelerator)
            .and(PropertyFilter::from(ResourceKind::Generic));
        assert!(f.is_unsatisfiable());
        assert!(!f.is_empty());
        assert!(!f.matches(&accel(1, 0x5e)));
        assert!(!f.matches(&Attributes::new(ObjectId::new(2), ResourceKind::Generic)));
    }

    #[test]
    fn test_refinement_never_widens() {
        let records = [
            accel(1, 0x5e),
            accel(2, 0xbe),
            Attributes::new(ObjectId::new(3), ResourceKind::Generic),
        ];
        let wide = PropertyFilter::from(ResourceKind::Accelerator);
        let narrow = wide.and(PropertyFilter::new().bus(0xbe));

        for r in &records {
            if narrow.matches(r) {
                assert!(wide.matches(r));
            }
        }
    }
}
