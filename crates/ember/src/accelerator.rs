//! # Accelerators
//!
//! Resource enumeration scoped to accelerator-kind entries. Every caller
//! filter is conjoined with `kind == Accelerator`, so a filter naming
//! another kind matches nothing here.

use alloc::vec::Vec;

use ember_core::{PropertyFilter, ResourceKind, Result};

use crate::enumerator::Enumerator;
use crate::resource::Resource;

/// Filter matching every accelerator
pub fn filter() -> PropertyFilter {
    PropertyFilter::from(ResourceKind::Accelerator)
}

/// Restrict a filter list to accelerators
pub fn scope(filters: &[PropertyFilter]) -> Vec<PropertyFilter> {
    if filters.is_empty() {
        return alloc::vec![filter()];
    }
    filters.iter().map(|f| f.and(filter())).collect()
}

/// Enumerate accelerator resources matching any of `filters`
pub fn enumerate(enumerator: &Enumerator, filters: &[PropertyFilter]) -> Result<Vec<Resource>> {
    Resource::enumerate(enumerator, &scope(filters))
}
