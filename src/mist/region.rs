//! Region resolution
//!
//! Maps a logical region identifier to the base endpoint of that Mist
//! deployment. The region set is static and immutable for the lifetime
//! of the process.

use crate::error::WorkflowError;

/// A named deployment of the Mist management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub id: &'static str,
    pub display_name: &'static str,
    pub base_url: &'static str,
}

/// The static region table, in display order.
pub const REGIONS: &[Region] = &[
    Region {
        id: "global01",
        display_name: "Global 01",
        base_url: "https://api.mist.com",
    },
    Region {
        id: "global02",
        display_name: "Global 02",
        base_url: "https://api.gc1.mist.com",
    },
    Region {
        id: "global03",
        display_name: "Global 03",
        base_url: "https://api.ac2.mist.com",
    },
    Region {
        id: "global04",
        display_name: "Global 04",
        base_url: "https://api.gc2.mist.com",
    },
];

/// Resolve a region id against the static table.
///
/// Pure lookup with no side effects; fails with [`WorkflowError::UnknownRegion`]
/// before any network activity can happen.
pub fn resolve(region_id: &str) -> Result<&'static Region, WorkflowError> {
    REGIONS
        .iter()
        .find(|r| r.id == region_id)
        .ok_or_else(|| WorkflowError::UnknownRegion(region_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_known_region() {
        let region = resolve("global01").unwrap();
        assert_eq!(region.base_url, "https://api.mist.com");
        assert_eq!(region.display_name, "Global 01");
    }

    #[test]
    fn resolve_all_table_entries() {
        for region in REGIONS {
            assert_eq!(resolve(region.id).unwrap().id, region.id);
        }
    }

    #[test]
    fn resolve_unknown_region_fails() {
        let err = resolve("not-a-region").unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownRegion(id) if id == "not-a-region"));
    }
}
