//! Site catalog
//!
//! In-memory snapshot of the organization's sites from one list call, with
//! the id/name lookups the selection and reporting stages need. Entries are
//! immutable snapshots - mutating one locally never affects the remote
//! system.

use crate::error::WorkflowError;
use crate::mist::client::MistClient;
use serde_json::Value;

/// Sentinel returned by name lookups for ids with no catalog entry.
pub const UNKNOWN_SITE: &str = "Unknown Site";

/// One site from the organization's list response.
#[derive(Debug, Clone)]
pub struct Site {
    pub id: String,
    pub name: String,
    pub address: String,
    pub country_code: String,
    pub timezone: String,
}

impl From<&Value> for Site {
    fn from(value: &Value) -> Self {
        Self {
            id: value
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            name: value
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            address: value
                .get("address")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            country_code: value
                .get("country_code")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            timezone: value
                .get("timezone")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
        }
    }
}

/// Ordered snapshot of the organization's sites.
#[derive(Debug, Clone, Default)]
pub struct SiteCatalog {
    sites: Vec<Site>,
}

impl SiteCatalog {
    /// Fetch the site list for the client's organization.
    ///
    /// A non-2xx status and an undecodable body both become
    /// [`WorkflowError::CatalogFetch`], carrying the remote `detail` message
    /// when the server sent one.
    pub async fn fetch(client: &MistClient) -> Result<Self, WorkflowError> {
        let response = client.list_sites().await?;

        if !response.is_success() {
            return Err(WorkflowError::CatalogFetch {
                detail: response.failure_message(),
            });
        }

        let payload = response.json().map_err(|e| WorkflowError::CatalogFetch {
            detail: format!("could not decode site list: {e}"),
        })?;

        let Some(items) = payload.as_array() else {
            return Err(WorkflowError::CatalogFetch {
                detail: "site list response was not an array".to_string(),
            });
        };

        let catalog = Self {
            sites: items.iter().map(Site::from).collect(),
        };
        tracing::info!("Fetched {} sites", catalog.sites.len());
        Ok(catalog)
    }

    /// Build a catalog from already-parsed entries.
    pub fn from_sites(sites: Vec<Site>) -> Self {
        Self { sites }
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Site> {
        self.sites.iter().find(|s| s.id == id)
    }

    /// Best-effort reverse lookup against the snapshot; never fails.
    pub fn lookup_name(&self, id: &str) -> &str {
        self.get(id).map(|s| s.name.as_str()).unwrap_or(UNKNOWN_SITE)
    }

    /// All site ids in catalog order.
    pub fn ids(&self) -> Vec<String> {
        self.sites.iter().map(|s| s.id.clone()).collect()
    }

    /// Resolve operator-supplied selectors (site ids or exact names) to ids,
    /// preserving selector order. Unmatched selectors are returned separately
    /// for the caller to surface; no deduplication.
    pub fn resolve_selectors(&self, selectors: &[String]) -> (Vec<String>, Vec<String>) {
        let mut ids = Vec::new();
        let mut unmatched = Vec::new();

        for selector in selectors {
            if let Some(site) = self
                .sites
                .iter()
                .find(|s| &s.id == selector || &s.name == selector)
            {
                ids.push(site.id.clone());
            } else {
                unmatched.push(selector.clone());
            }
        }

        (ids, unmatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> SiteCatalog {
        let items = json!([
            {"id": "s1", "name": "HQ", "address": "1 Main St", "country_code": "US", "timezone": "America/New_York"},
            {"id": "s2", "name": "Branch"},
        ]);
        SiteCatalog::from_sites(items.as_array().unwrap().iter().map(Site::from).collect())
    }

    #[test]
    fn site_from_value_defaults_missing_fields() {
        let site = Site::from(&json!({"id": "x"}));
        assert_eq!(site.id, "x");
        assert_eq!(site.name, "");
        assert_eq!(site.address, "");
    }

    #[test]
    fn lookup_name_hits_and_misses() {
        let catalog = catalog();
        assert_eq!(catalog.lookup_name("s1"), "HQ");
        assert_eq!(catalog.lookup_name("missing"), UNKNOWN_SITE);
    }

    #[test]
    fn resolve_selectors_by_id_and_name() {
        let catalog = catalog();
        let (ids, unmatched) = catalog.resolve_selectors(&[
            "Branch".to_string(),
            "s1".to_string(),
            "nope".to_string(),
        ]);
        // selector order, not catalog order
        assert_eq!(ids, vec!["s2".to_string(), "s1".to_string()]);
        assert_eq!(unmatched, vec!["nope".to_string()]);
    }

    #[test]
    fn catalog_preserves_response_order() {
        let catalog = catalog();
        let ids = catalog.ids();
        assert_eq!(ids, vec!["s1".to_string(), "s2".to_string()]);
    }
}
