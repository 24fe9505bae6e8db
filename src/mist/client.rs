//! Mist Client
//!
//! Credentialed client for one organization in one region, combining the
//! HTTP transport with endpoint construction.

use super::http::{ApiResponse, MistHttpClient};
use super::region;
use crate::error::WorkflowError;
use serde::Serialize;
use std::fmt;

/// Operator-supplied credential scoping every call to one organization in
/// one region.
///
/// Exists only for the lifetime of the session that supplied it; the token
/// is never written to config, durable storage, or logs.
#[derive(Clone)]
pub struct Credential {
    pub region_id: String,
    pub base_url: String,
    pub org_id: String,
    api_token: String,
}

impl Credential {
    /// Resolve a region id against the static table and bind the org and
    /// token to it. Fails with `UnknownRegion` before any network call.
    pub fn new(region_id: &str, org_id: &str, api_token: &str) -> Result<Self, WorkflowError> {
        let region = region::resolve(region_id)?;
        Ok(Self {
            region_id: region.id.to_string(),
            base_url: region.base_url.to_string(),
            org_id: org_id.to_string(),
            api_token: api_token.to_string(),
        })
    }

    /// Bind the org and token to an explicit endpoint, bypassing the region
    /// table. Intended for test servers; the CLI always goes through `new`.
    pub fn for_endpoint(base_url: &str, org_id: &str, api_token: &str) -> Self {
        Self {
            region_id: "custom".to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            org_id: org_id.to_string(),
            api_token: api_token.to_string(),
        }
    }
}

// Manual Debug so a stray {:?} can never leak the token.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("region_id", &self.region_id)
            .field("org_id", &self.org_id)
            .field("api_token", &"***")
            .finish()
    }
}

/// Client for the Mist management API, bound to one credential.
#[derive(Clone)]
pub struct MistClient {
    credential: Credential,
    http: MistHttpClient,
}

impl MistClient {
    /// Create a new client for the credential.
    pub fn new(credential: Credential) -> Result<Self, WorkflowError> {
        let http = MistHttpClient::new()?;
        Ok(Self { credential, http })
    }

    /// Create a client over an existing transport (shared connection pool).
    pub fn with_http(credential: Credential, http: MistHttpClient) -> Self {
        Self { credential, http }
    }

    pub fn org_id(&self) -> &str {
        &self.credential.org_id
    }

    pub fn region_id(&self) -> &str {
        &self.credential.region_id
    }

    // =========================================================================
    // URL builders
    // =========================================================================

    /// Build an org-scoped API URL
    pub fn org_url(&self, resource: &str) -> String {
        format!(
            "{}/api/v1/orgs/{}/{}",
            self.credential.base_url, self.credential.org_id, resource
        )
    }

    /// Build a site-scoped API URL
    pub fn site_url(&self, site_id: &str) -> String {
        format!("{}/api/v1/sites/{}", self.credential.base_url, site_id)
    }

    /// Build a URL for a resource under a site
    pub fn site_resource_url(&self, site_id: &str, resource: &str) -> String {
        format!("{}/{}", self.site_url(site_id), resource)
    }

    // =========================================================================
    // Sites API
    // =========================================================================

    /// List all sites in the organization.
    pub async fn list_sites(&self) -> Result<ApiResponse, WorkflowError> {
        self.http
            .get(&self.org_url("sites"), &self.credential.api_token)
            .await
    }

    /// Create a new site in the organization.
    pub async fn create_site<B: Serialize + ?Sized>(
        &self,
        payload: &B,
    ) -> Result<ApiResponse, WorkflowError> {
        self.http
            .post(&self.org_url("sites"), &self.credential.api_token, payload)
            .await
    }

    /// Delete a site.
    pub async fn delete_site(&self, site_id: &str) -> Result<ApiResponse, WorkflowError> {
        self.http
            .delete(&self.site_url(site_id), &self.credential.api_token)
            .await
    }

    /// Replace a site's settings document (firmware auto-upgrade lives here).
    pub async fn update_site_setting<B: Serialize + ?Sized>(
        &self,
        site_id: &str,
        payload: &B,
    ) -> Result<ApiResponse, WorkflowError> {
        self.http
            .put(
                &self.site_resource_url(site_id, "setting"),
                &self.credential.api_token,
                payload,
            )
            .await
    }

    /// Start a device upgrade across a site.
    pub async fn upgrade_devices<B: Serialize + ?Sized>(
        &self,
        site_id: &str,
        payload: &B,
    ) -> Result<ApiResponse, WorkflowError> {
        self.http
            .post(
                &self.site_resource_url(site_id, "devices/upgrade"),
                &self.credential.api_token,
                payload,
            )
            .await
    }

    // =========================================================================
    // Inventory API
    // =========================================================================

    /// List the organization's device inventory.
    pub async fn list_inventory(&self) -> Result<ApiResponse, WorkflowError> {
        self.http
            .get(&self.org_url("inventory"), &self.credential.api_token)
            .await
    }
}
