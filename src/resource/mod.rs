//! Resource layer
//!
//! In-memory snapshots of remotely managed resources and the projections
//! built from them.
//!
//! # Architecture
//!
//! - [`catalog`] - Site catalog snapshot with id/name lookups
//! - [`inventory`] - Device inventory with per-type normalization and CSV export
//!
//! # Example
//!
//! ```ignore
//! use crate::mist::client::MistClient;
//! use crate::resource::SiteCatalog;
//!
//! async fn list_names(client: &MistClient) -> anyhow::Result<Vec<String>> {
//!     let catalog = SiteCatalog::fetch(client).await?;
//!     Ok(catalog.sites().iter().map(|s| s.name.clone()).collect())
//! }
//! ```

pub mod catalog;
pub mod inventory;

pub use catalog::{Site, SiteCatalog, UNKNOWN_SITE};
pub use inventory::{export_csv, fetch_inventory, group_by_type, normalize_device, UNASSIGNED};
