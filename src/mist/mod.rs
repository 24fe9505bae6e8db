//! Mist API interaction module
//!
//! Core functionality for talking to the Juniper Mist management API:
//! region resolution, the HTTP transport, and the credentialed client.
//!
//! # Module Structure
//!
//! - [`region`] - Static region table and resolution
//! - [`http`] - HTTP transport for REST API calls
//! - [`client`] - Credentialed client with endpoint construction
//!
//! # Example
//!
//! ```ignore
//! use crate::mist::client::{Credential, MistClient};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let credential = Credential::new("global01", "my-org", "my-token")?;
//!     let client = MistClient::new(credential)?;
//!     let sites = client.list_sites().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
pub mod region;
