//! mistctl - bulk operation workflows for Juniper Mist organizations
//!
//! Every workflow follows the same shape: authenticate against one of the
//! Mist regions, snapshot the organization's site catalog (or import a CSV
//! of sites to create), select a subset, confirm anything destructive, then
//! apply one operation per target and report every outcome - failures
//! included, in input order.
//!
//! # Module Structure
//!
//! - `mist` - region table, HTTP plumbing, typed API client
//! - `resource` - site catalog and device inventory snapshots
//! - `import` - tabular file parsing and column binding
//! - `bulk` - the continue-on-error batch executor
//! - `ops` - the operation payloads and their success rules
//! - `workflow` - the staged session state machine
//! - `session` - in-memory session storage
//! - `geocode` - standalone address lookup collaborator

pub mod bulk;
pub mod config;
pub mod error;
pub mod geocode;
pub mod import;
pub mod mist;
pub mod ops;
pub mod resource;
pub mod session;
pub mod workflow;

pub use bulk::{BatchReport, BatchSummary, OperationOutcome, Target};
pub use error::WorkflowError;
pub use workflow::{Stage, WorkflowEngine, WorkflowSession};
