//! Workflow state machine
//!
//! Drives one operator session through the staged bulk-operation flow:
//! collect credentials (or import a file), select targets, confirm or
//! configure, execute, report. The session itself is a plain value; the
//! engine validates every input against the current stage and mutates the
//! session only after all fallible work has succeeded, so an error always
//! leaves the session re-enterable at the same stage.
//!
//! # Architecture
//!
//! - `Stage` - where a session sits in the flow
//! - `WorkflowSession` - everything one session carries between steps
//! - `WorkflowEngine` - stage-validated transitions over a session
//!
//! # Example
//!
//! ```ignore
//! let engine = WorkflowEngine::new(MistHttpClient::new()?);
//! let mut session = WorkflowSession::new(Operation::DeleteSites);
//! engine.submit_credentials(&mut session, credential).await?;
//! engine.select(&mut session, &selectors)?;
//! engine.confirm(&mut session, true)?;
//! let report = engine.execute(&mut session).await?;
//! ```

use crate::bulk::{self, BatchReport, Target};
use crate::error::WorkflowError;
use crate::import::{self, ColumnMapping, ImportBatch, ImportField};
use crate::mist::client::{Credential, MistClient};
use crate::mist::http::MistHttpClient;
use crate::ops::Operation;
use crate::resource::SiteCatalog;
use std::fmt;
use tracing::{debug, info, warn};

/// Where a session sits in the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Waiting for region, organization, and token.
    CollectCredentials,
    /// Waiting for an import file and column bindings (creation flow).
    Import,
    /// Catalog fetched; waiting for a target selection.
    SelectResources,
    /// Destructive operation waiting for an explicit yes or no.
    ConfirmOrConfigure,
    /// Confirmed (or confirmation skipped); ready to run the batch.
    Executing,
    /// Batch finished; outcomes available. Terminal.
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::CollectCredentials => "collect-credentials",
            Stage::Import => "import",
            Stage::SelectResources => "select-resources",
            Stage::ConfirmOrConfigure => "confirm",
            Stage::Executing => "execute",
            Stage::Report => "report",
        };
        f.write_str(name)
    }
}

/// Everything one operator session carries between steps.
///
/// Plain data - transitions happen in [`WorkflowEngine`]. A session lives in
/// a session store for the duration of one workflow and nowhere else; the
/// credential inside it disappears with the session.
#[derive(Debug, Clone)]
pub struct WorkflowSession {
    pub stage: Stage,
    pub operation: Operation,
    pub credential: Option<Credential>,
    pub catalog: SiteCatalog,
    pub import: Option<ImportBatch>,
    pub mapping: ColumnMapping,
    pub selection: Vec<Target>,
    pub report: Option<BatchReport>,
}

impl WorkflowSession {
    /// Open a session for one operation, at that operation's entry stage.
    pub fn new(operation: Operation) -> Self {
        let stage = if operation.is_import() {
            Stage::Import
        } else {
            Stage::CollectCredentials
        };

        Self {
            stage,
            operation,
            credential: None,
            catalog: SiteCatalog::default(),
            import: None,
            mapping: ColumnMapping::default(),
            selection: Vec::new(),
            report: None,
        }
    }

    fn expect_stage(&self, expected: Stage) -> Result<(), WorkflowError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(WorkflowError::WrongStage {
                expected,
                actual: self.stage,
            })
        }
    }
}

/// Stage-validated transitions over a [`WorkflowSession`].
///
/// The engine owns the shared HTTP client and the concurrency setting;
/// per-session state stays in the session value.
pub struct WorkflowEngine {
    http: MistHttpClient,
    concurrency: usize,
}

impl WorkflowEngine {
    pub fn new(http: MistHttpClient) -> Self {
        Self {
            http,
            concurrency: 1,
        }
    }

    /// Allow up to `max_in_flight` requests at once during execution.
    /// The default of 1 keeps the batch strictly sequential.
    pub fn with_concurrency(mut self, max_in_flight: usize) -> Self {
        self.concurrency = max_in_flight.max(1);
        self
    }

    fn client_for(&self, credential: &Credential) -> MistClient {
        MistClient::with_http(credential.clone(), self.http.clone())
    }

    /// Accept credentials and fetch the site catalog.
    ///
    /// Valid at `CollectCredentials`. On success the session holds the
    /// catalog snapshot and moves to `SelectResources`; on any failure
    /// (including an organization with zero sites) the session is untouched
    /// and re-enterable.
    pub async fn submit_credentials(
        &self,
        session: &mut WorkflowSession,
        credential: Credential,
    ) -> Result<(), WorkflowError> {
        session.expect_stage(Stage::CollectCredentials)?;

        let client = self.client_for(&credential);
        let catalog = SiteCatalog::fetch(&client).await?;
        if catalog.is_empty() {
            return Err(WorkflowError::CatalogFetch {
                detail: "organization has no sites".to_string(),
            });
        }

        info!(
            "catalog ready: {} sites in org {} ({})",
            catalog.len(),
            credential.org_id,
            credential.region_id
        );
        session.credential = Some(credential);
        session.catalog = catalog;
        session.stage = Stage::SelectResources;
        Ok(())
    }

    /// Accept credentials plus an uploaded file and parse it.
    ///
    /// Valid at `Import`, the entry stage for import-driven creation.
    /// No network call happens here; creation requests go out at execute.
    pub fn import_file(
        &self,
        session: &mut WorkflowSession,
        credential: Credential,
        data: &[u8],
    ) -> Result<(), WorkflowError> {
        session.expect_stage(Stage::Import)?;

        let batch = import::parse(data)?;
        debug!("import parsed: {} rows", batch.len());
        session.credential = Some(credential);
        session.import = Some(batch);
        Ok(())
    }

    /// Bind logical fields to the imported file's headers.
    ///
    /// Valid at `Import` after a file has been parsed. The selection is
    /// implicitly every parsed row and creation needs no confirmation, so a
    /// successful bind leaves the session execute-ready.
    pub fn bind_columns(
        &self,
        session: &mut WorkflowSession,
        assignments: &[(ImportField, String)],
    ) -> Result<(), WorkflowError> {
        session.expect_stage(Stage::Import)?;

        let batch = session.import.as_ref().ok_or_else(|| {
            WorkflowError::ImportParse("no import file has been parsed".to_string())
        })?;
        let mapping = import::bind(&batch.headers, assignments)?;

        session.mapping = mapping;
        session.stage = Stage::Executing;
        Ok(())
    }

    /// Choose the targets to act on, by site id or exact name.
    ///
    /// Valid at `SelectResources`. An empty or fully unmatched selection is
    /// rejected and the session stays put. Destructive operations move to
    /// the confirmation stage; configuring ones are execute-ready at once.
    pub fn select(
        &self,
        session: &mut WorkflowSession,
        selectors: &[String],
    ) -> Result<(), WorkflowError> {
        session.expect_stage(Stage::SelectResources)?;

        let (ids, unmatched) = session.catalog.resolve_selectors(selectors);
        for selector in &unmatched {
            warn!("selector matched no site: {selector}");
        }
        if ids.is_empty() {
            return Err(WorkflowError::EmptySelection);
        }

        let selection: Vec<Target> = ids
            .into_iter()
            .map(|id| {
                let name = session.catalog.lookup_name(&id).to_string();
                Target::new(id, name)
            })
            .collect();
        session.selection = selection;
        session.stage = if session.operation.requires_confirmation() {
            Stage::ConfirmOrConfigure
        } else {
            Stage::Executing
        };
        Ok(())
    }

    /// Answer the confirmation prompt for a destructive operation.
    ///
    /// Valid at `ConfirmOrConfigure`. Declining returns the session to
    /// `SelectResources` with the selection retained.
    pub fn confirm(&self, session: &mut WorkflowSession, yes: bool) -> Result<(), WorkflowError> {
        session.expect_stage(Stage::ConfirmOrConfigure)?;

        session.stage = if yes {
            Stage::Executing
        } else {
            Stage::SelectResources
        };
        Ok(())
    }

    /// Replace the operation parameters before the batch runs.
    ///
    /// Valid while execute-ready. Configuring operations skip the
    /// confirmation stage, so this is where late parameter changes land.
    pub fn configure(
        &self,
        session: &mut WorkflowSession,
        operation: Operation,
    ) -> Result<(), WorkflowError> {
        session.expect_stage(Stage::Executing)?;

        session.operation = operation;
        Ok(())
    }

    /// Run the bulk operation over the selection and produce the report.
    ///
    /// Valid at `Executing`. Guards that need no network - a non-empty
    /// selection, bound required fields for imports - are checked first;
    /// after that the batch always runs to completion and the session
    /// reaches `Report`, partial failures included.
    pub async fn execute(
        &self,
        session: &mut WorkflowSession,
    ) -> Result<BatchReport, WorkflowError> {
        session.expect_stage(Stage::Executing)?;

        let credential = session.credential.clone().ok_or(WorkflowError::WrongStage {
            expected: Stage::CollectCredentials,
            actual: Stage::Executing,
        })?;
        let client = self.client_for(&credential);
        let operation = session.operation.clone();

        let report = match &operation {
            Operation::CreateSites(template) => {
                template.validate_mapping(&session.mapping)?;
                let rows = match &session.import {
                    Some(batch) if !batch.rows.is_empty() => batch.rows.clone(),
                    _ => return Err(WorkflowError::EmptySelection),
                };
                info!("creating {} sites", rows.len());

                let mapping = session.mapping.clone();
                let client_ref = &client;
                let mapping_ref = &mapping;
                if self.concurrency <= 1 {
                    bulk::execute(rows, move |row| async move {
                        template.create_from_row(client_ref, &row, mapping_ref).await
                    })
                    .await
                } else {
                    bulk::execute_bounded(rows, self.concurrency, move |row| async move {
                        template.create_from_row(client_ref, &row, mapping_ref).await
                    })
                    .await
                }
            }
            _ => {
                if session.selection.is_empty() {
                    return Err(WorkflowError::EmptySelection);
                }
                let targets = session.selection.clone();
                info!("running {} over {} sites", operation.name(), targets.len());

                let client_ref = &client;
                let operation_ref = &operation;
                if self.concurrency <= 1 {
                    bulk::execute(targets, move |target| async move {
                        operation_ref.apply(client_ref, &target).await
                    })
                    .await
                } else {
                    bulk::execute_bounded(targets, self.concurrency, move |target| async move {
                        operation_ref.apply(client_ref, &target).await
                    })
                    .await
                }
            }
        };

        info!(
            "{} finished: {} succeeded, {} failed",
            operation.name(),
            report.summary.succeeded,
            report.summary.failed
        );

        // the one permitted mid-workflow snapshot refresh
        if operation.refreshes_catalog() {
            match SiteCatalog::fetch(&client).await {
                Ok(catalog) => session.catalog = catalog,
                Err(err) => warn!("catalog refresh after batch failed: {err}"),
            }
        }

        session.report = Some(report.clone());
        session.stage = Stage::Report;
        Ok(report)
    }

    /// Return the session to its entry stage, clearing everything except
    /// the operation itself.
    pub fn reset(&self, session: &mut WorkflowSession) {
        let fresh = WorkflowSession::new(session.operation.clone());
        *session = fresh;
    }
}
