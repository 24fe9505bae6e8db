//! Operation capability
//!
//! The tagged set of bulk operations the workflow can run, each pairing a
//! typed request payload with its endpoint and success predicate. Every
//! request body is a serde struct - payload construction is schema-checked
//! serialization, never string assembly.

use crate::bulk::{OperationOutcome, Target};
use crate::error::WorkflowError;
use crate::import::{ColumnMapping, ImportField, ImportRow};
use crate::mist::client::MistClient;
use crate::mist::http::ApiResponse;
use anyhow::Context;
use chrono::{Local, NaiveDateTime, TimeZone};
use serde::Serialize;
use std::collections::BTreeMap;

/// AP models that accept a pinned firmware version, as operators name them.
/// Slash models cover the base and "E" hardware variants in one entry.
pub const AP_MODELS: &[&str] = &[
    "AP12", "AP24", "AP32/E", "AP33", "AP34", "AP41/E", "AP43/E", "AP45/E", "AP61/E", "AP63/E",
    "AP64",
];

/// Expand an operator-facing model key into the payload keys it covers
/// ("AP43/E" pins both AP43 and AP43E).
pub fn expand_model_key(model: &str) -> Vec<String> {
    match model.split_once('/') {
        Some((base, variant)) => vec![base.to_string(), format!("{base}{variant}")],
        None => vec![model.to_string()],
    }
}

/// Firmware auto-upgrade settings for a site's `setting` document.
#[derive(Debug, Clone, Serialize)]
pub struct AutoUpgradeSettings {
    pub enabled: bool,
    pub version: String,
    pub time_of_day: String,
    pub custom_versions: BTreeMap<String, String>,
    pub day_of_week: String,
}

impl AutoUpgradeSettings {
    /// Build a custom-version schedule. Every known model key is present in
    /// the payload - pinned where the operator supplied a version, empty
    /// otherwise - and the schedule fires at `hour_of_day:00` on
    /// `day_of_week`.
    pub fn custom(versions: &[(String, String)], day_of_week: &str, hour_of_day: u8) -> Self {
        let mut custom_versions = BTreeMap::new();
        for model in AP_MODELS {
            for key in expand_model_key(model) {
                custom_versions.insert(key, String::new());
            }
        }
        for (model, version) in versions {
            for key in expand_model_key(model) {
                custom_versions.insert(key, version.clone());
            }
        }

        Self {
            enabled: true,
            version: "custom".to_string(),
            time_of_day: format!("{hour_of_day:02}:00"),
            custom_versions,
            day_of_week: day_of_week.to_string(),
        }
    }
}

/// Envelope the settings PUT expects.
#[derive(Debug, Clone, Serialize)]
pub struct AutoUpgradeEnvelope {
    pub auto_upgrade: AutoUpgradeSettings,
}

/// Rollout strategy for a phased device upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeStrategy {
    BigBang,
    Serial,
    Canary,
    Rrm,
}

impl UpgradeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpgradeStrategy::BigBang => "big_bang",
            UpgradeStrategy::Serial => "serial",
            UpgradeStrategy::Canary => "canary",
            UpgradeStrategy::Rrm => "rrm",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "big_bang" => Some(UpgradeStrategy::BigBang),
            "serial" => Some(UpgradeStrategy::Serial),
            "canary" => Some(UpgradeStrategy::Canary),
            "rrm" => Some(UpgradeStrategy::Rrm),
            _ => None,
        }
    }
}

/// Parameters for a `devices/upgrade` call.
#[derive(Debug, Clone, Serialize)]
pub struct UpgradePlan {
    pub strategy: UpgradeStrategy,
    pub canary_phases: Vec<u32>,
    /// Percentage of failed devices (0-99) at which the rollout stops.
    pub max_failure_percentage: u8,
    /// Epoch seconds; "now" when the operator gave no start time.
    pub start_time: i64,
}

impl Default for UpgradePlan {
    fn default() -> Self {
        Self {
            strategy: UpgradeStrategy::Serial,
            canary_phases: vec![1, 10, 50, 100],
            max_failure_percentage: 10,
            start_time: chrono::Utc::now().timestamp(),
        }
    }
}

/// Parse an operator-supplied local start time; empty means start now.
pub fn parse_start_time(input: &str) -> anyhow::Result<i64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(chrono::Utc::now().timestamp());
    }

    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M"))
        .context("start time must look like 2025-01-31T22:00")?;

    let local = Local
        .from_local_datetime(&naive)
        .single()
        .context("start time is ambiguous in the local timezone")?;

    Ok(local.timestamp())
}

/// Create-site request body.
#[derive(Debug, Clone, Serialize)]
pub struct SitePayload {
    pub name: String,
    pub country_code: String,
    pub timezone: String,
    pub address: String,
    pub rftemplate_id: String,
    pub notes: String,
}

/// Fixed fields applied uniformly to every imported site.
#[derive(Debug, Clone)]
pub struct SiteTemplate {
    pub rftemplate_id: String,
    pub country_code: String,
    pub timezone: String,
    pub address_suffix: String,
}

impl Default for SiteTemplate {
    fn default() -> Self {
        Self {
            rftemplate_id: String::new(),
            country_code: "US".to_string(),
            timezone: "America/New_York".to_string(),
            address_suffix: ", USA".to_string(),
        }
    }
}

impl SiteTemplate {
    pub fn new(rftemplate_id: &str) -> Self {
        Self {
            rftemplate_id: rftemplate_id.to_string(),
            ..Self::default()
        }
    }

    /// Fields a row must have bound before any create call is attempted.
    pub fn required_fields() -> &'static [ImportField] {
        &[ImportField::Name, ImportField::Address]
    }

    /// Reject an incomplete mapping before any network call is made.
    pub fn validate_mapping(&self, mapping: &ColumnMapping) -> Result<(), WorkflowError> {
        let missing: Vec<String> = Self::required_fields()
            .iter()
            .filter(|field| !mapping.is_bound(**field))
            .map(|field| field.as_str().to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(WorkflowError::UnboundFields(missing))
        }
    }

    /// Project a row into the create payload, applying the fixed fields
    /// uniformly. Unbound optional fields materialize as empty strings.
    pub fn materialize(&self, row: &ImportRow, mapping: &ColumnMapping) -> SitePayload {
        SitePayload {
            name: mapping.value(row, ImportField::Name).to_string(),
            country_code: self.country_code.clone(),
            timezone: self.timezone.clone(),
            address: format!(
                "{}{}",
                mapping.value(row, ImportField::Address),
                self.address_suffix
            ),
            rftemplate_id: self.rftemplate_id.clone(),
            notes: mapping.value(row, ImportField::ExternalId).to_string(),
        }
    }

    /// Create one site from a row. The outcome's id is the source file line,
    /// its display name the materialized site name.
    pub async fn create_from_row(
        &self,
        client: &MistClient,
        row: &ImportRow,
        mapping: &ColumnMapping,
    ) -> OperationOutcome {
        let payload = self.materialize(row, mapping);
        let target = Target::new(format!("row {}", row.line), payload.name.clone());
        let result = client.create_site(&payload).await;
        outcome_from_result(&target, result, |r| r.is_success(), "created")
    }
}

/// One bulk operation, selected per use case via a tagged variant.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Delete every selected site. Destructive - the workflow inserts an
    /// explicit confirmation stage.
    DeleteSites,
    /// Schedule a firmware auto-upgrade window on every selected site.
    AutoUpgrade(AutoUpgradeSettings),
    /// Start a phased device upgrade on every selected site.
    DeviceUpgrade(UpgradePlan),
    /// Create one site per imported row.
    CreateSites(SiteTemplate),
}

impl Operation {
    /// Short operation name for logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::DeleteSites => "delete-sites",
            Operation::AutoUpgrade(_) => "auto-upgrade",
            Operation::DeviceUpgrade(_) => "device-upgrade",
            Operation::CreateSites(_) => "create-sites",
        }
    }

    /// Destructive operations pass through the confirmation stage;
    /// configuring ones go straight to execution.
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, Operation::DeleteSites)
    }

    /// Whether this operation consumes imported rows instead of catalog
    /// selections.
    pub fn is_import(&self) -> bool {
        matches!(self, Operation::CreateSites(_))
    }

    /// Whether the catalog is re-fetched after the batch - the one
    /// permitted mid-workflow snapshot refresh.
    pub fn refreshes_catalog(&self) -> bool {
        matches!(self, Operation::AutoUpgrade(_))
    }

    /// Apply this operation to one selected site. Per-target failures land
    /// in the outcome, never as errors.
    pub async fn apply(&self, client: &MistClient, target: &Target) -> OperationOutcome {
        tracing::debug!("{}: {} ({})", self.name(), target.name, target.id);

        match self {
            Operation::DeleteSites => {
                let result = client.delete_site(&target.id).await;
                outcome_from_result(
                    target,
                    result,
                    |r| r.status == 204 || r.status == 200,
                    "deleted",
                )
            }
            Operation::AutoUpgrade(settings) => {
                let envelope = AutoUpgradeEnvelope {
                    auto_upgrade: settings.clone(),
                };
                let result = client.update_site_setting(&target.id, &envelope).await;
                outcome_from_result(target, result, |r| r.status == 200, "auto-upgrade scheduled")
            }
            Operation::DeviceUpgrade(plan) => {
                let result = client.upgrade_devices(&target.id, plan).await;
                outcome_from_result(target, result, |r| r.status == 200, "upgrade initiated")
            }
            // import-driven creation consumes rows, not catalog targets
            Operation::CreateSites(_) => OperationOutcome {
                target_id: target.id.clone(),
                target_name: target.name.clone(),
                success: false,
                message: "create-sites runs from imported rows".to_string(),
                status: None,
            },
        }
    }
}

/// Fold a request result into the target's outcome, surfacing the most
/// specific message available: remote detail over raw status over the
/// transport error.
fn outcome_from_result(
    target: &Target,
    result: Result<ApiResponse, WorkflowError>,
    success_when: fn(&ApiResponse) -> bool,
    success_message: &str,
) -> OperationOutcome {
    match result {
        Ok(response) => {
            let success = success_when(&response);
            OperationOutcome {
                target_id: target.id.clone(),
                target_name: target.name.clone(),
                success,
                message: if success {
                    success_message.to_string()
                } else {
                    response.failure_message()
                },
                status: Some(response.status.as_u16()),
            }
        }
        Err(err) => OperationOutcome {
            target_id: target.id.clone(),
            target_name: target.name.clone(),
            success: false,
            message: err.to_string(),
            status: None,
        },
    }
}
