//! Device inventory
//!
//! Fetches the organization's device inventory and normalizes each record
//! before any downstream projection: per-type optional fields get
//! empty-string/zero defaults, noisy vendor fields are dropped, and every
//! record gains a `site_name` from the site catalog. Grouped records can be
//! exported as one CSV per device type.

use super::catalog::SiteCatalog;
use crate::error::WorkflowError;
use crate::mist::client::MistClient;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Sentinel site name for devices without a resolvable site assignment.
pub const UNASSIGNED: &str = "Unassigned";

/// Fetch the inventory and normalize every record against the catalog.
pub async fn fetch_inventory(
    client: &MistClient,
    catalog: &SiteCatalog,
) -> Result<Vec<Value>, WorkflowError> {
    let response = client.list_inventory().await?;

    if !response.is_success() {
        return Err(response.as_error());
    }

    let payload = response.json().map_err(|e| WorkflowError::RemoteApi {
        status: response.status.as_u16(),
        detail: format!("could not decode inventory: {e}"),
    })?;

    let Some(items) = payload.as_array() else {
        return Err(WorkflowError::RemoteApi {
            status: response.status.as_u16(),
            detail: "inventory response was not an array".to_string(),
        });
    };

    let mut devices: Vec<Value> = items.to_vec();
    for device in &mut devices {
        normalize_device(device, catalog);
    }
    tracing::info!("Fetched {} inventory records", devices.len());
    Ok(devices)
}

/// Normalize one device record in place.
///
/// Absent per-type fields become ""/0 so every record of a type has the same
/// shape; the `site_name` join uses [`UNASSIGNED`] when the device has no
/// site or the site is not in the catalog snapshot.
pub fn normalize_device(device: &mut Value, catalog: &SiteCatalog) {
    let Some(obj) = device.as_object_mut() else {
        return;
    };

    let site_name = obj
        .get("site_id")
        .and_then(|v| v.as_str())
        .and_then(|id| catalog.get(id))
        .map(|site| site.name.clone())
        .unwrap_or_else(|| UNASSIGNED.to_string());
    obj.insert("site_name".to_string(), Value::String(site_name));

    let device_type = obj
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    match device_type.as_str() {
        "switch" => {
            obj.remove("vc_mac");
            for field in [
                "hostname",
                "chassis_mac",
                "chassis_serial",
                "name",
                "deviceprofile_id",
            ] {
                obj.entry(field).or_insert_with(|| Value::String(String::new()));
            }
            obj.entry("connected").or_insert(Value::from(0));
        }
        "ap" => {
            obj.remove("jsi");
            for field in ["name", "deviceprofile_id"] {
                obj.entry(field).or_insert_with(|| Value::String(String::new()));
            }
            obj.entry("connected").or_insert(Value::from(0));
        }
        _ => {}
    }
}

/// Group normalized records by their `type` tag ("unknown" when untagged).
pub fn group_by_type(devices: Vec<Value>) -> BTreeMap<String, Vec<Value>> {
    let mut groups: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for device in devices {
        let device_type = device
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        groups.entry(device_type).or_default().push(device);
    }
    groups
}

/// Replace filename-hostile characters with underscores.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Render one cell for CSV output. Nested values are JSON-encoded into the
/// cell, matching how the records are consumed downstream.
fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Write one CSV per device type into `out_dir`, returning the paths written.
///
/// The header row is the first record's field set; multi-level values are
/// JSON-encoded into their cell.
pub fn export_csv(groups: &BTreeMap<String, Vec<Value>>, out_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create export directory {}", out_dir.display()))?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let mut written = Vec::new();

    for (device_type, items) in groups {
        let Some(first) = items.first().and_then(|v| v.as_object()) else {
            continue;
        };

        let headers: Vec<String> = first.keys().cloned().collect();
        let path = out_dir.join(format!(
            "{}_inventory_{}.csv",
            sanitize_filename(device_type),
            timestamp
        ));

        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        writer.write_record(&headers)?;

        for item in items {
            let record: Vec<String> = headers
                .iter()
                .map(|h| render_cell(item.get(h)))
                .collect();
            writer.write_record(&record)?;
        }

        writer.flush()?;
        tracing::info!(
            "Exported {} {} records to {}",
            items.len(),
            device_type,
            path.display()
        );
        written.push(path);
    }

    Ok(written)
}
