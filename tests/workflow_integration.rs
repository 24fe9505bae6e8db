//! Integration tests for the bulk workflows using wiremock
//!
//! These tests drive the workflow engine end to end against mocked API
//! endpoints: catalog fetch, selection, confirmation, execution, and the
//! per-target outcome report.

use mistctl::bulk::Target;
use mistctl::error::WorkflowError;
use mistctl::geocode::GeocodeClient;
use mistctl::import::ImportField;
use mistctl::mist::client::Credential;
use mistctl::mist::http::MistHttpClient;
use mistctl::ops::{
    AutoUpgradeSettings, Operation, SiteTemplate, UpgradePlan, UpgradeStrategy,
};
use mistctl::resource;
use mistctl::workflow::{Stage, WorkflowEngine, WorkflowSession};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine() -> WorkflowEngine {
    WorkflowEngine::new(MistHttpClient::new().expect("client should build"))
}

fn credential_for(server: &MockServer) -> Credential {
    Credential::for_endpoint(&server.uri(), "org-1", "test-token")
}

/// Mount the site list endpoint with three sites.
async fn mount_catalog(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/orgs/org-1/sites"))
        .and(header("Authorization", "Token test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "site-a", "name": "Alpha", "address": "1 First St", "country_code": "US", "timezone": "America/New_York"},
            {"id": "site-b", "name": "Beta", "address": "2 Second St", "country_code": "US", "timezone": "America/New_York"},
            {"id": "site-c", "name": "Gamma", "address": "3 Third St", "country_code": "US", "timezone": "America/Chicago"},
        ])))
        .mount(server)
        .await;
}

/// Test module for the destructive delete workflow
mod delete_workflow_tests {
    use super::*;

    /// Test the full delete flow: one target succeeds, one fails with a
    /// remote detail message, and the report keeps input order
    #[tokio::test]
    async fn test_delete_mixed_outcomes_in_order() {
        let server = MockServer::start().await;
        mount_catalog(&server).await;

        Mock::given(method("DELETE"))
            .and(path("/api/v1/sites/site-a"))
            .and(header("Authorization", "Token test-token"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/sites/site-b"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"detail": "forbidden"})),
            )
            .mount(&server)
            .await;

        let engine = engine();
        let mut session = WorkflowSession::new(Operation::DeleteSites);

        engine
            .submit_credentials(&mut session, credential_for(&server))
            .await
            .expect("catalog fetch should succeed");
        assert_eq!(session.stage, Stage::SelectResources);
        assert_eq!(session.catalog.len(), 3);

        engine
            .select(&mut session, &["site-a".to_string(), "site-b".to_string()])
            .expect("selection should be accepted");
        assert_eq!(session.stage, Stage::ConfirmOrConfigure);

        engine
            .confirm(&mut session, true)
            .expect("confirmation should be accepted");
        let report = engine
            .execute(&mut session)
            .await
            .expect("the batch should run");

        assert_eq!(session.stage, Stage::Report);
        assert_eq!(report.outcomes.len(), 2);

        assert_eq!(report.outcomes[0].target_id, "site-a");
        assert_eq!(report.outcomes[0].target_name, "Alpha");
        assert!(report.outcomes[0].success);
        assert_eq!(report.outcomes[0].message, "deleted");
        assert_eq!(report.outcomes[0].status, Some(204));

        assert_eq!(report.outcomes[1].target_id, "site-b");
        assert!(!report.outcomes[1].success);
        assert_eq!(report.outcomes[1].message, "forbidden");
        assert_eq!(report.outcomes[1].status, Some(403));

        assert_eq!(report.summary.succeeded, 1);
        assert_eq!(report.summary.failed, 1);
        assert!(session.report.is_some());
    }

    /// Test that declining the confirmation returns to selection with the
    /// selection retained, and no delete request is ever sent
    #[tokio::test]
    async fn test_declined_confirmation_sends_nothing() {
        let server = MockServer::start().await;
        mount_catalog(&server).await;

        Mock::given(method("DELETE"))
            .and(path("/api/v1/sites/site-a"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let engine = engine();
        let mut session = WorkflowSession::new(Operation::DeleteSites);
        engine
            .submit_credentials(&mut session, credential_for(&server))
            .await
            .expect("catalog fetch should succeed");
        engine
            .select(&mut session, &["Alpha".to_string()])
            .expect("selection should be accepted");

        engine
            .confirm(&mut session, false)
            .expect("declining should be accepted");
        assert_eq!(session.stage, Stage::SelectResources);
        assert_eq!(session.selection.len(), 1);
    }

    /// Test that a transport failure on one target is captured in its
    /// outcome and never aborts the rest of the batch
    #[tokio::test]
    async fn test_transport_failures_never_abort_the_batch() {
        let engine = engine();
        let mut session = WorkflowSession::new(Operation::DeleteSites);
        // nothing listens on this port
        session.credential = Some(Credential::for_endpoint(
            "http://127.0.0.1:9",
            "org-1",
            "test-token",
        ));
        session.selection = vec![
            Target::new("site-a", "Alpha"),
            Target::new("site-b", "Beta"),
        ];
        session.stage = Stage::Executing;

        let report = engine
            .execute(&mut session)
            .await
            .expect("the batch should still run to completion");

        assert_eq!(report.outcomes.len(), 2);
        for outcome in &report.outcomes {
            assert!(!outcome.success);
            assert_eq!(outcome.status, None);
            assert!(outcome.message.contains("transport failure"));
        }
        assert_eq!(report.summary.failed, 2);
        assert_eq!(session.stage, Stage::Report);
    }
}

/// Test module for catalog fetch failures
mod catalog_tests {
    use super::*;

    /// Test that a non-2xx site list surfaces the remote detail and holds
    /// the session at the credential stage
    #[tokio::test]
    async fn test_catalog_failure_embeds_detail_and_holds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/orgs/org-1/sites"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({"detail": "internal maintenance"})),
            )
            .mount(&server)
            .await;

        let engine = engine();
        let mut session = WorkflowSession::new(Operation::DeleteSites);

        let err = engine
            .submit_credentials(&mut session, credential_for(&server))
            .await
            .unwrap_err();

        match err {
            WorkflowError::CatalogFetch { detail } => {
                assert_eq!(detail, "internal maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(session.stage, Stage::CollectCredentials);
        assert!(session.credential.is_none());
        assert!(session.catalog.is_empty());
    }

    /// Test that an organization with zero sites is rejected at the
    /// credential stage
    #[tokio::test]
    async fn test_empty_organization_holds_at_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/orgs/org-1/sites"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let engine = engine();
        let mut session = WorkflowSession::new(Operation::DeleteSites);

        let err = engine
            .submit_credentials(&mut session, credential_for(&server))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::CatalogFetch { .. }));
        assert_eq!(session.stage, Stage::CollectCredentials);
    }
}

/// Test module for the configuring workflows (auto-upgrade, device upgrade)
mod configure_workflow_tests {
    use super::*;

    /// Test that auto-upgrade sends the wrapped settings payload, covers
    /// both hardware variants of a pinned slash model, and re-fetches the
    /// catalog after the batch
    #[tokio::test]
    async fn test_auto_upgrade_payload_and_refresh() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/orgs/org-1/sites"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "site-a", "name": "Alpha", "address": "", "country_code": "US", "timezone": "UTC"},
            ])))
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/api/v1/sites/site-a/setting"))
            .and(header("Authorization", "Token test-token"))
            .and(body_partial_json(json!({
                "auto_upgrade": {
                    "enabled": true,
                    "version": "custom",
                    "time_of_day": "02:00",
                    "day_of_week": "sun",
                    "custom_versions": {
                        "AP43": "0.12.27220",
                        "AP43E": "0.12.27220",
                        "AP12": "",
                    },
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let settings = AutoUpgradeSettings::custom(
            &[("AP43/E".to_string(), "0.12.27220".to_string())],
            "sun",
            2,
        );
        let engine = engine();
        let mut session = WorkflowSession::new(Operation::AutoUpgrade(settings));

        engine
            .submit_credentials(&mut session, credential_for(&server))
            .await
            .expect("catalog fetch should succeed");
        engine
            .select(&mut session, &["Alpha".to_string()])
            .expect("selection should be accepted");
        assert_eq!(session.stage, Stage::Executing);

        let report = engine
            .execute(&mut session)
            .await
            .expect("the batch should run");

        assert!(report.all_succeeded());
        assert_eq!(report.outcomes[0].message, "auto-upgrade scheduled");
    }

    /// Test that device upgrade sends the plan as configured, including
    /// parameters replaced via configure() after selection
    #[tokio::test]
    async fn test_device_upgrade_sends_configured_plan() {
        let server = MockServer::start().await;
        mount_catalog(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/v1/sites/site-b/devices/upgrade"))
            .and(body_partial_json(json!({
                "strategy": "canary",
                "canary_phases": [5, 25, 100],
                "max_failure_percentage": 25,
                "start_time": 1_900_000_000,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let engine = engine();
        let mut session = WorkflowSession::new(Operation::DeviceUpgrade(UpgradePlan::default()));

        engine
            .submit_credentials(&mut session, credential_for(&server))
            .await
            .expect("catalog fetch should succeed");
        engine
            .select(&mut session, &["Beta".to_string()])
            .expect("selection should be accepted");

        let plan = UpgradePlan {
            strategy: UpgradeStrategy::Canary,
            canary_phases: vec![5, 25, 100],
            max_failure_percentage: 25,
            start_time: 1_900_000_000,
        };
        engine
            .configure(&mut session, Operation::DeviceUpgrade(plan))
            .expect("configure should be accepted while execute-ready");

        let report = engine
            .execute(&mut session)
            .await
            .expect("the batch should run");

        assert!(report.all_succeeded());
        assert_eq!(report.outcomes[0].message, "upgrade initiated");
        assert_eq!(report.outcomes[0].target_name, "Beta");
    }
}

/// Test module for import-driven site creation
mod import_workflow_tests {
    use super::*;

    /// Test that each row becomes one create request with the template's
    /// fixed fields applied, and a failing row does not stop the rest
    #[tokio::test]
    async fn test_import_creates_one_site_per_row() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/orgs/org-1/sites"))
            .and(body_partial_json(json!({
                "name": "HQ",
                "address": "1 Main St, USA",
                "country_code": "US",
                "timezone": "America/New_York",
                "rftemplate_id": "rf-1",
                "notes": "X-9",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "new-1"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/orgs/org-1/sites"))
            .and(body_partial_json(json!({"name": "Annex"})))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"detail": "name already in use"})),
            )
            .mount(&server)
            .await;

        let engine = engine();
        let mut session =
            WorkflowSession::new(Operation::CreateSites(SiteTemplate::new("rf-1")));

        engine
            .import_file(
                &mut session,
                credential_for(&server),
                b"Store,Street,ID\nHQ,1 Main St,X-9\nAnnex,2 Oak Ave,X-10\n",
            )
            .expect("the file should parse");
        engine
            .bind_columns(
                &mut session,
                &[
                    (ImportField::Name, "Store".to_string()),
                    (ImportField::Address, "Street".to_string()),
                    (ImportField::ExternalId, "ID".to_string()),
                ],
            )
            .expect("all named headers exist");
        assert_eq!(session.stage, Stage::Executing);

        let report = engine
            .execute(&mut session)
            .await
            .expect("the batch should run");

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[0].target_id, "row 2");
        assert_eq!(report.outcomes[0].target_name, "HQ");
        assert!(report.outcomes[0].success);
        assert_eq!(report.outcomes[0].message, "created");

        assert_eq!(report.outcomes[1].target_id, "row 3");
        assert_eq!(report.outcomes[1].target_name, "Annex");
        assert!(!report.outcomes[1].success);
        assert_eq!(report.outcomes[1].message, "name already in use");

        assert_eq!(report.summary.succeeded, 1);
        assert_eq!(report.summary.failed, 1);
    }

    /// Test that binding a field to an absent header fails before any
    /// network traffic
    #[tokio::test]
    async fn test_bind_to_absent_header_fails() {
        let engine = engine();
        let mut session =
            WorkflowSession::new(Operation::CreateSites(SiteTemplate::new("rf-1")));

        engine
            .import_file(
                &mut session,
                Credential::for_endpoint("http://127.0.0.1:9", "org-1", "t"),
                b"Store,Street\nHQ,1 Main St\n",
            )
            .expect("the file should parse");

        let err = engine
            .bind_columns(
                &mut session,
                &[
                    (ImportField::Name, "Store".to_string()),
                    (ImportField::Zip, "Zip".to_string()),
                ],
            )
            .unwrap_err();

        match err {
            WorkflowError::UnboundFields(missing) => {
                assert_eq!(missing.len(), 1);
                assert!(missing[0].contains("zip"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(session.stage, Stage::Import);
    }
}

/// Test module for the inventory snapshot
mod inventory_tests {
    use super::*;
    use mistctl::mist::client::MistClient;
    use mistctl::resource::SiteCatalog;

    /// Test that inventory devices are normalized per type and joined to
    /// site names, with unknown sites marked unassigned
    #[tokio::test]
    async fn test_inventory_is_normalized_and_joined() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/orgs/org-1/inventory"))
            .and(header("Authorization", "Token test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"type": "switch", "mac": "aa:bb", "serial": "SW1", "vc_mac": "drop-me", "site_id": "site-a"},
                {"type": "ap", "mac": "cc:dd", "serial": "AP1", "jsi": true, "site_id": "ghost"},
            ])))
            .mount(&server)
            .await;

        let client = MistClient::with_http(
            credential_for(&server),
            MistHttpClient::new().expect("client should build"),
        );
        let catalog = SiteCatalog::from_sites(vec![mistctl::resource::Site {
            id: "site-a".to_string(),
            name: "Alpha".to_string(),
            address: String::new(),
            country_code: String::new(),
            timezone: String::new(),
        }]);

        let devices = resource::fetch_inventory(&client, &catalog)
            .await
            .expect("inventory fetch should succeed");
        assert_eq!(devices.len(), 2);

        let switch = &devices[0];
        assert_eq!(switch["site_name"], "Alpha");
        assert!(switch.get("vc_mac").is_none());
        assert_eq!(switch["hostname"], "");
        assert_eq!(switch["connected"], 0);

        let ap = &devices[1];
        assert_eq!(ap["site_name"], "Unassigned");
        assert!(ap.get("jsi").is_none());
        assert_eq!(ap["name"], "");

        let groups = resource::group_by_type(devices);
        assert_eq!(groups["switch"].len(), 1);
        assert_eq!(groups["ap"].len(), 1);
    }
}

/// Test module for the geocoding collaborator
mod geocode_tests {
    use super::*;
    use mistctl::geocode::GeocodeError;
    use std::time::{Duration, Instant};

    /// Test that a lookup returns the first match and successive calls are
    /// spaced by the configured interval
    #[tokio::test]
    async fn test_lookup_returns_first_match_and_paces_calls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"lat": "40.7128", "lon": "-74.0060", "display_name": "New York, USA"},
            ])))
            .mount(&server)
            .await;

        let mut client = GeocodeClient::for_endpoint(&format!("{}/search", server.uri()))
            .expect("client should build")
            .with_min_interval(Duration::from_millis(120));

        let started = Instant::now();
        let first = client.lookup("new york").await.expect("lookup should succeed");
        assert_eq!(first.latitude, "40.7128");
        assert_eq!(first.display_name, "New York, USA");

        client.lookup("new york again").await.expect("lookup should succeed");
        assert!(
            started.elapsed() >= Duration::from_millis(120),
            "second call should wait out the spacing interval"
        );
    }

    /// Test that an empty provider response is a no-results failure
    #[tokio::test]
    async fn test_empty_response_is_no_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let mut client = GeocodeClient::for_endpoint(&format!("{}/search", server.uri()))
            .expect("client should build")
            .with_min_interval(Duration::from_millis(1));

        let err = client.lookup("nowhere at all").await.unwrap_err();
        assert!(matches!(err, GeocodeError::NoResults));
    }
}
