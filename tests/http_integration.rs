//! Integration tests for appliance operations using wiremock
//!
//! These tests run the real client and resource operations against mocked
//! appliances and check which mutating calls are (and are not) issued.

use isamcfg::appliance::{ApplianceClient, ApplianceError, Credentials};
use isamcfg::resource::operations;
use isamcfg::{CallOptions, Endpoint, PathParams};
use serde_json::{json, Value};
use wiremock::matchers::{
    basic_auth, body_json, body_partial_json, body_string_contains, header_regex, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ApplianceClient {
    ApplianceClient::with_base_url(&server.uri(), Credentials::new("admin@local", "admin"), true, None)
        .expect("client should build")
}

fn host_records() -> Endpoint<'static> {
    Endpoint::lookup("host-records", PathParams::new()).unwrap()
}

async fn mount_get(server: &MockServer, uri: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(uri))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_facts(server: &MockServer, version: &str, modules: &[&str]) {
    mount_get(
        server,
        "/firmware_settings",
        json!([{"partition": "1", "active": true, "firmware_version": version}]),
    )
    .await;
    let caps: Vec<Value> = modules.iter().map(|m| json!({"id": m, "enabled": true})).collect();
    mount_get(server, "/isam/capabilities/v1", Value::Array(caps)).await;
}

async fn expect_no_call(server: &MockServer, verb: &str, uri: &str) {
    Mock::given(method(verb))
        .and(path(uri))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
}

/// Generic set/update/delete against a collection resource
mod collection_tests {
    use super::*;

    /// Absent object is created with a POST
    #[tokio::test]
    async fn test_set_creates_missing_object() {
        let server = MockServer::start().await;
        mount_get(&server, "/isam/host_records", json!([])).await;

        let desired = json!({"addr": "10.0.0.8", "hostnames": ["ldap.internal"]});
        Mock::given(method("POST"))
            .and(path("/isam/host_records"))
            .and(basic_auth("admin@local", "admin"))
            .and(body_json(&desired))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let response = operations::set(&client_for(&server), &host_records(), &desired, CallOptions::default())
            .await
            .expect("set should succeed");

        assert!(response.changed);
        assert_eq!(response.rc, 0);
    }

    /// Equal object (up to list order) issues no mutating call
    #[tokio::test]
    async fn test_set_is_idempotent() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            "/isam/host_records",
            json!([{"addr": "10.0.0.8", "hostnames": ["b.internal", "a.internal"]}]),
        )
        .await;
        expect_no_call(&server, "POST", "/isam/host_records").await;
        expect_no_call(&server, "PUT", "/isam/host_records/10.0.0.8").await;

        let desired = json!({"addr": "10.0.0.8", "hostnames": ["a.internal", "b.internal"]});
        let response = operations::set(&client_for(&server), &host_records(), &desired, CallOptions::default())
            .await
            .expect("set should succeed");

        assert!(!response.changed);
        assert!(response.warnings.is_empty());
    }

    /// Differing object is updated with a PUT to its item URI
    #[tokio::test]
    async fn test_set_updates_changed_object() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            "/isam/host_records",
            json!([{"addr": "10.0.0.8", "hostnames": ["a.internal"]}]),
        )
        .await;
        expect_no_call(&server, "POST", "/isam/host_records").await;
        Mock::given(method("PUT"))
            .and(path("/isam/host_records/10.0.0.8"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let desired = json!({"addr": "10.0.0.8", "hostnames": ["a.internal", "b.internal"]});
        let response = operations::set(&client_for(&server), &host_records(), &desired, CallOptions::default())
            .await
            .expect("set should succeed");

        assert!(response.changed);
        assert_eq!(response.data, Value::Null);
    }

    /// Force skips the comparison
    #[tokio::test]
    async fn test_force_updates_equal_object() {
        let server = MockServer::start().await;
        mount_get(&server, "/isam/host_records", json!([{"addr": "10.0.0.8", "hostnames": ["a"]}])).await;
        Mock::given(method("PUT"))
            .and(path("/isam/host_records/10.0.0.8"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let desired = json!({"addr": "10.0.0.8", "hostnames": ["a"]});
        let response = operations::set(&client_for(&server), &host_records(), &desired, CallOptions::forced())
            .await
            .unwrap();
        assert!(response.changed);
    }

    /// Check mode reports a change but never calls the mutating endpoint
    #[tokio::test]
    async fn test_check_mode_does_not_mutate() {
        let server = MockServer::start().await;
        mount_get(&server, "/isam/host_records", json!([])).await;
        expect_no_call(&server, "POST", "/isam/host_records").await;

        let desired = json!({"addr": "10.0.0.9", "hostnames": ["x"]});
        let response = operations::set(&client_for(&server), &host_records(), &desired, CallOptions::check())
            .await
            .unwrap();
        assert!(response.changed);
    }

    /// Adding an existing object is skipped with a warning
    #[tokio::test]
    async fn test_add_existing_warns() {
        let server = MockServer::start().await;
        mount_get(&server, "/isam/host_records", json!([{"addr": "10.0.0.8", "hostnames": []}])).await;
        expect_no_call(&server, "POST", "/isam/host_records").await;

        let response = operations::add(
            &client_for(&server),
            &host_records(),
            &json!({"addr": "10.0.0.8", "hostnames": ["new"]}),
            CallOptions::default(),
        )
        .await
        .unwrap();

        assert!(!response.changed);
        assert_eq!(response.warnings.len(), 1);
        assert!(response.warnings[0].contains("already exists"));
    }

    /// Updating a missing object is skipped with a warning
    #[tokio::test]
    async fn test_update_missing_warns() {
        let server = MockServer::start().await;
        mount_get(&server, "/isam/host_records", json!([])).await;

        let response = operations::update(
            &client_for(&server),
            &host_records(),
            &json!({"addr": "10.0.0.8", "hostnames": ["new"]}),
            CallOptions::default(),
        )
        .await
        .unwrap();

        assert!(!response.changed);
        assert!(response.warnings[0].contains("does not exist"));
    }

    /// Deleting a missing object is a no-op with a warning
    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let server = MockServer::start().await;
        mount_get(&server, "/isam/host_records", json!([{"addr": "10.0.0.1", "hostnames": []}])).await;
        expect_no_call(&server, "DELETE", "/isam/host_records/10.0.0.8").await;

        let response = operations::delete(
            &client_for(&server),
            &host_records(),
            &json!({"addr": "10.0.0.8"}),
            CallOptions::default(),
        )
        .await
        .unwrap();

        assert!(!response.changed);
        assert_eq!(response.warnings.len(), 1);
    }

    /// Deleting an existing object uses its id in the item URI
    #[tokio::test]
    async fn test_delete_existing() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            "/iam/access/v8/policies",
            json!([{"id": 42, "name": "deny-all"}, {"id": 43, "name": "allow-all"}]),
        )
        .await;
        mount_facts(&server, "10.0.6.0", &["wga", "mga"]).await;
        Mock::given(method("DELETE"))
            .and(path("/iam/access/v8/policies/42"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = Endpoint::lookup("access-policies", PathParams::new()).unwrap();
        let response = operations::delete(
            &client_for(&server),
            &endpoint,
            &json!({"name": "deny-all"}),
            CallOptions::default(),
        )
        .await
        .unwrap();
        assert!(response.changed);
    }

    /// Search returns the id of the matching object
    #[tokio::test]
    async fn test_search_by_key() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            "/core/adv_params",
            json!({"tuningParameters": [
                {"uuid": "u-1", "key": "wga_rte.embedded.ldap.ssl.port", "value": "636"},
                {"uuid": "u-2", "key": "lmi.timeout", "value": "30"}
            ]}),
        )
        .await;

        let endpoint = Endpoint::lookup("advanced-tuning-parameters", PathParams::new()).unwrap();
        let key = json!({"key": "lmi.timeout"}).as_object().unwrap().clone();
        let id = operations::search(&client_for(&server), &endpoint, &key).await.unwrap();
        assert_eq!(id.as_deref(), Some("u-2"));

        let missing = json!({"key": "nope"}).as_object().unwrap().clone();
        assert!(operations::search(&client_for(&server), &endpoint, &missing).await.unwrap().is_none());
    }
}

/// Singleton resources and error handling
mod singleton_tests {
    use super::*;

    /// A changed singleton is PUT back with the desired fields
    #[tokio::test]
    async fn test_singleton_update() {
        let server = MockServer::start().await;
        mount_get(&server, "/net/dns", json!({"auto": false, "primaryServer": "10.0.0.1"})).await;

        let desired = json!({"primaryServer": "10.0.0.2"});
        Mock::given(method("PUT"))
            .and(path("/net/dns"))
            .and(body_json(&desired))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = Endpoint::lookup("dns", PathParams::new()).unwrap();
        let response = operations::set(&client_for(&server), &endpoint, &desired, CallOptions::default())
            .await
            .unwrap();
        assert!(response.changed);
    }

    /// Merge payload resources send the current document with changes laid over it
    #[tokio::test]
    async fn test_singleton_merge_payload() {
        let server = MockServer::start().await;
        mount_get(&server, "/core/admin_cfg", json!({"sessionTimeout": 30, "httpsPort": 443})).await;
        Mock::given(method("PUT"))
            .and(path("/core/admin_cfg"))
            .and(body_json(json!({"sessionTimeout": 60, "httpsPort": 443})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = Endpoint::lookup("admin-settings", PathParams::new()).unwrap();
        let response = operations::update(
            &client_for(&server),
            &endpoint,
            &json!({"sessionTimeout": 60}),
            CallOptions::default(),
        )
        .await
        .unwrap();
        assert!(response.changed);
    }

    /// Delete is rejected for singletons
    #[tokio::test]
    async fn test_singleton_delete_unsupported() {
        let server = MockServer::start().await;
        let endpoint = Endpoint::lookup("dns", PathParams::new()).unwrap();
        let err = operations::delete(&client_for(&server), &endpoint, &json!({}), CallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApplianceError>(),
            Some(ApplianceError::Unsupported { .. })
        ));
    }

    /// HTTP failures are typed errors unless ignored
    #[tokio::test]
    async fn test_ignore_error_sets_rc() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/net/dns"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
            .mount(&server)
            .await;

        let endpoint = Endpoint::lookup("dns", PathParams::new()).unwrap();
        let client = client_for(&server);

        let err = operations::get_all(&client, &endpoint, CallOptions::default())
            .await
            .unwrap_err();
        let typed = err.downcast_ref::<ApplianceError>().expect("typed error");
        assert_eq!(typed.status().map(|s| s.as_u16()), Some(500));

        let opts = CallOptions {
            ignore_error: true,
            ..CallOptions::default()
        };
        let response = operations::get_all(&client, &endpoint, opts).await.unwrap();
        assert_eq!(response.rc, 500);
        assert!(response.warnings[0].contains("boom"));
    }

    /// 401 carries the status for callers to report
    #[tokio::test]
    async fn test_401_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/net/dns"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .invoke_get("Retrieving DNS", "/net/dns", false)
            .await
            .unwrap_err();
        assert!(isamcfg::appliance::format_appliance_error(&err).starts_with("Authentication failed"));
    }
}

/// Version and module gating
mod gating_tests {
    use super::*;

    /// Calls needing newer firmware are skipped with a warning
    #[tokio::test]
    async fn test_min_version_skips_call() {
        let server = MockServer::start().await;
        mount_facts(&server, "10.0.2.0", &["wga"]).await;
        expect_no_call(&server, "GET", "/isam/container_ext/container").await;

        let endpoint = Endpoint::lookup("containers", PathParams::new()).unwrap();
        let response = operations::get_all(&client_for(&server), &endpoint, CallOptions::default())
            .await
            .unwrap();

        assert!(!response.changed);
        assert!(response.warnings[0].contains("requires minimum version: 10.0.4.0"));
    }

    /// Calls needing an inactive module are skipped with a warning
    #[tokio::test]
    async fn test_missing_module_skips_call() {
        let server = MockServer::start().await;
        mount_facts(&server, "10.0.6.0", &["federation"]).await;
        expect_no_call(&server, "GET", "/wga/reverseproxy").await;

        let endpoint = Endpoint::lookup("reverseproxy-instances", PathParams::new()).unwrap();
        let response = operations::get_all(&client_for(&server), &endpoint, CallOptions::default())
            .await
            .unwrap();
        assert!(response.warnings[0].contains("requires module: wga"));
    }

    /// A failed facts read is reported and retried, never cached
    #[tokio::test]
    async fn test_failed_facts_read_is_retried() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            "/firmware_settings",
            json!([{"active": true, "firmware_version": "10.0.6.0"}]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/isam/capabilities/v1"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        mount_get(&server, "/isam/capabilities/v1", json!([{"id": "wga", "enabled": true}])).await;
        mount_get(&server, "/wga/reverseproxy", json!([{"id": "default"}])).await;

        let client = client_for(&server);
        let endpoint = Endpoint::lookup("reverseproxy-instances", PathParams::new()).unwrap();

        let err = operations::get_all(&client, &endpoint, CallOptions::default())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Unable to read activated modules"));

        let response = operations::get_all(&client, &endpoint, CallOptions::default())
            .await
            .unwrap();
        assert!(response.warnings.is_empty());
        assert_eq!(response.data, json!([{"id": "default"}]));
    }

    /// Facts are read once and cached
    #[tokio::test]
    async fn test_facts_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/firmware_settings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"active": true, "firmware_version": "10.0.6.0"}
            ])))
            .expect(1)
            .mount(&server)
            .await;
        mount_get(&server, "/isam/capabilities/v1", json!([{"id": "wga", "enabled": "true"}])).await;

        let client = client_for(&server);
        let first = client.facts().await.unwrap();
        let second = client.facts().await.unwrap();
        assert_eq!(first.version.map(|v| v.to_string()), Some("10.0.6.0".to_string()));
        assert_eq!(second.activated_modules, vec!["wga"]);
    }
}

/// Drift detection across two appliances
mod compare_tests {
    use super::*;

    #[tokio::test]
    async fn test_compare_without_verdict_when_one_side_gated() {
        let left = MockServer::start().await;
        let right = MockServer::start().await;
        mount_facts(&left, "10.0.6.0", &["wga"]).await;
        mount_facts(&right, "10.0.6.0", &["federation"]).await;
        mount_get(&left, "/wga/reverseproxy", json!([{"id": "default"}])).await;
        expect_no_call(&right, "GET", "/wga/reverseproxy").await;

        let endpoint = Endpoint::lookup("reverseproxy-instances", PathParams::new()).unwrap();
        let response = operations::compare(&client_for(&left), &client_for(&right), &endpoint)
            .await
            .unwrap();

        assert!(response.data.get("matches").is_none());
        assert!(response.data.get("differences").is_none());
        assert_eq!(response.warnings.len(), 1);
        assert!(response.warnings[0].contains("requires module: wga"));
    }

    #[tokio::test]
    async fn test_compare_reports_extra_collection_item_once() {
        let left = MockServer::start().await;
        let right = MockServer::start().await;
        mount_get(
            &left,
            "/isam/host_records",
            json!([
                {"addr": "10.0.0.1", "hostnames": ["a"]},
                {"addr": "10.0.0.3", "hostnames": ["c"]},
                {"addr": "10.0.0.4", "hostnames": ["d"]}
            ]),
        )
        .await;
        mount_get(
            &right,
            "/isam/host_records",
            json!([
                {"addr": "10.0.0.1", "hostnames": ["a"]},
                {"addr": "10.0.0.2", "hostnames": ["b"]},
                {"addr": "10.0.0.3", "hostnames": ["c"]},
                {"addr": "10.0.0.4", "hostnames": ["d", "e"]}
            ]),
        )
        .await;

        let response = operations::compare(&client_for(&left), &client_for(&right), &host_records())
            .await
            .unwrap();

        assert_eq!(response.data["matches"], false);
        assert_eq!(
            response.data["summary"],
            "modified=0 only_left=0 only_right=2 structural=0"
        );
        let differences = response.data["differences"].as_array().unwrap();
        assert_eq!(differences[0]["path"], "$[2].hostnames[1]");
        assert_eq!(differences[1]["path"], "$[1]");
    }

    #[tokio::test]
    async fn test_compare_ignores_order_and_volatile_fields() {
        let left = MockServer::start().await;
        let right = MockServer::start().await;
        mount_get(
            &left,
            "/net/routes",
            json!([{"uuid": "a1", "address": "10.0.0.0", "maskOrPrefix": "8", "gateway": "10.0.0.1"}]),
        )
        .await;
        mount_get(
            &right,
            "/net/routes",
            json!([{"gateway": "10.0.0.1", "maskOrPrefix": "8", "address": "10.0.0.0", "uuid": "b7"}]),
        )
        .await;

        let endpoint = Endpoint::lookup("static-routes", PathParams::new()).unwrap();
        let response = operations::compare(&client_for(&left), &client_for(&right), &endpoint)
            .await
            .unwrap();

        assert_eq!(response.data["matches"], true);
        assert_eq!(response.data["differences"], json!([]));
        assert!(!response.changed);
    }

    #[tokio::test]
    async fn test_compare_reports_differences() {
        let left = MockServer::start().await;
        let right = MockServer::start().await;
        mount_get(&left, "/net/dns", json!({"primaryServer": "10.0.0.1", "auto": false})).await;
        mount_get(&right, "/net/dns", json!({"primaryServer": "10.0.0.2", "auto": false})).await;

        let endpoint = Endpoint::lookup("dns", PathParams::new()).unwrap();
        let response = operations::compare(&client_for(&left), &client_for(&right), &endpoint)
            .await
            .unwrap();

        assert_eq!(response.data["matches"], false);
        let differences = response.data["differences"].as_array().unwrap();
        assert_eq!(differences.len(), 1);
        assert_eq!(differences[0]["path"], "$.primaryServer");
        assert_eq!(differences[0]["type"], "Modified");
    }
}

/// Junctions, snapshots, pending changes and state documents
mod module_tests {
    use super::*;
    use isamcfg::modules::certificates::{self, CertKind};
    use isamcfg::modules::{junctions, pending_changes, snapshots};
    use isamcfg::state::{self, StateDocument};

    const JUNCTIONS: &str = "/wga/reverseproxy/default/junctions";

    #[tokio::test]
    async fn test_junction_created_without_force() {
        let server = MockServer::start().await;
        mount_facts(&server, "10.0.6.0", &["wga"]).await;
        mount_get(&server, JUNCTIONS, json!([{"id": "/other", "type": "TCP"}])).await;
        Mock::given(method("POST"))
            .and(path(JUNCTIONS))
            .and(body_partial_json(json!({
                "junction_point": "/app",
                "server_port": 8080,
                "force": "no"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Created junction"})))
            .expect(1)
            .mount(&server)
            .await;

        let junction = junctions::Junction::new("/app", "tcp", "backend.internal", 8080);
        let response = junctions::set(&client_for(&server), "default", &junction, CallOptions::default())
            .await
            .unwrap();
        assert!(response.changed);
    }

    #[tokio::test]
    async fn test_junction_unchanged_when_equal() {
        let server = MockServer::start().await;
        mount_facts(&server, "10.0.6.0", &["wga"]).await;
        mount_get(&server, JUNCTIONS, json!([{"id": "/app", "type": "TCP"}])).await;
        Mock::given(method("GET"))
            .and(path(JUNCTIONS))
            .and(query_param("junctions_id", "/app"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "/app",
                "type": "TCP",
                "stateful_junction": "no",
                "servers": [{
                    "server_hostname": "backend.internal",
                    "server_port": "8080",
                    "server_uuid": "9a3c"
                }]
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        expect_no_call(&server, "POST", JUNCTIONS).await;

        let mut junction = junctions::Junction::new("/app", "tcp", "backend.internal", 8080);
        junction.stateful_junction = Some(false);
        let response = junctions::set(&client_for(&server), "default", &junction, CallOptions::default())
            .await
            .unwrap();
        assert!(!response.changed);
    }

    #[tokio::test]
    async fn test_junction_replaced_with_force_when_changed() {
        let server = MockServer::start().await;
        mount_facts(&server, "10.0.6.0", &["wga"]).await;
        mount_get(&server, JUNCTIONS, json!([{"id": "/app", "type": "TCP"}])).await;
        Mock::given(method("GET"))
            .and(path(JUNCTIONS))
            .and(query_param("junctions_id", "/app"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "/app",
                "type": "TCP",
                "servers": [{"server_hostname": "old.internal", "server_port": "8080"}]
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(JUNCTIONS))
            .and(body_partial_json(json!({"server_hostname": "new.internal", "force": "yes"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let junction = junctions::Junction::new("/app", "tcp", "new.internal", 8080);
        let response = junctions::set(&client_for(&server), "default", &junction, CallOptions::default())
            .await
            .unwrap();
        assert!(response.changed);
    }

    #[tokio::test]
    async fn test_deploy_only_when_pending() {
        let server = MockServer::start().await;
        mount_get(&server, "/isam/pending_changes", json!({"changes": []})).await;
        expect_no_call(&server, "GET", "/isam/pending_changes/deploy").await;

        let response = pending_changes::deploy(&client_for(&server), CallOptions::default())
            .await
            .unwrap();
        assert!(!response.changed);
    }

    #[tokio::test]
    async fn test_deploy_pending_changes() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            "/isam/pending_changes",
            json!({"changes": [{"id": 1, "policy": "Reverse Proxy", "operation": "modify"}]}),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/isam/pending_changes/deploy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 0, "status": 0})))
            .expect(1)
            .mount(&server)
            .await;

        let response = pending_changes::deploy(&client_for(&server), CallOptions::default())
            .await
            .unwrap();
        assert!(response.changed);
    }

    #[tokio::test]
    async fn test_snapshot_upload_and_download() {
        let server = MockServer::start().await;
        mount_get(&server, "/snapshots", json!([{"id": "7", "comment": "baseline"}])).await;
        Mock::given(method("POST"))
            .and(path("/snapshots"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/snapshots/download"))
            .and(query_param("record_ids", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"SNAPSHOT-BYTES".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("upload.snapshot");
        std::fs::write(&file, b"data").unwrap();

        let client = client_for(&server);

        // Same comment already present: nothing uploaded
        let skipped = snapshots::upload(&client, &file, Some("baseline"), CallOptions::default())
            .await
            .unwrap();
        assert!(!skipped.changed);

        let uploaded = snapshots::upload(&client, &file, Some("after-change"), CallOptions::default())
            .await
            .unwrap();
        assert!(uploaded.changed);

        let target = dir.path().join("out").join("download.snapshot");
        let downloaded = snapshots::download(&client, &["7".to_string()], &target).await.unwrap();
        assert_eq!(downloaded.data["bytes"], 14);
        assert_eq!(std::fs::read(&target).unwrap(), b"SNAPSHOT-BYTES");
    }

    #[tokio::test]
    async fn test_state_document_apply() {
        let server = MockServer::start().await;
        mount_get(&server, "/net/dns", json!({"primaryServer": "10.0.0.2"})).await;
        mount_get(&server, "/isam/host_records", json!([{"addr": "10.0.0.99", "hostnames": ["old"]}])).await;
        mount_get(&server, "/isam/pending_changes", json!([{"id": 1}])).await;
        expect_no_call(&server, "PUT", "/net/dns").await;
        Mock::given(method("DELETE"))
            .and(path("/isam/host_records/10.0.0.99"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/isam/pending_changes/deploy"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let document = StateDocument::parse(
            r#"
deploy: true
resources:
  - resource: dns
    data: { primaryServer: 10.0.0.2 }
  - resource: host-records
    state: absent
    data: { addr: 10.0.0.99 }
"#,
        )
        .unwrap();

        let report = tokio_test::assert_ok!(state::apply(&client_for(&server), &document, CallOptions::default()).await);
        assert!(report.changed);
        assert!(!report.entries[0].response.changed);
        assert!(report.entries[1].response.changed);
        assert!(report.deploy.map(|d| d.changed).unwrap_or(false));
    }

    const SIGNERS: &str = "/isam/ssl_certificates/pdsrv/signer_cert";

    #[tokio::test]
    async fn test_certificate_import_new_label() {
        let server = MockServer::start().await;
        mount_get(&server, SIGNERS, json!([{"id": "other-ca", "label": "other-ca"}])).await;
        Mock::given(method("POST"))
            .and(path(SIGNERS))
            .and(header_regex("content-type", "^multipart/form-data"))
            .and(body_string_contains("name=\"operation\""))
            .and(body_string_contains("import"))
            .and(body_string_contains("name=\"label\""))
            .and(body_string_contains("ldap-ca"))
            .and(body_string_contains("-----BEGIN CERTIFICATE-----"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("ldap-ca.pem");
        std::fs::write(&cert, "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n").unwrap();

        let response = certificates::import(
            &client_for(&server),
            CertKind::Signer,
            "pdsrv",
            "ldap-ca",
            &cert,
            None,
            CallOptions::default(),
        )
        .await
        .unwrap();
        assert!(response.changed);
    }

    #[tokio::test]
    async fn test_certificate_import_existing_label_skipped() {
        let server = MockServer::start().await;
        mount_get(&server, SIGNERS, json!([{"id": "ldap-ca", "label": "ldap-ca"}])).await;
        expect_no_call(&server, "POST", SIGNERS).await;

        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("ldap-ca.pem");
        std::fs::write(&cert, "pem").unwrap();

        let response = certificates::import(
            &client_for(&server),
            CertKind::Signer,
            "pdsrv",
            "ldap-ca",
            &cert,
            None,
            CallOptions::default(),
        )
        .await
        .unwrap();
        assert!(!response.changed);
        assert_eq!(response.warnings.len(), 1);
        assert!(response.warnings[0].contains("already exists"));
    }

    #[tokio::test]
    async fn test_certificate_export_writes_file() {
        let server = MockServer::start().await;
        mount_get(&server, SIGNERS, json!([{"id": "ldap-ca", "label": "ldap-ca"}])).await;
        Mock::given(method("GET"))
            .and(path("/isam/ssl_certificates/pdsrv/signer_cert/ldap-ca"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PEM-DATA".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("ldap-ca.pem");
        let response = certificates::export(&client_for(&server), CertKind::Signer, "pdsrv", "ldap-ca", &target)
            .await
            .unwrap();

        assert_eq!(response.data["bytes"], 8);
        assert_eq!(std::fs::read(&target).unwrap(), b"PEM-DATA");
    }

    #[tokio::test]
    async fn test_certificate_delete_by_label() {
        let server = MockServer::start().await;
        mount_get(&server, SIGNERS, json!([{"id": "ldap-ca", "label": "ldap-ca"}])).await;
        Mock::given(method("DELETE"))
            .and(path("/isam/ssl_certificates/pdsrv/signer_cert/ldap-ca"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let response = certificates::delete(&client, CertKind::Signer, "pdsrv", "ldap-ca", CallOptions::default())
            .await
            .unwrap();
        assert!(response.changed);

        let missing = certificates::delete(&client, CertKind::Signer, "pdsrv", "gone", CallOptions::default())
            .await
            .unwrap();
        assert!(!missing.changed);
        assert_eq!(missing.warnings.len(), 1);
    }
}
