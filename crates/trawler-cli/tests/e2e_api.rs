//! E2E tests for the read and single-item commands against a stub API.

use assert_cmd::Command;
use httpmock::prelude::*;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

fn trawler_cmd(config_dir: &TempDir, base_url: &str) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("trawler"));
    cmd.env_remove("FORMAT");
    cmd.env("DIGITALOCEAN_TOKEN", "test-token");
    cmd.env("TRAWLER_CONFIG", config_dir.path().join("config.toml"));
    cmd.env("TRAWLER_API_URL", base_url);
    cmd.env("TRAWLER_LOG", "error");
    cmd
}

fn snapshot(id: &str, resource_id: &str, created_at: &str) -> Value {
    json!({
        "id": id,
        "name": format!("snap-{id}"),
        "created_at": created_at,
        "resource_id": resource_id,
        "resource_type": "droplet",
        "min_disk_size": 25,
        "size_gigabytes": 1.5
    })
}

#[test]
fn list_snapshots_follows_pagination() {
    let server = MockServer::start();
    let base = server.base_url();
    let page1 = server.mock(|when, then| {
        when.method(GET).path("/v2/snapshots").query_param("page", "1");
        then.status(200).json_body(json!({
            "snapshots": [snapshot("b", "100", "2023-02-01T00:00:00Z")],
            "links": { "pages": { "next": format!("{base}/v2/snapshots?page=2") } }
        }));
    });
    let page2 = server.mock(|when, then| {
        when.method(GET).path("/v2/snapshots").query_param("page", "2");
        then.status(200).json_body(json!({
            "snapshots": [
                snapshot("a", "100", "2023-01-01T00:00:00Z"),
                snapshot("c", "200", "2023-03-01T00:00:00Z")
            ],
            "links": {}
        }));
    });
    let dir = TempDir::new().expect("tempdir");

    let output = trawler_cmd(&dir, &base)
        .args(["list-snapshots", "100", "--json"])
        .output()
        .expect("list should not crash");
    assert!(
        output.status.success(),
        "list failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let rows: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let ids: Vec<&str> = rows
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|row| row["id"].as_str())
        .collect();
    assert_eq!(ids, ["a", "b"]);

    page1.assert_hits(1);
    page2.assert_hits(1);
}

#[test]
fn list_resources_shows_droplets_then_volumes() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v2/droplets");
        then.status(200).json_body(json!({
            "droplets": [{
                "id": 3164444,
                "name": "web-01",
                "region": { "slug": "nyc3", "name": "New York 3" },
                "size": { "disk": 25 }
            }],
            "links": {}
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/v2/volumes");
        then.status(200).json_body(json!({
            "volumes": [{
                "id": "vol-1",
                "name": "data",
                "region": { "slug": "fra1", "name": "Frankfurt 1" },
                "size_gigabytes": 100
            }],
            "links": {}
        }));
    });
    let dir = TempDir::new().expect("tempdir");

    trawler_cmd(&dir, &server.base_url())
        .args(["list-resources", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "droplet\t3164444\tweb-01\tNew York 3 (nyc3)\t25",
        ))
        .stdout(predicate::str::contains(
            "volume\tvol-1\tdata\tFrankfurt 1 (fra1)\t100",
        ));
}

#[test]
fn delete_of_unknown_snapshot_fails() {
    let server = MockServer::start();
    let delete = server.mock(|when, then| {
        when.method(DELETE).path("/v2/snapshots/nope");
        then.status(404).json_body(json!({
            "id": "not_found",
            "message": "The resource you were accessing could not be found."
        }));
    });
    let dir = TempDir::new().expect("tempdir");

    trawler_cmd(&dir, &server.base_url())
        .args(["delete-snapshot", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E3001"))
        .stderr(predicate::str::contains("snapshot 'nope' not found"));

    delete.assert_hits(1);
}

#[test]
fn dry_delete_sends_nothing() {
    let server = MockServer::start();
    let delete = server.mock(|when, then| {
        when.method(DELETE).path("/v2/snapshots/7938206");
        then.status(204);
    });
    let dir = TempDir::new().expect("tempdir");

    trawler_cmd(&dir, &server.base_url())
        .args(["--dry", "--format", "text", "delete-snapshot", "7938206"])
        .assert()
        .success()
        .stdout("dry mode in effect: simulate delete 7938206\n");

    delete.assert_hits(0);
}

#[test]
fn snapshot_volume_uses_volume_name() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v2/volumes/vol-1");
        then.status(200).json_body(json!({
            "volume": {
                "id": "vol-1",
                "name": "data",
                "region": { "slug": "fra1", "name": "Frankfurt 1" },
                "size_gigabytes": 100
            }
        }));
    });
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/v2/volumes/vol-1/snapshots")
            .body_contains("\"name\":\"data-");
        then.status(201).json_body(json!({
            "snapshot": {
                "id": "8fa70202",
                "name": "data-1672531200",
                "created_at": "2023-01-01T00:00:00Z",
                "resource_id": "vol-1",
                "resource_type": "volume",
                "min_disk_size": 100,
                "size_gigabytes": 0
            }
        }));
    });
    let dir = TempDir::new().expect("tempdir");

    let output = trawler_cmd(&dir, &server.base_url())
        .args(["snapshot-volume", "vol-1", "--json"])
        .output()
        .expect("snapshot should not crash");
    assert!(
        output.status.success(),
        "snapshot failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let result: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(result["snapshot_id"], "8fa70202");
    assert!(
        result["name"]
            .as_str()
            .is_some_and(|name| name.starts_with("data-"))
    );
    create.assert_hits(1);
}

#[test]
fn unauthorized_token_maps_to_error_code() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v2/snapshots");
        then.status(401).json_body(json!({
            "id": "Unauthorized",
            "message": "Unable to authenticate you"
        }));
    });
    let dir = TempDir::new().expect("tempdir");

    trawler_cmd(&dir, &server.base_url())
        .args(["list-snapshots", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error_code\": \"E3002\""))
        .stderr(predicate::str::contains("Unable to authenticate you"));
}

#[test]
fn completions_need_no_token() {
    let dir = TempDir::new().expect("tempdir");
    trawler_cmd(&dir, "http://127.0.0.1:9")
        .env_remove("DIGITALOCEAN_TOKEN")
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("trawler"));
}
