#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

const TOPOLOGY: &str = r#"
[[service]]
name = "S1"
[[service.client]]
name = "c"
nodes = ["A", "B", "D"]

[[service]]
name = "S2"
[[service.client]]
name = "c"
nodes = ["C"]

[[edge]]
from = "S1.c.A"
to = "S1.c.B"
payload = { w = 5 }

[[edge]]
from = "S1.c.A"
to = "S2.c.C"
payload = { w = 9 }

[[edge]]
from = "S1.c.A"
to = "S1.c.D"
payload = { w = 1 }

[[edge]]
from = "S2.c.C"
to = "S2.c.gone"
"#;

const HEAVY: &str = r#"{
    "edge": {
        "capture": {"var": "w", "path": ["w"]},
        "guard": {"greater_than": [
            {"property": {"entity": {"var": "w"}}},
            {"property": {"entity": {"var": "$0"}}}
        ]}
    }
}"#;

struct Workspace {
    _dir: TempDir,
    config: PathBuf,
    topology: PathBuf,
    pattern: PathBuf,
}

fn workspace() -> Workspace {
    let dir = TempDir::new().expect("tempdir");
    let write = |name: &str, contents: &str| -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).expect("write fixture");
        path
    };
    let config = write("config.toml", "log_level = \"off\"\n");
    let topology = write("topology.toml", TOPOLOGY);
    let pattern = write("heavy.json", HEAVY);
    Workspace {
        _dir: dir,
        config,
        topology,
        pattern,
    }
}

fn skein(config: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("skein");
    cmd.env_remove("SKEIN_LOG").arg("--config").arg(config);
    cmd
}

#[test]
fn check_reports_counts_as_json() {
    let ws = workspace();
    let output = skein(&ws.config)
        .args(["--format", "json", "check"])
        .arg(&ws.topology)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let summary: Value = serde_json::from_slice(&output).expect("json summary");
    assert_eq!(summary["services"], 2);
    assert_eq!(summary["nodes"], 4);
    assert_eq!(summary["edges"], 4);
    assert_eq!(summary["dangling_edges"], 1);
}

#[test]
fn query_prints_sorted_bindings() {
    let ws = workspace();
    let output = skein(&ws.config)
        .arg("query")
        .arg(&ws.topology)
        .arg("--pattern")
        .arg(&ws.pattern)
        .args(["--from", "S1.c.A", "--as", "S1.c", "--param", "4"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8 output");
    assert_eq!(text, "1 x {w=5}\n1 x {w=9}\n");
}

#[test]
fn query_json_rows_carry_counts() {
    let ws = workspace();
    let output = skein(&ws.config)
        .args(["--format", "json", "query"])
        .arg(&ws.topology)
        .arg("--pattern")
        .arg(&ws.pattern)
        .args(["--from", "S1.c.A", "--as", "S1.c", "--param", "8"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let rows: Value = serde_json::from_slice(&output).expect("json rows");
    assert_eq!(rows, serde_json::json!([{ "count": 1, "bindings": { "w": 9 } }]));
}

#[test]
fn query_from_a_missing_node_fails() {
    let ws = workspace();
    let assert = skein(&ws.config)
        .arg("query")
        .arg(&ws.topology)
        .arg("--pattern")
        .arg(&ws.pattern)
        .args(["--from", "S1.c.nope", "--as", "S1.c", "--param", "4"])
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
    assert!(stderr.contains("not found"), "stderr: {stderr}");
}
