//! End-to-end CLI tests using `assert_cmd`.
//!
//! These tests invoke the actual compiled binary against graph files in a
//! temporary directory. They never touch the network or the user's config.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

const GRAPH: &str = r#"{
  "nodes": [
    {"type": "CompanyEntity", "id": 1, "name": "Acme Gaming"},
    {"type": "CompanyNews", "id": 10, "title": "Acme expands to NJ"},
    {"type": "Keyword", "id": "k1", "text": "sportsbook"},
    {"type": "Policy", "id": "p1", "title": "Gaming act", "topic_scope": "sports_betting"},
    {"type": "State", "id": "NJ", "name": "New Jersey"},
    {"type": "Keyword", "id": "orphan", "text": "lottery"},
    {"type": "Entity", "id": "e1", "canonical_name": "Lottery board"}
  ],
  "edges": [
    {"from": {"type": "CompanyEntity", "id": 1}, "to": {"type": "CompanyNews", "id": 10}, "type": "reported_in"},
    {"from": {"type": "CompanyNews", "id": 10}, "to": {"type": "Keyword", "id": "k1"}, "type": "mentions"},
    {"from": {"type": "Keyword", "id": "k1"}, "to": {"type": "Policy", "id": "p1"}, "type": "mentions"},
    {"from": {"type": "Policy", "id": "p1"}, "to": {"type": "State", "id": "NJ"}, "type": "applies_to", "predicate": "enacted in"},
    {"from": {"type": "Keyword", "id": "orphan"}, "to": {"type": "Entity", "id": "e1"}, "type": "related"},
    {"from": {"type": "Keyword", "id": "k1"}, "to": {"type": "Game", "id": "missing"}, "type": "dangling"}
  ]
}"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("graph.json"), GRAPH).unwrap();
        Self { dir }
    }

    fn graph(&self) -> String {
        self.path("graph.json").display().to_string()
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Command isolated from the user's config file and environment.
    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("kgscope").unwrap();
        cmd.arg("--config")
            .arg(self.path("config.toml"))
            .env_remove("KGSCOPE_SOURCE_URL")
            .env_remove("KGSCOPE_TASK_ENDPOINT")
            .env_remove("RUST_LOG");
        cmd
    }
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

// ─── Help / version ─────────────────────────────────────────────────────

#[test]
fn test_help_shows_commands() {
    Command::cargo_bin("kgscope")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("stats"))
        .stdout(predicate::str::contains("layout"))
        .stdout(predicate::str::contains("render"))
        .stdout(predicate::str::contains("select"));
}

#[test]
fn test_version_shows_name() {
    Command::cargo_bin("kgscope")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("kgscope"));
}

#[test]
fn test_render_help() {
    Command::cargo_bin("kgscope")
        .unwrap()
        .args(["render", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--click"))
        .stdout(predicate::str::contains("--pin"))
        .stdout(predicate::str::contains("--format"))
        .stdout(predicate::str::contains("--yaw"));
}

// ─── Argument validation ────────────────────────────────────────────────

#[test]
fn test_rejects_unknown_kind() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["stats", "--input", &fx.graph(), "--kind", "weather"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_requires_a_source() {
    let fx = Fixture::new();
    fx.cmd()
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No graph source"));
}

#[test]
fn test_input_and_url_conflict() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["stats", "--input", &fx.graph(), "--url", "http://localhost:1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_select_requires_click() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["select", "--input", &fx.graph()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--click"));
}

#[test]
fn test_select_rejects_malformed_click() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["select", "--input", &fx.graph(), "--click", "Policy:p1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_render_rejects_invalid_format() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["render", "--input", &fx.graph(), "--format", "png", "-o", "out.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_missing_input_file_reports_error() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["stats", "--input", &fx.path("nope.json").display().to_string()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load graph"));
}

// ─── Init ───────────────────────────────────────────────────────────────

#[test]
fn test_init_writes_config_once() {
    let fx = Fixture::new();
    fx.cmd().arg("init").assert().success();

    let content = fs::read_to_string(fx.path("config.toml")).unwrap();
    assert!(content.contains("[tasks]"));
    assert!(content.contains("${KGSCOPE_TASK_API_KEY}"));

    fx.cmd()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    fx.cmd().args(["init", "--force"]).assert().success();
}

// ─── Stats ──────────────────────────────────────────────────────────────

#[test]
fn test_stats_company_view_is_anchor_pruned() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["stats", "--input", &fx.graph(), "--kind", "company"])
        .assert()
        .success()
        .stdout(predicate::str::contains("5 connected"))
        .stdout(predicate::str::contains("reachable from anchors"))
        .stdout(predicate::str::contains("CompanyNews"))
        .stdout(predicate::str::contains("Lottery board").not());
}

#[test]
fn test_stats_policy_view_has_no_anchor() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["stats", "--input", &fx.graph(), "--kind", "policy", "--limit", "many"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no anchor pruning"))
        .stdout(predicate::str::contains("Lottery board"));
}

#[test]
fn test_stats_mask_recovery() {
    let fx = Fixture::new();
    fx.cmd()
        .args([
            "stats",
            "--input",
            &fx.graph(),
            "--kind",
            "company",
            "--hide",
            "CompanyEntity,CompanyNews,Keyword,Policy,State",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("showing all types"));
}

#[test]
fn test_stats_reports_dangling_edges() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["stats", "--input", &fx.graph(), "--kind", "company"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 edges dropped (endpoint not in graph)"));
}

// ─── Layout / render ────────────────────────────────────────────────────

#[test]
fn test_layout_writes_positions() {
    let fx = Fixture::new();
    let out = fx.path("positions.json");
    fx.cmd()
        .args(["layout", "--input", &fx.graph(), "--kind", "company", "--frames", "50", "-o"])
        .arg(&out)
        .assert()
        .success();

    let positions = read_json(&out);
    let positions = positions.as_array().unwrap();
    assert_eq!(positions.len(), 5);
    assert!(positions.iter().all(|p| p["x"].is_number() && p["y"].is_number()));
}

#[test]
fn test_layout_3d_with_rotation() {
    let fx = Fixture::new();
    let out = fx.path("positions3d.json");
    fx.cmd()
        .args([
            "layout", "--input", &fx.graph(), "--kind", "company", "--mode", "3d", "--frames", "30",
            "--pitch", "20", "--yaw", "-45", "--drag", "10,-5", "-o",
        ])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("3d layout"));

    let positions = read_json(&out);
    let xs: Vec<f64> = positions
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["x"].as_f64().unwrap())
        .collect();
    let mean = xs.iter().sum::<f64>() / xs.len() as f64;
    assert!(mean.abs() < 0.1);
}

#[test]
fn test_layout_accepts_raw_drag_quaternion() {
    let fx = Fixture::new();
    let out = fx.path("positions_quat.json");
    fx.cmd()
        .args([
            "layout", "--input", &fx.graph(), "--kind", "company", "--mode", "3d", "--frames", "10",
            "--drag-quat", "0,0.38,0,0.92", "-o",
        ])
        .arg(&out)
        .assert()
        .success();

    let positions = read_json(&out);
    assert_eq!(positions.as_array().unwrap().len(), 5);
}

#[test]
fn test_layout_rejects_short_drag_quaternion() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["layout", "--input", &fx.graph(), "--drag-quat", "0,1", "-o"])
        .arg(fx.path("never.json"))
        .assert()
        .failure();
}

#[test]
fn test_render_svg() {
    let fx = Fixture::new();
    let out = fx.path("frame.svg");
    fx.cmd()
        .args([
            "render", "--input", &fx.graph(), "--kind", "company", "--frames", "20", "--format", "svg", "-o",
        ])
        .arg(&out)
        .assert()
        .success();

    let svg = fs::read_to_string(&out).unwrap();
    assert!(svg.starts_with("<svg"));
    assert_eq!(svg.matches("<circle").count(), 5);
    assert_eq!(svg.matches("<line").count(), 4);
}

#[test]
fn test_render_csv_writes_both_tables() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["render", "--input", &fx.graph(), "--frames", "5", "--format", "csv", "-o"])
        .arg(fx.path("frame.csv"))
        .assert()
        .success();

    assert!(fx.path("frame.nodes.csv").exists());
    assert!(fx.path("frame.edges.csv").exists());
}

#[test]
fn test_render_json_with_pinned_selection() {
    let fx = Fixture::new();
    let out = fx.path("frame.json");
    fx.cmd()
        .args([
            "render",
            "--input",
            &fx.graph(),
            "--kind",
            "company",
            "--frames",
            "5",
            "--click",
            "State:NJ@0",
            "--pin",
            "--palette",
            "okabe-ito",
            "-o",
        ])
        .arg(&out)
        .assert()
        .success();

    let frame = read_json(&out);
    assert_eq!(frame["pinned"], true);
    let nodes = frame["nodes"].as_array().unwrap();
    let selected: Vec<&serde_json::Value> = nodes.iter().filter(|n| n["selected"] == true).collect();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0]["id"], "NJ");

    // Far from the selection: dimmed
    let acme = nodes.iter().find(|n| n["type"] == "CompanyEntity").unwrap();
    assert!(acme["opacity"].as_f64().unwrap() < selected[0]["opacity"].as_f64().unwrap());
}

#[test]
fn test_render_pinned_hover_lights_selected_neighbors() {
    let fx = Fixture::new();
    let out = fx.path("hover.json");
    fx.cmd()
        .args([
            "render",
            "--input",
            &fx.graph(),
            "--kind",
            "company",
            "--frames",
            "5",
            "--click",
            "State:NJ@0",
            "--click",
            "Policy:p1@400",
            "--pin",
            "--hover",
            "Policy:p1",
            "-o",
        ])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 selected, pinned"));

    let frame = read_json(&out);
    let nodes = frame["nodes"].as_array().unwrap();
    let node = |ty: &str| nodes.iter().find(|n| n["type"] == ty).unwrap();
    let opacity = |ty: &str| node(ty)["opacity"].as_f64().unwrap();
    assert_eq!(node("Policy")["hovered"], true);

    // Hovered selected node lights its neighbor; the rest stays dimmed
    assert_eq!(opacity("Keyword"), opacity("Policy"));
    assert_eq!(opacity("State"), opacity("Policy"));
    assert!(opacity("CompanyNews") < opacity("Policy"));
    assert!(opacity("CompanyEntity") < opacity("Policy"));

    let edges = frame["edges"].as_array().unwrap();
    let edge = |rel: &str| {
        edges
            .iter()
            .filter(|e| e["relation"] == rel)
            .map(|e| e["opacity"].as_f64().unwrap())
            .fold(f64::MIN, f64::max)
    };
    assert!(edge("applies_to") > edge("reported_in"));
    assert!(edge("mentions") > edge("reported_in"));
}

#[test]
fn test_render_hover_on_unknown_node_warns() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["render", "--input", &fx.graph(), "--kind", "company", "--frames", "2", "--hover", "Game:missing", "-o"])
        .arg(fx.path("frame.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("--hover ignored"));
}

// ─── Select ─────────────────────────────────────────────────────────────

#[test]
fn test_select_double_click_prints_neighbors_payload() {
    let fx = Fixture::new();
    fx.cmd()
        .args([
            "select",
            "--input",
            &fx.graph(),
            "--kind",
            "company",
            "--click",
            "CompanyNews:10@0",
            "--click",
            "CompanyNews:10@150",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Selected 2 nodes"))
        .stdout(predicate::str::contains(r#""entry_id": "CompanyEntity:1""#))
        .stdout(predicate::str::contains(r#""entry_id": "Keyword:k1""#))
        .stdout(predicate::str::contains(r#""entry_id": "CompanyNews:10""#).not())
        .stdout(predicate::str::contains(r#""flow_type": "collect""#));
}

#[test]
fn test_select_slow_clicks_toggle_twice() {
    let fx = Fixture::new();
    fx.cmd()
        .args([
            "select",
            "--input",
            &fx.graph(),
            "--click",
            "Policy:p1@0",
            "--click",
            "Policy:p1@400",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Selected 0 nodes"));
}

#[test]
fn test_select_clear_at_drops_earlier_selection() {
    let fx = Fixture::new();
    fx.cmd()
        .args([
            "select",
            "--input",
            &fx.graph(),
            "--click",
            "Policy:p1@0",
            "--clear-at",
            "500",
            "--click",
            "State:NJ@800",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Selected 1 nodes"))
        .stdout(predicate::str::contains("State:NJ"))
        .stdout(predicate::str::contains(r#""entry_id": "Policy:p1""#).not());
}

#[test]
fn test_select_with_selection_mode_off_ignores_clicks() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["select", "--input", &fx.graph(), "--click", "Policy:p1@0", "--no-select-mode"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 clicks ignored (selection mode is off)"))
        .stdout(predicate::str::contains("Selected 0 nodes"));
}

#[test]
fn test_select_payload_with_edge_and_topic() {
    let fx = Fixture::new();
    fx.cmd()
        .args([
            "select",
            "--input",
            &fx.graph(),
            "--click",
            "Policy:p1@0",
            "--click",
            "State:NJ@1000",
            "--flow",
            "source_collect",
            "--llm-assist",
            "true",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""topic_focus": "sports_betting""#))
        .stdout(predicate::str::contains(r#""label": "enacted in""#))
        .stdout(predicate::str::contains(r#""flow_type": "source_collect""#))
        .stdout(predicate::str::contains(r#""llm_assist": true"#));
}

#[test]
fn test_select_submit_without_endpoint_fails() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["select", "--input", &fx.graph(), "--click", "Policy:p1@0", "--submit"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No task endpoint"));
}
