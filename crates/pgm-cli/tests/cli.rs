//! End-to-end tests for the `pgm` binary.
//!
//! Fixtures are the single-node grid used throughout the workspace: one
//! node, one source and one reactive load, plus a two-scenario update batch.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn input_fixture() -> Value {
    json!({
        "node": [{"id": 0, "u_rated": 100.0}],
        "source": [{"id": 1, "node": 0, "status": 1, "u_ref": 1.0, "sk": 1000.0, "rx_ratio": 0.0}],
        "sym_load": [{"id": 2, "node": 0, "status": 1, "type": 1, "p_specified": 0.0, "q_specified": 500.0}]
    })
}

fn update_fixture() -> Value {
    json!([
        {"sym_load": [{"id": 2, "q_specified": 100.0}], "source": [{"id": 1, "u_ref": 0.5}]},
        {"sym_load": [{"id": 2, "q_specified": 300.0}]}
    ])
}

fn write_json(dir: &TempDir, name: &str, value: &Value) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn pgm(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pgm").unwrap();
    cmd.current_dir(dir.path());
    cmd
}

#[test]
fn test_validate_accepts_input_dataset() {
    let tmp = tempdir().unwrap();
    let input = write_json(&tmp, "input.json", &input_fixture());
    pgm(&tmp)
        .arg("validate")
        .arg(&input)
        .args(["--dataset-type", "input"])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid input single dataset with 3 component types"));
}

#[test]
fn test_validate_batch_requirements() {
    let tmp = tempdir().unwrap();
    let update = write_json(&tmp, "update.json", &update_fixture());
    pgm(&tmp)
        .arg("validate")
        .arg(&update)
        .args(["-t", "update", "--batch"])
        .assert()
        .success()
        .stdout(predicate::str::contains("batch of 2 scenarios"));
    pgm(&tmp)
        .arg("validate")
        .arg(&update)
        .args(["-t", "update", "--single"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_validate_rejects_malformed_dataset() {
    let tmp = tempdir().unwrap();
    let bad = write_json(
        &tmp,
        "bad.json",
        &json!({"node": [{"id": 0, "u_rated": 100.0}], "transmogrifier": [{"id": 1}]}),
    );
    pgm(&tmp)
        .arg("validate")
        .arg(&bad)
        .args(["-t", "input"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("transmogrifier"));
}

#[test]
fn test_inspect_reports_shapes_as_json() {
    let tmp = tempdir().unwrap();
    let update = write_json(&tmp, "update.json", &update_fixture());
    let output = pgm(&tmp)
        .arg("inspect")
        .arg(&update)
        .args(["-t", "update", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["info"]["batch_size"], json!(2));
    assert_eq!(
        report["info"]["components"]["source"]["shape"]["kind"],
        json!("sparse_batch")
    );
    assert_eq!(
        report["info"]["components"]["sym_load"]["elements_per_scenario"],
        json!(1)
    );
}

#[test]
fn test_inspect_plain_table() {
    let tmp = tempdir().unwrap();
    let input = write_json(&tmp, "input.json", &input_fixture());
    pgm(&tmp)
        .arg("inspect")
        .arg(&input)
        .args(["-t", "input"])
        .assert()
        .success()
        .stdout(predicate::str::contains("COMPONENT"))
        .stdout(predicate::str::contains("sym_load"))
        .stdout(predicate::str::contains("Diagnostics: No issues"));
}

#[test]
fn test_convert_dense_then_sparse_restores_batch() {
    let tmp = tempdir().unwrap();
    let update = write_json(&tmp, "update.json", &update_fixture());
    let dense = tmp.path().join("out/dense.json");
    let sparse = tmp.path().join("out/sparse.json");

    pgm(&tmp)
        .arg("convert")
        .arg(&update)
        .args(["-t", "update", "--to", "dense", "-o"])
        .arg(&dense)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 2 scenarios"));
    let dense_json = read_json(&dense);
    assert_eq!(dense_json[1]["source"], json!([{"id": 1}]));

    pgm(&tmp)
        .arg("convert")
        .arg(&dense)
        .args(["-t", "update", "--to", "sparse", "-o"])
        .arg(&sparse)
        .assert()
        .success();
    assert_eq!(read_json(&sparse), update_fixture());
}

#[test]
fn test_convert_back_to_dense_uses_reference_slots() {
    let tmp = tempdir().unwrap();
    let original = json!([
        {"sym_load": [{"id": 3}, {"id": 2, "q_specified": 100.0}]},
        {"sym_load": [{"id": 3}, {"id": 2, "q_specified": 300.0}]}
    ]);
    let dense = write_json(&tmp, "dense.json", &original);
    let sparse = tmp.path().join("sparse.json");
    let restored = tmp.path().join("restored.json");
    let unslotted = tmp.path().join("unslotted.json");

    pgm(&tmp)
        .arg("convert")
        .arg(&dense)
        .args(["-t", "update", "--to", "sparse", "-o"])
        .arg(&sparse)
        .assert()
        .success();
    assert_eq!(
        read_json(&sparse),
        json!([
            {"sym_load": [{"id": 2, "q_specified": 100.0}]},
            {"sym_load": [{"id": 2, "q_specified": 300.0}]}
        ])
    );

    pgm(&tmp)
        .arg("convert")
        .arg(&sparse)
        .args(["-t", "update", "--to", "dense"])
        .arg("--slots-from")
        .arg(&dense)
        .arg("-o")
        .arg(&restored)
        .assert()
        .success()
        .stdout(predicate::str::contains("(4 records)"));
    assert_eq!(read_json(&restored), original);

    pgm(&tmp)
        .arg("convert")
        .arg(&sparse)
        .args(["-t", "update", "--to", "dense", "-o"])
        .arg(&unslotted)
        .assert()
        .success();
    assert_eq!(read_json(&unslotted), read_json(&sparse));
}

#[test]
fn test_filter_selected_attributes() {
    let tmp = tempdir().unwrap();
    let input = write_json(&tmp, "input.json", &input_fixture());
    let out = tmp.path().join("nodes.json");
    pgm(&tmp)
        .arg("filter")
        .arg(&input)
        .args(["-t", "input", "--components", "node:id,node:u_rated", "-o"])
        .arg(&out)
        .assert()
        .success();
    assert_eq!(
        read_json(&out),
        json!({"node": [{"id": 0, "u_rated": 100.0}]})
    );
}

#[test]
fn test_filter_relevant_keeps_populated_attributes() {
    let tmp = tempdir().unwrap();
    let input = write_json(&tmp, "input.json", &input_fixture());
    let out = tmp.path().join("relevant.json");
    pgm(&tmp)
        .arg("filter")
        .arg(&input)
        .args(["-t", "input", "--relevant", "-o"])
        .arg(&out)
        .assert()
        .success();
    assert_eq!(read_json(&out), input_fixture());
}

#[test]
fn test_filter_unknown_attribute_fails() {
    let tmp = tempdir().unwrap();
    let input = write_json(&tmp, "input.json", &input_fixture());
    pgm(&tmp)
        .arg("filter")
        .arg(&input)
        .args(["-t", "input", "--components", "node:voltage"])
        .args(["-o", "out.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("voltage"));
}

#[test]
fn test_options_come_from_config_file() {
    let tmp = tempdir().unwrap();
    fs::write(
        tmp.path().join("pgm.toml"),
        "[calculation]\ncalculation_type = \"state_estimation\"\nthreading = 0\n",
    )
    .unwrap();
    pgm(&tmp)
        .arg("options")
        .assert()
        .success()
        .stdout(predicate::str::contains("calculation_type = \"state_estimation\""))
        .stdout(predicate::str::contains("method in effect: iterative_linear"));

    let bad = tmp.path().join("bad.toml");
    fs::write(
        &bad,
        "[calculation]\ncalculation_type = \"state_estimation\"\ncalculation_method = \"iterative_current\"\n",
    )
    .unwrap();
    pgm(&tmp)
        .arg("--config")
        .arg(&bad)
        .arg("options")
        .assert()
        .failure()
        .stderr(predicate::str::contains("calculation method is invalid"));
}

#[test]
fn test_missing_meta_registry_fails() {
    let tmp = tempdir().unwrap();
    let input = write_json(&tmp, "input.json", &input_fixture());
    pgm(&tmp)
        .args(["--meta", "nowhere.json", "validate"])
        .arg(&input)
        .args(["-t", "input"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("meta data registry"));
}

#[test]
fn test_completions_generate_script() {
    let tmp = tempdir().unwrap();
    pgm(&tmp)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pgm"));

    let script = tmp.path().join("completions/pgm.fish");
    pgm(&tmp)
        .args(["completions", "fish", "--out"])
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote fish completion"));
    assert!(fs::read_to_string(&script).unwrap().contains("slots-from"));
}
