use std::fs;
use std::process::Command;

use tempfile::tempdir;

const RUN: &str = r#"
lattice:
  id: smoke
  elements:
    - { kind: drift, id: D1, length: 1.0 }
    - { kind: quadrupole, id: Q1, length: 0.1, gradient: 5.0 }
    - { kind: marker, id: M1 }
probe:
  kind: particle
  species: { kinetic_energy: 2.5e6 }
  centroid: [1.0e-3, 0.0, 0.0, 0.0, 0.0, 0.0]
tracker:
  step_size: 0.1
  update_policy: always
sync_mode: live
"#;

const SNAPSHOT: &str = r#"
values:
  Q1:
    gradient: 4.5
"#;

fn olm_sim() -> Command {
    Command::new(env!("CARGO_BIN_EXE_olm-sim"))
}

#[test]
fn run_inspect_verify_round_trip() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("run.yaml");
    let snapshot = dir.path().join("snapshot.yaml");
    fs::write(&config, RUN).unwrap();
    fs::write(&snapshot, SNAPSHOT).unwrap();
    let out = dir.path().join("out");

    let output = olm_sim()
        .args(["run", "--config"])
        .arg(&config)
        .arg("--snapshot")
        .arg(&snapshot)
        .arg("--out")
        .arg(&out)
        .output()
        .expect("run olm-sim");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["states"], 12);
    let hash = summary["trajectory_hash"].as_str().unwrap().to_string();

    let checkpoint = out.join("trajectory_smoke.json");
    assert!(checkpoint.exists());

    let output = olm_sim()
        .args(["inspect", "--element", "D1", "--checkpoint"])
        .arg(&checkpoint)
        .output()
        .expect("inspect");
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["element"]["states"].as_array().unwrap().len(), 10);
    assert_eq!(report["provenance"]["sync_mode"], "live");

    let status = olm_sim()
        .args(["verify", "--expect", &hash, "--checkpoint"])
        .arg(&checkpoint)
        .status()
        .expect("verify");
    assert!(status.success());
}

#[test]
fn live_run_without_snapshot_value_fails() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("run.yaml");
    let snapshot = dir.path().join("empty.yaml");
    fs::write(&config, RUN).unwrap();
    fs::write(&snapshot, "values: {}\n").unwrap();
    let status = olm_sim()
        .args(["run", "--config"])
        .arg(&config)
        .arg("--snapshot")
        .arg(&snapshot)
        .arg("--out")
        .arg(dir.path())
        .status()
        .expect("run olm-sim");
    assert!(!status.success());
}
