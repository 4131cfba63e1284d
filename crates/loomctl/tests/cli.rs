use assert_cmd::Command;
use predicates::str::contains;

fn cmd() -> Command {
    Command::cargo_bin("loomctl").unwrap()
}

#[test]
fn workflow_list_on_missing_manifest_is_empty_but_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .current_dir(dir.path())
        .args(["workflow", "list"])
        .assert()
        .success();
}

#[test]
fn workflow_list_renders_declared_workflows() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("workflows.yaml");
    std::fs::write(
        &manifest,
        "workflows:\n  - name: triage\n    description: Triages alerts\n    eventTypes: [DATA_ARRIVED]\n    priority: 5\n",
    )
    .unwrap();

    cmd()
        .args(["workflow", "list", "--manifest"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(contains("triage"));
}

#[test]
fn workflow_describe_unknown_name_fails() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("workflows.yaml");
    std::fs::write(&manifest, "workflows: []\n").unwrap();

    cmd()
        .args(["workflow", "describe", "nope", "--manifest"])
        .arg(&manifest)
        .assert()
        .failure();
}

#[test]
fn status_reports_empty_buffer_on_fresh_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("serve.yaml");
    std::fs::write(
        &config_path,
        format!("data_dir: {:?}\n", dir.path().join("data")),
    )
    .unwrap();

    cmd()
        .args(["status", "--config"])
        .arg(&config_path)
        .assert()
        .success()
        .stdout(contains("healthy"));
}

#[test]
fn queue_reports_zero_buffered_on_fresh_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("serve.yaml");
    std::fs::write(
        &config_path,
        format!("data_dir: {:?}\n", dir.path().join("data")),
    )
    .unwrap();

    cmd()
        .args(["queue", "--config"])
        .arg(&config_path)
        .assert()
        .success()
        .stdout(contains("total buffered: 0"));
}

#[test]
fn completion_generates_a_nonempty_script() {
    cmd()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(contains("loomctl"));
}
