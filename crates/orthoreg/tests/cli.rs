mod common;

use std::path::Path;

use assert_cmd::Command;
use orthoreg::{GeoTiffStore, RasterStore, RegistrationReport};
use predicates::prelude::*;

use common::shifted_pair;

fn register() -> Command {
    Command::cargo_bin("register").unwrap()
}

fn write_pair(dir: &Path) {
    let (source, target) = shifted_pair(100, 100, 1);
    GeoTiffStore
        .write_raster(&dir.join("source.tif"), &source)
        .unwrap();
    GeoTiffStore
        .write_raster(&dir.join("target.tif"), &target)
        .unwrap();
}

#[test]
fn missing_positional_arguments_are_a_usage_error() {
    register()
        .arg("only-one.tif")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn unreadable_source_exits_with_one() {
    let dir = tempfile::tempdir().unwrap();
    register()
        .arg(dir.path().join("nope.tif"))
        .arg(dir.path().join("nope2.tif"))
        .arg(dir.path().join("out.tif"))
        .arg("--quiet")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error: cannot read raster"));
    assert!(!dir.path().join("out.tif").exists());
}

#[test]
fn invalid_override_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_pair(dir.path());
    register()
        .arg(dir.path().join("source.tif"))
        .arg(dir.path().join("target.tif"))
        .arg(dir.path().join("out.tif"))
        .args(["--ransac-threshold=-1", "--quiet"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ransac.threshold"));
}

#[test]
fn registers_shifted_pair_and_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    write_pair(dir.path());
    let out = dir.path().join("out.tif");
    let report_path = dir.path().join("report.json");

    register()
        .arg(dir.path().join("source.tif"))
        .arg(dir.path().join("target.tif"))
        .arg(&out)
        .arg("--report")
        .arg(&report_path)
        .args(["--seed", "7", "--log-level", "warn"])
        .assert()
        .success();

    let written = GeoTiffStore.read_raster(&out).unwrap();
    assert_eq!((written.width(), written.height()), (100, 100));
    assert_eq!(written.crs(), "EPSG:32650");

    let report = RegistrationReport::load_json(&report_path).unwrap();
    assert!(report.error.is_none());
    let h = report.homography.expect("homography in report");
    let (tx, ty) = (h[0][2] / h[2][2], h[1][2] / h[2][2]);
    assert!((tx - 5.0).abs() < 1.0, "tx {tx}");
    assert!((ty - 3.0).abs() < 1.0, "ty {ty}");
    assert!(report.inliers.unwrap_or(0) >= 10);
}

#[test]
fn stage_messages_follow_log_level() {
    let dir = tempfile::tempdir().unwrap();
    write_pair(dir.path());
    let run = |extra: &[&str]| {
        register()
            .env_remove("RUST_LOG")
            .arg(dir.path().join("source.tif"))
            .arg(dir.path().join("target.tif"))
            .arg(dir.path().join("out.tif"))
            .args(extra)
            .assert()
            .success()
    };

    run(&["--log-level", "info"]).stderr(predicate::str::contains("good matches"));
    run(&["--quiet"]).stderr(predicate::str::is_empty());
}
