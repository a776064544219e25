#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

const HEADER: &str = "op, user, tier, enhance, session, product, amount, paid, outcome";

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: top up 100 credits.
    let mut csv1 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv1, "{HEADER}").unwrap();
    writeln!(csv1, "topup, 1, , , cs_a, prod_100, 100, true,").unwrap();

    let mut cmd1 = Command::new(cargo_bin!("pixelup"));
    cmd1.arg(csv1.path()).arg("--db-path").arg(&db_path);

    let output1 = cmd1.output().expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("1,100"));

    // 2. Second run against the same DB: the replayed session must not
    // credit again, and the upscale charge applies to the recovered balance.
    let mut csv2 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv2, "{HEADER}").unwrap();
    writeln!(csv2, "topup, 1, , , cs_a, prod_100, 100, true,").unwrap();
    writeln!(csv2, "upscale, 1, 4, false, , , , , ok").unwrap();

    let mut cmd2 = Command::new(cargo_bin!("pixelup"));
    cmd2.arg(csv2.path()).arg("--db-path").arg(&db_path);

    let output2 = cmd2.output().expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);

    // 100 recovered, duplicate top-up ignored, 2 charged.
    assert!(stdout2.contains("1,98"));
}

#[test]
fn test_rocksdb_refund_persists() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "{HEADER}").unwrap();
    writeln!(csv, "topup, 1, , , cs_a, prod_010, 10, true,").unwrap();
    writeln!(csv, "upscale, 1, 8, true, , , , , failed").unwrap();

    let mut cmd = Command::new(cargo_bin!("pixelup"));
    cmd.arg(csv.path()).arg("--db-path").arg(&db_path);

    let output = cmd.output().expect("Failed to execute command");
    assert!(output.status.success());
    // The failed 8-credit job (3 + 5 enhance) was refunded in full.
    assert!(String::from_utf8_lossy(&output.stdout).contains("1,10"));
}
