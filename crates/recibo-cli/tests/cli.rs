//! Integration tests for the recibo binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("recibo")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("doctor"));
}

#[test]
fn process_missing_file_fails() {
    Command::cargo_bin("recibo")
        .unwrap()
        .args(["process", "/no/existe/ticket.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no encontrado"));
}

#[test]
fn process_unsupported_bytes_fails_with_spanish_message() {
    let mut file = tempfile::Builder::new()
        .prefix("recibo-test-")
        .suffix(".bin")
        .tempfile()
        .unwrap();
    file.write_all(&[0x4D, 0x5A, 0x90, 0x00, 0x01, 0x02]).unwrap();

    Command::cargo_bin("recibo")
        .unwrap()
        .arg("process")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no soportado"));
}

#[test]
fn batch_without_matches_fails() {
    Command::cargo_bin("recibo")
        .unwrap()
        .args(["batch", "/no/existe/*.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Ningún fichero"));
}
