//! End-to-end tests of the runhpi binary.

mod common;

use assert_cmd::prelude::*;
use common::ArchiveBuilder;
use predicates::prelude::*;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn extract_writes_files_and_prints_paths() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("demo.hpi");
    let bytes = ArchiveBuilder::new()
        .key(0x1B2C3D4E)
        .file("docs/readme.txt", b"hi there\n", 0)
        .file("docs/changes.txt", b"v1.0\n", 2)
        .build();
    std::fs::write(&archive, bytes).unwrap();

    let out = dir.path().join("out");
    let mut cmd = Command::cargo_bin("runhpi").unwrap();
    cmd.arg("extract").arg(&out).arg(&archive);
    cmd.assert()
        .success()
        .stdout(
            predicate::str::contains("docs/readme.txt")
                .and(predicate::str::contains("docs/changes.txt")),
        );

    assert_eq!(
        std::fs::read(out.join("docs/readme.txt")).unwrap(),
        b"hi there\n"
    );
    assert_eq!(std::fs::read(out.join("docs/changes.txt")).unwrap(), b"v1.0\n");
}

#[test]
fn list_prints_one_path_per_line() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("demo.hpi");
    let bytes = ArchiveBuilder::new()
        .file("units/core.fbi", b"unit", 0)
        .file("anims/walk.gaf", b"anim", 0)
        .build();
    std::fs::write(&archive, bytes).unwrap();

    let mut cmd = Command::cargo_bin("runhpi").unwrap();
    cmd.arg("list").arg(&archive);
    cmd.assert()
        .success()
        .stdout(predicate::str::diff("units/core.fbi\nanims/walk.gaf\n"));
}

#[test]
fn list_verbose_shows_methods_and_totals() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("demo.hpi");
    let bytes = ArchiveBuilder::new()
        .file("a.txt", b"aaaa", 0)
        .file("b.txt", b"bbbb", 2)
        .build();
    std::fs::write(&archive, bytes).unwrap();

    let mut cmd = Command::cargo_bin("runhpi").unwrap();
    cmd.arg("list").arg("-v").arg(&archive);
    cmd.assert()
        .success()
        .stdout(
            predicate::str::contains("stored")
                .and(predicate::str::contains("zlib"))
                .and(predicate::str::contains("2 files")),
        );
}

#[test]
fn garbage_input_fails_with_nonzero_exit() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("broken.hpi");
    std::fs::write(&archive, b"PK\x03\x04 this is not an HPI archive").unwrap();

    let out = dir.path().join("out");
    let mut cmd = Command::cargo_bin("runhpi").unwrap();
    cmd.arg("extract").arg(&out).arg(&archive);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("HAPI"));
}

#[test]
fn missing_archive_fails() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");
    let mut cmd = Command::cargo_bin("runhpi").unwrap();
    cmd.arg("extract").arg(&out).arg(dir.path().join("nope.hpi"));
    cmd.assert().failure();
}

#[test]
fn keep_going_skips_bad_entries_but_exits_nonzero() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("demo.hpi");
    let mut bytes = ArchiveBuilder::new()
        .file("good.txt", b"fine", 0)
        .file("bad.txt", b"broken", 0)
        .build();
    // The archive ends with bad.txt's payload; flip its last byte so
    // only that entry fails its checksum.
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    std::fs::write(&archive, bytes).unwrap();

    let out = dir.path().join("out");
    let mut cmd = Command::cargo_bin("runhpi").unwrap();
    cmd.arg("extract").arg(&out).arg(&archive).arg("--keep-going");
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("good.txt"))
        .stderr(predicate::str::contains("checksum"));

    assert_eq!(std::fs::read(out.join("good.txt")).unwrap(), b"fine");
    assert!(!out.join("bad.txt").exists());
}

#[test]
fn fail_fast_stops_at_first_bad_entry() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("demo.hpi");
    let mut bytes = ArchiveBuilder::new()
        .file("bad.txt", b"broken", 0)
        .file("never.txt", b"unreached", 0)
        .build();
    // Corrupt the first file's payload: it sits right before never.txt's
    // chunk, which is the last 19 + 9 bytes of the archive.
    let never_chunk_len = 4 + 4 + 15 + 9;
    let bad_payload_end = bytes.len() - never_chunk_len;
    bytes[bad_payload_end - 1] ^= 0x01;
    std::fs::write(&archive, bytes).unwrap();

    let out = dir.path().join("out");
    let mut cmd = Command::cargo_bin("runhpi").unwrap();
    cmd.arg("extract").arg(&out).arg(&archive);
    cmd.assert().failure();

    assert!(!out.join("never.txt").exists());
}
