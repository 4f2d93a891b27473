use std::process::Command;
use tempfile::tempdir;

fn bin() -> String {
    env!("CARGO_BIN_EXE_blockdedup").to_string()
}

#[test]
fn cli_dedup_restore_roundtrip() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("base.bin");
    let child = dir.path().join("child.bin");
    let delta = dir.path().join("child.diff");
    let output = dir.path().join("output.bin");

    std::fs::write(&base, b"AAAABBBBCCCCDDDD").unwrap();
    std::fs::write(&child, b"DDDDAAAAXXXXBBBBYY").unwrap();

    let st = Command::new(bin())
        .args(["--quiet", "dedup", "--block-size", "4"])
        .arg(&base)
        .arg(&child)
        .arg(&delta)
        .status()
        .unwrap();
    assert!(st.success());
    assert!(dir.path().join("base.bin.dh1.4").exists());

    let st = Command::new(bin())
        .args(["--quiet", "restore", "--block-size", "4"])
        .arg(&base)
        .arg(&output)
        .arg(&delta)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(
        std::fs::read(&output).unwrap(),
        std::fs::read(&child).unwrap()
    );
}

#[test]
fn cli_refuses_to_overwrite_without_force() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("base.bin");
    let child = dir.path().join("child.bin");
    let delta = dir.path().join("child.diff");
    std::fs::write(&base, b"AAAA").unwrap();
    std::fs::write(&child, b"BBBB").unwrap();
    std::fs::write(&delta, b"keep me").unwrap();

    let st = Command::new(bin())
        .args(["--quiet", "dedup"])
        .arg(&base)
        .arg(&child)
        .arg(&delta)
        .status()
        .unwrap();
    assert!(!st.success());
    assert_eq!(std::fs::read(&delta).unwrap(), b"keep me");

    let st = Command::new(bin())
        .args(["--quiet", "--force", "dedup"])
        .arg(&base)
        .arg(&child)
        .arg(&delta)
        .status()
        .unwrap();
    assert!(st.success());
    assert_ne!(std::fs::read(&delta).unwrap(), b"keep me");
}

#[test]
fn cli_json_stats() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("base.bin");
    let child = dir.path().join("child.bin");
    let delta = dir.path().join("child.diff");
    std::fs::write(&base, b"AAAABBBB").unwrap();
    std::fs::write(&child, b"BBBBCCCC").unwrap();

    let out = Command::new(bin())
        .args(["--quiet", "--json", "dedup", "-b", "4"])
        .arg(&base)
        .arg(&child)
        .arg(&delta)
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["deduplicated_blocks"], 1);
    assert_eq!(v["unique_blocks"], 1);
    assert_eq!(v["diff_size"], 37);
}

#[test]
fn cli_restore_reports_corrupt_diff() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("base.bin");
    let delta = dir.path().join("bad.diff");
    let output = dir.path().join("out.bin");
    std::fs::write(&base, b"AAAA").unwrap();
    std::fs::write(&delta, b"K00000000\r\nEffffffff\r\n").unwrap();

    let out = Command::new(bin())
        .args(["restore", "-b", "4"])
        .arg(&base)
        .arg(&output)
        .arg(&delta)
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("unknown block type"), "{stderr}");
    assert!(!output.exists());
}

#[test]
fn cli_hash_writes_sidecar() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.bin");
    std::fs::write(&input, vec![0u8; 100_000]).unwrap();

    let st = Command::new(bin())
        .args(["--quiet", "hash"])
        .arg(&input)
        .status()
        .unwrap();
    assert!(st.success());
    let text = std::fs::read_to_string(dir.path().join("in.bin.dh1")).unwrap();
    assert_eq!(text.lines().count(), 2);
}

#[test]
fn cli_dedup_writes_restore_script() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("base.bin");
    let child = dir.path().join("child.bin");
    let delta = dir.path().join("child.diff");
    let script = dir.path().join("restore.sh");
    std::fs::write(&base, b"AAAA").unwrap();
    std::fs::write(&child, b"AAAABB").unwrap();

    let st = Command::new(bin())
        .args(["--quiet", "dedup", "-b", "4", "--script"])
        .arg(&script)
        .arg(&base)
        .arg(&child)
        .arg(&delta)
        .status()
        .unwrap();
    assert!(st.success());
    let text = std::fs::read_to_string(&script).unwrap();
    assert!(text.starts_with("#!/bin/sh\n"));
    assert!(text.contains("restore --block-size 4"));
}

#[test]
fn cli_config_works() {
    let out = Command::new(bin()).arg("config").output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("DEFAULT_BLOCK_SIZE=65536"));
}
