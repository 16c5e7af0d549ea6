#![cfg(not(target_arch = "wasm32"))]

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

const SQUARE: &str = r#"{
  "instructions": [
    { "opcode": "mov", "operands": [
      { "register": { "class": "temp", "index": 0 } },
      { "register": { "class": "const", "index": 0 } } ] },
    { "opcode": "mul", "operands": [
      { "register": { "class": "temp", "index": 1 } },
      { "register": { "class": "temp", "index": 0 } },
      { "register": { "class": "temp", "index": 0 } } ] },
    { "opcode": "mov", "operands": [
      { "register": { "class": "output", "index": 0 } },
      { "register": { "class": "temp", "index": 1 } } ] }
  ]
}"#;

const LOOP: &str = r#"{
  "instructions": [
    { "opcode": "loop", "operands": [ { "register": { "class": "const", "index": 0 } } ] },
    { "opcode": "endloop" }
  ]
}"#;

fn glint() -> Command {
    let mut cmd = Command::cargo_bin("glint").unwrap();
    cmd.env_remove("GLINT_TARGET")
        .env_remove("GLINT_LOG")
        .env_remove("GLINT_CACHE_CAPACITY");
    cmd
}

fn write_program(dir: &Path, name: &str, json: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, json).unwrap();
    path
}

#[test]
fn asm_then_disasm_on_every_target() {
    let dir = tempdir().unwrap();
    let program = write_program(dir.path(), "square.json", SQUARE);

    for target in ["generic", "legacy", "tile"] {
        let blob = dir.path().join(format!("square.{target}.glsb"));
        glint()
            .args(["asm", "-t", target, "-o"])
            .arg(&blob)
            .arg(&program)
            .assert()
            .success();
        assert_eq!(&fs::read(&blob).unwrap()[0..4], b"GLSB");

        glint()
            .args(["disasm", "-t", target])
            .arg(&blob)
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("; {target} shader, 3 instructions")))
            .stdout(predicate::str::contains("mov r0, c0"))
            .stdout(predicate::str::contains("mul r1, r0, r0"))
            .stdout(predicate::str::contains("mov o0, r1"));
    }
}

#[test]
fn default_output_path_and_env_target() {
    let dir = tempdir().unwrap();
    let program = write_program(dir.path(), "square.json", SQUARE);

    glint()
        .env("GLINT_TARGET", "legacy")
        .arg("asm")
        .arg(&program)
        .assert()
        .success();
    let blob = dir.path().join("square.glsb");
    assert!(blob.exists());

    glint()
        .env("GLINT_TARGET", "legacy")
        .arg("disasm")
        .arg(&blob)
        .assert()
        .success()
        .stdout(predicate::str::contains("; legacy shader"));

    glint()
        .arg("disasm")
        .arg(&blob)
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected generic"));
}

#[test]
fn batch_assembly() {
    let dir = tempdir().unwrap();
    let a = write_program(dir.path(), "a.json", SQUARE);
    let b = write_program(dir.path(), "b.json", SQUARE);

    glint()
        .env("GLINT_CACHE_CAPACITY", "1")
        .args(["asm", "-t", "tile"])
        .arg(&a)
        .arg(&b)
        .assert()
        .success();
    assert_eq!(
        fs::read(dir.path().join("a.glsb")).unwrap(),
        fs::read(dir.path().join("b.glsb")).unwrap()
    );

    glint()
        .args(["asm", "-o"])
        .arg(dir.path().join("out.glsb"))
        .arg(&a)
        .arg(&b)
        .assert()
        .failure()
        .stderr(predicate::str::contains("single input"));
}

#[test]
fn disasm_json() {
    let dir = tempdir().unwrap();
    let program = write_program(dir.path(), "square.json", SQUARE);
    glint().arg("asm").arg(&program).assert().success();

    let out = glint()
        .args(["disasm", "--json"])
        .arg(dir.path().join("square.glsb"))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let listing: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(listing["target"], "generic");
    assert_eq!(listing["instructions"].as_array().unwrap().len(), 3);
    assert_eq!(listing["instructions"][0]["byte_offset"], 24);
    assert_eq!(listing["instructions"][1]["instruction"]["opcode"], "mul");
    assert!(listing["malformed"].is_null());
}

#[test]
fn strict_mode_rejects_partial_listings() {
    let dir = tempdir().unwrap();
    let program = write_program(dir.path(), "square.json", SQUARE);
    glint().arg("asm").arg(&program).assert().success();

    let blob = dir.path().join("square.glsb");
    let mut bytes = fs::read(&blob).unwrap();
    bytes.truncate(bytes.len() - 4);
    fs::write(&blob, &bytes).unwrap();

    glint()
        .arg("disasm")
        .arg(&blob)
        .assert()
        .success()
        .stdout(predicate::str::contains("mul r1, r0, r0"))
        .stdout(predicate::str::contains("; malformed at byte 0x0030 (instruction 2)"));

    glint()
        .args(["disasm", "--strict"])
        .arg(&blob)
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not decode completely"));
}

#[test]
fn asm_reports_unsupported_opcodes() {
    let dir = tempdir().unwrap();
    let program = write_program(dir.path(), "loop.json", LOOP);

    glint()
        .args(["asm", "-t", "mobile"])
        .arg(&program)
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no encoding on the tile target"));
    assert!(!dir.path().join("loop.glsb").exists());

    glint().arg("asm").arg(&program).assert().success();
}

#[test]
fn asm_rejects_invalid_json() {
    let dir = tempdir().unwrap();
    let program = write_program(
        dir.path(),
        "broken.json",
        r#"{ "instructions": [ { "opcode": "frobnicate" } ] }"#,
    );
    glint()
        .arg("asm")
        .arg(&program)
        .assert()
        .failure()
        .stderr(predicate::str::contains("parse program"));
}

#[test]
fn bad_environment_is_reported() {
    glint()
        .env("GLINT_CACHE_CAPACITY", "zero")
        .arg("targets")
        .assert()
        .failure()
        .stderr(predicate::str::contains("GLINT_CACHE_CAPACITY"));
}

#[test]
fn targets_lists_all_backends() {
    glint()
        .arg("targets")
        .assert()
        .success()
        .stdout(predicate::str::contains("generic  id=0"))
        .stdout(predicate::str::contains("legacy   id=1"))
        .stdout(predicate::str::contains("tile     id=2"));
}
