use assert_cmd::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::TempDir;

fn write_mesh(dir: &TempDir) -> std::path::PathBuf {
    let mtl = "newmtl red\nKd 1 0 0\nnewmtl green\nKd 0 1 0\n";
    let obj = "mtllib scene.mtl\n\
               v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
               usemtl red\nf 1 2 3\n\
               usemtl green\nf 1 3 4\n";

    let mtl_path = dir.path().join("scene.mtl");
    let obj_path = dir.path().join("scene.obj");
    std::fs::File::create(&mtl_path)
        .expect("mtl file")
        .write_all(mtl.as_bytes())
        .expect("write mtl");
    std::fs::File::create(&obj_path)
        .expect("obj file")
        .write_all(obj.as_bytes())
        .expect("write obj");
    obj_path
}

#[test]
fn summary_reports_the_default_scene() {
    let mut cmd = Command::cargo_bin("pathtracer").expect("binary exists");
    cmd.arg("--summary-only");
    cmd.assert().success().stdout(contains(
        "Loaded scene with 1 triangles (3 vertices, 1 materials, 1 lights)",
    ));
}

#[test]
fn summary_reports_a_loaded_mesh() {
    let dir = TempDir::new().expect("temp dir");
    let obj_path = write_mesh(&dir);

    let mut cmd = Command::cargo_bin("pathtracer").expect("binary exists");
    cmd.arg(obj_path).arg("--summary-only");
    cmd.assert().success().stdout(contains(
        "Loaded scene with 2 triangles (4 vertices, 2 materials, 1 lights)",
    ));
}

#[test]
fn unreadable_mesh_falls_back_to_the_default_scene() {
    let mut cmd = Command::cargo_bin("pathtracer").expect("binary exists");
    cmd.arg("/definitely/not/here.obj").arg("--summary-only");
    cmd.assert().success().stdout(contains(
        "Loaded scene with 1 triangles (3 vertices, 1 materials, 1 lights)",
    ));
}

#[test]
fn unknown_arguments_are_rejected() {
    let mut cmd = Command::cargo_bin("pathtracer").expect("binary exists");
    cmd.arg("--bogus");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --bogus"));
}
