//! Command-line tests for the `modbuild` binary.


use assert_cmd::Command;
use predicates::prelude::*;
use test_utils::{
    assertions, populate_sample, sample_descriptor, write_sample_resources, TestProject,
    TestRepository,
};

/// Helper to get the binary command, isolated to the project's config
fn modbuild_cmd(project: &TestProject) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_modbuild"));
    cmd.current_dir(project.path())
        .env("MODBUILD_CONFIG_DIR", project.config_path())
        .env_remove("MODBUILD_CACHE_DIR")
        .env_remove("MODBUILD_LOG");
    cmd
}

struct Fixture {
    project: TestProject,
    _venmaven: TestRepository,
    mirror: TestRepository,
}

fn sample_project() -> Fixture {
    let project = TestProject::new();
    let (venmaven, mirror) = (TestRepository::new(), TestRepository::new());
    populate_sample(&venmaven, &mirror);
    write_sample_resources(&project);
    project.write_descriptor(&sample_descriptor(&venmaven, &mirror));
    Fixture {
        project,
        _venmaven: venmaven,
        mirror,
    }
}

#[test]
fn test_missing_descriptor() {
    let project = TestProject::new();
    modbuild_cmd(&project)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("modbuild.toml not found"));
}

#[test]
fn test_check_valid_descriptor() {
    let fixture = sample_project();
    modbuild_cmd(&fixture.project)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 repositories"))
        .stdout(predicate::str::contains("venmaven"))
        .stdout(predicate::str::contains("every declared coordinate is routable"));
}

#[test]
fn test_check_rejects_overlapping_exclusive_filters() {
    let project = TestProject::new();
    project.write_descriptor(
        r#"
[mod]
id = "swansong"
version = "1.0.0"
group = "com.ventooth"

[[repository]]
id = "mega"
url = "https://mvn.example/mega"
exclusive = ["codechicken", "com.falsepattern"]

[[repository]]
id = "horizon"
url = "https://mvn.example/horizon"
exclusive = ["com.falsepattern.lib"]
"#,
    );

    modbuild_cmd(&project)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("mega"))
        .stderr(predicate::str::contains("horizon"));
}

#[test]
fn test_route_command() {
    let fixture = sample_project();
    modbuild_cmd(&fixture.project)
        .args(["route", "com.ventooth:venterceptor-service-api:2.0.0-rc4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Repository: venmaven"))
        .stdout(predicate::str::contains(
            "com/ventooth/venterceptor-service-api/2.0.0-rc4/venterceptor-service-api-2.0.0-rc4.jar",
        ));

    modbuild_cmd(&fixture.project)
        .args(["route", "org.joml:joml:1.10.8"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Repository: mirror"))
        .stdout(predicate::str::contains("(catch-all)"));
}

#[test]
fn test_deps_with_override() {
    let fixture = sample_project();

    modbuild_cmd(&fixture.project)
        .arg("deps")
        .assert()
        .success()
        .stdout(predicate::str::contains("testNotEnoughItems → nothing"))
        .stdout(predicate::str::contains("notenoughitems").not());

    modbuild_cmd(&fixture.project)
        .args(["deps", "--set", "testNotEnoughItems=true"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(overridden)"))
        .stdout(predicate::str::contains(
            "codechicken:notenoughitems-mc1.7.10:2.4.2-mega:dev [dev-only-non-publishable]",
        ));
}

#[test]
fn test_deps_lists_shared_dependency_once() {
    let project = TestProject::new();
    project.write_descriptor(
        r#"
[mod]
id = "swansong"
version = "1.0.0"
group = "com.ventooth"

[[repository]]
id = "mirror"
url = "https://mvn.example/mirror"

[[dependency]]
coordinate = "org.joml:joml:1.10.8"
scope = "compile-only"

[[toggle]]
name = "testJoml"
enabled = false
on_false = [{ coordinate = "org.joml:joml:1.10.8", scope = "compile-only" }]
"#,
    );

    modbuild_cmd(&project)
        .arg("deps")
        .assert()
        .success()
        .stdout(predicate::str::contains("Active dependencies (1):"));
}

#[test]
fn test_deps_unknown_toggle() {
    let fixture = sample_project();
    modbuild_cmd(&fixture.project)
        .args(["deps", "--set", "testBotania=true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown feature toggle 'testBotania'"));
}

#[test]
fn test_resolve_writes_lockfile_and_frozen_detects_changes() {
    let fixture = sample_project();

    modbuild_cmd(&fixture.project)
        .arg("resolve")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote modbuild.lock"));

    assert!(fixture.project.has_lockfile());
    let lockfile = fixture.project.read_lockfile();
    assert!(lockfile.contains("com.ventooth:venterceptor-service-api:2.0.0-rc4"));
    assert!(lockfile.contains("repository = \"venmaven\""));

    modbuild_cmd(&fixture.project)
        .args(["resolve", "--frozen"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is up to date"));

    // Republished artifact with different bytes
    fixture
        .mirror
        .add_artifact("org.joml:joml:1.10.8", b"tampered");
    modbuild_cmd(&fixture.project)
        .args(["resolve", "--frozen"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Checksum mismatch"));

    // A plain resolve re-pins
    modbuild_cmd(&fixture.project)
        .arg("resolve")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote modbuild.lock"));
}

#[test]
fn test_build_writes_staging_and_manifests() {
    let fixture = sample_project();
    let root = fixture.project.path();

    modbuild_cmd(&fixture.project)
        .args(["build", "--out", "dist"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Build complete"));

    assertions::file_contains(
        &root.join("dist/staging/META-INF/swansong_deps.json"),
        "\"2.0.0-rc4\"",
    );
    assertions::file_exists(&root.join(
        "dist/staging/META-INF/falsepatternlib_repo/com/ventooth/venterceptor-service-api/2.0.0-rc4/venterceptor-service-api-2.0.0-rc4.jar",
    ));
    assertions::file_contains(&root.join("dist/publish/curseforge.json"), "fplib");
    assertions::file_contains(&root.join("dist/publish/maven.json"), "mavenpattern");
}

#[test]
fn test_build_fails_on_missing_companion() {
    let fixture = sample_project();
    let descriptor = std::fs::read_to_string(fixture.project.path().join("modbuild.toml"))
        .unwrap()
        .replace("required = [\"fplib\"]", "required = [\"fplib\", \"gtnhlib\"]");
    fixture.project.write_descriptor(&descriptor);

    modbuild_cmd(&fixture.project)
        .args(["build", "--out", "dist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires companion 'gtnhlib'"));

    assertions::dir_not_exists(&fixture.project.path().join("dist"));
}

#[test]
fn test_plan_prints_json() {
    let fixture = sample_project();
    modbuild_cmd(&fixture.project)
        .args(["plan", "--artifact", "build/libs/custom.jar"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"channel\": \"curseforge\""))
        .stdout(predicate::str::contains("custom.jar"));
}

#[test]
fn test_config_set_and_show() {
    let project = TestProject::new();

    modbuild_cmd(&project)
        .args(["config", "set", "resolver.jobs", "4"])
        .assert()
        .success();

    modbuild_cmd(&project)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("jobs                  = 4"));

    modbuild_cmd(&project)
        .args(["config", "set", "registry.url", "x"])
        .assert()
        .failure();
}

#[test]
fn test_completions() {
    let project = TestProject::new();
    modbuild_cmd(&project)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("modbuild"));
}
