use assert_cmd::Command;
use assert_cmd::cargo;
use predicates::prelude::*;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

fn create_var(path: &Path, deps: &[&str]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let body: Vec<String> = deps.iter().map(|d| format!("\"{}\" : {{}}", d)).collect();
    let manifest = format!("{{ \"dependencies\" : {{ {} }} }}", body.join(", "));

    let mut zip = ZipWriter::new(File::create(path).unwrap());
    zip.start_file("meta.json", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(manifest.as_bytes()).unwrap();
    zip.start_file("Saves/scene/main.json", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"{}").unwrap();
    zip.finish().unwrap();
}

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        let env = Self {
            dir: tempdir().unwrap(),
        };
        fs::create_dir_all(env.repo()).unwrap();
        env
    }

    fn repo(&self) -> PathBuf {
        self.dir.path().join("vars")
    }

    fn game(&self) -> PathBuf {
        self.dir.path().join("game")
    }

    fn add(&self, name: &str, deps: &[&str]) {
        let creator = name.split('.').next().unwrap();
        create_var(
            &self.repo().join(creator).join(format!("{}.var", name)),
            deps,
        );
    }

    /// The binary with roots set and the user's config directory hidden.
    fn vpm(&self) -> Command {
        let mut cmd = Command::new(cargo::cargo_bin!("vpm"));
        cmd.env("HOME", self.dir.path())
            .env("XDG_CONFIG_HOME", self.dir.path().join("config"))
            .env("VPM_REPO", self.repo())
            .env("VPM_ACTIVATION_ROOT", self.game())
            .env_remove("VPM_STATE");
        cmd
    }
}

#[test]
fn test_update_and_list() {
    let env = Env::new();
    env.add("alice.hair1.2", &[]);
    env.add("alice.hair1.5", &[]);

    env.vpm()
        .arg("update")
        .assert()
        .success()
        .stdout(predicate::str::contains("added alice.hair1.2"))
        .stdout(predicate::str::contains("2 added"));

    env.vpm()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("alice.hair1.2 not-installed (old)"))
        .stdout(predicate::str::contains("alice.hair1.5 not-installed\n"));

    assert!(env.repo().join(".vpm").join("catalog.json").exists());
}

#[test]
#[cfg_attr(vpm_skip_cross_windows_tests, ignore)]
fn test_install_reports_missing_and_approximate() {
    let env = Env::new();
    env.add("bob.scene1.3", &["alice.hair1.2", "carol.skin.latest"]);
    env.add("alice.hair1.5", &[]);
    env.vpm().arg("update").assert().success();

    env.vpm()
        .args(["install", "bob.scene1.3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice.hair1.2 resolved to alice.hair1.5$"))
        .stdout(predicate::str::contains("installed bob.scene1.3"))
        .stdout(predicate::str::contains("missing carol.skin.latest"));

    assert!(
        fs::symlink_metadata(env.game().join("___VarsLink___").join("alice.hair1.5.var")).is_ok()
    );

    env.vpm()
        .args(["list", "--active"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bob.scene1.3 installed"))
        .stdout(predicate::str::contains("alice.hair1.5 installed"));

    env.vpm()
        .arg("missing")
        .assert()
        .success()
        .stdout(predicate::str::contains("missing carol.skin.latest"))
        .stdout(predicate::str::contains("approximate alice.hair1.2 -> alice.hair1.5$"));
}

#[test]
fn test_missing_with_download_table() {
    let env = Env::new();
    env.add("bob.scene1.3", &["carol.skin.4"]);
    let table = env.dir.path().join("downloads.json");
    fs::write(&table, r#"{"carol.skin": "https://hub.example/carol.skin"}"#).unwrap();
    env.vpm().arg("update").assert().success();

    env.vpm()
        .args(["missing", "--all", "--downloads"])
        .arg(&table)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "missing carol.skin.4 (https://hub.example/carol.skin)",
        ));
}

#[test]
#[cfg_attr(vpm_skip_cross_windows_tests, ignore)]
fn test_substitute_links_missing_reference() {
    let env = Env::new();
    env.add("bob.scene1.3", &["alice.hair1.7"]);
    env.add("alice.hair1.5", &[]);
    env.vpm().arg("update").assert().success();

    env.vpm()
        .args(["substitute", "alice.hair1.7", "alice.hair1.latest"])
        .assert()
        .success()
        .stdout(predicate::str::contains("linked alice.hair1.5 as"));

    let link = env
        .game()
        .join("___MissingVarLink___")
        .join("alice.hair1.7.var");
    assert_eq!(
        fs::read_link(link).unwrap(),
        env.repo().join("alice").join("alice.hair1.5.var")
    );
}

#[test]
fn test_show_unknown_package_fails() {
    let env = Env::new();
    env.vpm().arg("update").assert().success();
    env.vpm()
        .args(["show", "nobody.nothing.1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not in the repository"));
}

#[test]
fn test_delete_with_yes_moves_archive() {
    let env = Env::new();
    env.add("a.b.1", &[]);
    env.vpm().arg("update").assert().success();

    env.vpm()
        .args(["delete", "a.b.1", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("moved a.b.1"));

    assert!(
        env.repo()
            .join("___Quarantine___")
            .join("deleted")
            .join("a.b.1.var")
            .exists()
    );
    env.vpm()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No packages"));
}

#[test]
fn test_sweep_stale() {
    let env = Env::new();
    env.add("a.b.1", &[]);
    env.add("a.b.2", &[]);
    env.vpm().arg("update").assert().success();

    env.vpm()
        .args(["sweep", "stale"])
        .assert()
        .success()
        .stdout(predicate::str::contains("moved a.b.1"));
    env.vpm()
        .args(["sweep", "stale"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to sweep."));
}

#[test]
fn test_requires_repository_root() {
    let env = Env::new();
    env.vpm()
        .env_remove("VPM_REPO")
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--repo"));
}

#[test]
#[cfg(target_os = "linux")]
fn test_config_file_supplies_roots() {
    let env = Env::new();
    env.add("a.b.1", &[]);
    let config_dir = env.dir.path().join("config").join("vpm");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.json"),
        serde_json::json!({
            "repo": env.repo(),
            "activation_root": env.game(),
        })
        .to_string(),
    )
    .unwrap();

    let mut cmd = Command::new(cargo::cargo_bin!("vpm"));
    cmd.env("HOME", env.dir.path())
        .env("XDG_CONFIG_HOME", env.dir.path().join("config"))
        .env_remove("VPM_REPO")
        .env_remove("VPM_ACTIVATION_ROOT")
        .env_remove("VPM_STATE")
        .arg("update")
        .assert()
        .success()
        .stdout(predicate::str::contains("added a.b.1"));
}
