//! Integration tests for Skiff

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn skiff() -> Command {
        cargo_bin_cmd!("skiff")
    }

    #[test]
    fn help_displays() {
        skiff()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("OCI image push tool"));
    }

    #[test]
    fn version_displays() {
        skiff()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("skiff"));
    }

    #[test]
    fn push_requires_source() {
        skiff()
            .arg("push")
            .assert()
            .failure()
            .stderr(predicate::str::contains("SOURCE"));
    }

    #[test]
    fn push_rejects_invalid_reference() {
        skiff()
            .args(["push", "not a ref"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid image reference"));
    }

    #[test]
    fn push_missing_image_fails() {
        let temp = tempfile::tempdir().unwrap();
        skiff()
            .args(["push", "localhost:5000/absent:latest"])
            .args(["--image"])
            .arg(temp.path().join("nothing-here"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("does not appear to be an unpacked image"));
    }

    #[test]
    fn push_cache_flag_fails_when_disabled() {
        let temp = tempfile::tempdir().unwrap();
        let config_path = temp.path().join("config.toml");
        std::fs::write(&config_path, "[push]\ncache = false\n").unwrap();

        skiff()
            .args(["push", "localhost:5000/app:v1", "--cache"])
            .args(["--config"])
            .arg(&config_path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("cache is disabled"));
    }

    #[test]
    fn config_show() {
        skiff()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[storage]"))
            .stdout(predicate::str::contains("[push]"));
    }

    #[test]
    fn config_path() {
        skiff()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show_honors_override() {
        let temp = tempfile::tempdir().unwrap();
        let config_path = temp.path().join("config.toml");
        std::fs::write(
            &config_path,
            "[storage]\nroot = \"/custom/skiff-root\"\n",
        )
        .unwrap();

        skiff()
            .args(["config", "show", "--config"])
            .arg(&config_path)
            .assert()
            .success()
            .stdout(predicate::str::contains("/custom/skiff-root"));
    }
}
