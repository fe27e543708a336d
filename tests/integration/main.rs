//! Integration tests for ecr-release

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    const RELEASE_VARS: [&str; 6] = [
        "ECR_REPOSITORY",
        "BUILD_ID",
        "VERSION",
        "RELEASE_PARAMS",
        "RELEASE_METADATA_PATH",
        "RELEASE_LOG_FORMAT",
    ];

    fn ecr_release() -> Command {
        let mut cmd = cargo_bin_cmd!("ecr-release");
        for var in RELEASE_VARS {
            cmd.env_remove(var);
        }
        cmd
    }

    /// A release invocation with identifiers set, run from an empty directory
    fn release(dir: &TempDir, params: &str) -> Command {
        let mut cmd = ecr_release();
        cmd.current_dir(dir.path())
            .env("ECR_REPOSITORY", "123.dkr.ecr.eu-west-1.amazonaws.com/app")
            .env("BUILD_ID", "release")
            .env("VERSION", "1.0")
            .env("RELEASE_PARAMS", params)
            .env("RELEASE_METADATA_PATH", dir.path().join("metadata.json"));
        cmd
    }

    #[test]
    fn help_displays() {
        ecr_release()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "builds a container image and pushes it to ECR",
            ));
    }

    #[test]
    fn version_displays() {
        ecr_release()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("ecr-release"));
    }

    #[test]
    fn requirements_reports_ecr() {
        ecr_release()
            .arg("requirements")
            .assert()
            .success()
            .stdout(predicate::str::contains(r#"{"needs":["ecr"]}"#));
    }

    #[test]
    fn wrong_parameter_type_fails_before_any_command() {
        let dir = TempDir::new().unwrap();
        release(&dir, r#"{"dockerfile": 42}"#)
            .assert()
            .failure()
            .stderr(predicate::str::contains(
                "unexpected type for build.release.params.dockerfile: number (should be string)",
            ))
            .stderr(predicate::str::contains("$ docker").not());
        assert!(!dir.path().join("metadata.json").exists());
    }

    #[test]
    fn unsupported_cache_backend_fails() {
        let dir = TempDir::new().unwrap();
        release(&dir, r#"{"buildx": true, "cache-from": "type=local,src=/tmp"}"#)
            .assert()
            .failure()
            .stderr(predicate::str::contains(
                "currently only gha cache type supported, got: type=local,src=/tmp",
            ))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn malformed_params_fail() {
        let dir = TempDir::new().unwrap();
        release(&dir, "[1, 2]")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid release parameters"));
    }

    #[test]
    fn missing_repository_fails() {
        let dir = TempDir::new().unwrap();
        release(&dir, "{}")
            .env_remove("ECR_REPOSITORY")
            .assert()
            .failure()
            .stderr(predicate::str::contains("ECR_REPOSITORY"));
    }
}
