//! CLI argument definitions using clap derive
//!
//! The pipeline passes everything through environment variables; the
//! flags exist for running a release by hand.

use crate::config::ReleaseTarget;
use crate::error::{ReleaseError, ReleaseResult};
use crate::metadata::DEFAULT_METADATA_PATH;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ecr-release - build a container image and push it to ECR
///
/// Logs in to ECR and to every registry the Dockerfile pulls base images
/// from, builds the image (optionally for several platforms with buildx)
/// and pushes it.
#[derive(Parser, Debug)]
#[command(name = "ecr-release")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute; a release runs when none is given
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub release: ReleaseArgs,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log output format
    #[arg(
        long,
        global = true,
        value_enum,
        env = "RELEASE_LOG_FORMAT",
        default_value_t = LogFormat::Text
    )]
    pub log_format: LogFormat,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report the capabilities this release step needs from the pipeline
    Requirements,
}

/// Log output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Arguments for a release run
#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// ECR repository to push to
    #[arg(long, env = "ECR_REPOSITORY")]
    pub repository: Option<String>,

    /// Build identifier, used in the image tag and in error messages
    #[arg(long, env = "BUILD_ID")]
    pub build_id: Option<String>,

    /// Version being released, used in the image tag
    #[arg(long = "release-version", env = "VERSION")]
    pub release_version: Option<String>,

    /// Build parameters as a JSON object
    #[arg(long, env = "RELEASE_PARAMS", hide_env_values = true)]
    pub params: Option<String>,

    /// Where to write the release metadata JSON
    #[arg(long, env = "RELEASE_METADATA_PATH", default_value = DEFAULT_METADATA_PATH)]
    pub metadata_path: PathBuf,
}

impl ReleaseArgs {
    /// The image this run releases; all three identifiers are required
    pub fn target(&self) -> ReleaseResult<ReleaseTarget> {
        let repository = required(&self.repository, "repository", "ECR_REPOSITORY")?;
        let build_id = required(&self.build_id, "build-id", "BUILD_ID")?;
        let version = required(&self.release_version, "release-version", "VERSION")?;
        Ok(ReleaseTarget::new(repository, build_id, version))
    }
}

fn required<'a>(
    value: &'a Option<String>,
    flag: &'static str,
    env: &'static str,
) -> ReleaseResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(ReleaseError::MissingSetting { flag, env })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_build_target() {
        let cli = Cli::try_parse_from([
            "ecr-release",
            "--repository",
            "repo",
            "--build-id",
            "b1",
            "--release-version",
            "1.0",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(
            cli.release.target().unwrap(),
            ReleaseTarget::new("repo", "b1", "1.0")
        );
    }

    #[test]
    fn missing_identifier_reported() {
        let args = ReleaseArgs {
            repository: Some("repo".to_string()),
            build_id: Some("b1".to_string()),
            release_version: Some(String::new()),
            params: None,
            metadata_path: PathBuf::from(DEFAULT_METADATA_PATH),
        };
        let err = args.target().unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::MissingSetting {
                env: "VERSION",
                ..
            }
        ));
        assert!(err.to_string().contains("--release-version"));
    }

    #[test]
    fn requirements_subcommand() {
        let cli = Cli::try_parse_from(["ecr-release", "requirements"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Requirements)));
    }

    #[test]
    fn log_format_flag() {
        let cli = Cli::try_parse_from(["ecr-release", "--log-format", "json", "-vv"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.verbose, 2);
    }
}
