//! Release command - build, push and record the image

use crate::cli::ReleaseArgs;
use crate::config::RawParameters;
use crate::credentials::{AwsCliEcr, CredentialResolver, RegistryEnv};
use crate::error::{ReleaseError, ReleaseResult};
use crate::orchestration::{ExecCommandRunner, Orchestrator, OutputSink};
use crate::ui::Narrator;
use std::sync::Arc;
use tracing::debug;

/// Execute a release
pub async fn execute(args: ReleaseArgs) -> ReleaseResult<()> {
    let target = args.target()?;
    let params = RawParameters::from_json(args.params.as_deref().unwrap_or_default())?;

    let workdir = std::env::current_dir()
        .map_err(|e| ReleaseError::io("getting current directory", e))?;
    debug!("Releasing {} from {}", target.image(), workdir.display());

    let narrator = Narrator::stderr();
    // Child output goes to stderr so stdout only carries the metadata JSON
    let sink: OutputSink = Arc::new(|line: String| eprintln!("{line}"));
    let runner = ExecCommandRunner::with_output_sink(sink);
    let ecr = AwsCliEcr::new(ExecCommandRunner::new());
    let resolver = CredentialResolver::new(RegistryEnv::from_env());

    let metadata = Orchestrator::new(&ecr, &runner, &resolver, &narrator)
        .with_workdir(workdir)
        .run(&params, &target)
        .await?;

    metadata.write(&args.metadata_path).await?;
    println!("{}", metadata.to_json()?);

    Ok(())
}
