//! Release sequence
//!
//! Resolve plan, authenticate to ECR, log in to base-image registries,
//! then build and push. The first failing step ends the run; nothing is
//! retried.

use crate::config::{resolve, BuildPlan, ImageReference, RawParameters, ReleaseTarget};
use crate::credentials::{decode_token, CredentialResolver, RegistryAuthService};
use crate::dockerfile::{scan_and_authenticate, BaseImageScanner, FromLineScanner, RegistryLogin};
use crate::error::ReleaseResult;
use crate::metadata::ReleaseMetadata;
use crate::orchestration::docker::{self, DockerLogin, DOCKER};
use crate::orchestration::runner::CommandRunner;
use crate::ui::Narrator;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Drives one release from parameters to pushed image
pub struct Orchestrator<'a> {
    auth: &'a dyn RegistryAuthService,
    runner: &'a dyn CommandRunner,
    resolver: &'a CredentialResolver,
    narrator: &'a Narrator,
    scanner: Box<dyn BaseImageScanner>,
    workdir: PathBuf,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        auth: &'a dyn RegistryAuthService,
        runner: &'a dyn CommandRunner,
        resolver: &'a CredentialResolver,
        narrator: &'a Narrator,
    ) -> Self {
        Self {
            auth,
            runner,
            resolver,
            narrator,
            scanner: Box::new(FromLineScanner),
            workdir: PathBuf::from("."),
        }
    }

    /// Directory whose Dockerfile is scanned for base-image registries
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    /// Replace the base-image scanner
    pub fn with_scanner(mut self, scanner: Box<dyn BaseImageScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    /// Build and push the image for `target`
    pub async fn run(
        &self,
        params: &RawParameters,
        target: &ReleaseTarget,
    ) -> ReleaseResult<ReleaseMetadata> {
        let plan = resolve(params, &target.build_id)?;
        debug!("Resolved build plan: {:?}", plan);

        self.narrator.step("Getting ECR auth token...");
        let token = self.auth.authorization_token().await?;
        let credential = decode_token(&token, &target.repository)?;

        self.narrator
            .step("Authenticating docker client to ECR repository...");
        let login = DockerLogin::new(self.runner, self.narrator);
        login.login(&credential).await?;

        let image = target.image();

        let logins = scan_and_authenticate(
            &self.workdir,
            self.scanner.as_ref(),
            self.resolver,
            &login,
            self.narrator,
        )
        .await?;
        debug!("Logged in to {} base image registries", logins);

        self.narrator.step("Building docker image...");
        if plan.multi_platform {
            self.build_multi_platform(&plan, &image).await?;
        } else {
            self.build(&plan, &image).await?;
        }

        info!("Released {}", image);
        Ok(ReleaseMetadata::new(&image, &plan))
    }

    async fn build(&self, plan: &BuildPlan, image: &ImageReference) -> ReleaseResult<()> {
        if plan.uses_cache() {
            warn!("Cache directives are only forwarded to buildx builds");
        }

        self.exec(&docker::build_args(plan, image)).await?;

        self.narrator.step("Pushing docker image...");
        self.exec(&docker::push_args(image)).await
    }

    async fn build_multi_platform(
        &self,
        plan: &BuildPlan,
        image: &ImageReference,
    ) -> ReleaseResult<()> {
        if plan.uses_cache() && !self.resolver.env().github_cache_configured() {
            self.narrator.notice(&[
                "Github authentication parameter(s) missing, gha cache won't be used.",
            ]);
        }

        self.exec(&docker::binfmt_install_args()).await?;
        self.exec(&docker::buildx_create_args()).await?;
        self.exec(&docker::buildx_build_args(plan, image)).await
    }

    async fn exec(&self, args: &[String]) -> ReleaseResult<()> {
        self.narrator.command(DOCKER, args);
        self.runner.run(DOCKER, args).await
    }
}
