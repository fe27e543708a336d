//! Docker command lines
//!
//! Builders for every docker invocation a release makes, plus the login
//! primitive shared by the primary registry and base-image registries.

use crate::config::{BuildPlan, ImageReference};
use crate::credentials::RegistryCredential;
use crate::dockerfile::RegistryLogin;
use crate::error::ReleaseResult;
use crate::orchestration::runner::CommandRunner;
use crate::ui::Narrator;
use async_trait::async_trait;

pub const DOCKER: &str = "docker";

/// Image that registers QEMU handlers for cross-platform builds
const BINFMT_IMAGE: &str = "tonistiigi/binfmt";

/// Name of the buildx builder created for multi-platform builds
const BUILDER_NAME: &str = "container";

fn strings<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.into_iter().map(String::from).collect()
}

/// `docker login -u <user> --password-stdin <registry>`
pub fn login_args(username: &str, registry: &str) -> Vec<String> {
    strings(["login", "-u", username, "--password-stdin", registry])
}

/// Single-architecture `docker build`
pub fn build_args(plan: &BuildPlan, image: &ImageReference) -> Vec<String> {
    let mut args = strings([
        "build",
        "-f",
        plan.dockerfile.as_str(),
        "-t",
        image.to_string().as_str(),
    ]);
    for secret in &plan.secrets {
        args.push("--secret".to_string());
        args.push(secret.clone());
    }
    args.push(plan.context.clone());
    args
}

/// `docker push <image>`
pub fn push_args(image: &ImageReference) -> Vec<String> {
    strings(["push", image.to_string().as_str()])
}

/// Install emulators for every platform buildx may target
pub fn binfmt_install_args() -> Vec<String> {
    strings(["run", "--privileged", "--rm", BINFMT_IMAGE, "--install", "all"])
}

/// Create and select a container-driver builder
pub fn buildx_create_args() -> Vec<String> {
    strings([
        "buildx",
        "create",
        "--bootstrap",
        "--use",
        "--name",
        BUILDER_NAME,
        "--driver",
        "docker-container",
    ])
}

/// Multi-platform `docker buildx build --push`
pub fn buildx_build_args(plan: &BuildPlan, image: &ImageReference) -> Vec<String> {
    let mut args = strings(["buildx", "build", "--push"]);

    if !plan.platforms.is_empty() {
        args.push("--platform".to_string());
        args.push(plan.platforms.clone());
    }
    if let Some(cache_from) = &plan.cache_from {
        args.push("--cache-from".to_string());
        args.push(cache_from.clone());
    }
    if let Some(cache_to) = &plan.cache_to {
        args.push("--cache-to".to_string());
        args.push(cache_to.clone());
    }
    for secret in &plan.secrets {
        args.push("--secret".to_string());
        args.push(secret.clone());
    }

    args.extend(strings([
        "-f",
        plan.dockerfile.as_str(),
        "-t",
        image.to_string().as_str(),
    ]));
    args.push(plan.context.clone());
    args
}

/// Logs in with `docker login`, passing the password on stdin
pub struct DockerLogin<'a> {
    runner: &'a dyn CommandRunner,
    narrator: &'a Narrator,
}

impl<'a> DockerLogin<'a> {
    pub fn new(runner: &'a dyn CommandRunner, narrator: &'a Narrator) -> Self {
        Self { runner, narrator }
    }
}

#[async_trait]
impl RegistryLogin for DockerLogin<'_> {
    async fn login(&self, credential: &RegistryCredential) -> ReleaseResult<()> {
        let args = login_args(&credential.username, &credential.registry_host);
        self.narrator.command(DOCKER, &args);
        self.runner
            .run_with_input(&credential.password, DOCKER, &args)
            .await
    }
}
