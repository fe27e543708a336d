//! Release orchestration
//!
//! Sequences the external commands that turn a build plan into a pushed
//! image:
//! - single-architecture: `docker build` then `docker push`
//! - multi-platform: binfmt install, buildx builder, `buildx build --push`

pub mod docker;
mod release;
mod runner;

pub use docker::DockerLogin;
pub use release::Orchestrator;
pub use runner::{display_command, CommandRunner, ExecCommandRunner, OutputSink};
