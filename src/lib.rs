//! ecr-release - container image release step
//!
//! Builds a Docker image (plain or multi-platform with buildx), logs in
//! to ECR and to any registries the Dockerfile pulls base images from,
//! pushes the result and reports the image reference.

pub mod cli;
pub mod config;
pub mod credentials;
pub mod dockerfile;
pub mod error;
pub mod metadata;
pub mod orchestration;
pub mod ui;

pub use error::{ReleaseError, ReleaseResult};
