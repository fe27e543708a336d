//! Base-image registry discovery
//!
//! Finds the images a Dockerfile builds from and logs in to their
//! registries before the build so private base images can be pulled.
//! This is a line matcher for top-level `FROM` instructions, not a
//! Dockerfile parser.

use crate::credentials::{CredentialResolver, RegistryCredential};
use crate::error::ReleaseResult;
use crate::ui::Narrator;
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Pseudo-image meaning "no base image"
pub const NO_BASE_IMAGE: &str = "scratch";

/// Extracts base image references from Dockerfile contents
pub trait BaseImageScanner: Send + Sync {
    /// Every base image in file order, duplicates included
    fn base_images(&self, dockerfile: &str) -> Vec<String>;
}

/// Matches lines of the form `FROM <image>` (case-insensitive)
#[derive(Debug, Clone, Copy, Default)]
pub struct FromLineScanner;

impl FromLineScanner {
    fn pattern() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(r"(?i)^\s*FROM[ \f\r\t\v]+([^ \f\r\t\v\n#]+)")
                .expect("FROM pattern is valid")
        })
    }
}

impl BaseImageScanner for FromLineScanner {
    fn base_images(&self, dockerfile: &str) -> Vec<String> {
        dockerfile
            .lines()
            .filter_map(|line| Self::pattern().captures(line))
            .filter_map(|captures| captures.get(1).map(|m| m.as_str()))
            .filter(|image| *image != NO_BASE_IMAGE)
            .map(String::from)
            .collect()
    }
}

/// Performs a registry login
#[async_trait]
pub trait RegistryLogin: Send + Sync {
    async fn login(&self, credential: &RegistryCredential) -> ReleaseResult<()>;
}

/// Log in to the registry of every base image in `<workdir>/Dockerfile`
///
/// Logs in once per matching `FROM` line, so a registry referenced twice
/// is logged in to twice. A missing or unreadable Dockerfile is not an
/// error here; the build step reports it. Returns the number of logins.
pub async fn scan_and_authenticate(
    workdir: &Path,
    scanner: &dyn BaseImageScanner,
    resolver: &CredentialResolver,
    login: &dyn RegistryLogin,
    narrator: &Narrator,
) -> ReleaseResult<usize> {
    let path = workdir.join("Dockerfile");
    let contents = match tokio::fs::read(&path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!("Unable to read {}: {}", path.display(), e);
            return Ok(0);
        }
    };

    let mut logins = 0;
    for image in scanner.base_images(&contents) {
        debug!("Found base image: {}", image);
        let credential = resolver.resolve(&image);

        if credential.is_present() {
            narrator.step(&format!(
                "Found credentials for registry {}. Attempting to login...",
                credential.registry_host
            ));
            login.login(&credential).await?;
            logins += 1;
        } else {
            let heading = format!(
                "- Auth credentials not found for registry '{}'.",
                credential.registry_host
            );
            narrator.notice(&[
                heading.as_str(),
                "Access to this registry will be without auth.",
                "Set the appropriate environment variables if auth is required.",
            ]);
        }
    }

    Ok(logins)
}
