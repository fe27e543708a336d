//! Registry credentials
//!
//! Credentials for base-image registries are supplied by the pipeline as
//! environment variables named after the registry host, e.g.
//! `CDFLOW2_DOCKER_AUTH_MY_REGISTRY_IO_5000_USERNAME`. The environment is
//! captured once into a [`RegistryEnv`] so lookups never touch process
//! state directly.

pub mod ecr;
pub mod reference;

pub use ecr::{decode_token, AwsCliEcr, RegistryAuthService};

use reference::LEGACY_DEFAULT_DOMAIN;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Prefix shared by all registry credential variables
pub const AUTH_ENV_PREFIX: &str = "CDFLOW2_DOCKER_AUTH_";

const GHA_CACHE_URL_VAR: &str = "ACTIONS_CACHE_URL";
const GHA_RUNTIME_TOKEN_VAR: &str = "ACTIONS_RUNTIME_TOKEN";

/// Read-only snapshot of the environment variables this release uses
#[derive(Debug, Clone, Default)]
pub struct RegistryEnv {
    vars: HashMap<String, String>,
}

impl RegistryEnv {
    /// Capture the relevant variables from the process environment
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    /// Build a snapshot from explicit key/value pairs
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _): &(String, String)| {
                k.starts_with(AUTH_ENV_PREFIX) || k == GHA_CACHE_URL_VAR || k == GHA_RUNTIME_TOKEN_VAR
            })
            .collect();
        Self { vars }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Whether the GitHub Actions cache service can be reached
    pub fn github_cache_configured(&self) -> bool {
        [GHA_CACHE_URL_VAR, GHA_RUNTIME_TOKEN_VAR]
            .iter()
            .all(|key| self.get(key).is_some_and(|v| !v.is_empty()))
    }
}

/// Login details for one registry
///
/// Either both username and password are set, or neither is.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredential {
    pub registry_host: String,
    pub username: String,
    pub password: String,
}

impl RegistryCredential {
    pub fn new(
        registry_host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let username = username.into();
        let password = password.into();
        if username.is_empty() || password.is_empty() {
            return Self::anonymous(registry_host);
        }
        Self {
            registry_host: registry_host.into(),
            username,
            password,
        }
    }

    /// A credential with no login details
    pub fn anonymous(registry_host: impl Into<String>) -> Self {
        Self {
            registry_host: registry_host.into(),
            username: String::new(),
            password: String::new(),
        }
    }

    pub fn is_present(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for RegistryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredential")
            .field("registry_host", &self.registry_host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Convert a registry host into the token used in variable names
///
/// `my.registry.io:5000` becomes `MY_REGISTRY_IO_5000`.
pub fn env_token(registry_host: &str) -> String {
    registry_host
        .chars()
        .map(|c| match c {
            '.' | ':' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Registry host guessed from the raw reference text
///
/// Used when the reference cannot be parsed strictly: a reference with
/// more than one `/` names its registry in the first segment.
pub fn legacy_registry_host(image: &str) -> String {
    if image.matches('/').count() > 1 {
        image
            .split('/')
            .next()
            .unwrap_or(LEGACY_DEFAULT_DOMAIN)
            .to_string()
    } else {
        LEGACY_DEFAULT_DOMAIN.to_string()
    }
}

/// Resolves image references to registry credentials
#[derive(Debug, Clone, Default)]
pub struct CredentialResolver {
    env: RegistryEnv,
}

impl CredentialResolver {
    pub fn new(env: RegistryEnv) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &RegistryEnv {
        &self.env
    }

    /// Determine the registry host an image reference pulls from
    pub fn registry_host(&self, image: &str) -> String {
        match reference::parse_normalized(image) {
            Ok(named) => named.domain().to_string(),
            Err(e) => {
                warn!(
                    "Unable to get registry credentials, fallback to legacy method: {}",
                    e
                );
                legacy_registry_host(image)
            }
        }
    }

    /// Resolve the credential for an image reference
    ///
    /// Never fails: an unparsable reference falls back to the legacy
    /// host heuristic and missing variables yield an anonymous credential.
    pub fn resolve(&self, image: &str) -> RegistryCredential {
        let host = self.registry_host(image);
        self.lookup(&host)
    }

    /// Look up the credential variables for a registry host
    pub fn lookup(&self, registry_host: &str) -> RegistryCredential {
        let token = env_token(registry_host);
        let username = self.env.get(&format!("{}{}_USERNAME", AUTH_ENV_PREFIX, token));
        let password = self.env.get(&format!("{}{}_PASSWORD", AUTH_ENV_PREFIX, token));

        debug!(
            "Credential lookup for {} (token {}): username {}, password {}",
            registry_host,
            token,
            if username.is_some() { "set" } else { "unset" },
            if password.is_some() { "set" } else { "unset" },
        );

        match (username, password) {
            (Some(username), Some(password)) => {
                RegistryCredential::new(registry_host, username, password)
            }
            _ => RegistryCredential::anonymous(registry_host),
        }
    }
}
