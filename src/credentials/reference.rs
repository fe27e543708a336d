//! Strict parsing of normalized image references
//!
//! Follows the distribution reference grammar: short names such as
//! `ubuntu` normalize to `docker.io/library/ubuntu`, and the first path
//! segment is only treated as a registry host when it looks like one
//! (contains `.` or `:`, or is `localhost`).

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Registry host implied when a reference names no registry
pub const DEFAULT_DOMAIN: &str = "docker.io";

/// Historical index host, normalized to [`DEFAULT_DOMAIN`]
pub const LEGACY_DEFAULT_DOMAIN: &str = "index.docker.io";

const NAME_TOTAL_LENGTH_MAX: usize = 255;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("repository name must have at least one component")]
    NameEmpty,

    #[error("repository name must be lowercase")]
    NameNotCanonical,

    #[error("repository name must not be more than {NAME_TOTAL_LENGTH_MAX} characters")]
    NameTooLong,

    #[error("invalid repository name ({0}), cannot specify 64-byte hexadecimal strings")]
    AmbiguousIdentifier(String),

    #[error("invalid reference format: {0}")]
    InvalidFormat(String),
}

/// A fully-qualified named reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedReference {
    domain: String,
    path: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl NamedReference {
    /// Registry host, including port when present
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Repository path within the registry
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }
}

/// Parse a possibly-short image reference into its normalized form
pub fn parse_normalized(reference: &str) -> Result<NamedReference, ReferenceError> {
    if identifier_regex().is_match(reference) {
        return Err(ReferenceError::AmbiguousIdentifier(reference.to_string()));
    }

    let (domain, remainder) = split_domain(reference);

    // Only the name may be checked here; tags are allowed to contain capitals.
    let name = remainder
        .split_once(['@', ':'])
        .map(|(name, _)| name)
        .unwrap_or(&remainder);
    if name.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(ReferenceError::NameNotCanonical);
    }

    parse(&format!("{}/{}", domain, remainder))
}

fn split_domain(name: &str) -> (String, String) {
    let (mut domain, mut remainder) = match name.split_once('/') {
        Some((first, rest))
            if first.contains(['.', ':'])
                || first == "localhost"
                || first.chars().any(|c| c.is_ascii_uppercase()) =>
        {
            (first.to_string(), rest.to_string())
        }
        _ => (DEFAULT_DOMAIN.to_string(), name.to_string()),
    };

    if domain == LEGACY_DEFAULT_DOMAIN {
        domain = DEFAULT_DOMAIN.to_string();
    }
    if domain == DEFAULT_DOMAIN && !remainder.contains('/') {
        remainder = format!("library/{}", remainder);
    }

    (domain, remainder)
}

fn parse(reference: &str) -> Result<NamedReference, ReferenceError> {
    let captures = reference_regex()
        .captures(reference)
        .ok_or_else(|| match reference {
            "" => ReferenceError::NameEmpty,
            _ => ReferenceError::InvalidFormat(reference.to_string()),
        })?;

    let name = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
    if name.is_empty() {
        return Err(ReferenceError::NameEmpty);
    }
    if name.len() > NAME_TOTAL_LENGTH_MAX {
        return Err(ReferenceError::NameTooLong);
    }

    let name_parts = anchored_name_regex()
        .captures(name)
        .ok_or_else(|| ReferenceError::InvalidFormat(reference.to_string()))?;

    Ok(NamedReference {
        domain: name_parts
            .get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        path: name_parts
            .get(2)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        tag: captures.get(2).map(|m| m.as_str().to_string()),
        digest: captures.get(3).map(|m| m.as_str().to_string()),
    })
}

const PATH_COMPONENT: &str = r"[a-z0-9]+(?:(?:[._]|__|[-]+)[a-z0-9]+)*";
const DOMAIN_AND_PORT: &str = r"(?:(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])(?:\.(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9]))*|\[[a-fA-F0-9:]+\])(?::[0-9]+)?";
const TAG: &str = r"[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}";
const DIGEST: &str = r"[A-Za-z][A-Za-z0-9]*(?:[-_+.][A-Za-z][A-Za-z0-9]*)*:[0-9a-fA-F]{32,}";

fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let name = format!(
            "(?:{domain}/)?{path}(?:/{path})*",
            domain = DOMAIN_AND_PORT,
            path = PATH_COMPONENT
        );
        Regex::new(&format!("^({name})(?::({TAG}))?(?:@({DIGEST}))?$"))
            .expect("reference pattern is valid")
    })
}

fn anchored_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            "^(?:({domain})/)?({path}(?:/{path})*)$",
            domain = DOMAIN_AND_PORT,
            path = PATH_COMPONENT
        ))
        .expect("name pattern is valid")
    })
}

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("^[a-f0-9]{64}$").expect("identifier pattern is valid"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_registry_host() {
        let named = parse_normalized("gcr.io/foo/bar").unwrap();
        assert_eq!(named.domain(), "gcr.io");
        assert_eq!(named.path(), "foo/bar");
        assert_eq!(named.tag(), None);
    }

    #[test]
    fn short_name_normalizes_to_docker_hub() {
        let named = parse_normalized("ubuntu:22.04").unwrap();
        assert_eq!(named.domain(), DEFAULT_DOMAIN);
        assert_eq!(named.path(), "library/ubuntu");
        assert_eq!(named.tag(), Some("22.04"));

        let named = parse_normalized("grafana/grafana").unwrap();
        assert_eq!(named.domain(), DEFAULT_DOMAIN);
        assert_eq!(named.path(), "grafana/grafana");
    }

    #[test]
    fn nested_path_without_host_stays_on_docker_hub() {
        let named = parse_normalized("team/group/app").unwrap();
        assert_eq!(named.domain(), DEFAULT_DOMAIN);
        assert_eq!(named.path(), "team/group/app");
    }

    #[test]
    fn host_with_port_and_localhost() {
        let named = parse_normalized("my.registry.io:5000/team/app:1.0").unwrap();
        assert_eq!(named.domain(), "my.registry.io:5000");
        assert_eq!(named.tag(), Some("1.0"));

        let named = parse_normalized("localhost/app").unwrap();
        assert_eq!(named.domain(), "localhost");
    }

    #[test]
    fn legacy_index_host_normalized() {
        let named = parse_normalized("index.docker.io/library/alpine").unwrap();
        assert_eq!(named.domain(), DEFAULT_DOMAIN);
    }

    #[test]
    fn digest_reference() {
        let digest = format!("sha256:{}", "a".repeat(64));
        let named = parse_normalized(&format!("quay.io/org/app@{}", digest)).unwrap();
        assert_eq!(named.domain(), "quay.io");
        assert_eq!(named.digest(), Some(digest.as_str()));
    }

    #[test]
    fn uppercase_repository_rejected() {
        assert_eq!(
            parse_normalized("gcr.io/Foo/bar"),
            Err(ReferenceError::NameNotCanonical)
        );
    }

    #[test]
    fn uppercase_tag_accepted() {
        let named = parse_normalized("gcr.io/foo/bar:Release-1").unwrap();
        assert_eq!(named.tag(), Some("Release-1"));
    }

    #[test]
    fn build_arg_placeholder_rejected() {
        assert!(matches!(
            parse_normalized("${base_image}"),
            Err(ReferenceError::InvalidFormat(_))
        ));
        assert!(parse_normalized("${BASE_IMAGE}").is_err());
    }

    #[test]
    fn bare_identifier_rejected() {
        assert!(matches!(
            parse_normalized(&"f".repeat(64)),
            Err(ReferenceError::AmbiguousIdentifier(_))
        ));
    }

    #[test]
    fn overlong_name_rejected() {
        let long = format!("gcr.io/{}", "a".repeat(300));
        assert_eq!(parse_normalized(&long), Err(ReferenceError::NameTooLong));
    }
}
