//! Error types for ecr-release
//!
//! All modules use `ReleaseResult<T>` as their return type.

use thiserror::Error;

/// Result type alias for release operations
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// All errors that can occur during a release
#[derive(Error, Debug)]
pub enum ReleaseError {
    // Configuration errors
    #[error("unexpected type for build.{build_id}.params.{key}: {actual} (should be {expected})")]
    InvalidParameterType {
        build_id: String,
        key: String,
        actual: &'static str,
        expected: &'static str,
    },

    #[error("currently only gha cache type supported, got: {0}")]
    UnsupportedCacheBackend(String),

    #[error("Invalid release parameters: {0}")]
    InvalidParameters(String),

    #[error("Required setting not provided: --{flag} (or {env})")]
    MissingSetting {
        flag: &'static str,
        env: &'static str,
    },

    // Authentication service errors
    #[error("ECR authorization failed: {0}")]
    EcrAuth(String),

    #[error("Malformed ECR authorization token: {0}")]
    MalformedToken(String),

    // External command errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command exited with non-zero status: {command}, exit code: {code}")]
    CommandStatus { command: String, code: i32 },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReleaseError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Whether the error comes from the caller's build parameters
    /// rather than from the environment or an external command
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameterType { .. }
                | Self::UnsupportedCacheBackend(_)
                | Self::InvalidParameters(_)
                | Self::MissingSetting { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::UnsupportedCacheBackend(_) => {
                Some("Use a cache directive such as: type=gha,scope=my-image")
            }
            Self::InvalidParameters(_) => Some("RELEASE_PARAMS must be a JSON object"),
            Self::EcrAuth(_) => Some("Check the AWS credentials available to the release step"),
            Self::CommandFailed { .. } => Some("Make sure docker and aws are installed and on PATH"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_type_display() {
        let err = ReleaseError::InvalidParameterType {
            build_id: "release".to_string(),
            key: "dockerfile".to_string(),
            actual: "number",
            expected: "string",
        };
        assert_eq!(
            err.to_string(),
            "unexpected type for build.release.params.dockerfile: number (should be string)"
        );
    }

    #[test]
    fn error_hint() {
        let err = ReleaseError::UnsupportedCacheBackend("type=local".to_string());
        assert!(err.hint().unwrap().contains("type=gha"));
        assert_eq!(ReleaseError::MalformedToken("x".to_string()).hint(), None);
    }

    #[test]
    fn config_error_classification() {
        assert!(ReleaseError::UnsupportedCacheBackend("type=s3".to_string()).is_config_error());
        assert!(!ReleaseError::EcrAuth("denied".to_string()).is_config_error());
        assert!(!ReleaseError::CommandStatus {
            command: "docker push".to_string(),
            code: 1
        }
        .is_config_error());
    }
}
