//! Release configuration
//!
//! Raw build parameters arrive as a JSON object from the pipeline's
//! config container. They are resolved once into a [`BuildPlan`] and
//! then discarded.

pub mod plan;

pub use plan::{resolve, BuildPlan, CacheBackend};

use crate::error::{ReleaseError, ReleaseResult};
use serde_json::{Map, Value};
use std::fmt;

/// Untyped build parameters as supplied by the caller
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawParameters(Map<String, Value>);

impl RawParameters {
    /// Decode parameters from a JSON document
    ///
    /// A blank document or JSON `null` yields an empty parameter map.
    /// Anything other than an object is rejected.
    pub fn from_json(json: &str) -> ReleaseResult<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }

        let value: Value = serde_json::from_str(json)
            .map_err(|e| ReleaseError::InvalidParameters(e.to_string()))?;

        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(ReleaseError::InvalidParameters(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Look up a parameter by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for RawParameters {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Human-readable name of a JSON value's type, used in validation messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Identifies the image one run produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTarget {
    /// Primary registry repository, e.g. `123.dkr.ecr.eu-west-1.amazonaws.com/app`
    pub repository: String,
    pub build_id: String,
    pub version: String,
}

impl ReleaseTarget {
    pub fn new(
        repository: impl Into<String>,
        build_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            build_id: build_id.into(),
            version: version.into(),
        }
    }

    /// The image reference this release builds and pushes
    pub fn image(&self) -> ImageReference {
        ImageReference {
            repository: self.repository.clone(),
            tag: format!("{}-{}", self.build_id, self.version),
        }
    }
}

/// `repository:tag` where the tag is `<build id>-<version>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    repository: String,
    tag: String,
}

impl ImageReference {
    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_params_are_empty() {
        assert!(RawParameters::from_json("").unwrap().is_empty());
        assert!(RawParameters::from_json("  \n").unwrap().is_empty());
        assert!(RawParameters::from_json("null").unwrap().is_empty());
    }

    #[test]
    fn params_object_decodes() {
        let params = RawParameters::from_json(r#"{"dockerfile": "test1.Dockerfile"}"#).unwrap();
        assert_eq!(
            params.get("dockerfile"),
            Some(&Value::String("test1.Dockerfile".to_string()))
        );
    }

    #[test]
    fn malformed_params_rejected() {
        let err = RawParameters::from_json("{not json").unwrap_err();
        assert!(matches!(err, ReleaseError::InvalidParameters(_)));
    }

    #[test]
    fn non_object_params_rejected() {
        let err = RawParameters::from_json(r#"["a"]"#).unwrap_err();
        assert!(err.to_string().contains("expected a JSON object, got array"));
    }

    #[test]
    fn image_reference_format() {
        let target = ReleaseTarget::new("test-repository", "test-build-id", "test-version");
        let image = target.image();
        assert_eq!(image.to_string(), "test-repository:test-build-id-test-version");
        assert_eq!(image.repository(), "test-repository");
        assert_eq!(image.tag(), "test-build-id-test-version");
    }
}
