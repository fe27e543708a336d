//! Build plan resolution
//!
//! Turns the loosely-typed parameter map into a validated [`BuildPlan`].
//! Unknown keys are ignored so newer pipelines can pass options this
//! release step does not understand yet.

use super::{json_type_name, RawParameters};
use crate::error::{ReleaseError, ReleaseResult};
use serde_json::Value;

const DEFAULT_DOCKERFILE: &str = "Dockerfile";
const DEFAULT_CONTEXT: &str = ".";

/// Cache backends the build tool can be pointed at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    /// GitHub Actions cache service
    Gha,
}

impl CacheBackend {
    /// Marker a cache directive must contain to select this backend
    pub fn marker(&self) -> &'static str {
        match self {
            CacheBackend::Gha => "type=gha",
        }
    }

    /// Detect the backend named by a cache directive
    pub fn from_directive(directive: &str) -> Option<Self> {
        [CacheBackend::Gha]
            .into_iter()
            .find(|backend| directive.contains(backend.marker()))
    }
}

/// Validated configuration for one build invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub dockerfile: String,
    pub context: String,
    /// Build with buildx for several platforms and push from the build
    pub multi_platform: bool,
    /// Comma-separated platform list; empty means the host default
    pub platforms: String,
    pub cache_from: Option<String>,
    pub cache_to: Option<String>,
    pub secrets: Vec<String>,
}

impl Default for BuildPlan {
    fn default() -> Self {
        Self {
            dockerfile: DEFAULT_DOCKERFILE.to_string(),
            context: DEFAULT_CONTEXT.to_string(),
            multi_platform: false,
            platforms: String::new(),
            cache_from: None,
            cache_to: None,
            secrets: Vec::new(),
        }
    }
}

impl BuildPlan {
    /// Whether any cache directive is forwarded to the build
    pub fn uses_cache(&self) -> bool {
        self.cache_from.is_some() || self.cache_to.is_some()
    }
}

/// Resolve raw parameters into a build plan for `build_id`
pub fn resolve(params: &RawParameters, build_id: &str) -> ReleaseResult<BuildPlan> {
    let reader = ParamReader { params, build_id };
    let mut plan = BuildPlan::default();

    if let Some(dockerfile) = reader.string("dockerfile")? {
        plan.dockerfile = dockerfile;
    }
    if let Some(context) = reader.string("context")? {
        plan.context = context;
    }
    if let Some(buildx) = reader.boolean("buildx")? {
        plan.multi_platform = buildx;
    }
    if let Some(platforms) = reader.string("platforms")? {
        plan.platforms = platforms;
    }
    plan.cache_from = reader.string("cache-from")?.filter(|s| !s.is_empty());
    plan.cache_to = reader.string("cache-to")?.filter(|s| !s.is_empty());
    if let Some(secrets) = reader.strings("secrets")? {
        plan.secrets = secrets;
    }

    for directive in [&plan.cache_from, &plan.cache_to].into_iter().flatten() {
        if CacheBackend::from_directive(directive).is_none() {
            return Err(ReleaseError::UnsupportedCacheBackend(directive.clone()));
        }
    }

    Ok(plan)
}

struct ParamReader<'a> {
    params: &'a RawParameters,
    build_id: &'a str,
}

impl ParamReader<'_> {
    fn string(&self, key: &str) -> ReleaseResult<Option<String>> {
        match self.params.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.type_error(key, other, "string")),
        }
    }

    fn boolean(&self, key: &str) -> ReleaseResult<Option<bool>> {
        match self.params.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.type_error(key, other, "bool")),
        }
    }

    fn strings(&self, key: &str) -> ReleaseResult<Option<Vec<String>>> {
        let items = match self.params.get(key) {
            None => return Ok(None),
            Some(Value::Array(items)) => items,
            Some(other) => return Err(self.type_error(key, other, "array of strings")),
        };

        items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(self.type_error(&format!("{}[{}]", key, i), other, "string")),
            })
            .collect::<ReleaseResult<Vec<_>>>()
            .map(Some)
    }

    fn type_error(&self, key: &str, actual: &Value, expected: &'static str) -> ReleaseError {
        ReleaseError::InvalidParameterType {
            build_id: self.build_id.to_string(),
            key: key.to_string(),
            actual: json_type_name(actual),
            expected,
        }
    }
}
