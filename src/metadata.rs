//! Release metadata handed back to the pipeline

use crate::config::{BuildPlan, ImageReference};
use crate::error::{ReleaseError, ReleaseResult};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Default location the pipeline reads release metadata from
pub const DEFAULT_METADATA_PATH: &str = "/release-metadata.json";

/// The pushed image and the effective build plan
///
/// Values are all strings because the pipeline stores release metadata
/// as a flat string map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseMetadata {
    pub image: String,
    #[serde(serialize_with = "bool_as_string")]
    pub buildx: bool,
    pub platforms: String,
}

impl ReleaseMetadata {
    pub fn new(image: &ImageReference, plan: &BuildPlan) -> Self {
        Self {
            image: image.to_string(),
            buildx: plan.multi_platform,
            platforms: plan.platforms.clone(),
        }
    }

    pub fn to_json(&self) -> ReleaseResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Write the metadata file
    pub async fn write(&self, path: &Path) -> ReleaseResult<()> {
        let json = self.to_json()?;
        tokio::fs::write(path, json).await.map_err(|e| {
            ReleaseError::io(
                format!("writing release metadata to {}", path.display()),
                e,
            )
        })?;

        info!("Release metadata written to {}", path.display());
        Ok(())
    }
}

fn bool_as_string<S: serde::Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "true" } else { "false" })
}
