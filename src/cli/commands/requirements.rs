//! Requirements command - tell the pipeline what this step needs

use crate::error::ReleaseResult;
use serde::Serialize;

/// Capabilities requested from the pipeline
#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct Requirements {
    pub needs: Vec<&'static str>,
}

impl Default for Requirements {
    fn default() -> Self {
        Self { needs: vec!["ecr"] }
    }
}

/// Execute the requirements command
pub fn execute() -> ReleaseResult<()> {
    println!("{}", serde_json::to_string(&Requirements::default())?);
    Ok(())
}
