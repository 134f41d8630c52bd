use crate::errors::AnalysisError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// An OpenStudio workflow (OSW) file.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Workflow {
    pub seed_file: Option<String>,
    pub weather_file: Option<String>,
    #[serde(default)]
    pub measure_paths: Vec<String>,
    #[serde(default)]
    pub file_paths: Vec<String>,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    #[serde(flatten)]
    pub other: IndexMap<String, Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WorkflowStep {
    pub measure_dir_name: String,
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: IndexMap<String, Value>,
    #[serde(flatten)]
    pub other: IndexMap<String, Value>,
}

impl Workflow {
    pub fn from_reader(json: impl Read) -> Result<Self, AnalysisError> {
        Ok(serde_json::from_reader(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, AnalysisError> {
        let file = File::open(path).map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file))
    }
}

impl WorkflowStep {
    /// The identifier the step is known by before uniqueness suffixes are applied.
    pub fn base_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.measure_dir_name)
    }
}
