use crate::analysis::measure::Distribution;
use crate::analysis::{Analysis, OutputDefinition, ScriptScope, ScriptType, DEFAULT_ANALYSIS_TYPE};
use crate::errors::AnalysisError;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Settings applied on top of a converted workflow to make it a calibration analysis.
///
/// Relative paths are resolved against the directory the configuration was loaded from.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    pub display_name: String,
    #[serde(default = "default_analysis_type")]
    pub analysis_type: String,
    #[serde(default)]
    pub outputs: Vec<OutputDefinition>,
    #[serde(default)]
    pub measures: Vec<MeasureSettings>,
    #[serde(default)]
    pub server_scripts: Vec<ServerScriptSettings>,
    #[serde(default)]
    pub libraries: Vec<LibrarySettings>,
}

fn default_analysis_type() -> String {
    DEFAULT_ANALYSIS_TYPE.to_string()
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeasureSettings {
    pub measure: String,
    #[serde(default)]
    pub arguments: IndexMap<String, Value>,
    #[serde(default)]
    pub variables: Vec<VariableSettings>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableSettings {
    pub argument: String,
    pub display_name: String,
    pub distribution: Distribution,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerScriptSettings {
    pub file: PathBuf,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub script_type: ScriptType,
    #[serde(default)]
    pub scope: ScriptScope,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibrarySettings {
    pub path: PathBuf,
    pub library_name: String,
}

impl AnalysisConfig {
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

    /// Registers outputs, applies measure settings and attaches server scripts.
    ///
    /// The analysis type and libraries are left alone; see [`AnalysisConfig::finalize`].
    pub fn apply(&self, analysis: &mut Analysis, base_dir: &Path) -> Result<(), AnalysisError> {
        for output in &self.outputs {
            analysis.add_output(output.clone())?;
        }

        for settings in &self.measures {
            let measure = analysis.workflow.find_measure(&settings.measure)?;
            for (argument, value) in &settings.arguments {
                measure.argument_value(argument, value.clone());
            }
            for variable in &settings.variables {
                measure.make_variable(
                    &variable.argument,
                    &variable.display_name,
                    variable.distribution.clone(),
                )?;
            }
        }

        for script in &self.server_scripts {
            analysis.server_scripts.add(
                base_dir.join(&script.file),
                script.arguments.clone(),
                script.script_type,
                script.scope,
            );
        }

        Ok(())
    }

    /// Switches to the configured algorithm and attaches library directories, the settings
    /// that only matter to the server package.
    pub fn finalize(&self, analysis: &mut Analysis, base_dir: &Path) {
        analysis.analysis_type = self.analysis_type.clone();
        for library in &self.libraries {
            analysis
                .libraries
                .add(base_dir.join(&library.path), &library.library_name);
        }
    }
}
