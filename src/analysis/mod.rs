//! Assembly of a parametric calibration analysis from a local workflow file.
//!
//! An [`Analysis`] is built from an OSW workflow, then measures are looked up by name to have
//! their arguments overridden or turned into variables, outputs are registered, and the
//! result is serialized to `analysis.json` and packaged into a zip for remote execution.

pub mod config;
pub mod measure;
mod package;
pub mod workflow;

use crate::analysis::measure::Measure;
use crate::analysis::workflow::Workflow;
use crate::errors::AnalysisError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_ANALYSIS_TYPE: &str = "single_run";
const FILE_FORMAT_VERSION: u32 = 1;

/// An output field reported by each simulated data point.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct OutputDefinition {
    pub display_name: String,
    pub name: String,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub objective_function: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective_function_group: Option<u32>,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub objective_function_index: Option<usize>,
}

impl OutputDefinition {
    pub fn new(display_name: &str, name: &str, units: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            name: name.to_string(),
            units: units.to_string(),
            objective_function: false,
            objective_function_group: None,
            objective_function_index: None,
        }
    }

    pub fn objective(mut self, group: Option<u32>) -> Self {
        self.objective_function = true;
        self.objective_function_group = group;
        self
    }
}

/// The ordered measure steps of an analysis, addressable by their unique names.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnalysisWorkflow {
    measures: Vec<Measure>,
}

impl AnalysisWorkflow {
    /// Builds measures from workflow steps. A step whose name is already taken gets a
    /// `_2`, `_3`, ... suffix, so repeated uses of one measure stay addressable.
    fn from_workflow(workflow: &Workflow) -> Self {
        let mut measures: Vec<Measure> = vec![];
        for step in &workflow.steps {
            let base = step.base_name();
            let mut name = base.to_string();
            let mut suffix = 1;
            while measures.iter().any(|measure| measure.name() == name) {
                suffix += 1;
                name = format!("{base}_{suffix}");
            }
            measures.push(Measure::from_step(name, step));
        }
        Self { measures }
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    pub fn find_measure(&mut self, name: &str) -> Result<&mut Measure, AnalysisError> {
        self.measures
            .iter_mut()
            .find(|measure| measure.name() == name)
            .ok_or_else(|| AnalysisError::UnknownMeasure(name.to_string()))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptType {
    #[default]
    Initialization,
    Finalization,
}

impl ScriptType {
    fn file_stem(&self) -> &'static str {
        match self {
            ScriptType::Initialization => "initialize",
            ScriptType::Finalization => "finalize",
        }
    }
}

/// Whether a server script runs around each data point or around the whole analysis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptScope {
    #[default]
    DataPoint,
    Analysis,
}

impl ScriptScope {
    fn directory(&self) -> &'static str {
        match self {
            ScriptScope::DataPoint => "data_point",
            ScriptScope::Analysis => "analysis",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServerScript {
    pub file: PathBuf,
    pub arguments: Vec<String>,
    pub script_type: ScriptType,
    pub scope: ScriptScope,
}

/// Scripts run on the server, at most one per type and scope.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ServerScripts {
    scripts: IndexMap<(ScriptScope, ScriptType), ServerScript>,
}

impl ServerScripts {
    pub fn add(
        &mut self,
        file: impl Into<PathBuf>,
        arguments: Vec<String>,
        script_type: ScriptType,
        scope: ScriptScope,
    ) -> &mut Self {
        let script = ServerScript {
            file: file.into(),
            arguments,
            script_type,
            scope,
        };
        if let Some(replaced) = self.scripts.insert((scope, script_type), script) {
            warn!(
                "replacing {:?} {:?} script {}",
                scope,
                script_type,
                replaced.file.display()
            );
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServerScript> {
        self.scripts.values()
    }
}

/// A directory of supporting data uploaded alongside the analysis.
#[derive(Clone, Debug, PartialEq)]
pub struct Library {
    pub path: PathBuf,
    pub library_name: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Libraries {
    libraries: Vec<Library>,
}

impl Libraries {
    /// Adds a library directory, replacing any earlier one registered under the same name.
    pub fn add(&mut self, path: impl Into<PathBuf>, library_name: &str) -> &mut Self {
        let library = Library {
            path: path.into(),
            library_name: library_name.to_string(),
        };
        match self
            .libraries
            .iter_mut()
            .find(|existing| existing.library_name == library_name)
        {
            Some(existing) => *existing = library,
            None => self.libraries.push(library),
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Library> {
        self.libraries.iter()
    }
}

/// Where files referenced by the workflow are searched for.
#[derive(Clone, Debug, Default, PartialEq)]
struct WorkflowLocation {
    directory: PathBuf,
    measure_paths: Vec<String>,
    file_paths: Vec<String>,
}

impl WorkflowLocation {
    fn find_file(&self, file_name: &str) -> Option<PathBuf> {
        self.file_paths
            .iter()
            .map(String::as_str)
            .chain(["", "files", "seeds", "weather"])
            .map(|dir| self.directory.join(dir).join(file_name))
            .find(|candidate| candidate.is_file())
    }

    fn find_measure_dir(&self, measure_dir_name: &str) -> Option<PathBuf> {
        self.measure_paths
            .iter()
            .map(String::as_str)
            .chain(["measures", "../measures"])
            .map(|dir| self.directory.join(dir).join(measure_dir_name))
            .find(|candidate| candidate.is_dir())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Analysis {
    display_name: String,
    name: String,
    pub analysis_type: String,
    pub workflow: AnalysisWorkflow,
    outputs: Vec<OutputDefinition>,
    pub server_scripts: ServerScripts,
    pub libraries: Libraries,
    seed_file: Option<String>,
    weather_file: Option<String>,
    location: Option<WorkflowLocation>,
}

impl Analysis {
    pub fn create(display_name: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            name: snake_case(display_name),
            analysis_type: DEFAULT_ANALYSIS_TYPE.to_string(),
            workflow: Default::default(),
            outputs: vec![],
            server_scripts: Default::default(),
            libraries: Default::default(),
            seed_file: None,
            weather_file: None,
            location: None,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn outputs(&self) -> &[OutputDefinition] {
        &self.outputs
    }

    /// Loads an OSW file, taking its steps as the analysis workflow.
    pub fn convert_osw(&mut self, osw_path: &Path) -> Result<(), AnalysisError> {
        let workflow = Workflow::from_path(osw_path)?;
        let directory = osw_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        self.convert_workflow(&workflow, Some(directory));
        Ok(())
    }

    /// Takes the steps of an already parsed workflow. `directory` is where the workflow's
    /// relative paths are resolved from when packaging.
    pub fn convert_workflow(&mut self, workflow: &Workflow, directory: Option<PathBuf>) {
        self.workflow = AnalysisWorkflow::from_workflow(workflow);
        self.seed_file = workflow.seed_file.clone();
        self.weather_file = workflow.weather_file.clone();
        self.location = directory.map(|directory| WorkflowLocation {
            directory,
            measure_paths: workflow.measure_paths.clone(),
            file_paths: workflow.file_paths.clone(),
        });
        debug!(
            "converted workflow with {} measures",
            self.workflow.measures().len()
        );
    }

    /// Registers an output. Objective functions are indexed in the order they are added and
    /// default to a group of their own.
    pub fn add_output(&mut self, mut output: OutputDefinition) -> Result<(), AnalysisError> {
        if self.outputs.iter().any(|existing| existing.name == output.name) {
            return Err(AnalysisError::DuplicateOutput(output.name));
        }

        if output.objective_function {
            let index = self
                .outputs
                .iter()
                .filter(|existing| existing.objective_function)
                .count();
            output.objective_function_index = Some(index);
            output.objective_function_group.get_or_insert(index as u32 + 1);
        } else {
            output.objective_function_index = None;
            output.objective_function_group = None;
        }

        self.outputs.push(output);
        Ok(())
    }

    pub fn to_json(&self) -> Value {
        let objective_functions = self
            .outputs
            .iter()
            .filter(|output| output.objective_function)
            .map(|output| output.name.as_str())
            .collect::<Vec<_>>();
        let workflow = self
            .workflow
            .measures()
            .iter()
            .enumerate()
            .map(|(index, measure)| measure.to_json(index))
            .collect::<Vec<_>>();

        json!({
            "analysis": {
                "display_name": self.display_name,
                "name": self.name,
                "output_variables": self.outputs,
                "problem": {
                    "analysis_type": self.analysis_type,
                    "algorithm": {
                        "objective_functions": objective_functions,
                    },
                    "workflow": workflow,
                },
                "seed": self.seed_file.as_deref().map(|file| json!({
                    "file_type": "OSM",
                    "path": format!("./seed/{}", file_name(file)),
                })),
                "weather_file": self.weather_file.as_deref().map(|file| json!({
                    "file_type": "EPW",
                    "path": format!("./weather/{}", file_name(file)),
                })),
                "file_format_version": FILE_FORMAT_VERSION,
            }
        })
    }

    pub fn save_json(&self, path: &Path) -> Result<(), AnalysisError> {
        let json = serde_json::to_string_pretty(&self.to_json())
            .map_err(|e| AnalysisError::Packaging(e.into()))?;
        fs::write(path, json).map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

fn snake_case(display_name: &str) -> String {
    display_name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}
