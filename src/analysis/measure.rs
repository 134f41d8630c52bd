use crate::analysis::workflow::WorkflowStep;
use crate::errors::AnalysisError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionType {
    Uniform,
    Triangle,
    Normal,
    Lognormal,
}

/// Probability distribution attached to a measure argument that the algorithm may vary.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Distribution {
    #[serde(rename = "type")]
    pub distribution_type: DistributionType,
    pub minimum: f64,
    pub maximum: f64,
    pub mean: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_deviation: Option<f64>,
}

impl Distribution {
    pub fn uniform(minimum: f64, maximum: f64, mean: f64) -> Self {
        Self {
            distribution_type: DistributionType::Uniform,
            minimum,
            maximum,
            mean,
            standard_deviation: None,
        }
    }

    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    fn validate(&self, variable: &str) -> Result<(), AnalysisError> {
        let invalid = |reason: String| AnalysisError::InvalidDistribution {
            variable: variable.to_string(),
            reason,
        };

        if !(self.minimum <= self.maximum) {
            return Err(invalid(format!(
                "minimum {} is greater than maximum {}",
                self.minimum, self.maximum
            )));
        }
        if !(self.minimum <= self.mean && self.mean <= self.maximum) {
            return Err(invalid(format!(
                "mean {} lies outside [{}, {}]",
                self.mean, self.minimum, self.maximum
            )));
        }
        if matches!(
            self.distribution_type,
            DistributionType::Normal | DistributionType::Lognormal
        ) && !self.standard_deviation.is_some_and(|sd| sd > 0.)
        {
            return Err(invalid(
                "normal distributions need a positive standard_deviation".to_string(),
            ));
        }

        Ok(())
    }

    /// Distribution in the analysis file's `uncertainty_description` shape.
    pub(crate) fn uncertainty_description(&self) -> Value {
        let mut attributes = vec![
            json!({"name": "lower_bounds", "value": self.minimum}),
            json!({"name": "upper_bounds", "value": self.maximum}),
            json!({"name": "modes", "value": self.mean}),
        ];
        if let Some(standard_deviation) = self.standard_deviation {
            attributes.push(json!({"name": "stddev", "value": standard_deviation}));
        }

        json!({
            "type": self.distribution_type,
            "attributes": attributes,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Variable {
    pub argument: String,
    pub display_name: String,
    pub distribution: Distribution,
}

/// One measure step of the analysis workflow.
#[derive(Clone, Debug, PartialEq)]
pub struct Measure {
    name: String,
    measure_dir_name: String,
    arguments: IndexMap<String, Value>,
    variables: Vec<Variable>,
}

impl Measure {
    pub(crate) fn from_step(name: String, step: &WorkflowStep) -> Self {
        Self {
            name,
            measure_dir_name: step.measure_dir_name.clone(),
            arguments: step.arguments.clone(),
            variables: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn measure_dir_name(&self) -> &str {
        &self.measure_dir_name
    }

    pub fn arguments(&self) -> &IndexMap<String, Value> {
        &self.arguments
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Sets a static argument value, replacing whatever the workflow specified.
    pub fn argument_value(&mut self, argument: &str, value: impl Into<Value>) -> &mut Self {
        self.arguments.insert(argument.to_string(), value.into());
        self
    }

    /// Turns an argument into a variable the algorithm samples from `distribution`.
    ///
    /// Making the same argument a variable twice replaces the earlier definition.
    pub fn make_variable(
        &mut self,
        argument: &str,
        display_name: &str,
        distribution: Distribution,
    ) -> Result<&mut Self, AnalysisError> {
        distribution.validate(argument)?;

        let variable = Variable {
            argument: argument.to_string(),
            display_name: display_name.to_string(),
            distribution,
        };
        match self.variables.iter_mut().find(|v| v.argument == argument) {
            Some(existing) => *existing = variable,
            None => self.variables.push(variable),
        }

        Ok(self)
    }

    pub(crate) fn to_json(&self, workflow_index: usize) -> Value {
        let variable_arguments = self
            .variables
            .iter()
            .map(|variable| variable.argument.as_str())
            .collect::<Vec<_>>();
        let arguments = self
            .arguments
            .iter()
            .filter(|(name, _)| !variable_arguments.contains(&name.as_str()))
            .map(|(name, value)| json!({"name": name, "value": value}))
            .collect::<Vec<_>>();
        let variables = self
            .variables
            .iter()
            .map(|variable| {
                json!({
                    "argument": {"name": variable.argument},
                    "display_name": variable.display_name,
                    "variable_type": "variable",
                    "minimum": variable.distribution.minimum,
                    "maximum": variable.distribution.maximum,
                    "initial_value": variable.distribution.mean,
                    "uncertainty_description": variable.distribution.uncertainty_description(),
                })
            })
            .collect::<Vec<_>>();

        json!({
            "name": self.name,
            "display_name": self.name,
            "measure_definition_directory": format!("./measures/{}", self.measure_dir_name),
            "measure_definition_directory_local": self.measure_dir_name,
            "workflow_index": workflow_index,
            "arguments": arguments,
            "variables": variables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn measure() -> Measure {
        let step: WorkflowStep = serde_json::from_value(json!({
            "measure_dir_name": "general_calibration_measure_percent_change",
            "arguments": {"lights_perc_change": 0, "space_type": "*All SpaceTypes*"}
        }))
        .unwrap();
        Measure::from_step("general_calibration_measure_percent_change".into(), &step)
    }

    #[rstest]
    fn test_override_argument_values(mut measure: Measure) {
        measure
            .argument_value("space_type", "Office")
            .argument_value("new_argument", true);

        assert_eq!(measure.arguments()["space_type"], json!("Office"));
        assert_eq!(measure.arguments()["new_argument"], json!(true));
    }

    #[rstest]
    fn test_make_and_replace_variables(mut measure: Measure) {
        measure
            .make_variable(
                "lights_perc_change",
                "Lights Percent Change",
                Distribution::uniform(-50., 50., 0.),
            )
            .unwrap();
        measure
            .make_variable(
                "lights_perc_change",
                "Lights Percent Change",
                Distribution::uniform(-20., 20., 0.),
            )
            .unwrap();

        assert_eq!(measure.variables().len(), 1);
        assert_eq!(measure.variables()[0].distribution.minimum, -20.);
    }

    #[rstest]
    #[case(Distribution::uniform(50., -50., 0.))]
    #[case(Distribution::uniform(-50., 50., 60.))]
    #[case(Distribution::uniform(f64::NAN, 50., 0.))]
    #[case(Distribution { distribution_type: DistributionType::Normal, ..Distribution::uniform(-50., 50., 0.) })]
    fn test_reject_invalid_distributions(mut measure: Measure, #[case] distribution: Distribution) {
        assert!(matches!(
            measure.make_variable("lights_perc_change", "Lights", distribution),
            Err(AnalysisError::InvalidDistribution { .. })
        ));
        assert!(measure.variables().is_empty());
    }

    #[rstest]
    fn test_leave_variable_arguments_out_of_static_arguments(mut measure: Measure) {
        measure
            .make_variable(
                "lights_perc_change",
                "Lights Percent Change",
                Distribution::uniform(-50., 50., 0.),
            )
            .unwrap();

        let value = measure.to_json(3);

        assert_eq!(value["workflow_index"], json!(3));
        assert_eq!(
            value["arguments"],
            json!([{"name": "space_type", "value": "*All SpaceTypes*"}])
        );
        assert_eq!(
            value["variables"][0]["uncertainty_description"],
            json!({
                "type": "uniform",
                "attributes": [
                    {"name": "lower_bounds", "value": -50.0},
                    {"name": "upper_bounds", "value": 50.0},
                    {"name": "modes", "value": 0.0},
                ]
            })
        );
    }
}
