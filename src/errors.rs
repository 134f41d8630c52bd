use crate::reporting_frequency::ReportingFrequency;
use crate::series::{ColumnLabel, SeriesKey};
use chrono::NaiveDateTime;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a reporting pass.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Could not read from the simulation results: {0}")]
    SourceFailure(#[from] anyhow::Error),
    #[error("Column {label} appears more than once (from {key})")]
    LabelCollision { label: ColumnLabel, key: SeriesKey },
    #[error("{0}")]
    AxisMismatch(AxisMismatch),
    #[error("Could not write report to {location}: {source}")]
    WriteFailure {
        location: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Describes how a collected series departs from the reference timestamp axis.
#[derive(Clone, Debug, PartialEq)]
pub enum AxisMismatch {
    Length {
        label: ColumnLabel,
        expected: usize,
        actual: usize,
    },
    Timestamp {
        label: ColumnLabel,
        index: usize,
        expected: NaiveDateTime,
        actual: NaiveDateTime,
    },
}

impl Display for AxisMismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AxisMismatch::Length {
                label,
                expected,
                actual,
            } => write!(
                f,
                "Timeseries {label} has {actual} timestamps but the reference axis has {expected}"
            ),
            AxisMismatch::Timestamp {
                label,
                index,
                expected,
                actual,
            } => write!(
                f,
                "Timeseries {label} has timestamp {actual} at row {index} where the reference axis has {expected}"
            ),
        }
    }
}

/// Conditions recorded during a reporting pass that do not abort it.
#[derive(Clone, Debug, PartialEq)]
pub enum ReportIssue {
    ConfigurationSkip(ReportingFrequency),
    MissingKeyQualifiers { variable_name: String },
    EmptySeries(SeriesKey),
    NoDataCollected(ReportingFrequency),
}

impl Display for ReportIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportIssue::ConfigurationSkip(frequency) => {
                write!(f, "Reporting frequency {frequency} disables extraction")
            }
            ReportIssue::MissingKeyQualifiers { variable_name } => write!(
                f,
                "Timeseries for {variable_name} did not have any key values. No timeseries available."
            ),
            ReportIssue::EmptySeries(key) => write!(f, "Timeseries for {key} is empty."),
            ReportIssue::NoDataCollected(frequency) => write!(
                f,
                "No output variables found at reporting frequency = {frequency}"
            ),
        }
    }
}

/// Errors raised while assembling an analysis definition.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid JSON input: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Unknown measure identifier: {0}")]
    UnknownMeasure(String),
    #[error("Could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid distribution for variable {variable}: {reason}")]
    InvalidDistribution { variable: String, reason: String },
    #[error("Output {0} has already been added")]
    DuplicateOutput(String),
    #[error("Could not package analysis: {0}")]
    Packaging(#[from] anyhow::Error),
}
