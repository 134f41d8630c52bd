pub mod analysis;
pub mod errors;
pub mod output;
pub mod report_table;
pub mod reporting_frequency;
pub mod series;
pub mod series_source;
pub mod sql_source;

use crate::analysis::config::AnalysisConfig;
use crate::analysis::Analysis;
use crate::errors::{AnalysisError, ReportError, ReportIssue};
use crate::output::{write_report_table, Output};
use crate::report_table::{ReportBuild, SeriesTableBuilder};
use crate::reporting_frequency::ReportingFrequency;
use crate::series_source::SeriesSource;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

pub const REPORT_FILE_EXTENSION: &str = "csv";

/// What a reporting pass did, for the invoking harness.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportOutcome {
    /// Where the report went, if one was written.
    pub location: Option<String>,
    pub issues: Vec<ReportIssue>,
    pub column_count: usize,
    pub row_count: usize,
}

/// Extracts every series the source holds and writes them as one delimited report.
///
/// Nothing is written when the frequency is the `All` sentinel or when no series were found.
#[instrument(skip(source, output))]
pub fn run_report(
    source: impl SeriesSource,
    output: impl Output,
    frequency: ReportingFrequency,
) -> Result<ReportOutcome, ReportError> {
    let ReportBuild { table, issues } = SeriesTableBuilder::new(source, frequency).build()?;

    let mut outcome = ReportOutcome {
        location: None,
        issues,
        column_count: table.column_count(),
        row_count: table.rows().len(),
    };

    if table.is_empty() || output.is_noop() {
        return Ok(outcome);
    }

    let location_key = frequency.file_key();
    let location = output.describe_location(&location_key, REPORT_FILE_EXTENSION);
    let write_failure = |source| ReportError::WriteFailure {
        location: location.clone(),
        source,
    };

    let writer = output
        .writer_for_location_key(&location_key, REPORT_FILE_EXTENSION)
        .map_err(write_failure)?;
    write_report_table(&table, writer).map_err(write_failure)?;

    info!("Output file written to {location}");
    outcome.location = Some(location);

    Ok(outcome)
}

/// Paths of the files written by [`assemble_analysis`].
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisFiles {
    pub json: PathBuf,
    pub package: PathBuf,
}

/// Builds an analysis from a workflow file and a configuration, writing `analysis.json` and
/// `analysis.zip` into `output_dir`.
///
/// The JSON is written before the configured analysis type and libraries are applied, so it
/// describes the default single-run analysis while the package carries the configured one.
#[instrument]
pub fn assemble_analysis(
    osw_path: &Path,
    config_path: &Path,
    output_dir: &Path,
) -> Result<AnalysisFiles, AnalysisError> {
    let config = AnalysisConfig::from_path(config_path)?;
    let config_dir = config_path.parent().unwrap_or(Path::new(""));

    let mut analysis = Analysis::create(&config.display_name);
    analysis.convert_osw(osw_path)?;
    config.apply(&mut analysis, config_dir)?;

    let json = output_dir.join("analysis.json");
    analysis.save_json(&json)?;

    config.finalize(&mut analysis, config_dir);
    let package = output_dir.join("analysis.zip");
    analysis.save_osa_zip(&package)?;

    Ok(AnalysisFiles { json, package })
}
