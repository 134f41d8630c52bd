use crate::errors::{AxisMismatch, ReportError, ReportIssue};
use crate::reporting_frequency::ReportingFrequency;
use crate::series::{ColumnLabel, Series, SeriesKey};
use crate::series_source::SeriesSource;
use chrono::NaiveDateTime;
use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::{error, info, instrument, warn};

pub const TIMESTAMP_HEADING: &str = "timestamp";

/// Display format for row timestamps: month and day without zero-padding, time zero-padded.
pub const TIMESTAMP_FORMAT: &str = "%-m/%-d/%Y %H:%M:%S";

pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// A header of column labels and one row of aligned values per timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportTable {
    header: Vec<String>,
    rows: Vec<ReportRow>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReportRow {
    pub timestamp: String,
    pub values: Vec<f64>,
}

impl ReportTable {
    /// The header row, starting with the timestamp pseudo-column.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Number of value columns, excluding the timestamp.
    pub fn column_count(&self) -> usize {
        self.header.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.column_count() == 0
    }
}

impl Default for ReportTable {
    fn default() -> Self {
        Self {
            header: vec![TIMESTAMP_HEADING.to_string()],
            rows: vec![],
        }
    }
}

/// The result of a reporting pass: the table and anything worth telling the harness about.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReportBuild {
    pub table: ReportTable,
    pub issues: Vec<ReportIssue>,
}

impl ReportBuild {
    fn skipped(issue: ReportIssue) -> Self {
        Self {
            table: Default::default(),
            issues: vec![issue],
        }
    }
}

/// Tabulates every series a source holds for one reporting frequency.
#[derive(Debug)]
pub struct SeriesTableBuilder<S: SeriesSource> {
    source: S,
    frequency: ReportingFrequency,
}

impl<S: SeriesSource> SeriesTableBuilder<S> {
    pub fn new(source: S, frequency: ReportingFrequency) -> Self {
        Self { source, frequency }
    }

    #[instrument(skip_all, fields(frequency = %self.frequency))]
    pub fn build(&self) -> Result<ReportBuild, ReportError> {
        if self.frequency.is_skip_sentinel() {
            info!("reporting frequency {} set, skipping extraction", self.frequency);
            return Ok(ReportBuild::skipped(ReportIssue::ConfigurationSkip(
                self.frequency,
            )));
        }

        let mut issues = vec![];
        let columns = self.collect_columns(&mut issues)?;

        if columns.is_empty() {
            let issue = ReportIssue::NoDataCollected(self.frequency);
            info!("{issue}");
            issues.push(issue);
            return Ok(ReportBuild {
                table: Default::default(),
                issues,
            });
        }

        verify_axes(&columns).map_err(ReportError::AxisMismatch)?;

        Ok(ReportBuild {
            table: tabulate(columns),
            issues,
        })
    }

    fn collect_columns(
        &self,
        issues: &mut Vec<ReportIssue>,
    ) -> Result<IndexMap<ColumnLabel, Series>, ReportError> {
        let mut columns: IndexMap<ColumnLabel, Series> = Default::default();

        for variable_name in self.source.available_variable_names()? {
            let key_qualifiers = self.source.available_key_qualifiers(&variable_name)?;
            if key_qualifiers.is_empty() {
                let issue = ReportIssue::MissingKeyQualifiers { variable_name };
                error!("{issue}");
                issues.push(issue);
                continue;
            }

            for key_qualifier in key_qualifiers {
                let key = SeriesKey::new(variable_name.as_str(), key_qualifier);
                let Some(series) = self
                    .source
                    .fetch_series(&key.variable_name, &key.key_qualifier)?
                else {
                    let issue = ReportIssue::EmptySeries(key);
                    warn!("{issue}");
                    issues.push(issue);
                    continue;
                };

                let label = ColumnLabel::new(&key, series.unit());
                match columns.entry(label) {
                    Entry::Occupied(entry) => {
                        return Err(ReportError::LabelCollision {
                            label: entry.key().clone(),
                            key,
                        });
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(series);
                    }
                }
            }
        }

        Ok(columns)
    }
}

/// Checks every column against the first column's timestamp axis.
fn verify_axes(columns: &IndexMap<ColumnLabel, Series>) -> Result<(), AxisMismatch> {
    let Some((_, reference)) = columns.first() else {
        return Ok(());
    };
    let axis = reference.timestamps();

    for (label, series) in columns.iter().skip(1) {
        if series.len() != axis.len() {
            return Err(AxisMismatch::Length {
                label: label.clone(),
                expected: axis.len(),
                actual: series.len(),
            });
        }
        if let Some((index, (expected, actual))) = axis
            .iter()
            .zip(series.timestamps())
            .enumerate()
            .find(|(_, (expected, actual))| expected != actual)
        {
            return Err(AxisMismatch::Timestamp {
                label: label.clone(),
                index,
                expected: *expected,
                actual: *actual,
            });
        }
    }

    Ok(())
}

/// Lays the columns out row by row. Values are read positionally; callers verify axes first.
fn tabulate(columns: IndexMap<ColumnLabel, Series>) -> ReportTable {
    let mut header = vec![TIMESTAMP_HEADING.to_string()];
    header.extend(columns.keys().map(ToString::to_string));

    let rows = match columns.first() {
        Some((_, reference)) => reference
            .timestamps()
            .iter()
            .enumerate()
            .map(|(idx, timestamp)| ReportRow {
                timestamp: format_timestamp(timestamp),
                values: columns.values().map(|series| series.values()[idx]).collect(),
            })
            .collect(),
        None => vec![],
    };

    ReportTable { header, rows }
}
