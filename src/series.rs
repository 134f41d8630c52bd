use chrono::NaiveDateTime;
use std::fmt::{Display, Formatter};

/// Identifies one reported time series within a period and reporting frequency.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct SeriesKey {
    pub variable_name: String,
    pub key_qualifier: String,
}

impl SeriesKey {
    pub fn new(variable_name: impl Into<String>, key_qualifier: impl Into<String>) -> Self {
        Self {
            variable_name: variable_name.into(),
            key_qualifier: key_qualifier.into(),
        }
    }
}

impl Display for SeriesKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.key_qualifier.is_empty() {
            write!(f, "{}", self.variable_name)
        } else {
            write!(f, "{} {}", self.key_qualifier, self.variable_name)
        }
    }
}

/// One time-indexed sequence of values with an associated unit.
///
/// Timestamps are naive local date-times as recorded by the simulation. Values are not
/// assumed to be finite.
#[derive(Clone, Debug, PartialEq)]
pub struct Series {
    timestamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
    unit: String,
}

impl Series {
    /// Builds a series from parallel timestamp and value sequences.
    ///
    /// Returns `None` if the two sequences differ in length, as such a series has no
    /// meaningful pairing.
    pub fn new(
        timestamps: Vec<NaiveDateTime>,
        values: Vec<f64>,
        unit: impl Into<String>,
    ) -> Option<Self> {
        (timestamps.len() == values.len()).then(|| Self {
            timestamps,
            values,
            unit: unit.into(),
        })
    }

    pub fn from_points(points: Vec<(NaiveDateTime, f64)>, unit: impl Into<String>) -> Self {
        let (timestamps, values) = points.into_iter().unzip();
        Self {
            timestamps,
            values,
            unit: unit.into(),
        }
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Header string identifying one output column.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ColumnLabel(String);

impl ColumnLabel {
    pub fn new(key: &SeriesKey, unit: &str) -> Self {
        let SeriesKey {
            variable_name,
            key_qualifier,
        } = key;
        if key_qualifier.is_empty() {
            Self(format!("{variable_name}[{unit}]"))
        } else {
            Self(format!("{key_qualifier}:{variable_name}[{unit}]"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ColumnLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ColumnLabel {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
