use crate::series::Series;
use indexmap::IndexMap;

/// Access to the named time series recorded for one simulation period and one reporting
/// frequency.
///
/// Implementations are bound to their period and frequency on construction, so none of the
/// methods take them as arguments.
pub trait SeriesSource {
    /// Variable names available, in the order the source enumerates them.
    fn available_variable_names(&self) -> anyhow::Result<Vec<String>>;

    /// Key qualifiers recorded for a variable. May be empty.
    fn available_key_qualifiers(&self, variable_name: &str) -> anyhow::Result<Vec<String>>;

    /// The series for a variable and key qualifier, or `None` if nothing was recorded.
    fn fetch_series(&self, variable_name: &str, key_qualifier: &str)
        -> anyhow::Result<Option<Series>>;
}

impl<T: SeriesSource + ?Sized> SeriesSource for &T {
    fn available_variable_names(&self) -> anyhow::Result<Vec<String>> {
        (**self).available_variable_names()
    }

    fn available_key_qualifiers(&self, variable_name: &str) -> anyhow::Result<Vec<String>> {
        (**self).available_key_qualifiers(variable_name)
    }

    fn fetch_series(
        &self,
        variable_name: &str,
        key_qualifier: &str,
    ) -> anyhow::Result<Option<Series>> {
        (**self).fetch_series(variable_name, key_qualifier)
    }
}

/// A source holding its series in memory, keyed by variable name then key qualifier.
///
/// A qualifier mapped to `None` is listed as available but yields no data.
#[derive(Clone, Debug, Default)]
pub struct InMemorySeriesSource {
    variables: IndexMap<String, IndexMap<String, Option<Series>>>,
}

impl InMemorySeriesSource {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a variable with no key qualifiers.
    pub fn with_variable(mut self, variable_name: &str) -> Self {
        self.variables.entry(variable_name.to_string()).or_default();
        self
    }

    pub fn with_series(mut self, variable_name: &str, key_qualifier: &str, series: Series) -> Self {
        self.insert(variable_name, key_qualifier, Some(series));
        self
    }

    pub fn with_empty_series(mut self, variable_name: &str, key_qualifier: &str) -> Self {
        self.insert(variable_name, key_qualifier, None);
        self
    }

    fn insert(&mut self, variable_name: &str, key_qualifier: &str, series: Option<Series>) {
        self.variables
            .entry(variable_name.to_string())
            .or_default()
            .insert(key_qualifier.to_string(), series);
    }
}

impl SeriesSource for InMemorySeriesSource {
    fn available_variable_names(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.variables.keys().cloned().collect())
    }

    fn available_key_qualifiers(&self, variable_name: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .variables
            .get(variable_name)
            .map(|qualifiers| qualifiers.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn fetch_series(
        &self,
        variable_name: &str,
        key_qualifier: &str,
    ) -> anyhow::Result<Option<Series>> {
        Ok(self
            .variables
            .get(variable_name)
            .and_then(|qualifiers| qualifiers.get(key_qualifier))
            .cloned()
            .flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn series() -> Series {
        let t0 = NaiveDate::from_ymd_opt(2009, 1, 1)
            .unwrap()
            .and_hms_opt(1, 0, 0)
            .unwrap();
        Series::from_points(vec![(t0, 1.0)], "W")
    }

    #[rstest]
    fn test_enumerate_in_insertion_order(series: Series) {
        let source = InMemorySeriesSource::new()
            .with_series("B", "Z2", series.clone())
            .with_variable("C")
            .with_series("A", "Z1", series.clone())
            .with_series("B", "Z1", series);

        assert_eq!(source.available_variable_names().unwrap(), ["B", "C", "A"]);
        assert_eq!(source.available_key_qualifiers("B").unwrap(), ["Z2", "Z1"]);
        assert!(source.available_key_qualifiers("C").unwrap().is_empty());
        assert!(source.available_key_qualifiers("missing").unwrap().is_empty());
    }

    #[rstest]
    fn test_return_none_for_empty_or_unknown_series(series: Series) {
        let source = InMemorySeriesSource::new()
            .with_series("A", "Z1", series.clone())
            .with_empty_series("A", "Z2");

        assert_eq!(source.fetch_series("A", "Z1").unwrap(), Some(series));
        assert_eq!(source.fetch_series("A", "Z2").unwrap(), None);
        assert_eq!(source.fetch_series("A", "Z3").unwrap(), None);
        assert_eq!(source.available_key_qualifiers("A").unwrap(), ["Z1", "Z2"]);
    }
}
