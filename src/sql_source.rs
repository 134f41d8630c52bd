//! Series source backed by an EnergyPlus SQLite result database (`eplusout.sql`).
//!
//! Only the weather-driven run period is read; sizing and design-day periods are ignored.

use crate::reporting_frequency::ReportingFrequency;
use crate::series::Series;
use crate::series_source::SeriesSource;
use anyhow::{anyhow, Context};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use tracing::debug;

/// EnergyPlus code for an environment period driven by a weather file.
const WEATHER_RUN_PERIOD: i64 = 3;

/// Year assumed when the database does not record one.
pub const DEFAULT_YEAR: i32 = 2009;

#[derive(Debug)]
pub struct SqlSeriesSource {
    connection: Connection,
    environment_period_index: i64,
    frequency: ReportingFrequency,
}

impl SqlSeriesSource {
    pub fn open(path: &Path, frequency: ReportingFrequency) -> anyhow::Result<Self> {
        let connection = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("Cannot open sql file {}", path.display()))?;
        Self::from_connection(connection, frequency)
    }

    pub fn from_connection(
        connection: Connection,
        frequency: ReportingFrequency,
    ) -> anyhow::Result<Self> {
        let environment_period_index = weather_run_period(&connection)?
            .ok_or_else(|| anyhow!("Cannot find weather run period in sql file"))?;
        debug!("using environment period {environment_period_index}");

        Ok(Self {
            connection,
            environment_period_index,
            frequency,
        })
    }

    fn units(&self, variable_name: &str, key_qualifier: &str) -> anyhow::Result<String> {
        Ok(self
            .connection
            .query_row(
                "SELECT Units FROM ReportDataDictionary \
                 WHERE Name = ?1 AND KeyValue = ?2 AND ReportingFrequency = ?3 \
                 ORDER BY ReportDataDictionaryIndex LIMIT 1",
                params![variable_name, key_qualifier, self.frequency.as_str()],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten()
            .unwrap_or_default())
    }
}

fn weather_run_period(connection: &Connection) -> anyhow::Result<Option<i64>> {
    Ok(connection
        .query_row(
            "SELECT EnvironmentPeriodIndex FROM EnvironmentPeriods \
             WHERE EnvironmentType = ?1 ORDER BY EnvironmentPeriodIndex LIMIT 1",
            params![WEATHER_RUN_PERIOD],
            |row| row.get(0),
        )
        .optional()?)
}

/// Builds a timestamp from the database's time columns.
///
/// Hour 24 and minute 60 are end-of-interval markers and roll over into the next day or
/// hour.
fn timestamp_from_parts(
    year: Option<i32>,
    month: u32,
    day: u32,
    hour: i64,
    minute: i64,
) -> anyhow::Result<NaiveDateTime> {
    let year = match year {
        Some(year) if year > 0 => year,
        _ => DEFAULT_YEAR,
    };
    let midnight = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| anyhow!("Invalid date {year}-{month}-{day} in sql file"))?;

    Ok(midnight + TimeDelta::hours(hour) + TimeDelta::minutes(minute))
}

impl SeriesSource for SqlSeriesSource {
    fn available_variable_names(&self) -> anyhow::Result<Vec<String>> {
        let mut statement = self.connection.prepare(
            "SELECT DISTINCT rdd.Name FROM ReportDataDictionary rdd \
             WHERE rdd.ReportingFrequency = ?1 \
             AND EXISTS (SELECT 1 FROM ReportData rd \
                 INNER JOIN Time t ON rd.TimeIndex = t.TimeIndex \
                 WHERE rd.ReportDataDictionaryIndex = rdd.ReportDataDictionaryIndex \
                 AND t.EnvironmentPeriodIndex = ?2) \
             ORDER BY rdd.Name",
        )?;
        let names = statement
            .query_map(
                params![self.frequency.as_str(), self.environment_period_index],
                |row| row.get(0),
            )?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(names)
    }

    fn available_key_qualifiers(&self, variable_name: &str) -> anyhow::Result<Vec<String>> {
        let mut statement = self.connection.prepare(
            "SELECT DISTINCT rdd.KeyValue FROM ReportDataDictionary rdd \
             WHERE rdd.Name = ?1 AND rdd.ReportingFrequency = ?2 \
             AND EXISTS (SELECT 1 FROM ReportData rd \
                 INNER JOIN Time t ON rd.TimeIndex = t.TimeIndex \
                 WHERE rd.ReportDataDictionaryIndex = rdd.ReportDataDictionaryIndex \
                 AND t.EnvironmentPeriodIndex = ?3) \
             ORDER BY rdd.KeyValue",
        )?;
        let key_qualifiers = statement
            .query_map(
                params![
                    variable_name,
                    self.frequency.as_str(),
                    self.environment_period_index
                ],
                |row| row.get::<_, Option<String>>(0),
            )?
            .map(|key| key.map(Option::unwrap_or_default))
            .collect::<Result<Vec<String>, _>>()?;

        Ok(key_qualifiers)
    }

    fn fetch_series(
        &self,
        variable_name: &str,
        key_qualifier: &str,
    ) -> anyhow::Result<Option<Series>> {
        let mut statement = self.connection.prepare(
            "SELECT t.Year, t.Month, t.Day, t.Hour, t.Minute, rd.Value FROM ReportData rd \
             INNER JOIN ReportDataDictionary rdd \
                 ON rd.ReportDataDictionaryIndex = rdd.ReportDataDictionaryIndex \
             INNER JOIN Time t ON rd.TimeIndex = t.TimeIndex \
             WHERE rdd.Name = ?1 AND rdd.KeyValue = ?2 AND rdd.ReportingFrequency = ?3 \
             AND t.EnvironmentPeriodIndex = ?4 \
             ORDER BY t.TimeIndex",
        )?;
        let rows = statement
            .query_map(
                params![
                    variable_name,
                    key_qualifier,
                    self.frequency.as_str(),
                    self.environment_period_index
                ],
                |row| {
                    Ok((
                        row.get::<_, Option<i32>>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, f64>(5)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        if rows.is_empty() {
            return Ok(None);
        }

        let points = rows
            .into_iter()
            .map(|(year, month, day, hour, minute, value)| {
                Ok((timestamp_from_parts(year, month, day, hour, minute)?, value))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Some(Series::from_points(
            points,
            self.units(variable_name, key_qualifier)?,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::write_report_table;
    use crate::report_table::SeriesTableBuilder;
    use pretty_assertions::assert_eq;
    use rstest::*;

    const SCHEMA: &str = "
        CREATE TABLE EnvironmentPeriods (
            EnvironmentPeriodIndex INTEGER PRIMARY KEY, SimulationIndex INTEGER,
            EnvironmentName TEXT, EnvironmentType INTEGER);
        CREATE TABLE Time (
            TimeIndex INTEGER PRIMARY KEY, Year INTEGER, Month INTEGER, Day INTEGER,
            Hour INTEGER, Minute INTEGER, Dst INTEGER, Interval INTEGER, IntervalType INTEGER,
            SimulationDays INTEGER, DayType TEXT, EnvironmentPeriodIndex INTEGER,
            WarmupFlag INTEGER);
        CREATE TABLE ReportDataDictionary (
            ReportDataDictionaryIndex INTEGER PRIMARY KEY, IsMeter INTEGER, Type TEXT,
            IndexGroup TEXT, TimestepType TEXT, KeyValue TEXT, Name TEXT,
            ReportingFrequency TEXT, ScheduleName TEXT, Units TEXT);
        CREATE TABLE ReportData (
            ReportDataIndex INTEGER PRIMARY KEY, TimeIndex INTEGER,
            ReportDataDictionaryIndex INTEGER, Value REAL);

        INSERT INTO EnvironmentPeriods VALUES
            (1, 1, 'WINTER DESIGN DAY', 1),
            (2, 1, 'RUN PERIOD 1', 3);
        INSERT INTO Time (TimeIndex, Year, Month, Day, Hour, Minute, EnvironmentPeriodIndex) VALUES
            (1, 2009, 1, 21, 1, 0, 1),
            (2, 2009, 1, 1, 1, 0, 2),
            (3, 2009, 1, 1, 2, 0, 2),
            (4, 2009, 1, 1, 24, 0, 2);
        INSERT INTO ReportDataDictionary
            (ReportDataDictionaryIndex, IsMeter, KeyValue, Name, ReportingFrequency, Units) VALUES
            (1, 0, 'ZONE1', 'Zone Mean Air Temperature', 'Hourly', 'C'),
            (2, 1, '', 'Electricity:Facility', 'Hourly', 'J'),
            (3, 0, 'ZONE1', 'Zone Mean Air Temperature', 'Zone Timestep', 'C'),
            (4, 0, 'ZONE2', 'Zone Mean Air Temperature', 'Hourly', 'C'),
            (5, 0, 'SIZING', 'Zone Design Load', 'Hourly', 'W');
        INSERT INTO ReportData (TimeIndex, ReportDataDictionaryIndex, Value) VALUES
            (1, 1, -5.0),
            (2, 1, 20.5),
            (3, 1, 21.0),
            (4, 1, 21.5),
            (2, 2, 1000.0),
            (3, 2, 2000.0),
            (4, 2, 3000.0),
            (1, 5, 99.0);
    ";

    #[fixture]
    fn source() -> SqlSeriesSource {
        let connection = Connection::open_in_memory().unwrap();
        connection.execute_batch(SCHEMA).unwrap();
        SqlSeriesSource::from_connection(connection, ReportingFrequency::Hourly).unwrap()
    }

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2009, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[rstest]
    fn test_select_weather_run_period(source: SqlSeriesSource) {
        assert_eq!(source.environment_period_index, 2);
    }

    #[rstest]
    fn test_fail_without_weather_run_period() {
        let connection = Connection::open_in_memory().unwrap();
        connection.execute_batch(SCHEMA).unwrap();
        connection
            .execute("DELETE FROM EnvironmentPeriods WHERE EnvironmentType = 3", [])
            .unwrap();

        assert!(SqlSeriesSource::from_connection(connection, ReportingFrequency::Hourly).is_err());
    }

    #[rstest]
    fn test_list_variable_names_with_data_in_run_period(source: SqlSeriesSource) {
        assert_eq!(
            source.available_variable_names().unwrap(),
            ["Electricity:Facility", "Zone Mean Air Temperature"]
        );
    }

    #[rstest]
    fn test_write_report_from_sql_source(source: SqlSeriesSource) {
        let build = SeriesTableBuilder::new(source, ReportingFrequency::Hourly)
            .build()
            .unwrap();
        assert!(build.issues.is_empty(), "{:?}", build.issues);

        let mut buffer = Vec::new();
        write_report_table(&build.table, &mut buffer).unwrap();

        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "timestamp,Electricity:Facility[J],ZONE1:Zone Mean Air Temperature[C]\n\
             1/1/2009 01:00:00,1000.0,20.5\n\
             1/1/2009 02:00:00,2000.0,21.0\n\
             1/2/2009 00:00:00,3000.0,21.5\n"
        );
    }

    #[rstest]
    fn test_only_list_key_qualifiers_with_data_in_run_period(source: SqlSeriesSource) {
        assert_eq!(
            source
                .available_key_qualifiers("Zone Mean Air Temperature")
                .unwrap(),
            ["ZONE1"]
        );
        assert_eq!(
            source
                .available_key_qualifiers("Electricity:Facility")
                .unwrap(),
            [""]
        );
        assert!(source
            .available_key_qualifiers("Zone Design Load")
            .unwrap()
            .is_empty());
    }

    #[rstest]
    fn test_fetch_series_in_time_order(source: SqlSeriesSource) {
        let series = source
            .fetch_series("Zone Mean Air Temperature", "ZONE1")
            .unwrap()
            .unwrap();

        assert_eq!(series.unit(), "C");
        assert_eq!(series.values(), &[20.5, 21.0, 21.5]);
        assert_eq!(series.timestamps(), &[at(1, 1), at(1, 2), at(2, 0)]);
    }

    #[rstest]
    fn test_return_none_for_series_without_data(source: SqlSeriesSource) {
        assert_eq!(
            source
                .fetch_series("Zone Mean Air Temperature", "ZONE2")
                .unwrap(),
            None
        );
    }

    #[rstest]
    #[case(Some(2009), 1, 5, 3, 0, at(5, 3))]
    #[case(None, 1, 5, 3, 0, at(5, 3))]
    #[case(Some(0), 1, 31, 24, 0, NaiveDate::from_ymd_opt(2009, 2, 1).unwrap().and_hms_opt(0, 0, 0).unwrap())]
    #[case(Some(2009), 1, 1, 0, 60, at(1, 1))]
    #[case(Some(2009), 1, 1, 0, 15, NaiveDate::from_ymd_opt(2009, 1, 1).unwrap().and_hms_opt(0, 15, 0).unwrap())]
    fn test_build_timestamps_from_time_columns(
        #[case] year: Option<i32>,
        #[case] month: u32,
        #[case] day: u32,
        #[case] hour: i64,
        #[case] minute: i64,
        #[case] expected: NaiveDateTime,
    ) {
        assert_eq!(
            timestamp_from_parts(year, month, day, hour, minute).unwrap(),
            expected
        );
    }

    #[rstest]
    fn test_reject_invalid_dates() {
        assert!(timestamp_from_parts(Some(2009), 2, 30, 1, 0).is_err());
    }
}
