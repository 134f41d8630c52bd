use strum::{Display, EnumIter, EnumString};

/// Sampling interval of the output variables to extract.
///
/// `All` is a sentinel that disables per-frequency extraction entirely.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString, EnumIter)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ReportingFrequency {
    #[default]
    #[strum(serialize = "Hourly")]
    #[cfg_attr(feature = "clap", value(name = "Hourly"))]
    Hourly,
    #[strum(serialize = "Zone Timestep")]
    #[cfg_attr(feature = "clap", value(name = "Zone Timestep"))]
    ZoneTimestep,
    #[strum(serialize = "HVAC System Timestep")]
    #[cfg_attr(feature = "clap", value(name = "HVAC System Timestep"))]
    HvacSystemTimestep,
    #[strum(serialize = "All")]
    #[cfg_attr(feature = "clap", value(name = "All"))]
    All,
}

impl ReportingFrequency {
    /// The name used by the simulation result database for this frequency.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportingFrequency::Hourly => "Hourly",
            ReportingFrequency::ZoneTimestep => "Zone Timestep",
            ReportingFrequency::HvacSystemTimestep => "HVAC System Timestep",
            ReportingFrequency::All => "All",
        }
    }

    pub fn is_skip_sentinel(&self) -> bool {
        matches!(self, ReportingFrequency::All)
    }

    /// Name with spaces removed, for use in output file names.
    pub fn file_key(&self) -> String {
        self.as_str().replace(' ', "")
    }
}
