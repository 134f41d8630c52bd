use crate::report_table::ReportTable;
use anyhow::anyhow;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use formatx::formatx;
use std::fmt::Debug;
use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub const REPORT_FILE_TEMPLATE: &str = "report_variables_{}.{}";

pub trait Output: Debug {
    fn writer_for_location_key(
        &self,
        location_key: &str,
        file_extension: &str,
    ) -> anyhow::Result<impl Write>;
    /// Human-readable description of where a location key ends up, for logging.
    fn describe_location(&self, location_key: &str, file_extension: &str) -> String;
    /// Whether this output can be considered a no-op and therefore that any code that only writes to the output can be skipped.
    fn is_noop(&self) -> bool {
        false
    }
}

#[derive(Debug)]
pub struct FileOutput {
    directory_path: PathBuf,
    file_template: String,
}

impl FileOutput {
    pub fn new(directory_path: PathBuf, file_template: String) -> Self {
        Self {
            directory_path,
            file_template,
        }
    }

    /// Output into a directory using the `report_variables_<key>.csv` naming.
    pub fn for_reports(directory_path: PathBuf) -> Self {
        Self::new(directory_path, REPORT_FILE_TEMPLATE.to_string())
    }

    pub fn path_for_location_key(
        &self,
        location_key: &str,
        file_extension: &str,
    ) -> anyhow::Result<PathBuf> {
        let file_name = formatx!(&self.file_template, location_key, file_extension)
            .map_err(|e| anyhow!("Invalid output file template {}: {e:?}", self.file_template))?;
        Ok(self.directory_path.join(file_name))
    }
}

impl Output for FileOutput {
    fn writer_for_location_key(
        &self,
        location_key: &str,
        file_extension: &str,
    ) -> anyhow::Result<impl Write> {
        Ok(BufWriter::new(File::create(
            self.path_for_location_key(location_key, file_extension)?,
        )?))
    }

    fn describe_location(&self, location_key: &str, file_extension: &str) -> String {
        match self.path_for_location_key(location_key, file_extension) {
            Ok(path) => path.display().to_string(),
            Err(_) => format!("{}/{location_key}", self.directory_path.display()),
        }
    }
}

impl Output for &FileOutput {
    fn writer_for_location_key(
        &self,
        location_key: &str,
        file_extension: &str,
    ) -> anyhow::Result<impl Write> {
        <FileOutput as Output>::writer_for_location_key(self, location_key, file_extension)
    }

    fn describe_location(&self, location_key: &str, file_extension: &str) -> String {
        <FileOutput as Output>::describe_location(self, location_key, file_extension)
    }
}

/// An output that goes to nowhere/ a "sink"/ /dev/null.
#[derive(Debug, Default)]
pub struct SinkOutput;

impl Output for SinkOutput {
    fn writer_for_location_key(
        &self,
        _location_key: &str,
        _file_extension: &str,
    ) -> anyhow::Result<impl Write> {
        Ok(io::sink())
    }

    fn describe_location(&self, location_key: &str, _file_extension: &str) -> String {
        format!("sink ({location_key})")
    }

    fn is_noop(&self) -> bool {
        true
    }
}

/// Renders a value with a fractional part, as in `1.0`.
///
/// Magnitudes outside roughly `1e-5..1e16` switch to exponent form (`1e16`, `1e-7`).
pub(crate) fn format_value(value: f64) -> String {
    format!("{value:?}")
}

/// Writes the table as comma-joined lines, header first.
///
/// Cells are not quoted, so a label containing a comma will shift the columns of the line
/// it appears in.
pub fn write_report_table(table: &ReportTable, writer: impl Write) -> anyhow::Result<()> {
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(writer);

    writer.write_record(table.header())?;
    for row in table.rows() {
        writer.write_record(
            std::iter::once(row.timestamp.clone())
                .chain(row.values.iter().copied().map(format_value)),
        )?;
    }

    writer.flush()?;

    Ok(())
}
