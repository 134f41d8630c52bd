use crate::analysis::{file_name, Analysis};
use crate::errors::AnalysisError;
use anyhow::{anyhow, Context};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

impl Analysis {
    /// Writes the analysis and everything it needs on the server into a zip archive.
    pub fn save_osa_zip(&self, path: &Path) -> Result<(), AnalysisError> {
        let file = File::create(path).map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.write_package(BufWriter::new(file))?;
        info!("analysis package written to {}", path.display());
        Ok(())
    }

    /// Archive layout:
    ///
    /// - `analysis.json`
    /// - `seed/<file>` and `weather/<file>` when found beside the workflow
    /// - `measures/<measure_dir_name>/...` for each measure directory found
    /// - `scripts/<scope>/<initialize|finalize>.sh` plus a `.args` JSON array
    /// - `lib/<library_name>/...` for each library directory
    pub fn write_package<W: Write + Seek>(&self, writer: W) -> Result<(), AnalysisError> {
        let mut zip = ZipWriter::new(writer);
        let options: FileOptions<'_, ()> =
            FileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("analysis.json", options)
            .context("Could not add analysis.json")?;
        serde_json::to_writer_pretty(&mut zip, &self.to_json())
            .context("Could not add analysis.json")?;

        self.package_workflow_files(&mut zip, options)?;

        for script in self.server_scripts.iter() {
            if !script.file.is_file() {
                return Err(anyhow!("Server script {} not found", script.file.display()).into());
            }
            let prefix = format!(
                "scripts/{}/{}",
                script.scope.directory(),
                script.script_type.file_stem()
            );
            add_file(&mut zip, options, &script.file, &format!("{prefix}.sh"))?;
            zip.start_file(format!("{prefix}.args"), options)
                .with_context(|| format!("Could not add {prefix}.args"))?;
            serde_json::to_writer(&mut zip, &script.arguments)
                .with_context(|| format!("Could not add {prefix}.args"))?;
        }

        for library in self.libraries.iter() {
            if !library.path.is_dir() {
                return Err(anyhow!("Library directory {} not found", library.path.display()).into());
            }
            add_directory(
                &mut zip,
                options,
                &library.path,
                &format!("lib/{}", library.library_name),
            )?;
        }

        zip.finish().context("Could not finish analysis package")?;
        Ok(())
    }

    fn package_workflow_files<W: Write + Seek>(
        &self,
        zip: &mut ZipWriter<W>,
        options: FileOptions<'_, ()>,
    ) -> anyhow::Result<()> {
        let Some(location) = &self.location else {
            return Ok(());
        };

        for (file, directory) in [(&self.seed_file, "seed"), (&self.weather_file, "weather")] {
            let Some(file) = file else { continue };
            match location.find_file(file) {
                Some(path) => {
                    add_file(zip, options, &path, &format!("{directory}/{}", file_name(file)))?
                }
                None => warn!("{file} not found beside workflow, leaving it out of the package"),
            }
        }

        let mut packaged = HashSet::new();
        for measure in self.workflow.measures() {
            let measure_dir_name = measure.measure_dir_name();
            if !packaged.insert(measure_dir_name) {
                continue;
            }
            match location.find_measure_dir(measure_dir_name) {
                Some(path) => add_directory(
                    zip,
                    options,
                    &path,
                    &format!("measures/{measure_dir_name}"),
                )?,
                None => warn!("measure directory {measure_dir_name} not found, leaving it out of the package"),
            }
        }

        Ok(())
    }
}

fn add_file<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    options: FileOptions<'_, ()>,
    path: &Path,
    entry_name: &str,
) -> anyhow::Result<()> {
    let contents =
        std::fs::read(path).with_context(|| format!("Could not read {}", path.display()))?;
    zip.start_file(entry_name, options)
        .with_context(|| format!("Could not add {entry_name}"))?;
    zip.write_all(&contents)?;
    Ok(())
}

/// Adds every file below `directory`, with entry names rooted at `prefix`.
fn add_directory<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    options: FileOptions<'_, ()>,
    directory: &Path,
    prefix: &str,
) -> anyhow::Result<()> {
    for entry in WalkDir::new(directory).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(directory)?;
        let entry_name = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .fold(prefix.to_string(), |name, part| format!("{name}/{part}"));
        add_file(zip, options, entry.path(), &entry_name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ScriptScope, ScriptType};
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::json;
    use std::fs;
    use std::io::{Cursor, Read};
    use tempfile::TempDir;
    use zip::ZipArchive;

    #[fixture]
    fn project() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("calibration_workflow.osw"),
            json!({
                "seed_file": "example.osm",
                "weather_file": "missing.epw",
                "steps": [
                    {"measure_dir_name": "add_monthly_json_utility_data"},
                    {"measure_dir_name": "add_monthly_json_utility_data"}
                ]
            })
            .to_string(),
        )
        .unwrap();
        fs::create_dir_all(root.join("files")).unwrap();
        fs::write(root.join("files/example.osm"), "OS:Version").unwrap();
        fs::create_dir_all(root.join("measures/add_monthly_json_utility_data/resources")).unwrap();
        fs::write(
            root.join("measures/add_monthly_json_utility_data/measure.rb"),
            "# measure",
        )
        .unwrap();
        fs::write(
            root.join("measures/add_monthly_json_utility_data/resources/helper.rb"),
            "# helper",
        )
        .unwrap();
        fs::create_dir_all(root.join("Data")).unwrap();
        fs::write(root.join("Data/electric.json"), "{}").unwrap();
        fs::create_dir_all(root.join("scripts")).unwrap();
        fs::write(root.join("scripts/script.sh"), "#!/bin/bash").unwrap();
        dir
    }

    fn entries(bytes: Vec<u8>) -> ZipArchive<Cursor<Vec<u8>>> {
        ZipArchive::new(Cursor::new(bytes)).unwrap()
    }

    #[rstest]
    fn test_package_analysis_with_supporting_files(project: TempDir) {
        let root = project.path();
        let mut analysis = Analysis::create("Analysis Name");
        analysis
            .convert_osw(&root.join("calibration_workflow.osw"))
            .unwrap();
        analysis.server_scripts.add(
            root.join("scripts/script.sh"),
            vec!["one".into(), "two".into()],
            ScriptType::Initialization,
            ScriptScope::DataPoint,
        );
        analysis.libraries.add(root.join("Data"), "calibration_data");

        let mut buffer = Cursor::new(vec![]);
        analysis.write_package(&mut buffer).unwrap();
        let mut archive = entries(buffer.into_inner());

        let mut names = archive.file_names().map(str::to_string).collect::<Vec<_>>();
        names.sort();
        assert_eq!(
            names,
            [
                "analysis.json",
                "lib/calibration_data/electric.json",
                "measures/add_monthly_json_utility_data/measure.rb",
                "measures/add_monthly_json_utility_data/resources/helper.rb",
                "scripts/data_point/initialize.args",
                "scripts/data_point/initialize.sh",
                "seed/example.osm",
            ]
        );

        let mut args = String::new();
        archive
            .by_name("scripts/data_point/initialize.args")
            .unwrap()
            .read_to_string(&mut args)
            .unwrap();
        assert_eq!(args, r#"["one","two"]"#);

        let mut analysis_json = String::new();
        archive
            .by_name("analysis.json")
            .unwrap()
            .read_to_string(&mut analysis_json)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&analysis_json).unwrap();
        assert_eq!(value, analysis.to_json());
    }

    #[rstest]
    fn test_fail_on_missing_library(project: TempDir) {
        let mut analysis = Analysis::create("Analysis Name");
        analysis
            .libraries
            .add(project.path().join("NoSuchData"), "calibration_data");

        assert!(matches!(
            analysis.write_package(Cursor::new(vec![])),
            Err(AnalysisError::Packaging(_))
        ));
    }

    #[rstest]
    fn test_save_zip_to_disk(project: TempDir) {
        let path = project.path().join("analysis.zip");

        Analysis::create("Analysis Name").save_osa_zip(&path).unwrap();

        let archive = entries(fs::read(path).unwrap());
        assert_eq!(archive.len(), 1);
    }
}
