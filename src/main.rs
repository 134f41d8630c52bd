use clap::{Parser, Subcommand};
use osa_calibration::output::FileOutput;
use osa_calibration::reporting_frequency::ReportingFrequency;
use osa_calibration::sql_source::SqlSeriesSource;
use osa_calibration::{assemble_analysis, run_report};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct CalibrationArgs {
    #[command(subcommand)]
    command: Command,
    #[clap(long, global = true, default_value_t = false, help = "Whether to log out spans")]
    log_spans: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write every output variable of a simulation run to report_variables_<frequency>.csv
    Report {
        #[arg(long, help = "Path to the EnergyPlus SQLite output (eplusout.sql)")]
        sql: PathBuf,
        #[arg(long, short, value_enum, default_value_t = ReportingFrequency::Hourly)]
        frequency: ReportingFrequency,
        #[arg(long, short, default_value = ".", help = "Directory to write the report into")]
        output_dir: PathBuf,
    },
    /// Build analysis.json and analysis.zip from a workflow and an analysis configuration
    Analysis {
        #[arg(long, help = "Path to the workflow (.osw) file")]
        osw: PathBuf,
        #[arg(long, short, help = "Path to the analysis configuration in .json format")]
        config: PathBuf,
        #[arg(long, short, default_value = ".", help = "Directory to write the analysis files into")]
        output_dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let args = CalibrationArgs::parse();

    // set up basic tracing
    let tracing_subscriber = {
        let mut builder = tracing_subscriber::fmt::fmt().with_max_level(tracing::Level::INFO);

        if args.log_spans {
            builder = builder.with_span_events(FmtSpan::CLOSE);
        }

        builder.finish()
    };
    tracing::subscriber::set_global_default(tracing_subscriber)?;

    match args.command {
        Command::Report {
            sql,
            frequency,
            output_dir,
        } => {
            let source = SqlSeriesSource::open(&sql, frequency)?;
            let outcome = run_report(source, FileOutput::for_reports(output_dir), frequency)?;
            if outcome.location.is_none() {
                warn!("no report written for reporting frequency {frequency}");
            }
        }
        Command::Analysis {
            osw,
            config,
            output_dir,
        } => {
            let files = assemble_analysis(&osw, &config, &output_dir)?;
            info!(
                "wrote {} and {}",
                files.json.display(),
                files.package.display()
            );
        }
    }

    Ok(())
}
