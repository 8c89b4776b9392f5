use std::path::PathBuf;
use subasta_core::error::SubastaError;
use subasta_core::extraction::pdftotext::PdftotextExtractor;
use subasta_core::extraction::{AutoExtractor, TableExtractor};
use subasta_core::persist::persist_run;
use subasta_core::pipeline::{Pipeline, RunOutcome};
use subasta_core::source::DirectorySource;
use tracing::{info, warn};

use crate::output;

pub struct RunArgs {
    pub input_dir: PathBuf,
    pub start: u32,
    pub end: u32,
    pub out: PathBuf,
    pub config: Option<PathBuf>,
    pub no_tables: bool,
    pub output_format: String,
}

pub fn run(args: RunArgs) -> Result<(), SubastaError> {
    if args.start > args.end {
        return Err(SubastaError::ConfigInvalid(format!(
            "start {} is after end {}",
            args.start, args.end
        )));
    }
    let config = super::resolve_config(args.config.as_deref())?;

    if !PdftotextExtractor::is_available() {
        warn!("pdftotext not found, only extracted .txt documents can be read");
    }
    let extractor = AutoExtractor::new(PdftotextExtractor::new());
    let tables: Option<&dyn TableExtractor> = if args.no_tables {
        None
    } else {
        Some(&extractor)
    };
    let pipeline = Pipeline::new(config, &extractor, tables);
    let source = DirectorySource::new(&args.input_dir);

    let ids: Vec<u32> = (args.start..=args.end).collect();
    let run = pipeline.run(&ids, &source)?;

    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let written = persist_run(&args.out, args.start, args.end, &stamp, &run)?;

    match args.output_format.as_str() {
        "json" => output::json::print(&run.report)?,
        _ => {
            println!("{}", output::table::format_report(&run.report));
            if let RunOutcome::Completed { weekly, .. } = &run.outcome {
                println!();
                println!("{}", output::table::format_weekly(weekly));
            }
        }
    }

    match (&written, &run.outcome) {
        (Some(paths), _) => {
            eprintln!(
                "Cleaned {} lot(s), written to {}",
                run.report.clean.retained,
                paths.cleaned.display()
            );
            eprintln!("  weekly table: {}", paths.weekly.display());
            eprintln!("  summary: {}", paths.summary.display());
        }
        (None, RunOutcome::EmptyCorpus { stage }) => {
            info!(?stage, "empty corpus, previous outputs kept");
            eprintln!("No lots survived {stage:?}; nothing written");
        }
        (None, RunOutcome::Completed { .. }) => {}
    }

    Ok(())
}
