use std::path::PathBuf;
use subasta_core::error::SubastaError;
use subasta_core::persist::{latest_output, read_corpus, write_weekly, OutputKind};
use subasta_core::pipeline::{replay, RunOutcome};

use crate::output;

pub fn run(
    cleaned_file: Option<PathBuf>,
    out: PathBuf,
    config: Option<PathBuf>,
) -> Result<(), SubastaError> {
    let config = super::resolve_config(config.as_deref())?;
    let cleaned_file = match cleaned_file {
        Some(path) => path,
        None => latest_output(&out, OutputKind::Cleaned)?.ok_or_else(|| {
            SubastaError::ParseError(format!("no cleaned table found in {}", out.display()))
        })?,
    };

    let corpus = read_corpus(&cleaned_file)?;
    let run = replay(&config, corpus);

    let RunOutcome::Completed { weekly, .. } = &run.outcome else {
        eprintln!("No lots left in {}; nothing written", cleaned_file.display());
        return Ok(());
    };

    let stem = cleaned_file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("cleaned");
    let suffix = stem
        .strip_prefix(OutputKind::Cleaned.prefix())
        .unwrap_or("_replay");
    let weekly_path = out.join(format!("{}{suffix}.csv", OutputKind::Weekly.prefix()));
    write_weekly(&weekly_path, weekly)?;

    println!("{}", output::table::format_weekly(weekly));
    eprintln!(
        "Aggregated {} lot(s) into {} group(s), written to {}",
        run.report.clean.retained,
        weekly.len(),
        weekly_path.display()
    );
    Ok(())
}
