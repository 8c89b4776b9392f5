mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "subasta",
    version,
    about = "Price statistics from livestock auction price sheets"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a range of price sheets into cleaned and weekly tables
    Run {
        /// Directory holding <id>.pdf or <id>.txt files
        #[arg(short, long, value_name = "DIR")]
        input_dir: PathBuf,

        /// First document identifier
        #[arg(long)]
        start: u32,

        /// Last document identifier (inclusive)
        #[arg(long)]
        end: u32,

        /// Where to write the output tables
        #[arg(long = "out", value_name = "DIR", default_value = ".")]
        out: PathBuf,

        /// JSON pipeline config (defaults are used otherwise)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Skip table extraction and use the line grammars only
        #[arg(long)]
        no_tables: bool,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Extract and clean a single price sheet (PDF or extracted text)
    Parse {
        /// Path to PDF or text file
        input_file: PathBuf,

        /// Document identifier to stamp on the rows
        #[arg(long, default_value_t = 0)]
        id: u32,

        /// JSON pipeline config
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Re-clean and re-aggregate a stored cleaned table
    Aggregate {
        /// Cleaned table (default: newest cleaned_*.csv in --out)
        cleaned_file: Option<PathBuf>,

        /// Directory to search and to write the weekly table to
        #[arg(long = "out", value_name = "DIR", default_value = ".")]
        out: PathBuf,

        /// JSON pipeline config
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Print the default pipeline config as JSON
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            input_dir,
            start,
            end,
            out,
            config,
            no_tables,
            output,
        } => commands::run::run(commands::run::RunArgs {
            input_dir,
            start,
            end,
            out,
            config,
            no_tables,
            output_format: output,
        }),
        Commands::Parse {
            input_file,
            id,
            config,
            output,
        } => commands::parse::run(input_file, id, config, &output),
        Commands::Aggregate {
            cleaned_file,
            out,
            config,
        } => commands::aggregate::run(cleaned_file, out, config),
        Commands::Config => commands::config::print_defaults(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
