use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use log::error;

use basket_collection::utils::write_dataset;
use basket_collection::{Pipeline, PipelineConfig, Result};

/// Count co-occurring item pairs across baskets with bounded memory
#[derive(Parser, Debug)]
#[command(name = "basket-pairs", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Aggregate pair counts from a basket file into a CSV report
    Run(RunArgs),

    /// Write a synthetic gzip basket dataset
    Generate(GenerateArgs)
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Input file of basket rows, plain or gzip compressed
    #[arg(long = "gzip_filename", visible_alias = "gzip-filename")]
    gzip_filename: Option<PathBuf>,

    /// Name of the CSV report to write
    #[arg(long = "reportfile")]
    reportfile: Option<PathBuf>,

    /// Approximate number of records per fragment
    #[arg(long = "line_limit", visible_alias = "line-limit")]
    line_limit: Option<usize>,

    /// Maximum pairs per count-fragment
    #[arg(long)]
    row_limit: Option<usize>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker threads for fragment processing and comparison
    #[arg(long)]
    workers: Option<usize>,

    /// Directory for intermediate fragment files
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Keep intermediate fragment files after the run
    #[arg(long)]
    keep_scratch: bool
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Size of the dataset, from 1 to 10
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=10))]
    scale: u8,

    /// Output file; defaults to data_<scale>.csv.gz
    #[arg(long)]
    output: Option<PathBuf>,

    /// Random seed
    #[arg(long, default_value_t = 0)]
    seed: u64
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = match args.config {
        Some(ref path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default()
    };
    config.apply_env_overrides()?;

    if let Some(input) = args.gzip_filename {
        config.input = input;
    }
    if let Some(report) = args.reportfile {
        config.report = report;
    }
    if let Some(n) = args.line_limit {
        config.line_limit = n;
    }
    if args.row_limit.is_some() {
        config.row_limit = args.row_limit;
    }
    if let Some(n) = args.workers {
        config.workers = n;
    }
    if let Some(dir) = args.scratch_dir {
        config.scratch_dir = dir;
    }
    config.keep_scratch |= args.keep_scratch;

    println!("Processing gzip file: {}", config.input.display());
    let summary = Pipeline::new(config)?.run()?;
    println!("{}", summary);
    Ok(())
}

fn generate(args: GenerateArgs) -> Result<()> {
    let scale = args.scale;
    let output = args.output
        .unwrap_or_else(|| PathBuf::from(format!("data_{}.csv.gz", scale)));
    println!("Generating dataset with scale: {}", scale);
    let rows = write_dataset(&output, scale as usize, args.seed)?;
    println!("Generated {} with {} rows", output.display(), rows);
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let res = match cli.command {
        Command::Run(args) => run(args),
        Command::Generate(args) => generate(args)
    };

    if let Err(e) = res {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
