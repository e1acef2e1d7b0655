use clap::Parser;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tube_cut::orchestrator::{SolveConfig, plan_cuts};
use tube_cut::search::BranchAndBound;
use tube_cut::{render, table};

#[derive(Parser)]
#[command(
    name = "tube_cut",
    about = "Minimum-waste cutting plans for tube stock"
)]
struct Cli {
    /// Demand CSV with columns Required Length (mm), Thickness (mm),
    /// Diameter (mm), Demand, Standard Tube Length (mm). Use - for stdin
    #[arg(long, short)]
    input: PathBuf,

    /// Write the cutting plan here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Search time limit per material group, in seconds
    #[arg(long, default_value_t = 30.0)]
    time_limit: f64,

    /// Search every group to proven optimality
    #[arg(long, conflicts_with = "time_limit")]
    no_time_limit: bool,

    /// Show an ASCII bar for every tube (on stderr)
    #[arg(long)]
    layout: bool,

    /// Show a table of distinct patterns with totals (on stderr)
    #[arg(long)]
    summary: bool,

    /// Emit the full report as JSON instead of CSV
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(level)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> tube_cut::Result<()> {
    let records = if cli.input.as_os_str() == "-" {
        table::read_demand(std::io::stdin().lock())?
    } else {
        table::read_demand(BufReader::new(File::open(&cli.input)?))?
    };

    let config = if cli.no_time_limit {
        SolveConfig::unbounded()
    } else {
        SolveConfig {
            time_limit_secs: Some(cli.time_limit),
        }
    };

    let report = plan_cuts(&records, &BranchAndBound::default(), &config)?;
    for warning in report.warnings() {
        eprintln!("Warning: {warning}");
    }
    let report = report.ensure_nonempty()?;

    if cli.layout {
        for (i, line) in report.lines().enumerate() {
            eprintln!("Tube {} ({}): {}", i + 1, line.key, line.cut_plan());
            eprint!("{}", render::render_tube(line));
        }
        eprintln!();
    }
    if cli.summary {
        eprint!("{}", render::render_summary(&report));
    }

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };

    if cli.json {
        serde_json::to_writer_pretty(&mut out, &report.view()).map_err(std::io::Error::from)?;
        writeln!(out)?;
        out.flush()?;
    } else {
        table::write_plan(&mut out, report.lines())?;
    }

    Ok(())
}
