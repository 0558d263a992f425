//! Correlation function driver
//!
//! Usage:
//!   coffe <SETTINGS.json> [--output <PATH>] [--threads <N>] [-v]
//!   coffe --print-defaults

use clap::Parser;
use coffe_rust::{CoffeError, Settings, compute, compute_all, io};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "coffe")]
#[command(about = "Relativistic two-point correlation function of galaxy number counts")]
struct Args {
    /// JSON settings file
    #[arg(required_unless_present = "print_defaults")]
    settings: Option<PathBuf>,

    /// Output file, overriding `output_file` from the settings
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Worker threads, overriding `nthreads` from the settings
    #[arg(long)]
    threads: Option<usize>,

    /// More log output (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the default settings as JSON and exit
    #[arg(long)]
    print_defaults: bool,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("coffe_rust={level},coffe={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(args: &Args) -> Result<(), CoffeError> {
    if args.print_defaults {
        println!("{}", Settings::default().to_json()?);
        return Ok(());
    }
    let Some(path) = &args.settings else {
        return Err(CoffeError::InvalidInput("no settings file given".into()));
    };

    let started = Instant::now();
    let loaded = Settings::from_file(path)?;
    let mut parameters = loaded.settings.parameters(&loaded.base)?;
    if let Some(n) = args.threads {
        parameters = parameters.with_threads(n);
    }
    let background = loaded.settings.background(&loaded.base)?;
    info!(
        grid = parameters.grid_size(),
        integrals = parameters.nonzero_terms().len(),
        "settings ready"
    );

    let integrals = compute_all(&parameters, background.as_ref())?;
    let corrfunc = compute(&parameters, background.as_ref(), &integrals)?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| loaded.settings.output_path(&loaded.base));
    io::write_corrfunc(&output, &corrfunc)?;
    info!(
        output = %output.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "done"
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(kind = ?err.kind(), "{err}");
            ExitCode::FAILURE
        }
    }
}
