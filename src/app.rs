//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the real main that:
//! - loads `.env` and initialises logging
//! - parses CLI arguments
//! - loads and assembles the dataset
//! - runs the requested command and prints its report

use std::path::Path;

use clap::Parser;

use crate::cli::{Cli, Command, DiagnoseArgs, EvalArgs, FitArgs, FormulaArgs, InfoArgs};
use crate::dataset::DataSet;
use crate::domain::{BuildOptions, Technique};
use crate::error::AppError;
use crate::regression::{extract_coef_names, extract_variables_names, fit_linear_coefficients};
use crate::report;

/// Entry point for the `gridx` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let options = cli.global.build_options();
    match cli.command {
        Command::Info(args) => handle_info(args, options),
        Command::Eval(args) => handle_eval(args, options),
        Command::Diagnose(args) => handle_diagnose(args, options),
        Command::Fit(args) => handle_fit(args, options),
        Command::Formula(args) => handle_formula(args),
    }
}

/// `RUST_LOG` wins; otherwise `warn`, raised by each `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn load(path: &Path, options: BuildOptions) -> Result<DataSet, AppError> {
    Ok(DataSet::from_file(path, options)?)
}

fn handle_info(args: InfoArgs, options: BuildOptions) -> Result<(), AppError> {
    let dataset = load(&args.file, options)?;
    print!("{}", report::format_dataset_summary(&dataset));
    Ok(())
}

fn handle_eval(args: EvalArgs, options: BuildOptions) -> Result<(), AppError> {
    let dataset = load(&args.file, options)?;
    let grid = dataset.grid(&args.label)?;
    let points: Vec<Vec<f64>> = args.points.into_iter().map(|p| p.0).collect();
    let values = report::evaluate_points(grid, args.technique, &points)?;
    print!("{}", report::format_evaluations(grid, args.technique, &points, &values));
    Ok(())
}

fn handle_diagnose(args: DiagnoseArgs, options: BuildOptions) -> Result<(), AppError> {
    let dataset = load(&args.file, options)?;
    let labels: Vec<&str> = if args.labels.is_empty() {
        dataset.data_labels()
    } else {
        args.labels.iter().map(String::as_str).collect()
    };

    println!("Node errors:");
    for technique in Technique::ALL {
        let available = dataset.extract_approximation(technique, Some(labels.as_slice()))?;
        for label in available.keys() {
            let grid = dataset.grid(label)?;
            if grid.data().is_none() {
                continue;
            }
            let summary = report::node_errors(grid, technique)?;
            print!("{}", report::format_error_summary(&summary));
        }
    }

    if args.samples > 0 {
        println!("\nTechnique agreement ({} samples, seed {}):", args.samples, args.seed);
        for label in &labels {
            let grid = dataset.grid(label)?;
            let approx = grid.approx();
            if !(approx.is_available(Technique::Rgi) && approx.is_available(Technique::Eqn)) {
                log::info!("grid \"{label}\": skipping agreement check, both techniques are required");
                continue;
            }
            let summary = report::sample_agreement(grid, Technique::Rgi, Technique::Eqn, args.samples, args.seed)?;
            print!("{}", report::format_error_summary(&summary));
        }
    }

    Ok(())
}

fn handle_fit(args: FitArgs, options: BuildOptions) -> Result<(), AppError> {
    let dataset = load(&args.file, options)?;
    let grid = dataset.grid(&args.label)?;
    let fit = fit_linear_coefficients(grid, &args.eqn)?;
    print!("{}", report::format_fit(&fit));
    Ok(())
}

fn handle_formula(args: FormulaArgs) -> Result<(), AppError> {
    // Reject formulas the engine could never compile.
    crate::expr::parse(&args.formula)?;

    let coefficients = extract_coef_names(&args.formula)?;
    let variables = extract_variables_names(&args.formula, &args.suffix)?;
    println!("coefficients: {}", coefficients.join(", "));
    println!("variables   : {}", variables.join(", "));
    Ok(())
}
