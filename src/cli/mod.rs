//! Command-line parsing for the grid approximation tool.
//!
//! Argument parsing stays here; dispatch lives in `app` and the numerical work
//! in the library modules.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{BuildOptions, RANGE_SUFFIX, ShapePolicy, Technique, UnavailablePolicy};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "gridx", version, about = "Evaluate and diagnose tabulated grid approximations")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand.
#[derive(Debug, Args, Clone)]
pub struct GlobalArgs {
    /// Reject grids whose axis lengths disagree with the array shape.
    #[arg(long, global = true)]
    pub strict_shapes: bool,

    /// Fail instead of skipping grids where a requested technique is unavailable.
    #[arg(long, global = true)]
    pub fail_unavailable: bool,

    /// Value returned for queries outside the grid (default: extrapolate).
    #[arg(long, global = true, value_name = "V", allow_hyphen_values = true)]
    pub fill_value: Option<f64>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl GlobalArgs {
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            shape_policy: if self.strict_shapes { ShapePolicy::Strict } else { ShapePolicy::Warn },
            unavailable_policy: if self.fail_unavailable {
                UnavailablePolicy::Fail
            } else {
                UnavailablePolicy::Skip
            },
            fill_value: self.fill_value,
        }
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the grids of a dataset with their axes, shape and techniques.
    Info(InfoArgs),
    /// Evaluate one grid's technique at explicit coordinates.
    Eval(EvalArgs),
    /// Report node errors and technique agreement for each grid.
    Diagnose(DiagnoseArgs),
    /// Fit the coefficients of a formula to one grid's table.
    Fit(FitArgs),
    /// Print the coefficient and variable names found in a formula.
    Formula(FormulaArgs),
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Dataset container (.json).
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct EvalArgs {
    /// Dataset container (.json).
    pub file: PathBuf,

    /// Grid label.
    #[arg(short, long)]
    pub label: String,

    /// Approximation technique.
    #[arg(short, long, value_enum, default_value_t = Technique::Rgi)]
    pub technique: Technique,

    /// Query point as comma-separated coordinates in axis order; repeatable.
    #[arg(long = "at", value_name = "V1,V2,..", required = true, value_parser = parse_point, allow_hyphen_values = true)]
    pub points: Vec<QueryPoint>,
}

#[derive(Debug, Args)]
pub struct DiagnoseArgs {
    /// Dataset container (.json).
    pub file: PathBuf,

    /// Restrict to these labels (default: every grid).
    #[arg(short, long = "label")]
    pub labels: Vec<String>,

    /// Number of random samples used to compare techniques.
    #[arg(long, default_value_t = 256)]
    pub samples: usize,

    /// Random seed for the samples.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Debug, Args)]
pub struct FitArgs {
    /// Dataset container (.json).
    pub file: PathBuf,

    /// Grid label.
    #[arg(short, long)]
    pub label: String,

    /// Formula linear in its coefficients, over the grid's axis names.
    #[arg(long)]
    pub eqn: String,
}

#[derive(Debug, Args)]
pub struct FormulaArgs {
    /// Formula text.
    pub formula: String,

    /// Suffix marking range variables.
    #[arg(long, default_value = RANGE_SUFFIX)]
    pub suffix: String,
}

/// One query point, coordinates in axis order.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPoint(pub Vec<f64>);

/// Parse `"v1,v2,.."` into coordinates.
pub fn parse_point(s: &str) -> Result<QueryPoint, String> {
    s.split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<f64>()
                .map_err(|e| format!("invalid coordinate \"{part}\": {e}"))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(QueryPoint)
}
