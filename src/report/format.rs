//! Formatted terminal output.
//!
//! Formatting lives in one place so the numerical code stays free of
//! presentation concerns and output changes stay localized.

use crate::dataset::DataSet;
use crate::domain::Technique;
use crate::grid::Grid;
use crate::regression::CoefficientFit;
use crate::report::ErrorSummary;

/// One block per grid: description, axes, shape and technique states.
pub fn format_dataset_summary(dataset: &DataSet) -> String {
    let mut out = String::new();

    out.push_str("=== gridx - grid approximation dataset ===\n");
    out.push_str(&format!("Grids: {}\n", dataset.len()));
    if !dataset.dropped_labels().is_empty() {
        out.push_str(&format!("Dropped (incomplete sources): {}\n", dataset.dropped_labels().join(", ")));
    }

    for (_, grid) in dataset {
        out.push('\n');
        out.push_str(&format_grid(grid));
    }

    out
}

fn format_grid(grid: &Grid) -> String {
    let mut out = String::new();
    out.push_str(&format!("[{}] {}\n", grid.label(), grid.description()));

    for (name, axis) in grid.axes().iter().zip(grid.axes_range()) {
        out.push_str(&format!(
            "  {:<16} [{}, {}] x {}\n",
            name,
            fmt_num(axis[0]),
            fmt_num(axis[axis.len() - 1]),
            axis.len()
        ));
    }
    let data = if grid.data().is_some() { "table" } else { "no table" };
    out.push_str(&format!("  shape: {:?} ({data})\n", grid.shape()));

    let approx = grid.approx();
    for t in Technique::ALL {
        let state = if approx.is_available(t) {
            "ready"
        } else if approx.requested().contains(&t) {
            "unavailable"
        } else {
            "-"
        };
        out.push_str(&format!("  {:<4} {:<28} {state}\n", t.as_str(), t.display_name()));
    }
    if let Ok(reg) = approx.reg().eqn() {
        out.push_str(&format!("  eqn: {}\n", reg.expression()));
        let coeffs: Vec<String> = reg.coeffs().iter().map(|(k, v)| format!("{k}={}", fmt_num(*v))).collect();
        out.push_str(&format!("  coeffs: {}\n", coeffs.join(" ")));
    }

    out
}

/// Format a table of query points and results.
pub fn format_evaluations(grid: &Grid, technique: Technique, points: &[Vec<f64>], values: &[Vec<f64>]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} ({}) via {}\n", grid.label(), grid.description(), technique.display_name()));

    let mut header: Vec<String> = grid.axes().iter().map(|a| format!("{a:>14}")).collect();
    header.push(format!("{:>14}", "value"));
    out.push_str(header.join(" ").trim_end());
    out.push('\n');

    for (p, v) in points.iter().zip(values) {
        let mut row: Vec<String> = p.iter().map(|x| format!("{:>14}", fmt_num(*x))).collect();
        row.extend(v.iter().map(|x| format!("{:>14}", fmt_num(*x))));
        out.push_str(row.join(" ").trim_end());
        out.push('\n');
    }

    out
}

/// Format an error summary as a single diagnostic line (plus the worst node).
pub fn format_error_summary(s: &ErrorSummary) -> String {
    let mut out = format!(
        "{:<16} {:<14} n={:<6} mean|err|={} max|err|={} rmse={} max_rel={}",
        s.label,
        s.subject,
        s.n,
        fmt_num(s.mean_abs),
        fmt_num(s.max_abs),
        fmt_num(s.rmse),
        fmt_num(s.max_rel)
    );
    if s.skipped > 0 {
        out.push_str(&format!(" skipped={}", s.skipped));
    }
    if let Some(w) = &s.worst {
        out.push_str(&format!(" worst@{}", fmt_vec(w)));
    }
    out.push('\n');
    out
}

/// Format a coefficient fit, including a ready-to-paste `eqn_coeffs` line.
pub fn format_fit(fit: &CoefficientFit) -> String {
    let mut out = String::new();
    out.push_str(&format!("Fit of \"{}\" on grid {}\n", fit.expression, fit.label));
    out.push_str(&format!("Nodes: n={} skipped={}\n", fit.n, fit.skipped));
    for (name, value) in fit.names.iter().zip(&fit.values) {
        out.push_str(&format!("  {name} = {value:.10e}\n"));
    }
    out.push_str(&format!("RMSE={} max|err|={}\n", fmt_num(fit.rmse), fmt_num(fit.max_abs_error)));
    out.push_str(&format!("eqn_coeffs: {}\n", fmt_vec(&fit.values)));
    out
}

fn fmt_num(v: f64) -> String {
    let a = v.abs();
    if v == 0.0 || (1e-3..1e6).contains(&a) {
        format!("{v:.6}")
    } else {
        format!("{v:.6e}")
    }
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| fmt_num(*x)).collect();
    format!("[{}]", parts.join(", "))
}
