//! Reporting utilities: approximation-error diagnostics and formatted terminal output.

pub mod format;

pub use format::*;

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::domain::Technique;
use crate::error::GridError;
use crate::grid::Grid;

/// Error statistics of one comparison (technique vs table, or technique vs technique).
#[derive(Debug, Clone)]
pub struct ErrorSummary {
    pub label: String,
    /// What was compared, e.g. `"rgi vs table"`.
    pub subject: String,
    pub n: usize,
    /// Pairs left out because either side was not finite.
    pub skipped: usize,
    pub mean_abs: f64,
    pub max_abs: f64,
    pub rmse: f64,
    /// Largest `|err| / |reference|` over pairs with a non-zero reference.
    pub max_rel: f64,
    /// Coordinates of the pair with the largest absolute error.
    pub worst: Option<Vec<f64>>,
}

impl ErrorSummary {
    fn from_pairs(label: &str, subject: String, points: &[Vec<f64>], pairs: &[(f64, f64)], channels: usize) -> Self {
        let mut n = 0;
        let mut skipped = 0;
        let mut sum_abs = 0.0;
        let mut sum_sq = 0.0;
        let mut max_abs = 0.0_f64;
        let mut max_rel = 0.0_f64;
        let mut worst = None;

        for (i, &(got, want)) in pairs.iter().enumerate() {
            if !(got.is_finite() && want.is_finite()) {
                skipped += 1;
                continue;
            }
            let err = (got - want).abs();
            n += 1;
            sum_abs += err;
            sum_sq += err * err;
            if err > max_abs || worst.is_none() {
                max_abs = max_abs.max(err);
                worst = Some(points[i / channels].clone());
            }
            if want != 0.0 {
                max_rel = max_rel.max(err / want.abs());
            }
        }

        let denom = n.max(1) as f64;
        Self {
            label: label.to_string(),
            subject,
            n,
            skipped,
            mean_abs: sum_abs / denom,
            max_abs,
            rmse: (sum_sq / denom).sqrt(),
            max_rel,
            worst,
        }
    }
}

fn coords_batch(points: &[Vec<f64>], ndim: usize) -> Result<Array2<f64>, GridError> {
    let flat: Vec<f64> = points.iter().flatten().copied().collect();
    Array2::from_shape_vec((points.len(), ndim), flat)
        .map_err(|e| GridError::InvalidAxis(format!("cannot build coordinate batch: {e}")))
}

/// Evaluate `technique` at every mesh node and compare with the tabulated values.
pub fn node_errors(grid: &Grid, technique: Technique) -> Result<ErrorSummary, GridError> {
    let label = grid.label();
    let approx = grid.approx().get(technique)?;
    let data = grid
        .data()
        .ok_or_else(|| GridError::config(label, "the grid has no array data to compare against"))?;

    let nodes: Vec<Vec<f64>> = grid.nodes().collect();
    if nodes.is_empty() || data.len() % nodes.len() != 0 {
        return Err(GridError::config(
            label,
            format!("array has {} values for {} mesh nodes", data.len(), nodes.len()),
        ));
    }
    let channels = data.len() / nodes.len();

    let coords = coords_batch(&nodes, grid.axes().len())?;
    let values = approx.evaluate(coords.into_dyn().view()).map_err(|e| GridError::Evaluation {
        label: label.to_string(),
        technique,
        source: Box::new(e),
    })?;
    if values.len() != data.len() {
        return Err(GridError::config(
            label,
            format!(
                "\"{technique}\" returns {} channel(s) per node but the table has {channels}",
                values.len() / nodes.len()
            ),
        ));
    }

    let pairs: Vec<(f64, f64)> = values.iter().copied().zip(data.iter().copied()).collect();
    Ok(ErrorSummary::from_pairs(
        label,
        format!("{technique} vs table"),
        &nodes,
        &pairs,
        channels,
    ))
}

/// Compare two techniques at `n` uniformly drawn in-bounds points.
///
/// Points are drawn sequentially from a seeded generator, so a given seed
/// always samples the same coordinates; evaluation runs in parallel.
pub fn sample_agreement(grid: &Grid, a: Technique, b: Technique, n: usize, seed: u64) -> Result<ErrorSummary, GridError> {
    let label = grid.label();
    let first = grid.approx().get(a)?;
    let second = grid.approx().get(b)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let points: Vec<Vec<f64>> = (0..n)
        .map(|_| {
            grid.axes_range()
                .iter()
                .map(|axis| {
                    let (lo, hi) = (axis[0], axis[axis.len() - 1]);
                    if hi > lo { rng.gen_range(lo..=hi) } else { lo }
                })
                .collect()
        })
        .collect();

    let wrap = |technique: Technique| {
        move |e: GridError| GridError::Evaluation {
            label: label.to_string(),
            technique,
            source: Box::new(e),
        }
    };
    let evaluated: Vec<(Vec<f64>, Vec<f64>)> = points
        .par_iter()
        .map(|x| -> Result<_, GridError> {
            let u = first.evaluate_point(x).map_err(wrap(a))?;
            let v = second.evaluate_point(x).map_err(wrap(b))?;
            Ok((u, v))
        })
        .collect::<Result<_, _>>()?;

    // Compare the channels both techniques produce.
    let channels = evaluated
        .first()
        .map(|(x, y)| x.len().min(y.len()))
        .unwrap_or(1)
        .max(1);
    let pairs: Vec<(f64, f64)> = evaluated
        .iter()
        .flat_map(|(x, y)| x.iter().copied().zip(y.iter().copied()).take(channels))
        .collect();

    Ok(ErrorSummary::from_pairs(label, format!("{a} vs {b}"), &points, &pairs, channels))
}

/// Evaluate `technique` on a batch of query points, one row per point.
pub fn evaluate_points(grid: &Grid, technique: Technique, points: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, GridError> {
    let label = grid.label();
    let ndim = grid.axes().len();
    if let Some(bad) = points.iter().find(|p| p.len() != ndim) {
        return Err(GridError::ArgumentCount {
            expected: ndim,
            got: bad.len(),
        });
    }
    let approx = grid.approx().get(technique)?;
    let coords = coords_batch(points, ndim)?;
    let values = approx.evaluate(coords.into_dyn().view()).map_err(|e| GridError::Evaluation {
        label: label.to_string(),
        technique,
        source: Box::new(e),
    })?;
    let per_point = if points.is_empty() { 0 } else { values.len() / points.len() };
    let values = values
        .into_shape_with_order((points.len(), per_point))
        .map_err(|e| GridError::InvalidAxis(format!("cannot reshape evaluation output: {e}")))?;
    Ok(values.axis_iter(Axis(0)).map(|row| row.to_vec()).collect())
}
