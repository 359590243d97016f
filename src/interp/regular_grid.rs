//! N-dimensional regular-grid multilinear interpolator.
//!
//! Inputs:
//! - `points`: one strictly increasing coordinate vector per axis (`m_1..m_N`)
//! - `values`: array of shape `(m_1, .., m_N, ..trailing)`; trailing dimensions
//!   are independent output channels evaluated together
//!
//! For a query `x` the lower cell index on axis `n` is the `i` with
//! `points[n][i] <= x < points[n][i+1]`, clamped to `[0, m_n - 2]`, so queries
//! beyond the mesh reuse the boundary cell (linear extrapolation). A query is
//! out of bounds when any coordinate lies strictly outside its axis range (or is
//! NaN); with a fill value set, every output channel of such a point is replaced.
//!
//! Cost is `O(2^N)` per query point plus a binary search per axis. Points are
//! evaluated in parallel with rayon.

use ndarray::{ArrayD, ArrayViewD, IxDyn};
use rayon::prelude::*;

use crate::error::GridError;

/// Multilinear interpolator over a regular mesh.
#[derive(Debug, Clone)]
pub struct RegularGridInterpolator {
    points: Vec<Vec<f64>>,
    /// Row-major values, `n_out` consecutive entries per mesh node.
    values: Vec<f64>,
    /// Node strides per axis, in units of mesh nodes.
    strides: Vec<usize>,
    output_shape: Vec<usize>,
    n_out: usize,
    fill_value: Option<f64>,
}

impl RegularGridInterpolator {
    /// Build an interpolator, validating axes against the value array.
    pub fn new(points: Vec<Vec<f64>>, values: ArrayD<f64>) -> Result<Self, GridError> {
        let ndim = points.len();
        if ndim == 0 {
            return Err(GridError::InvalidAxis("at least one axis is required".into()));
        }
        if values.ndim() < ndim {
            return Err(GridError::InvalidAxis(format!(
                "values have {} dimensions but {ndim} axes were given",
                values.ndim()
            )));
        }

        for (n, axis) in points.iter().enumerate() {
            if axis.len() < 2 {
                return Err(GridError::InvalidAxis(format!(
                    "axis {n} needs at least 2 points, got {}",
                    axis.len()
                )));
            }
            if axis.iter().any(|v| !v.is_finite()) {
                return Err(GridError::InvalidAxis(format!("axis {n} contains non-finite points")));
            }
            if axis.windows(2).any(|w| w[1] <= w[0]) {
                return Err(GridError::InvalidAxis(format!("axis {n} is not strictly increasing")));
            }
            if values.shape()[n] != axis.len() {
                return Err(GridError::InvalidAxis(format!(
                    "axis {n} has {} points but values dimension {n} has {}",
                    axis.len(),
                    values.shape()[n]
                )));
            }
        }

        let output_shape = values.shape()[ndim..].to_vec();
        let n_out: usize = output_shape.iter().product();
        if n_out == 0 {
            return Err(GridError::InvalidAxis("values have an empty output dimension".into()));
        }

        let mut strides = vec![1usize; ndim];
        for n in (0..ndim.saturating_sub(1)).rev() {
            strides[n] = strides[n + 1] * points[n + 1].len();
        }

        // `iter()` walks in logical (row-major) order regardless of memory layout.
        let values: Vec<f64> = values.iter().copied().collect();

        Ok(Self {
            points,
            values,
            strides,
            output_shape,
            n_out,
            fill_value: None,
        })
    }

    /// Replace out-of-bounds results with `fill_value` (or extrapolate when `None`).
    pub fn with_fill_value(mut self, fill_value: Option<f64>) -> Self {
        self.fill_value = fill_value;
        self
    }

    pub fn fill_value(&self) -> Option<f64> {
        self.fill_value
    }

    /// Number of interpolation axes `N`.
    pub fn ndim(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[Vec<f64>] {
        &self.points
    }

    /// Shape of the trailing output dimensions.
    pub fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    /// Evaluate a batch of shape `(.., N)`, returning shape `(.., ..trailing)`.
    pub fn evaluate(&self, coords: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>, GridError> {
        let ndim = self.ndim();
        let shape = coords.shape();
        if shape.last() != Some(&ndim) {
            return Err(GridError::InvalidAxis(format!(
                "query array of shape {shape:?} must end in a dimension of size {ndim}"
            )));
        }

        let flat: Vec<f64> = coords.iter().copied().collect();
        let n_points = flat.len() / ndim;
        let mut out = vec![0.0; n_points * self.n_out];

        out.par_chunks_mut(self.n_out)
            .zip(flat.par_chunks(ndim))
            .for_each(|(row, x)| self.interpolate_into(x, row));

        let mut out_shape = shape[..shape.len() - 1].to_vec();
        out_shape.extend_from_slice(&self.output_shape);
        ArrayD::from_shape_vec(IxDyn(&out_shape), out)
            .map_err(|e| GridError::InvalidAxis(format!("cannot shape interpolation output: {e}")))
    }

    /// Evaluate a single coordinate tuple, returning the flattened output channels.
    pub fn evaluate_point(&self, x: &[f64]) -> Result<Vec<f64>, GridError> {
        if x.len() != self.ndim() {
            return Err(GridError::ArgumentCount {
                expected: self.ndim(),
                got: x.len(),
            });
        }
        let mut out = vec![0.0; self.n_out];
        self.interpolate_into(x, &mut out);
        Ok(out)
    }

    fn interpolate_into(&self, x: &[f64], out: &mut [f64]) {
        let ndim = self.ndim();
        let mut lower = Vec::with_capacity(ndim);
        let mut frac = Vec::with_capacity(ndim);
        let mut out_of_bounds = false;

        for (axis, &xv) in self.points.iter().zip(x) {
            let last = axis.len() - 1;
            if !(xv >= axis[0] && xv <= axis[last]) {
                out_of_bounds = true;
            }
            // Number of nodes <= x, minus one, clamped to a valid cell.
            let i = axis.partition_point(|&p| p <= xv).saturating_sub(1).min(last - 1);
            lower.push(i);
            frac.push((xv - axis[i]) / (axis[i + 1] - axis[i]));
        }

        if out_of_bounds {
            if let Some(fill) = self.fill_value {
                out.fill(fill);
                return;
            }
        }

        out.fill(0.0);
        for corner in 0..(1usize << ndim) {
            let mut weight = 1.0;
            let mut node = 0usize;
            for n in 0..ndim {
                let upper = (corner >> n) & 1 == 1;
                weight *= if upper { frac[n] } else { 1.0 - frac[n] };
                node += (lower[n] + upper as usize) * self.strides[n];
            }
            let base = node * self.n_out;
            for (o, v) in out.iter_mut().zip(&self.values[base..base + self.n_out]) {
                *o += weight * v;
            }
        }
    }
}
