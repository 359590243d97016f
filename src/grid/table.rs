//! Grid construction and axis reconstruction.

use ndarray::ArrayD;

use crate::domain::{AxisRange, BuildOptions, ConfigMap, GridConfig, ShapePolicy};
use crate::error::GridError;
use crate::grid::approximator::Approximator;

/// One tabulated quantity over a regular mesh. Immutable once built.
#[derive(Debug, Clone)]
pub struct Grid {
    label: String,
    data: Option<ArrayD<f64>>,
    axes_range: Vec<Vec<f64>>,
    shape: Vec<usize>,
    config: GridConfig,
    approx: Approximator,
}

impl Grid {
    /// Build a grid from a raw array (if any) and its merged configuration.
    pub fn new(
        label: &str,
        data: Option<ArrayD<f64>>,
        config: &ConfigMap,
        options: &BuildOptions,
    ) -> Result<Self, GridError> {
        let config = GridConfig::from_map(label, config)?;
        Self::from_config(label, data, config, options)
    }

    /// Build a grid from an already parsed configuration.
    pub fn from_config(
        label: &str,
        data: Option<ArrayD<f64>>,
        config: GridConfig,
        options: &BuildOptions,
    ) -> Result<Self, GridError> {
        let axes_range: Vec<Vec<f64>> = config.ranges.iter().map(AxisRange::points).collect();

        if let Some(data) = &data {
            check_shape(label, &config.axes, &axes_range, data.shape(), options.shape_policy)?;
        }
        let shape = match &data {
            Some(d) => d.shape().to_vec(),
            None => axes_range.iter().map(Vec::len).collect(),
        };

        let approx = Approximator::new(label, data.as_ref(), &axes_range, &config, options)?;

        Ok(Self {
            label: label.to_string(),
            data,
            axes_range,
            shape,
            config,
            approx,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Description of the tabulated quantity (`parameter` key).
    pub fn description(&self) -> &str {
        self.config.parameter.as_deref().unwrap_or("")
    }

    pub fn data(&self) -> Option<&ArrayD<f64>> {
        self.data.as_ref()
    }

    /// Axis names in array-dimension order.
    pub fn axes(&self) -> &[String] {
        &self.config.axes
    }

    /// Reconstructed coordinates of the named axis.
    pub fn axis_range(&self, axis: &str) -> Option<&[f64]> {
        let idx = self.config.axes.iter().position(|a| a == axis)?;
        Some(&self.axes_range[idx])
    }

    /// Reconstructed coordinates of every axis, in `axes` order.
    pub fn axes_range(&self) -> &[Vec<f64>] {
        &self.axes_range
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn approx(&self) -> &Approximator {
        &self.approx
    }

    /// Coordinates of every mesh node, in row-major order.
    pub fn nodes(&self) -> MeshNodes<'_> {
        MeshNodes::new(&self.axes_range)
    }
}

/// Row-major walk over the nodes of a mesh.
#[derive(Debug, Clone)]
pub struct MeshNodes<'a> {
    axes: &'a [Vec<f64>],
    index: Vec<usize>,
    done: bool,
}

impl<'a> MeshNodes<'a> {
    pub fn new(axes: &'a [Vec<f64>]) -> Self {
        Self {
            axes,
            index: vec![0; axes.len()],
            done: axes.is_empty() || axes.iter().any(Vec::is_empty),
        }
    }
}

impl Iterator for MeshNodes<'_> {
    type Item = Vec<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let node = self.index.iter().zip(self.axes).map(|(&i, axis)| axis[i]).collect();

        // Odometer increment, last axis fastest.
        self.done = true;
        for n in (0..self.axes.len()).rev() {
            self.index[n] += 1;
            if self.index[n] < self.axes[n].len() {
                self.done = false;
                break;
            }
            self.index[n] = 0;
        }
        Some(node)
    }
}

fn check_shape(
    label: &str,
    axes: &[String],
    axes_range: &[Vec<f64>],
    data_shape: &[usize],
    policy: ShapePolicy,
) -> Result<(), GridError> {
    for (i, (axis, points)) in axes.iter().zip(axes_range).enumerate() {
        let data_len = data_shape.get(i).copied().unwrap_or(0);
        if data_len == points.len() {
            continue;
        }
        let err = GridError::ShapeMismatch {
            label: label.to_string(),
            axis: axis.clone(),
            axis_len: points.len(),
            data_len,
        };
        match policy {
            ShapePolicy::Strict => return Err(err),
            ShapePolicy::Warn => log::warn!("{err}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Technique;
    use ndarray::Array2;
    use serde_json::json;

    fn cfg() -> ConfigMap {
        json!({
            "parameter": "emissivity",
            "axes": ["temp", "den"],
            "temp_range": [9000, 20000, 3],
            "den_range": [1, 600, 4],
            "approximation": ["rgi"]
        })
        .as_object()
        .unwrap()
        .clone()
    }

    #[test]
    fn reconstructs_axes_from_ranges() {
        let data = Array2::<f64>::zeros((3, 4)).into_dyn();
        let grid = Grid::new("H1_6563A", Some(data), &cfg(), &BuildOptions::default()).unwrap();
        assert_eq!(grid.axis_range("temp").unwrap(), &[9000.0, 14500.0, 20000.0]);
        assert_eq!(grid.axis_range("den").unwrap().len(), 4);
        assert_eq!(grid.shape(), &[3, 4]);
        assert_eq!(grid.description(), "emissivity");
        assert_eq!(grid.approx().techniques(), vec![Technique::Rgi]);
    }

    #[test]
    fn shape_mismatch_warns_or_fails_per_policy() {
        let data = Array2::<f64>::zeros((3, 5)).into_dyn();
        let grid = Grid::new("g", Some(data.clone()), &cfg(), &BuildOptions::default()).unwrap();
        // The grid survives, but the table cannot back an interpolator.
        assert!(grid.approx().interp().rgi().is_err());

        let strict = BuildOptions {
            shape_policy: ShapePolicy::Strict,
            ..BuildOptions::default()
        };
        let err = Grid::new("g", Some(data), &cfg(), &strict).unwrap_err();
        assert!(matches!(err, GridError::ShapeMismatch { ref axis, axis_len: 4, data_len: 5, .. } if axis == "den"));
    }

    #[test]
    fn formula_only_grid_takes_shape_from_axes() {
        let mut c = cfg();
        c.insert("approximation".into(), json!(["eqn"]));
        c.insert("eqn".into(), json!("a + b*temp"));
        c.insert("eqn_coeffs".into(), json!([1.0, 0.5]));
        let grid = Grid::new("g", None, &c, &BuildOptions::default()).unwrap();
        assert_eq!(grid.shape(), &[3, 4]);
        assert!(grid.data().is_none());
        let v = grid.approx().reg().eqn().unwrap().eqn_scalar(&[10000.0, 1.0]).unwrap();
        assert_eq!(v, 5001.0);
    }

    #[test]
    fn nodes_walk_row_major() {
        let axes = vec![vec![0.0, 1.0], vec![10.0, 20.0, 30.0]];
        let nodes: Vec<Vec<f64>> = MeshNodes::new(&axes).collect();
        assert_eq!(nodes.len(), 6);
        assert_eq!(nodes[1], vec![0.0, 20.0]);
        assert_eq!(nodes[3], vec![1.0, 10.0]);
    }
}
