//! DataSet assembly, lookup and technique extraction.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Index;
use std::path::Path;

use ndarray::{ArrayD, ArrayViewD};

use crate::domain::{ArrayMap, BuildOptions, ConfigSet, Technique, UnavailablePolicy, merge_config};
use crate::error::GridError;
use crate::grid::{Approximation, Grid};

/// A read-only, label-indexed set of grids.
#[derive(Debug, Clone)]
pub struct DataSet {
    grids: BTreeMap<String, Grid>,
    dropped: Vec<String>,
    options: BuildOptions,
}

impl DataSet {
    /// Assemble grids from arrays plus global and local configuration.
    ///
    /// Local entries override global ones on key collision. Any grid that
    /// cannot be built meaningfully fails the whole assembly.
    pub fn new(
        mut arrays: ArrayMap,
        global: &ConfigSet,
        local: &ConfigSet,
        options: BuildOptions,
    ) -> Result<Self, GridError> {
        let in_arrays: BTreeSet<&String> = arrays.keys().collect();
        let in_global: BTreeSet<&String> = global.keys().collect();
        let in_local: BTreeSet<&String> = local.keys().collect();

        let labels: Vec<String> = in_arrays
            .iter()
            .filter(|l| in_global.contains(*l) && in_local.contains(*l))
            .map(|l| l.to_string())
            .collect();

        let dropped: Vec<String> = in_arrays
            .union(&in_global)
            .copied()
            .collect::<BTreeSet<&String>>()
            .union(&in_local)
            .filter(|l| !labels.iter().any(|x| x == **l))
            .map(|l| l.to_string())
            .collect();
        if !dropped.is_empty() {
            log::warn!(
                "dropping {} label(s) missing from the arrays, global or local configuration: {}",
                dropped.len(),
                dropped.join(", ")
            );
        }

        let mut grids = BTreeMap::new();
        for label in labels {
            let data = arrays.remove(&label).flatten();
            let config = merge_config(&global[&label], &local[&label]);
            let grid = Grid::new(&label, data, &config, &options)?;
            grids.insert(label, grid);
        }
        log::info!("assembled {} grid(s)", grids.len());

        Ok(Self { grids, dropped, options })
    }

    /// Load a persisted container and assemble it.
    pub fn from_file(path: &Path, options: BuildOptions) -> Result<Self, GridError> {
        let (arrays, global, local) = crate::io::load_dataset(path)?;
        Self::new(arrays, &global, &local, options)
    }

    /// Labels of the grids held, sorted.
    pub fn data_labels(&self) -> Vec<&str> {
        self.grids.keys().map(String::as_str).collect()
    }

    /// Labels that were missing from at least one source.
    pub fn dropped_labels(&self) -> &[String] {
        &self.dropped
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.grids.contains_key(label)
    }

    pub fn get(&self, label: &str) -> Option<&Grid> {
        self.grids.get(label)
    }

    /// Like `get`, but an unknown label is an error.
    pub fn grid(&self, label: &str) -> Result<&Grid, GridError> {
        self.grids.get(label).ok_or_else(|| GridError::UnknownLabel(label.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Grid)> {
        self.grids.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Map each label to its evaluator for `technique`.
    ///
    /// `labels` restricts the lookup (all grids when `None`). Labels where the
    /// technique is unavailable are skipped or reported per the dataset's
    /// `UnavailablePolicy`; labels not in the dataset are always an error.
    pub fn extract_approximation(
        &self,
        technique: Technique,
        labels: Option<&[&str]>,
    ) -> Result<BTreeMap<String, &dyn Approximation>, GridError> {
        let labels: Vec<&str> = match labels {
            Some(l) => l.to_vec(),
            None => self.data_labels(),
        };

        let mut out = BTreeMap::new();
        for label in labels {
            let grid = self.grid(label)?;
            match grid.approx().get(technique) {
                Ok(approx) => {
                    out.insert(label.to_string(), approx);
                }
                Err(e) => match self.options.unavailable_policy {
                    UnavailablePolicy::Fail => return Err(e),
                    UnavailablePolicy::Skip => log::warn!("{e}"),
                },
            }
        }
        Ok(out)
    }

    /// Evaluate one grid's technique on a coordinate batch of shape `(.., N)`.
    pub fn evaluate(
        &self,
        label: &str,
        technique: Technique,
        coords: ArrayViewD<'_, f64>,
    ) -> Result<ArrayD<f64>, GridError> {
        let approx = self.grid(label)?.approx().get(technique)?;
        approx.evaluate(coords).map_err(|e| GridError::Evaluation {
            label: label.to_string(),
            technique,
            source: Box::new(e),
        })
    }
}

impl Index<&str> for DataSet {
    type Output = Grid;

    /// Panics if the label is not present; use `get` or `grid` to handle that case.
    fn index(&self, label: &str) -> &Grid {
        &self.grids[label]
    }
}

impl<'a> IntoIterator for &'a DataSet {
    type Item = (&'a String, &'a Grid);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Grid>;

    fn into_iter(self) -> Self::IntoIter {
        self.grids.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConfigMap;
    use ndarray::{Array2, array};
    use serde_json::{Value, json};

    fn obj(v: Value) -> ConfigMap {
        v.as_object().unwrap().clone()
    }

    fn base() -> ConfigMap {
        obj(json!({
            "parameter": "emissivity",
            "axes": ["temp", "den"],
            "temp_range": [0, 2, 3],
            "den_range": [0, 1, 2],
            "approximation": ["rgi", "eqn"],
            "eqn": "a*temp + b*den",
            "eqn_coeffs": [1.0, 2.0]
        }))
    }

    fn table(scale: f64) -> Option<ArrayD<f64>> {
        Some(Array2::from_shape_fn((3, 2), |(i, j)| scale * (i as f64 + 2.0 * j as f64)).into_dyn())
    }

    #[test]
    fn keeps_only_labels_present_everywhere() {
        let arrays = ArrayMap::from([("A".to_string(), table(1.0)), ("B".to_string(), table(2.0))]);
        let global = ConfigSet::from([("A".to_string(), base()), ("B".to_string(), base()), ("C".to_string(), base())]);
        let local = ConfigSet::from([("A".to_string(), ConfigMap::new())]);
        let ds = DataSet::new(arrays, &global, &local, BuildOptions::default()).unwrap();
        assert_eq!(ds.data_labels(), vec!["A"]);
        assert_eq!(ds.dropped_labels(), &["B".to_string(), "C".to_string()]);
        assert!(ds.contains("A") && !ds.contains("B"));
        assert_eq!(ds["A"].label(), "A");
    }

    #[test]
    fn local_configuration_wins() {
        let arrays = ArrayMap::from([("A".to_string(), table(1.0))]);
        let global = ConfigSet::from([("A".to_string(), base())]);
        let local = ConfigSet::from([("A".to_string(), obj(json!({"parameter": "ratio", "eqn_coeffs": [3.0, 0.0]})))]);
        let ds = DataSet::new(arrays, &global, &local, BuildOptions::default()).unwrap();
        let grid = ds.grid("A").unwrap();
        assert_eq!(grid.description(), "ratio");
        assert_eq!(grid.approx().reg().eqn().unwrap().coeffs()["a"], 3.0);
    }

    #[test]
    fn extract_skips_or_fails_per_policy() {
        let arrays = ArrayMap::from([("A".to_string(), table(1.0)), ("B".to_string(), None)]);
        let global = ConfigSet::from([("A".to_string(), base()), ("B".to_string(), base())]);
        let local = ConfigSet::from([("A".to_string(), ConfigMap::new()), ("B".to_string(), ConfigMap::new())]);

        let ds = DataSet::new(arrays.clone(), &global, &local, BuildOptions::default()).unwrap();
        let rgi = ds.extract_approximation(Technique::Rgi, None).unwrap();
        assert_eq!(rgi.keys().collect::<Vec<_>>(), vec!["A"]);
        let eqn = ds.extract_approximation(Technique::Eqn, Some(&["B"][..])).unwrap();
        assert_eq!(eqn["B"].evaluate_point(&[1.0, 1.0]).unwrap(), vec![3.0]);

        let strict = BuildOptions {
            unavailable_policy: UnavailablePolicy::Fail,
            ..BuildOptions::default()
        };
        let ds = DataSet::new(arrays, &global, &local, strict).unwrap();
        let err = ds.extract_approximation(Technique::Rgi, None).unwrap_err();
        assert!(err.to_string().contains("\"B\""), "{err}");
        assert!(matches!(
            ds.extract_approximation(Technique::Rgi, Some(&["Z"][..])),
            Err(GridError::UnknownLabel(_))
        ));
    }

    #[test]
    fn evaluate_batches_through_the_dataset() {
        let arrays = ArrayMap::from([("A".to_string(), table(1.0))]);
        let global = ConfigSet::from([("A".to_string(), base())]);
        let local = ConfigSet::from([("A".to_string(), ConfigMap::new())]);
        let ds = DataSet::new(arrays, &global, &local, BuildOptions::default()).unwrap();
        let coords = array![[0.5, 0.5], [2.0, 1.0], [1.0, 0.0]].into_dyn();
        let rgi = ds.evaluate("A", Technique::Rgi, coords.view()).unwrap();
        let eqn = ds.evaluate("A", Technique::Eqn, coords.view()).unwrap();
        assert_eq!(rgi.shape(), &[3, 1]);
        for (r, e) in rgi.iter().zip(eqn.iter()) {
            assert!((r - e).abs() < 1e-12);
        }
        let err = ds.evaluate("A", Technique::Rgi, array![[1.0, 2.0, 3.0]].into_dyn().view()).unwrap_err();
        assert!(matches!(err, GridError::Evaluation { technique: Technique::Rgi, .. }));
    }
}
