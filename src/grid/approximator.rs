//! Per-grid façade over the configured approximation techniques.
//!
//! Each requested technique ends up in one of three states: not requested,
//! unavailable (with the reason, logged once at build time), or ready. The
//! state is fixed at construction so a built grid can be shared freely.

use ndarray::{ArrayD, ArrayViewD, Axis};

use crate::domain::{BuildOptions, GridConfig, Technique, TechniqueFamily};
use crate::error::GridError;
use crate::interp::RegularGridInterpolator;
use crate::regression::ExpressionRegressor;

/// Uniform evaluation surface shared by every technique.
pub trait Approximation: Send + Sync + std::fmt::Debug {
    fn technique(&self) -> Technique;

    /// Number of coordinates per query point.
    fn ndim(&self) -> usize;

    /// Evaluate a batch of shape `(.., N)`, returning shape `(.., k)`.
    fn evaluate(&self, coords: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>, GridError>;

    /// Evaluate one coordinate tuple, returning its `k` output channels.
    fn evaluate_point(&self, x: &[f64]) -> Result<Vec<f64>, GridError>;
}

impl Approximation for RegularGridInterpolator {
    fn technique(&self) -> Technique {
        Technique::Rgi
    }

    fn ndim(&self) -> usize {
        RegularGridInterpolator::ndim(self)
    }

    fn evaluate(&self, coords: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>, GridError> {
        RegularGridInterpolator::evaluate(self, coords)
    }

    fn evaluate_point(&self, x: &[f64]) -> Result<Vec<f64>, GridError> {
        RegularGridInterpolator::evaluate_point(self, x)
    }
}

impl Approximation for ExpressionRegressor {
    fn technique(&self) -> Technique {
        Technique::Eqn
    }

    fn ndim(&self) -> usize {
        self.variables().len()
    }

    fn evaluate(&self, coords: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>, GridError> {
        self.evaluate_coords(coords)
    }

    fn evaluate_point(&self, x: &[f64]) -> Result<Vec<f64>, GridError> {
        Ok(vec![self.eqn_scalar(x)?])
    }
}

#[derive(Debug, Clone)]
enum Slot<T> {
    NotRequested,
    Unavailable(String),
    Ready(T),
}

impl<T> Slot<T> {
    fn get(&self, label: &str, technique: Technique) -> Result<&T, GridError> {
        match self {
            Slot::Ready(v) => Ok(v),
            Slot::Unavailable(reason) => Err(GridError::unavailable(label, technique, reason.clone())),
            Slot::NotRequested => Err(GridError::unavailable(
                label,
                technique,
                "technique not listed in the grid's \"approximation\" configuration",
            )),
        }
    }

    fn is_ready(&self) -> bool {
        matches!(self, Slot::Ready(_))
    }
}

/// Interpolation techniques of one grid.
#[derive(Debug, Clone)]
pub struct Interpolation {
    label: String,
    rgi: Slot<RegularGridInterpolator>,
}

impl Interpolation {
    fn build(label: &str, requested: bool, data: Option<&ArrayD<f64>>, points: &[Vec<f64>], options: &BuildOptions) -> Self {
        let rgi = if !requested {
            Slot::NotRequested
        } else {
            match data {
                None => {
                    log::warn!("grid \"{label}\": no array data, interpolation techniques cannot be used");
                    Slot::Unavailable("the grid has no array data".into())
                }
                Some(data) => {
                    // A bare table becomes a single output channel.
                    let values = if data.ndim() == points.len() {
                        data.clone().insert_axis(Axis(data.ndim()))
                    } else {
                        data.clone()
                    };
                    match RegularGridInterpolator::new(points.to_vec(), values) {
                        Ok(interp) => {
                            log::debug!("grid \"{label}\": built rgi over {} axes", points.len());
                            Slot::Ready(interp.with_fill_value(options.fill_value))
                        }
                        Err(e) => {
                            log::warn!("grid \"{label}\": rgi unavailable: {e}");
                            Slot::Unavailable(e.to_string())
                        }
                    }
                }
            }
        };
        Self {
            label: label.to_string(),
            rgi,
        }
    }

    /// The regular-grid interpolator.
    pub fn rgi(&self) -> Result<&RegularGridInterpolator, GridError> {
        self.rgi.get(&self.label, Technique::Rgi)
    }

    /// Interpolation techniques ready for use.
    pub fn techniques(&self) -> Vec<Technique> {
        if self.rgi.is_ready() { vec![Technique::Rgi] } else { Vec::new() }
    }
}

/// Regression techniques of one grid.
#[derive(Debug, Clone)]
pub struct Regression {
    label: String,
    eqn: Slot<ExpressionRegressor>,
}

impl Regression {
    fn build(label: &str, requested: bool, config: &GridConfig) -> Result<Self, GridError> {
        let eqn = if !requested {
            Slot::NotRequested
        } else {
            match (&config.eqn, &config.eqn_coeffs) {
                (Some(formula), Some(coeffs)) => {
                    let reg = ExpressionRegressor::new(formula, coeffs, &config.axes).map_err(|e| GridError::Formula {
                        label: label.to_string(),
                        technique: Technique::Eqn,
                        source: Box::new(e),
                    })?;
                    log::debug!("grid \"{label}\": compiled eqn with {} coefficients", reg.coeffs().len());
                    Slot::Ready(reg)
                }
                (formula, coeffs) => {
                    let mut missing = Vec::new();
                    if formula.is_none() {
                        missing.push("parametrisation formula (\"eqn\" key)");
                    }
                    if coeffs.is_none() {
                        missing.push("parametrisation coefficients (\"eqn_coeffs\" key)");
                    }
                    let reason = format!("missing {}", missing.join(" and "));
                    log::warn!("grid \"{label}\": {reason}");
                    Slot::Unavailable(reason)
                }
            }
        };
        Ok(Self {
            label: label.to_string(),
            eqn,
        })
    }

    /// The compiled regression formula.
    pub fn eqn(&self) -> Result<&ExpressionRegressor, GridError> {
        self.eqn.get(&self.label, Technique::Eqn)
    }

    /// Regression techniques ready for use.
    pub fn techniques(&self) -> Vec<Technique> {
        if self.eqn.is_ready() { vec![Technique::Eqn] } else { Vec::new() }
    }
}

/// The approximation techniques built for one grid.
#[derive(Debug, Clone)]
pub struct Approximator {
    requested: Vec<Technique>,
    interp: Interpolation,
    reg: Regression,
}

impl Approximator {
    /// Build every requested technique.
    ///
    /// A missing technique list is a configuration error. A requested technique
    /// whose inputs are absent is left unavailable; a formula that is present but
    /// broken (syntax, unknown names, coefficient count) fails the build.
    pub fn new(
        label: &str,
        data: Option<&ArrayD<f64>>,
        points: &[Vec<f64>],
        config: &GridConfig,
        options: &BuildOptions,
    ) -> Result<Self, GridError> {
        let requested = config.approximation.clone().ok_or_else(|| {
            GridError::config(
                label,
                "configuration does not include an \"approximation\" technique list",
            )
        })?;
        if requested.is_empty() {
            log::warn!("grid \"{label}\": empty \"approximation\" list, no technique will be available");
        }

        let wants = |family: TechniqueFamily, t: Technique| t.family() == family && requested.contains(&t);
        let interp = Interpolation::build(
            label,
            wants(TechniqueFamily::Interpolation, Technique::Rgi),
            data,
            points,
            options,
        );
        let reg = Regression::build(label, wants(TechniqueFamily::Regression, Technique::Eqn), config)?;

        Ok(Self { requested, interp, reg })
    }

    pub fn interp(&self) -> &Interpolation {
        &self.interp
    }

    pub fn reg(&self) -> &Regression {
        &self.reg
    }

    /// Techniques listed in the configuration, available or not.
    pub fn requested(&self) -> &[Technique] {
        &self.requested
    }

    /// Techniques ready for evaluation.
    pub fn techniques(&self) -> Vec<Technique> {
        let mut out = self.interp.techniques();
        out.extend(self.reg.techniques());
        out
    }

    pub fn is_available(&self, technique: Technique) -> bool {
        self.get(technique).is_ok()
    }

    /// Look up a technique's evaluator by identifier.
    pub fn get(&self, technique: Technique) -> Result<&dyn Approximation, GridError> {
        let approx: &dyn Approximation = match technique {
            Technique::Rgi => self.interp.rgi()?,
            Technique::Eqn => self.reg.eqn()?,
        };
        Ok(approx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AxisRange, ConfigMap};
    use ndarray::Array2;

    fn config(approximation: Option<Vec<Technique>>, eqn: Option<&str>, coeffs: Option<Vec<f64>>) -> GridConfig {
        GridConfig {
            parameter: Some("emissivity".into()),
            axes: vec!["temp".into(), "den".into()],
            ranges: vec![AxisRange::new(0.0, 2.0, 3).unwrap(), AxisRange::new(0.0, 1.0, 2).unwrap()],
            approximation,
            eqn: eqn.map(str::to_string),
            eqn_coeffs: coeffs,
            extra: ConfigMap::new(),
        }
    }

    fn points() -> Vec<Vec<f64>> {
        vec![vec![0.0, 1.0, 2.0], vec![0.0, 1.0]]
    }

    #[test]
    fn builds_both_techniques() {
        let data = Array2::from_shape_fn((3, 2), |(i, j)| (i + 2 * j) as f64).into_dyn();
        let cfg = config(Some(vec![Technique::Rgi, Technique::Eqn]), Some("a*temp + b*den"), Some(vec![1.0, 2.0]));
        let approx = Approximator::new("g", Some(&data), &points(), &cfg, &BuildOptions::default()).unwrap();
        assert_eq!(approx.techniques(), vec![Technique::Rgi, Technique::Eqn]);

        let rgi = approx.get(Technique::Rgi).unwrap().evaluate_point(&[1.5, 0.5]).unwrap();
        let eqn = approx.get(Technique::Eqn).unwrap().evaluate_point(&[1.5, 0.5]).unwrap();
        assert!((rgi[0] - 2.5).abs() < 1e-12);
        assert!((eqn[0] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn missing_data_degrades_interpolation_only() {
        let cfg = config(Some(vec![Technique::Rgi, Technique::Eqn]), Some("a + b*temp"), Some(vec![1.0, 2.0]));
        let approx = Approximator::new("g", None, &points(), &cfg, &BuildOptions::default()).unwrap();
        let err = approx.interp().rgi().unwrap_err();
        assert!(matches!(err, GridError::ApproximationUnavailable { technique: Technique::Rgi, .. }));
        assert!(approx.reg().eqn().is_ok());
    }

    #[test]
    fn unrequested_and_incomplete_techniques_are_unavailable() {
        let data = Array2::<f64>::zeros((3, 2)).into_dyn();
        let cfg = config(Some(vec![Technique::Eqn]), None, Some(vec![1.0]));
        let approx = Approximator::new("g", Some(&data), &points(), &cfg, &BuildOptions::default()).unwrap();
        assert!(approx.techniques().is_empty());
        assert!(!approx.is_available(Technique::Rgi));
        let msg = approx.reg().eqn().unwrap_err().to_string();
        assert!(msg.contains("\"eqn\" key"), "{msg}");
    }

    #[test]
    fn missing_technique_list_is_a_configuration_error() {
        let cfg = config(None, None, None);
        let err = Approximator::new("g", None, &points(), &cfg, &BuildOptions::default()).unwrap_err();
        assert!(matches!(err, GridError::Configuration { .. }));
    }

    #[test]
    fn coefficient_mismatch_fails_the_build() {
        let cfg = config(Some(vec![Technique::Eqn]), Some("a + b*temp + c*den"), Some(vec![1.0, 2.0]));
        let err = Approximator::new("g", None, &points(), &cfg, &BuildOptions::default()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("\"g\"") && msg.contains("3 coefficient symbols"), "{msg}");
        match err {
            GridError::Formula { label, technique, source } => {
                assert_eq!((label.as_str(), technique), ("g", Technique::Eqn));
                assert!(matches!(*source, GridError::CoefficientCountMismatch { names: 3, values: 2 }));
            }
            other => panic!("expected a formula error, got {other:?}"),
        }
    }
}
