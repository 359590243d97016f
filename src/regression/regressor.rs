//! Closed-form regression formulas with stored coefficients.

use std::collections::BTreeMap;

use ndarray::{ArrayD, ArrayViewD, Axis};

use crate::error::GridError;
use crate::expr::CompiledExpr;
use crate::regression::names::{create_coef_dict, extract_coef_names_excluding};

/// A formula compiled with its fitted coefficients fixed.
#[derive(Debug, Clone)]
pub struct ExpressionRegressor {
    eqn: CompiledExpr,
    coeffs: BTreeMap<String, f64>,
}

impl ExpressionRegressor {
    /// Discover coefficient symbols, bind them to `coefficient_values` in sorted
    /// order and compile over `variable_names`.
    pub fn new(expression: &str, coefficient_values: &[f64], variable_names: &[String]) -> Result<Self, GridError> {
        let names = extract_coef_names_excluding(expression, variable_names)?;
        let coeffs = create_coef_dict(&names, coefficient_values)?;
        let eqn = CompiledExpr::compile(expression, variable_names, &coeffs)?;
        Ok(Self { eqn, coeffs })
    }

    pub fn coeffs(&self) -> &BTreeMap<String, f64> {
        &self.coeffs
    }

    pub fn expression(&self) -> &str {
        self.eqn.source()
    }

    pub fn variables(&self) -> &[String] {
        self.eqn.variables()
    }

    /// Evaluate with one argument per variable; arguments broadcast elementwise.
    pub fn eqn(&self, args: &[ArrayD<f64>]) -> Result<ArrayD<f64>, GridError> {
        self.eqn.eval(args)
    }

    /// Evaluate at a single point.
    pub fn eqn_scalar(&self, args: &[f64]) -> Result<f64, GridError> {
        self.eqn.eval_scalar(args)
    }

    /// Evaluate a coordinate batch of shape `(.., N)`, returning shape `(.., 1)`.
    pub fn evaluate_coords(&self, coords: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>, GridError> {
        let n = self.eqn.arity();
        let shape = coords.shape();
        if coords.ndim() == 0 || shape[shape.len() - 1] != n {
            return Err(GridError::InvalidAxis(format!(
                "query array of shape {shape:?} must end in a dimension of size {n}"
            )));
        }
        let last = Axis(coords.ndim() - 1);
        let args: Vec<ArrayD<f64>> = coords.axis_iter(last).map(|col| col.to_owned()).collect();
        let out = self.eqn.eval(&args)?;
        // A formula that ignores its variables yields a 0-d result; stretch it to the batch.
        let batch = &shape[..shape.len() - 1];
        let out = match out.broadcast(batch) {
            Some(view) => view.to_owned(),
            None => {
                return Err(GridError::Broadcast {
                    left: out.shape().to_vec(),
                    right: batch.to_vec(),
                });
            }
        };
        Ok(out.insert_axis(last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, arr0};

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn matches_reference_values() {
        let reg = ExpressionRegressor::new(
            "a + b/(v1/10000.0) + c*log10(v2/10000)",
            &[1.0, 4.0, 7.0],
            &names(&["v1", "v2"]),
        )
        .unwrap();
        let x = array![10000.0, 20000.0, 30000.0].into_dyn();
        let out = reg.eqn(&[x.clone(), x]).unwrap();
        let expected = [5.0, 5.107209969647869, 5.67318211637097];
        for (got, want) in out.iter().zip(expected) {
            assert!((got - want).abs() < 1e-7, "{got} vs {want}");
        }
        assert_eq!(reg.coeffs()["b"], 4.0);
    }

    #[test]
    fn numpy_prefixed_functions_are_accepted() {
        let reg = ExpressionRegressor::new(
            "a + b / (variable1_range/10000.0) + c * np.log10(variable2_range/10000)",
            &[1.0, 4.0, 7.0],
            &names(&["variable1_range", "variable2_range"]),
        )
        .unwrap();
        assert!((reg.eqn_scalar(&[20000.0, 20000.0]).unwrap() - 5.107209969647869).abs() < 1e-7);
        let out = reg.eqn(&[arr0(10000.0).into_dyn(), arr0(10000.0).into_dyn()]).unwrap();
        assert_eq!(out.ndim(), 0);
    }

    #[test]
    fn coefficient_count_mismatch_is_fatal() {
        let err = ExpressionRegressor::new("a + b*temp", &[1.0], &names(&["temp"])).unwrap_err();
        assert!(matches!(err, GridError::CoefficientCountMismatch { names: 2, values: 1 }));
    }

    #[test]
    fn coordinate_batches_gain_a_channel_axis() {
        let reg = ExpressionRegressor::new("a*temp + b*den", &[2.0, 3.0], &names(&["temp", "den"])).unwrap();
        let coords = array![[1.0, 1.0], [2.0, 0.5]].into_dyn();
        let out = reg.evaluate_coords(coords.view()).unwrap();
        assert_eq!(out.shape(), &[2, 1]);
        assert_eq!(out[[1, 0]], 5.5);

        let constant = ExpressionRegressor::new("a", &[4.0], &names(&["temp"])).unwrap();
        let out = constant.evaluate_coords(array![[1.0], [2.0], [3.0]].into_dyn().view()).unwrap();
        assert_eq!(out.shape(), &[3, 1]);
    }
}
