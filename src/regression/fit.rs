//! Least-squares fitting of formula coefficients against a grid's table.
//!
//! Only formulas that are linear in their coefficients are supported. For such
//! a formula `f(x; β) = f(x; 0) + Σ β_j φ_j(x)` the design matrix column `j` is
//! `f(x; e_j) - f(x; 0)`, so the basis is recovered by evaluating the formula
//! itself with unit coefficients; no symbolic differentiation is needed.
//!
//! Linearity is verified after the solve by comparing the formula evaluated at
//! the fitted coefficients with the linear prediction at every node.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::error::GridError;
use crate::expr::CompiledExpr;
use crate::grid::Grid;
use crate::math::{residual_stats, solve_least_squares};
use crate::regression::names::extract_coef_names_excluding;

/// Relative tolerance for the post-fit linearity check.
const LINEARITY_TOL: f64 = 1e-6;

/// Fitted coefficients plus residual statistics over the grid nodes.
#[derive(Debug, Clone)]
pub struct CoefficientFit {
    pub label: String,
    pub expression: String,
    /// Coefficient symbols, sorted; `values[i]` belongs to `names[i]`.
    pub names: Vec<String>,
    pub values: Vec<f64>,
    pub rmse: f64,
    pub max_abs_error: f64,
    /// Nodes used in the fit.
    pub n: usize,
    /// Nodes skipped because the table value or a basis term was not finite.
    pub skipped: usize,
}

/// One design row: the formula with all coefficients at zero, and the basis.
struct Row {
    offset: f64,
    basis: Vec<f64>,
    target: f64,
    node: Vec<f64>,
}

/// Whether the formula matches its linear expansion at `coeffs` on every row.
fn is_linear_at(f: &CompiledExpr, rows: &[Row], coeffs: &[f64]) -> bool {
    rows.par_iter().all(|row| {
        let mut args = row.node.clone();
        args.extend_from_slice(coeffs);
        let linear = row.offset + row.basis.iter().zip(coeffs).map(|(b, v)| b * v).sum::<f64>();
        match f.eval_scalar(&args) {
            Ok(actual) => (actual - linear).abs() <= LINEARITY_TOL * (1.0 + linear.abs()),
            Err(_) => false,
        }
    })
}

/// Fit the coefficients of `expression` to the grid's tabulated values.
pub fn fit_linear_coefficients(grid: &Grid, expression: &str) -> Result<CoefficientFit, GridError> {
    let label = grid.label();
    let fail = |message: String| GridError::Fit {
        label: label.to_string(),
        message,
    };

    let data = grid
        .data()
        .ok_or_else(|| fail("the grid has no array data to fit against".into()))?;
    let n_nodes: usize = grid.axes_range().iter().map(Vec::len).product();
    if data.len() != n_nodes {
        return Err(fail(format!(
            "array has {} values but the axes span {n_nodes} nodes",
            data.len()
        )));
    }

    let axes = grid.axes().to_vec();
    let names = extract_coef_names_excluding(expression, &axes)?;
    if names.is_empty() {
        return Err(fail(format!("formula \"{expression}\" has no coefficient symbols")));
    }

    // Coefficients become trailing positional arguments so one compiled
    // formula serves every evaluation.
    let mut variables = axes;
    variables.extend(names.iter().cloned());
    let f = CompiledExpr::compile(expression, &variables, &Default::default())?;
    let p = names.len();

    let targets: Vec<f64> = data.iter().copied().collect();
    let nodes: Vec<Vec<f64>> = grid.nodes().collect();

    let rows: Vec<Option<Row>> = nodes
        .into_par_iter()
        .zip(targets.into_par_iter())
        .map(|(node, target)| {
            let mut args = node.clone();
            args.resize(node.len() + p, 0.0);
            let offset = f.eval_scalar(&args).ok()?;
            let mut basis = Vec::with_capacity(p);
            for j in 0..p {
                args[node.len() + j] = 1.0;
                basis.push(f.eval_scalar(&args).ok()? - offset);
                args[node.len() + j] = 0.0;
            }
            let finite = target.is_finite() && offset.is_finite() && basis.iter().all(|v| v.is_finite());
            finite.then_some(Row {
                offset,
                basis,
                target,
                node,
            })
        })
        .collect();

    let skipped = rows.iter().filter(|r| r.is_none()).count();
    let rows: Vec<Row> = rows.into_iter().flatten().collect();
    if skipped > 0 {
        log::warn!("grid \"{label}\": skipping {skipped} node(s) with non-finite values");
    }
    if rows.len() < p {
        return Err(fail(format!(
            "{} usable node(s) for {p} coefficient(s)",
            rows.len()
        )));
    }

    // The basis construction is only exact for linear formulas. Check
    // additivity and scaling at fixed coefficients first (a degenerate basis
    // such as the one of `a*b*temp` fits anything), then at the solution.
    let ones = vec![1.0; p];
    let ramp: Vec<f64> = (0..p).map(|j| j as f64 + 2.0).collect();
    if !is_linear_at(&f, &rows, &ones) || !is_linear_at(&f, &rows, &ramp) {
        return Err(fail(format!("formula \"{expression}\" is not linear in its coefficients")));
    }

    let n = rows.len();
    let x = DMatrix::from_fn(n, p, |i, j| rows[i].basis[j]);
    let y = DVector::from_fn(n, |i, _| rows[i].target - rows[i].offset);
    let beta = solve_least_squares(&x, &y).ok_or_else(|| fail("least-squares solve did not converge".into()))?;
    let values: Vec<f64> = beta.iter().copied().collect();

    if !is_linear_at(&f, &rows, &values) {
        return Err(fail(format!("formula \"{expression}\" is not linear in its coefficients")));
    }

    let (rmse, max_abs_error) = residual_stats(&x, &y, &beta);
    log::info!("grid \"{label}\": fitted {p} coefficient(s) on {n} node(s), rmse {rmse:.3e}");

    Ok(CoefficientFit {
        label: label.to_string(),
        expression: expression.to_string(),
        names,
        values,
        rmse,
        max_abs_error,
        n,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BuildOptions;
    use ndarray::Array2;
    use serde_json::json;

    fn grid(f: impl Fn(f64, f64) -> f64) -> Grid {
        let config = json!({
            "axes": ["temp", "den"],
            "temp_range": [1000, 5000, 5],
            "den_range": [1, 4, 4],
            "approximation": ["rgi"]
        });
        let temps = [1000.0, 2000.0, 3000.0, 4000.0, 5000.0];
        let dens = [1.0, 2.0, 3.0, 4.0];
        let data = Array2::from_shape_fn((5, 4), |(i, j)| f(temps[i], dens[j])).into_dyn();
        Grid::new("g", Some(data), config.as_object().unwrap(), &BuildOptions::default()).unwrap()
    }

    #[test]
    fn recovers_exact_coefficients() {
        let g = grid(|t, d| 1.5 + 2.0 * (t / 1000.0) - 0.5 * d.log10());
        let fit = fit_linear_coefficients(&g, "a + b*temp/1000 + c*np.log10(den)").unwrap();
        assert_eq!(fit.names, vec!["a", "b", "c"]);
        let want = [1.5, 2.0, -0.5];
        for (got, want) in fit.values.iter().zip(want) {
            assert!((got - want).abs() < 1e-9, "{got} vs {want}");
        }
        assert!(fit.rmse < 1e-9);
        assert_eq!((fit.n, fit.skipped), (20, 0));
    }

    #[test]
    fn skips_non_finite_nodes() {
        let g = grid(|t, d| if d == 4.0 && t == 1000.0 { f64::NAN } else { 3.0 * d });
        let fit = fit_linear_coefficients(&g, "a*den").unwrap();
        assert!((fit.values[0] - 3.0).abs() < 1e-9);
        assert_eq!(fit.skipped, 1);
    }

    #[test]
    fn rejects_nonlinear_formulas() {
        let g = grid(|t, _| (2.0 * t / 1000.0).exp());
        let err = fit_linear_coefficients(&g, "exp(a*temp/1000)").unwrap_err();
        assert!(err.to_string().contains("not linear"), "{err}");
    }

    #[test]
    fn rejects_products_of_coefficients() {
        // Every unit-coefficient basis column is zero here.
        let g = grid(|t, _| 3.0 * t);
        let err = fit_linear_coefficients(&g, "a*b*temp").unwrap_err();
        assert!(err.to_string().contains("not linear"), "{err}");
        let err = fit_linear_coefficients(&g, "a**2*temp").unwrap_err();
        assert!(matches!(err, GridError::Fit { .. }));
    }

    #[test]
    fn formula_without_coefficients_is_an_error() {
        let g = grid(|t, _| t);
        assert!(matches!(fit_linear_coefficients(&g, "temp*2"), Err(GridError::Fit { .. })));
    }
}
