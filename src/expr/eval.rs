//! Resolved expression tree and its evaluators.
//!
//! Array evaluation follows NumPy broadcasting: shapes are aligned from the
//! trailing dimension and size-1 (or missing) dimensions stretch. Incompatible
//! shapes are reported as `GridError::Broadcast` instead of panicking.

use ndarray::{ArrayD, IxDyn, Zip, arr0};

use crate::error::GridError;
use crate::expr::parser::BinOp;

/// Allow-listed numeric functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Log,
    Log10,
    Log2,
    Log1p,
    Exp,
    Expm1,
    Sqrt,
    Abs,
    Sin,
    Cos,
    Tan,
    Arcsin,
    Arccos,
    Arctan,
    Sinh,
    Cosh,
    Tanh,
    Power,
    Minimum,
    Maximum,
}

impl Func {
    pub fn from_name(name: &str) -> Option<Func> {
        let f = match name {
            "log" => Func::Log,
            "log10" => Func::Log10,
            "log2" => Func::Log2,
            "log1p" => Func::Log1p,
            "exp" => Func::Exp,
            "expm1" => Func::Expm1,
            "sqrt" => Func::Sqrt,
            "abs" | "fabs" | "absolute" => Func::Abs,
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "arcsin" | "asin" => Func::Arcsin,
            "arccos" | "acos" => Func::Arccos,
            "arctan" | "atan" => Func::Arctan,
            "sinh" => Func::Sinh,
            "cosh" => Func::Cosh,
            "tanh" => Func::Tanh,
            "power" | "pow" => Func::Power,
            "minimum" | "min" => Func::Minimum,
            "maximum" | "max" => Func::Maximum,
            _ => return None,
        };
        Some(f)
    }

    pub fn arity(self) -> usize {
        match self {
            Func::Power | Func::Minimum | Func::Maximum => 2,
            _ => 1,
        }
    }

    fn apply1(self, x: f64) -> f64 {
        match self {
            Func::Log => x.ln(),
            Func::Log10 => x.log10(),
            Func::Log2 => x.log2(),
            Func::Log1p => x.ln_1p(),
            Func::Exp => x.exp(),
            Func::Expm1 => x.exp_m1(),
            Func::Sqrt => x.sqrt(),
            Func::Abs => x.abs(),
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Arcsin => x.asin(),
            Func::Arccos => x.acos(),
            Func::Arctan => x.atan(),
            Func::Sinh => x.sinh(),
            Func::Cosh => x.cosh(),
            Func::Tanh => x.tanh(),
            Func::Power | Func::Minimum | Func::Maximum => f64::NAN,
        }
    }

    fn apply2(self, a: f64, b: f64) -> f64 {
        match self {
            Func::Power => a.powf(b),
            // NumPy's minimum/maximum propagate NaN.
            Func::Minimum if a.is_nan() || b.is_nan() => f64::NAN,
            Func::Maximum if a.is_nan() || b.is_nan() => f64::NAN,
            Func::Minimum => a.min(b),
            Func::Maximum => a.max(b),
            _ => f64::NAN,
        }
    }
}

/// Expression tree with every name resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    /// Index into the evaluator's positional arguments.
    Var(usize),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

impl Expr {
    /// Evaluate at a single point.
    pub fn eval_scalar(&self, args: &[f64]) -> f64 {
        match self {
            Expr::Const(c) => *c,
            Expr::Var(i) => args[*i],
            Expr::Neg(a) => -a.eval_scalar(args),
            Expr::Binary(op, a, b) => op.apply(a.eval_scalar(args), b.eval_scalar(args)),
            Expr::Call(f, xs) => match xs.as_slice() {
                [x] => f.apply1(x.eval_scalar(args)),
                [x, y] => f.apply2(x.eval_scalar(args), y.eval_scalar(args)),
                _ => f64::NAN,
            },
        }
    }

    /// Evaluate elementwise over broadcast arrays.
    pub fn eval_array(&self, args: &[ArrayD<f64>]) -> Result<ArrayD<f64>, GridError> {
        match self {
            Expr::Const(c) => Ok(arr0(*c).into_dyn()),
            Expr::Var(i) => Ok(args[*i].clone()),
            Expr::Neg(a) => Ok(a.eval_array(args)?.mapv_into(|v| -v)),
            Expr::Binary(op, a, b) => {
                let lhs = a.eval_array(args)?;
                let rhs = b.eval_array(args)?;
                zip_broadcast(&lhs, &rhs, |x, y| op.apply(x, y))
            }
            Expr::Call(f, xs) => match xs.as_slice() {
                [x] => Ok(x.eval_array(args)?.mapv_into(|v| f.apply1(v))),
                [x, y] => {
                    let lhs = x.eval_array(args)?;
                    let rhs = y.eval_array(args)?;
                    zip_broadcast(&lhs, &rhs, |a, b| f.apply2(a, b))
                }
                _ => Ok(arr0(f64::NAN).into_dyn()),
            },
        }
    }

    /// Fold sub-trees that no longer depend on any variable.
    pub fn fold(self) -> Expr {
        match self {
            Expr::Neg(a) => match a.fold() {
                Expr::Const(c) => Expr::Const(-c),
                other => Expr::Neg(Box::new(other)),
            },
            Expr::Binary(op, a, b) => match (a.fold(), b.fold()) {
                (Expr::Const(x), Expr::Const(y)) => Expr::Const(op.apply(x, y)),
                (x, y) => Expr::Binary(op, Box::new(x), Box::new(y)),
            },
            Expr::Call(f, xs) => {
                let xs: Vec<Expr> = xs.into_iter().map(Expr::fold).collect();
                if xs.iter().all(|x| matches!(x, Expr::Const(_))) {
                    Expr::Const(Expr::Call(f, xs).eval_scalar(&[]))
                } else {
                    Expr::Call(f, xs)
                }
            }
            leaf => leaf,
        }
    }
}

/// Common shape of two operands under NumPy broadcasting rules.
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let ndim = a.len().max(b.len());
    let mut out = vec![0; ndim];
    for k in 0..ndim {
        let da = if k < ndim - a.len() { 1 } else { a[k - (ndim - a.len())] };
        let db = if k < ndim - b.len() { 1 } else { b[k - (ndim - b.len())] };
        out[k] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => return None,
        };
    }
    Some(out)
}

fn zip_broadcast(
    a: &ArrayD<f64>,
    b: &ArrayD<f64>,
    f: impl Fn(f64, f64) -> f64,
) -> Result<ArrayD<f64>, GridError> {
    let mismatch = || GridError::Broadcast {
        left: a.shape().to_vec(),
        right: b.shape().to_vec(),
    };
    let shape = broadcast_shape(a.shape(), b.shape()).ok_or_else(mismatch)?;
    let av = a.broadcast(IxDyn(&shape)).ok_or_else(mismatch)?;
    let bv = b.broadcast(IxDyn(&shape)).ok_or_else(mismatch)?;
    Ok(Zip::from(av).and(bv).map_collect(|&x, &y| f(x, y)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, array};

    #[test]
    fn broadcast_shape_follows_numpy_rules() {
        assert_eq!(broadcast_shape(&[3], &[]), Some(vec![3]));
        assert_eq!(broadcast_shape(&[4, 1], &[3]), Some(vec![4, 3]));
        assert_eq!(broadcast_shape(&[2, 3], &[3, 2]), None);
    }

    #[test]
    fn column_and_row_broadcast_to_a_matrix() {
        // x - y with x: (3, 1), y: (2,)
        let expr = Expr::Binary(BinOp::Sub, Box::new(Expr::Var(0)), Box::new(Expr::Var(1)));
        let x = array![[1.0], [2.0], [3.0]].into_dyn();
        let y = array![10.0, 20.0].into_dyn();
        let out = expr.eval_array(&[x, y]).unwrap();
        assert_eq!(out.shape(), &[3, 2]);
        assert_eq!(out[[2, 1]], -17.0);
    }

    #[test]
    fn incompatible_shapes_are_an_error() {
        let expr = Expr::Binary(BinOp::Add, Box::new(Expr::Var(0)), Box::new(Expr::Var(1)));
        let x = Array1::<f64>::zeros(3).into_dyn();
        let y = Array1::<f64>::zeros(4).into_dyn();
        assert!(matches!(expr.eval_array(&[x, y]), Err(GridError::Broadcast { .. })));
    }

    #[test]
    fn fold_collapses_constant_subtrees() {
        let expr = Expr::Binary(
            BinOp::Mul,
            Box::new(Expr::Call(Func::Log10, vec![Expr::Const(100.0)])),
            Box::new(Expr::Var(0)),
        )
        .fold();
        assert_eq!(expr, Expr::Binary(BinOp::Mul, Box::new(Expr::Const(2.0)), Box::new(Expr::Var(0))));
    }
}
