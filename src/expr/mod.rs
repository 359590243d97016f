//! Restricted arithmetic formulas.
//!
//! A formula is parsed into a closed grammar (arithmetic operators, a fixed
//! numeric-function allow-list, constants, declared names) and compiled into a
//! tree whose coefficients are folded in as constants. Nothing outside that
//! grammar can be expressed, so formulas stored next to a dataset cannot reach
//! anything but arithmetic.
//!
//! Names resolve in this order: declared variables, fixed bindings
//! (coefficients), then built-in constants (`pi`, `np.pi`, `np.e`). Function
//! and constant names may carry a `np.`, `numpy.` or `math.` prefix.

pub mod eval;
pub mod lexer;
pub mod parser;

use std::collections::BTreeMap;

use ndarray::ArrayD;

use crate::error::GridError;
pub use eval::{Expr, Func, broadcast_shape};
pub use parser::{Ast, BinOp, parse};

const NAMESPACES: [&str; 3] = ["np", "numpy", "math"];

/// A formula compiled over an ordered list of free variables.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    source: String,
    variables: Vec<String>,
    root: Expr,
}

impl CompiledExpr {
    /// Compile `source` with `bindings` fixed and `variables` as positional arguments.
    pub fn compile(source: &str, variables: &[String], bindings: &BTreeMap<String, f64>) -> Result<Self, GridError> {
        let ast = parse(source)?;
        let root = resolve(&ast, variables, bindings)?.fold();
        Ok(Self {
            source: source.to_string(),
            variables: variables.to_vec(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Number of positional arguments the evaluator takes.
    pub fn arity(&self) -> usize {
        self.variables.len()
    }

    /// Evaluate with one array (or 0-d array for a scalar) per variable.
    pub fn eval(&self, args: &[ArrayD<f64>]) -> Result<ArrayD<f64>, GridError> {
        self.check_arity(args.len())?;
        self.root.eval_array(args)
    }

    /// Evaluate at a single point.
    pub fn eval_scalar(&self, args: &[f64]) -> Result<f64, GridError> {
        self.check_arity(args.len())?;
        Ok(self.root.eval_scalar(args))
    }

    fn check_arity(&self, got: usize) -> Result<(), GridError> {
        if got != self.arity() {
            return Err(GridError::ArgumentCount {
                expected: self.arity(),
                got,
            });
        }
        Ok(())
    }
}

fn resolve(ast: &Ast, variables: &[String], bindings: &BTreeMap<String, f64>) -> Result<Expr, GridError> {
    Ok(match ast {
        Ast::Number(v) => Expr::Const(*v),
        Ast::Name(name) => resolve_name(name, variables, bindings)?,
        Ast::Neg(a) => Expr::Neg(Box::new(resolve(a, variables, bindings)?)),
        Ast::Binary(op, a, b) => Expr::Binary(
            *op,
            Box::new(resolve(a, variables, bindings)?),
            Box::new(resolve(b, variables, bindings)?),
        ),
        Ast::Call(name, args) => {
            let func = Func::from_name(strip_namespace(name).ok_or_else(|| unknown("function", name))?)
                .ok_or_else(|| unknown("function", name))?;
            if args.len() != func.arity() {
                return Err(GridError::Parse {
                    offset: 0,
                    message: format!("{name}() takes {} argument(s), got {}", func.arity(), args.len()),
                });
            }
            let args = args
                .iter()
                .map(|a| resolve(a, variables, bindings))
                .collect::<Result<Vec<_>, _>>()?;
            Expr::Call(func, args)
        }
    })
}

fn resolve_name(name: &str, variables: &[String], bindings: &BTreeMap<String, f64>) -> Result<Expr, GridError> {
    if let Some(i) = variables.iter().position(|v| v == name) {
        return Ok(Expr::Var(i));
    }
    if let Some(value) = bindings.get(name) {
        return Ok(Expr::Const(*value));
    }
    let constant = match (name.contains('.'), strip_namespace(name)) {
        (_, Some("pi")) => Some(std::f64::consts::PI),
        (true, Some("e")) => Some(std::f64::consts::E),
        _ => None,
    };
    constant.map(Expr::Const).ok_or_else(|| unknown("name", name))
}

/// Drop an allowed namespace prefix; `None` for any other dotted path.
fn strip_namespace(name: &str) -> Option<&str> {
    match name.split_once('.') {
        None => Some(name),
        Some((ns, rest)) if NAMESPACES.contains(&ns) && !rest.contains('.') => Some(rest),
        Some(_) => None,
    }
}

fn unknown(kind: &'static str, name: &str) -> GridError {
    GridError::UnknownIdentifier {
        kind,
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr0, array};

    fn vars(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn evaluates_with_fixed_coefficients() {
        let bindings = BTreeMap::from([("a".to_string(), 1.0), ("b".to_string(), 2.0)]);
        let f = CompiledExpr::compile("a + b * x**2 - np.sqrt(y)", &vars(&["x", "y"]), &bindings).unwrap();
        assert!((f.eval_scalar(&[3.0, 4.0]).unwrap() - 17.0).abs() < 1e-12);
    }

    #[test]
    fn scalar_and_array_arguments_broadcast() {
        let f = CompiledExpr::compile("x * y", &vars(&["x", "y"]), &BTreeMap::new()).unwrap();
        let out = f.eval(&[array![1.0, 2.0, 3.0].into_dyn(), arr0(2.0).into_dyn()]).unwrap();
        assert_eq!(out, array![2.0, 4.0, 6.0].into_dyn());
    }

    #[test]
    fn constants_resolve_with_or_without_namespace() {
        let f = CompiledExpr::compile("np.e + pi - math.pi", &[], &BTreeMap::new()).unwrap();
        assert!((f.eval_scalar(&[]).unwrap() - std::f64::consts::E).abs() < 1e-12);
    }

    #[test]
    fn rejects_names_outside_the_allow_list() {
        let err = CompiledExpr::compile("os.system(x)", &vars(&["x"]), &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, GridError::UnknownIdentifier { kind: "function", .. }));
        let err = CompiledExpr::compile("x + q", &vars(&["x"]), &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, GridError::UnknownIdentifier { kind: "name", .. }));
        assert!(CompiledExpr::compile("np.linalg.inv(x)", &vars(&["x"]), &BTreeMap::new()).is_err());
        assert!(CompiledExpr::compile("log(x, x)", &vars(&["x"]), &BTreeMap::new()).is_err());
    }

    #[test]
    fn arity_is_checked() {
        let f = CompiledExpr::compile("x + 1", &vars(&["x"]), &BTreeMap::new()).unwrap();
        assert!(matches!(f.eval_scalar(&[]), Err(GridError::ArgumentCount { expected: 1, got: 0 })));
    }
}
