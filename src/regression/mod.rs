//! Closed-form regression: coefficient discovery, compiled formulas and
//! least-squares coefficient fitting.

pub mod fit;
pub mod names;
pub mod regressor;

pub use fit::{CoefficientFit, fit_linear_coefficients};
pub use names::{
    RESERVED_VARIABLE_LETTERS, create_coef_dict, extract_coef_names, extract_coef_names_excluding,
    extract_variables_names,
};
pub use regressor::ExpressionRegressor;
