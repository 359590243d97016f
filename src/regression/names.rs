//! Name extraction helpers used to prepare formulas.
//!
//! Names are found with word-boundary regular expressions:
//!
//! - a coefficient is a single-letter word (`\b[a-zA-Z]\b`: `a`, `b`, `K`, ...)
//! - `x`, `y` and `z` are conventional free-variable names and never coefficients
//! - range variables are whole words ending with a suffix such as `_range`

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

use crate::error::GridError;

/// Single letters reserved for free variables.
pub const RESERVED_VARIABLE_LETTERS: [char; 6] = ['x', 'y', 'z', 'X', 'Y', 'Z'];

const COEFFICIENT_PATTERN: &str = r"\b[a-zA-Z]\b";

/// Distinct coefficient symbols in `expression`, sorted.
pub fn extract_coef_names(expression: &str) -> Result<Vec<String>, GridError> {
    extract_coef_names_excluding(expression, &[])
}

/// Like [`extract_coef_names`], additionally skipping declared variable names.
pub fn extract_coef_names_excluding(expression: &str, variables: &[String]) -> Result<Vec<String>, GridError> {
    let re = Regex::new(COEFFICIENT_PATTERN)?;
    let names: BTreeSet<&str> = re
        .find_iter(expression)
        .map(|m| m.as_str())
        .filter(|t| !t.chars().any(|c| RESERVED_VARIABLE_LETTERS.contains(&c)))
        .filter(|t| !variables.iter().any(|v| v == t))
        .collect();
    Ok(names.into_iter().map(str::to_string).collect())
}

/// Pair coefficient names with values positionally.
pub fn create_coef_dict(names: &[String], values: &[f64]) -> Result<BTreeMap<String, f64>, GridError> {
    if names.len() != values.len() {
        return Err(GridError::CoefficientCountMismatch {
            names: names.len(),
            values: values.len(),
        });
    }
    Ok(names.iter().cloned().zip(values.iter().copied()).collect())
}

/// Distinct words ending with `suffix` (and longer than it), sorted.
pub fn extract_variables_names(expression: &str, suffix: &str) -> Result<Vec<String>, GridError> {
    let re = Regex::new(&format!(r"\b\w+{}\b", regex::escape(suffix)))?;
    let names: BTreeSet<&str> = re.find_iter(expression).map(|m| m.as_str()).collect();
    Ok(names.into_iter().map(str::to_string).collect())
}
