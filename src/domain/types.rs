//! Shared domain types.
//!
//! Configuration arrives as loosely typed JSON mappings (one per label, in two
//! levels). The types here are the strongly typed view the engine works with:
//!
//! - parsed once when a grid is built
//! - unknown keys kept verbatim as pass-through metadata
//! - serializable so they can be written back into a container

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GridError;

/// One label's configuration mapping, as persisted.
pub type ConfigMap = serde_json::Map<String, Value>;

/// Label-indexed configuration (either the global or the local level).
pub type ConfigSet = BTreeMap<String, ConfigMap>;

/// Label-indexed raw arrays. `None` marks a grid that only carries a formula.
pub type ArrayMap = BTreeMap<String, Option<ArrayD<f64>>>;

/// Configuration keys interpreted by the engine.
pub const KEY_PARAMETER: &str = "parameter";
pub const KEY_AXES: &str = "axes";
pub const KEY_APPROXIMATION: &str = "approximation";
pub const KEY_EQN: &str = "eqn";
pub const KEY_EQN_COEFFS: &str = "eqn_coeffs";
pub const RANGE_SUFFIX: &str = "_range";

/// Approximation technique identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Technique {
    /// Regular-grid multilinear interpolation.
    Rgi,
    /// Closed-form regression formula.
    Eqn,
}

/// Which half of the approximator hosts a technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TechniqueFamily {
    Interpolation,
    Regression,
}

impl Technique {
    /// Every technique the engine recognizes.
    pub const ALL: [Technique; 2] = [Technique::Rgi, Technique::Eqn];

    pub fn as_str(self) -> &'static str {
        match self {
            Technique::Rgi => "rgi",
            Technique::Eqn => "eqn",
        }
    }

    pub fn family(self) -> TechniqueFamily {
        match self {
            Technique::Rgi => TechniqueFamily::Interpolation,
            Technique::Eqn => TechniqueFamily::Regression,
        }
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            Technique::Rgi => "regular-grid interpolation",
            Technique::Eqn => "regression formula",
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Technique {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Technique::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| format!("unrecognized technique \"{s}\""))
    }
}

/// Compact `(start, stop, count)` axis descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub start: f64,
    pub stop: f64,
    pub count: usize,
}

impl AxisRange {
    /// Largest point count accepted for one axis.
    pub const MAX_POINTS: usize = 1 << 24;

    /// Validate and build a descriptor.
    ///
    /// Requires `2 <= count <= MAX_POINTS`, finite bounds and `stop > start`,
    /// so the reconstructed points are strictly increasing.
    pub fn new(start: f64, stop: f64, count: usize) -> Result<Self, String> {
        if count < 2 {
            return Err(format!("axis range needs at least 2 points, got {count}"));
        }
        if count > Self::MAX_POINTS {
            return Err(format!(
                "axis range of {count} points exceeds the limit of {}",
                Self::MAX_POINTS
            ));
        }
        if !(start.is_finite() && stop.is_finite()) || stop <= start {
            return Err(format!(
                "axis range must satisfy start < stop with finite bounds, got ({start}, {stop})"
            ));
        }
        Ok(Self { start, stop, count })
    }

    /// `count` evenly spaced points from `start` to `stop` inclusive.
    pub fn points(&self) -> Vec<f64> {
        let step = (self.stop - self.start) / (self.count as f64 - 1.0);
        let mut out: Vec<f64> = (0..self.count).map(|i| self.start + step * i as f64).collect();
        // Pin the endpoint so the last node matches `stop` exactly.
        if let Some(last) = out.last_mut() {
            *last = self.stop;
        }
        out
    }

    fn from_value(value: &Value) -> Result<Self, String> {
        let items = value
            .as_array()
            .ok_or_else(|| format!("expected [start, stop, count], got {value}"))?;
        if items.len() != 3 {
            return Err(format!("expected 3 entries (start, stop, count), got {}", items.len()));
        }
        let start = items[0].as_f64().ok_or("range start is not a number")?;
        let stop = items[1].as_f64().ok_or("range stop is not a number")?;
        let too_large = || format!("range count {} exceeds the limit of {}", items[2], Self::MAX_POINTS);
        let count = match (items[2].as_u64(), items[2].as_f64()) {
            (Some(n), _) => usize::try_from(n).map_err(|_| too_large())?,
            (None, Some(x)) if x.fract() == 0.0 && x >= 0.0 => {
                if x > Self::MAX_POINTS as f64 {
                    return Err(too_large());
                }
                x as usize
            }
            _ => return Err(format!("range count must be a non-negative integer, got {}", items[2])),
        };
        AxisRange::new(start, stop, count)
    }

    pub fn to_value(&self) -> Value {
        Value::from(vec![Value::from(self.start), Value::from(self.stop), Value::from(self.count)])
    }
}

/// How a reconstructed-axis vs array-dimension mismatch is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShapePolicy {
    /// Log a warning and keep the grid.
    #[default]
    Warn,
    /// Reject the grid with `GridError::ShapeMismatch`.
    Strict,
}

/// What `extract_approximation` does with labels lacking the technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnavailablePolicy {
    /// Log and leave the label out of the result.
    #[default]
    Skip,
    /// Fail on the first such label.
    Fail,
}

/// Options applied while assembling grids.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub shape_policy: ShapePolicy,
    pub unavailable_policy: UnavailablePolicy,
    /// Value returned by the interpolator for out-of-bounds queries.
    ///
    /// `None` keeps linear extrapolation from the boundary cell.
    pub fill_value: Option<f64>,
}

/// Typed view over one grid's merged configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    pub parameter: Option<String>,
    pub axes: Vec<String>,
    /// One range per entry of `axes`, in the same order.
    pub ranges: Vec<AxisRange>,
    /// `None` when the `approximation` key is absent altogether.
    pub approximation: Option<Vec<Technique>>,
    pub eqn: Option<String>,
    pub eqn_coeffs: Option<Vec<f64>>,
    /// Keys the engine does not interpret.
    pub extra: ConfigMap,
}

impl GridConfig {
    /// Parse the keys the engine interprets out of a merged configuration.
    pub fn from_map(label: &str, map: &ConfigMap) -> Result<Self, GridError> {
        let parameter = match map.get(KEY_PARAMETER) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };

        let axes = parse_axes(label, map.get(KEY_AXES))?;

        let mut ranges = Vec::with_capacity(axes.len());
        for axis in &axes {
            let key = format!("{axis}{RANGE_SUFFIX}");
            let value = map.get(&key).ok_or_else(|| {
                GridError::config(
                    label,
                    format!("configuration does not include a range for the axis \"{axis}\" (key \"{key}\")"),
                )
            })?;
            let range = AxisRange::from_value(value)
                .map_err(|e| GridError::config(label, format!("invalid \"{key}\": {e}")))?;
            ranges.push(range);
        }

        let approximation = map
            .get(KEY_APPROXIMATION)
            .filter(|v| !v.is_null())
            .map(|v| parse_techniques(label, v))
            .transpose()?;

        let eqn = match map.get(KEY_EQN) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(GridError::config(label, format!("\"eqn\" must be a string, got {other}")));
            }
        };

        let eqn_coeffs = match map.get(KEY_EQN_COEFFS) {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => {
                let values: Option<Vec<f64>> = items.iter().map(Value::as_f64).collect();
                Some(values.ok_or_else(|| GridError::config(label, "\"eqn_coeffs\" must contain only numbers"))?)
            }
            Some(other) => {
                return Err(GridError::config(
                    label,
                    format!("\"eqn_coeffs\" must be a list of numbers, got {other}"),
                ));
            }
        };

        let range_keys: Vec<String> = axes.iter().map(|a| format!("{a}{RANGE_SUFFIX}")).collect();
        let extra = map
            .iter()
            .filter(|(k, _)| {
                ![KEY_PARAMETER, KEY_AXES, KEY_APPROXIMATION, KEY_EQN, KEY_EQN_COEFFS].contains(&k.as_str())
                    && !range_keys.contains(*k)
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            parameter,
            axes,
            ranges,
            approximation,
            eqn,
            eqn_coeffs,
            extra,
        })
    }

    /// Serialize back into a configuration mapping (inverse of `from_map`).
    pub fn to_map(&self) -> ConfigMap {
        let mut map = self.extra.clone();
        if let Some(p) = &self.parameter {
            map.insert(KEY_PARAMETER.into(), Value::from(p.clone()));
        }
        map.insert(KEY_AXES.into(), Value::from(self.axes.clone()));
        for (axis, range) in self.axes.iter().zip(&self.ranges) {
            map.insert(format!("{axis}{RANGE_SUFFIX}"), range.to_value());
        }
        if let Some(list) = &self.approximation {
            let names: Vec<Value> = list.iter().map(|t| Value::from(t.as_str())).collect();
            map.insert(KEY_APPROXIMATION.into(), Value::from(names));
        }
        if let Some(eqn) = &self.eqn {
            map.insert(KEY_EQN.into(), Value::from(eqn.clone()));
        }
        if let Some(coeffs) = &self.eqn_coeffs {
            map.insert(KEY_EQN_COEFFS.into(), Value::from(coeffs.clone()));
        }
        map
    }
}

/// Merge two configuration levels; `local` wins on key collision.
pub fn merge_config(global: &ConfigMap, local: &ConfigMap) -> ConfigMap {
    let mut merged = global.clone();
    for (k, v) in local {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

fn parse_axes(label: &str, value: Option<&Value>) -> Result<Vec<String>, GridError> {
    let items = match value {
        Some(Value::Array(items)) => items,
        Some(Value::String(s)) => return Ok(vec![s.clone()]),
        Some(other) => {
            return Err(GridError::config(label, format!("\"axes\" must be a list of names, got {other}")));
        }
        None => return Err(GridError::config(label, "configuration does not include the \"axes\" key")),
    };
    if items.is_empty() {
        return Err(GridError::config(label, "\"axes\" must name at least one axis"));
    }
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| GridError::config(label, format!("axis names must be strings, got {v}")))
        })
        .collect()
}

/// Parse a technique list, dropping identifiers the engine does not recognize.
fn parse_techniques(label: &str, value: &Value) -> Result<Vec<Technique>, GridError> {
    let names: Vec<&str> = match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .ok_or_else(|| GridError::config(label, format!("technique names must be strings, got {v}")))
            })
            .collect::<Result<_, _>>()?,
        other => {
            return Err(GridError::config(
                label,
                format!("\"approximation\" must be a list of technique names, got {other}"),
            ));
        }
    };

    let mut out = Vec::new();
    for name in names {
        match name.parse::<Technique>() {
            Ok(t) if !out.contains(&t) => out.push(t),
            Ok(_) => {}
            Err(e) => log::warn!("grid \"{label}\": ignoring {e}"),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> ConfigMap {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn axis_range_includes_endpoints() {
        let r = AxisRange::new(9000.0, 20000.0, 251).unwrap();
        let p = r.points();
        assert_eq!(p.len(), 251);
        assert_eq!(p[0], 9000.0);
        assert_eq!(p[250], 20000.0);
        assert!(p.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn axis_range_rejects_degenerate_inputs() {
        assert!(AxisRange::new(0.0, 1.0, 1).is_err());
        assert!(AxisRange::new(1.0, 1.0, 5).is_err());
        assert!(AxisRange::new(f64::NAN, 1.0, 5).is_err());
    }

    #[test]
    fn oversized_point_counts_are_rejected() {
        for count in [json!(1e300), json!(u64::MAX), json!(AxisRange::MAX_POINTS + 1)] {
            let cfg = map(json!({"axes": ["temp"], "temp_range": [9000, 20000, count]}));
            let err = GridConfig::from_map("H1", &cfg).unwrap_err();
            assert!(matches!(err, GridError::Configuration { .. }), "{err}");
        }
        assert!(AxisRange::new(0.0, 1.0, AxisRange::MAX_POINTS).is_ok());
    }

    #[test]
    fn missing_axis_range_names_axis_and_label() {
        let cfg = map(json!({"axes": ["temp", "den"], "temp_range": [9000, 20000, 251]}));
        let err = GridConfig::from_map("O3_5007A", &cfg).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("den") && msg.contains("O3_5007A"), "{msg}");
    }

    #[test]
    fn parses_interpreted_keys_and_keeps_extras() {
        let cfg = map(json!({
            "parameter": "emissivity",
            "axes": ["temp", "den"],
            "temp_range": [9000, 20000, 251],
            "den_range": [1, 600, 101.0],
            "approximation": ["rgi", "eqn", "nn"],
            "eqn": "a + b*temp",
            "eqn_coeffs": [1, 2],
            "units": "erg"
        }));
        let g = GridConfig::from_map("H1", &cfg).unwrap();
        assert_eq!(g.parameter.as_deref(), Some("emissivity"));
        assert_eq!(g.ranges[1].count, 101);
        assert_eq!(g.approximation, Some(vec![Technique::Rgi, Technique::Eqn]));
        assert_eq!(g.eqn_coeffs, Some(vec![1.0, 2.0]));
        assert_eq!(g.extra.len(), 1);
        assert_eq!(GridConfig::from_map("H1", &g.to_map()).unwrap(), g);
    }

    #[test]
    fn local_config_overrides_global() {
        let global = map(json!({"parameter": "emissivity", "eqn": "a"}));
        let local = map(json!({"eqn": "a + b*temp"}));
        let merged = merge_config(&global, &local);
        assert_eq!(merged["eqn"], json!("a + b*temp"));
        assert_eq!(merged["parameter"], json!("emissivity"));
    }

    #[test]
    fn technique_parses_from_identifier() {
        assert_eq!("rgi".parse::<Technique>().unwrap(), Technique::Rgi);
        assert_eq!(Technique::Eqn.family(), TechniqueFamily::Regression);
        assert!("spline".parse::<Technique>().is_err());
    }
}
