//! Read/write dataset container files.
//!
//! A container is a single JSON document holding the three label-indexed
//! mappings a `DataSet` is assembled from:
//!
//! ```text
//! {
//!   "format": "grid-approx",
//!   "version": 1,
//!   "created": "2024-05-01T12:00:00Z",
//!   "arrays": { "<label>": { "v": 1, "dim": [..], "data": [..] } | null },
//!   "global": { "<label>": { .. } },
//!   "local":  { "<label>": { .. } }
//! }
//! ```
//!
//! Arrays use ndarray's serde layout. A `null` array is a formula-only grid.
//! JSON has no encoding for NaN or infinities, so tables holding them are
//! refused at save time instead of producing a file that cannot be read back.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ArrayMap, ConfigMap, ConfigSet};
use crate::error::GridError;

pub const CONTAINER_FORMAT: &str = "grid-approx";
pub const CONTAINER_VERSION: u32 = 1;
pub const CONTAINER_EXTENSION: &str = "json";

#[derive(Debug, Deserialize)]
struct ContainerFile {
    format: String,
    version: u32,
    #[serde(default)]
    created: Option<DateTime<Utc>>,
    arrays: ArrayMap,
    #[serde(default)]
    global: ConfigSet,
    #[serde(default)]
    local: ConfigSet,
}

#[derive(Serialize)]
struct ContainerRef<'a> {
    format: &'a str,
    version: u32,
    created: DateTime<Utc>,
    arrays: &'a ArrayMap,
    global: &'a ConfigSet,
    local: &'a ConfigSet,
}

fn check_extension(path: &Path) -> Result<(), GridError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case(CONTAINER_EXTENSION) => Ok(()),
        other => Err(GridError::Format {
            path: path.to_path_buf(),
            message: format!(
                "the extension \"{}\" is not recognized, please use \".{CONTAINER_EXTENSION}\"",
                other.unwrap_or("")
            ),
        }),
    }
}

/// Read a container file into `(arrays, global, local)`.
pub fn load_dataset(path: &Path) -> Result<(ArrayMap, ConfigSet, ConfigSet), GridError> {
    if !path.is_file() {
        return Err(GridError::NotFound {
            path: path.to_path_buf(),
        });
    }
    check_extension(path)?;

    let file = File::open(path).map_err(|source| GridError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let container: ContainerFile =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| GridError::Format {
            path: path.to_path_buf(),
            message: format!("invalid container: {e}"),
        })?;

    if container.format != CONTAINER_FORMAT || container.version != CONTAINER_VERSION {
        return Err(GridError::Format {
            path: path.to_path_buf(),
            message: format!(
                "unsupported container \"{}\" version {} (expected \"{CONTAINER_FORMAT}\" version {CONTAINER_VERSION})",
                container.format, container.version
            ),
        });
    }

    match container.created {
        Some(ts) => log::info!(
            "loaded {} array(s) from '{}' (created {})",
            container.arrays.len(),
            path.display(),
            ts.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => log::info!("loaded {} array(s) from '{}'", container.arrays.len(), path.display()),
    }

    Ok((container.arrays, container.global, container.local))
}

/// Write `(arrays, global, local)` to a container file, replacing it if present.
pub fn save_dataset(path: &Path, arrays: &ArrayMap, global: &ConfigSet, local: &ConfigSet) -> Result<(), GridError> {
    if arrays.is_empty() {
        return Err(GridError::config(
            path.display().to_string(),
            "refusing to save a dataset with no arrays",
        ));
    }
    check_extension(path)?;
    check_finite(path, arrays)?;

    let io_err = |source: std::io::Error| GridError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let container = ContainerRef {
        format: CONTAINER_FORMAT,
        version: CONTAINER_VERSION,
        created: Utc::now(),
        arrays,
        global,
        local,
    };
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &container)?;
    writer.flush().map_err(io_err)?;

    log::info!("saved {} array(s) to '{}'", arrays.len(), path.display());
    Ok(())
}

fn check_finite(path: &Path, arrays: &ArrayMap) -> Result<(), GridError> {
    for (label, array) in arrays {
        let Some(array) = array else { continue };
        let bad = array.iter().filter(|v| !v.is_finite()).count();
        if bad > 0 {
            return Err(GridError::Format {
                path: path.to_path_buf(),
                message: format!("array \"{label}\" holds {bad} non-finite value(s), which JSON cannot store"),
            });
        }
    }
    Ok(())
}

/// Expand one dataset-wide configuration into a per-label global configuration.
pub fn broadcast_config<S: AsRef<str>>(common: &ConfigMap, labels: &[S]) -> ConfigSet {
    labels
        .iter()
        .map(|l| (l.as_ref().to_string(), common.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, ArrayD};
    use serde_json::json;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("grid_approx_{}_{name}", std::process::id()))
    }

    fn common() -> ConfigMap {
        json!({
            "axes": ["temp", "den"],
            "temp_range": [9000, 20000, 3],
            "den_range": [1, 100, 2],
            "approximation": ["rgi"]
        })
        .as_object()
        .unwrap()
        .clone()
    }

    #[test]
    fn save_then_load_preserves_the_triple() {
        let path = temp_path("roundtrip.json");
        let table: ArrayD<f64> = Array2::from_shape_fn((3, 2), |(i, j)| (i * 10 + j) as f64).into_dyn();
        let arrays = ArrayMap::from([("H1_4861A".to_string(), Some(table.clone())), ("formula".to_string(), None)]);
        let global = broadcast_config(&common(), &["H1_4861A", "formula"]);
        let local = ConfigSet::from([(
            "H1_4861A".to_string(),
            json!({"parameter": "emissivity"}).as_object().unwrap().clone(),
        )]);

        save_dataset(&path, &arrays, &global, &local).unwrap();
        let (a, g, l) = load_dataset(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(a["H1_4861A"].as_ref().unwrap(), &table);
        assert!(a["formula"].is_none());
        assert_eq!(g, global);
        assert_eq!(l, local);
    }

    #[test]
    fn missing_file_and_bad_extension_are_distinguished() {
        let missing = temp_path("missing.json");
        assert!(matches!(load_dataset(&missing), Err(GridError::NotFound { .. })));

        let wrong = temp_path("grid.fits");
        std::fs::write(&wrong, b"SIMPLE").unwrap();
        let err = load_dataset(&wrong);
        std::fs::remove_file(&wrong).ok();
        assert!(matches!(err, Err(GridError::Format { .. })));
    }

    #[test]
    fn malformed_content_is_a_format_error() {
        let path = temp_path("malformed.json");
        std::fs::write(&path, br#"{"format": "other", "version": 1, "arrays": {}}"#).unwrap();
        let err = load_dataset(&path);
        std::fs::write(&path, b"not json").unwrap();
        let err2 = load_dataset(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, Err(GridError::Format { .. })));
        assert!(matches!(err2, Err(GridError::Format { .. })));
    }

    #[test]
    fn non_finite_tables_are_refused() {
        let path = temp_path("nan.json");
        let table = ndarray::array![[1.0, f64::NAN], [3.0, 4.0]].into_dyn();
        let arrays = ArrayMap::from([("O3_5007A".to_string(), Some(table))]);
        let err = save_dataset(&path, &arrays, &ConfigSet::new(), &ConfigSet::new()).unwrap_err();
        assert!(!path.exists());
        match err {
            GridError::Format { message, .. } => assert!(message.contains("\"O3_5007A\""), "{message}"),
            other => panic!("expected a format error, got {other:?}"),
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn write_failures_surface_as_errors() {
        let path = temp_path("full.json");
        std::fs::remove_file(&path).ok();
        std::os::unix::fs::symlink("/dev/full", &path).unwrap();
        let arrays = ArrayMap::from([("H1_4861A".to_string(), Some(Array2::<f64>::ones((2, 2)).into_dyn()))]);
        let result = save_dataset(&path, &arrays, &ConfigSet::new(), &ConfigSet::new());
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(GridError::Io { .. } | GridError::Json(_))), "{result:?}");
    }

    #[test]
    fn saving_no_arrays_fails() {
        let path = temp_path("empty.json");
        let err = save_dataset(&path, &ArrayMap::new(), &ConfigSet::new(), &ConfigSet::new()).unwrap_err();
        assert!(matches!(err, GridError::Configuration { .. }));
        assert!(!path.exists());
    }
}
