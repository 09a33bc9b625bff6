use crate::config::ValidationConfig;
use crate::error::AuditError;
use crate::formula;
use crate::store::Snapshot;
use crate::validation::{ScenarioSet, Validator};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

fn to_py_err(err: AuditError) -> PyErr {
    match err {
        AuditError::Cancelled | AuditError::Io(_) => PyRuntimeError::new_err(err.to_string()),
        _ => PyValueError::new_err(err.to_string()),
    }
}

/// Validates a JSON snapshot and returns the report as JSON.
///
/// `config_toml` uses the same format as the CLI's `--config` file. Without
/// `scenarios_json` value rules run once against the computed values.
#[pyfunction]
#[pyo3(signature = (snapshot_json, config_toml=None, scenarios_json=None))]
pub fn validate_json(snapshot_json: &str, config_toml: Option<&str>, scenarios_json: Option<&str>) -> PyResult<String> {
    let snapshot = Snapshot::from_json(snapshot_json).map_err(to_py_err)?;
    let config = match config_toml {
        Some(text) => ValidationConfig::from_toml_str(text).map_err(to_py_err)?,
        None => ValidationConfig::default(),
    };
    let scenarios = match scenarios_json {
        Some(text) => ScenarioSet::from_json(text).map_err(to_py_err)?,
        None => ScenarioSet::empty(),
    };
    let report = Validator::new(config).run(&snapshot, &scenarios).map_err(to_py_err)?;
    report.to_json().map_err(to_py_err)
}

/// Canonical text and references of one formula. Raises on unparseable input.
#[pyfunction]
pub fn parse_formula(text: &str) -> PyResult<(String, Vec<String>)> {
    let parsed = formula::parse(text);
    if let Some(err) = &parsed.error {
        return Err(PyValueError::new_err(err.to_string()));
    }
    let canonical = parsed.canonical().unwrap_or_default();
    Ok((canonical, parsed.references.iter().map(ToString::to_string).collect()))
}

#[pyfunction]
fn rust_core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// The `valuation_audit._core` extension module.
#[pymodule]
pub fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(validate_json, m)?)?;
    m.add_function(wrap_pyfunction!(parse_formula, m)?)?;
    m.add_function(wrap_pyfunction!(rust_core_version, m)?)?;
    Ok(())
}
