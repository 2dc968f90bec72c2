//! Python bindings for mixed-anova.
//!
//! This module exposes the analysis to Python using PyO3. Enable the
//! `python` feature to use this.
//!
//! Rows are `(subject, [level, ...], value)` tuples; subjects and levels
//! may be ints or strings.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::config::{AnovaConfig, MultivariateTest};
use crate::design::{Level, Observation, ObservationTable};
use crate::result::SourceResult;

fn extract_level(value: &PyAny) -> PyResult<Level> {
    if let Ok(i) = value.extract::<i64>() {
        return Ok(Level::Int(i));
    }
    value.extract::<String>().map(Level::Text)
}

fn result_dict<'py>(py: Python<'py>, r: &SourceResult) -> PyResult<&'py PyDict> {
    let dict = PyDict::new(py);
    dict.set_item("source", &r.label)?;
    dict.set_item("kind", r.kind.to_string())?;
    dict.set_item("ss", r.ss)?;
    dict.set_item("error_ss", r.error_ss)?;
    dict.set_item("df_num", r.df_num)?;
    dict.set_item("df_den", r.df_den)?;
    dict.set_item("ms", r.ms)?;
    dict.set_item("ms_error", r.ms_error)?;
    dict.set_item("f", r.f)?;
    dict.set_item("p", r.p)?;
    dict.set_item("wilks_lambda", r.wilks_lambda)?;
    dict.set_item("chi_square", r.chi_square)?;
    dict.set_item("degeneracy", r.degeneracy.map(|d| d.to_string()))?;
    Ok(dict)
}

/// Run a mixed ANOVA and return one dict per source.
#[pyfunction]
#[pyo3(signature = (rows, factor_names=None, bartlett=false))]
fn anova(
    py: Python<'_>,
    rows: Vec<(&PyAny, Vec<&PyAny>, f64)>,
    factor_names: Option<Vec<String>>,
    bartlett: bool,
) -> PyResult<PyObject> {
    let mut table = ObservationTable::new();
    for (subject, levels, value) in rows {
        let levels = levels
            .into_iter()
            .map(extract_level)
            .collect::<PyResult<Vec<_>>>()?;
        let row = Observation {
            subject: extract_level(subject)?,
            levels,
            value,
        };
        table
            .push(row)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
    }

    let config = AnovaConfig {
        factor_names,
        multivariate_test: if bartlett {
            MultivariateTest::Bartlett
        } else {
            MultivariateTest::Rao
        },
        ..AnovaConfig::default()
    };
    let results = py
        .allow_threads(|| crate::context::anova(&table, &config))
        .map_err(|e| PyValueError::new_err(e.to_string()))?;

    let list = PyList::empty(py);
    for r in &results {
        list.append(result_dict(py, r)?)?;
    }
    Ok(list.into())
}

/// The mixed_anova Python module.
#[pymodule]
fn mixed_anova(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(anova, m)?)?;
    Ok(())
}
