//! Embedded CPython behind `py_snippet:` blocks

use std::ffi::CString;
use std::path::Path;

use pyo3::exceptions::PySyntaxError;
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyCFunction, PyDict, PyFloat, PyInt, PyList, PyString, PyTuple};
use pyo3::IntoPyObjectExt;
use tracing::debug;

use super::engine::ForeignEngine;
use super::marshal::{self, MarshalRules};
use crate::config::Settings;
use crate::host::{Host, Level, Origin};
use crate::script::{Key, Snippet, Value, VarStore};

/// `sys.stdout`/`sys.stderr` replacement forwarding to the console
#[pyclass]
struct ConsoleWriter {
    host: Host,
}

#[pymethods]
impl ConsoleWriter {
    fn write(&self, text: &str) -> usize {
        self.host.write_console(text);
        text.chars().count()
    }

    fn flush(&self) {}
}

/// Python-backed snippet engine with a persistent globals dict
pub struct PythonEngine {
    globals: Py<PyDict>,
    host: Host,
    rules: MarshalRules,
}

impl PythonEngine {
    pub fn new(host: Host) -> Self {
        Self::with_settings(host, &Settings::default())
    }

    pub fn with_settings(host: Host, settings: &Settings) -> Self {
        let globals = Python::with_gil(|py| PyDict::new(py).unbind());
        Self {
            globals,
            host,
            rules: MarshalRules::from_settings(settings),
        }
    }

    /// Look up a global by name
    pub fn get(&self, name: &str) -> Option<Value> {
        Python::with_gil(|py| {
            let globals = self.globals.bind(py);
            match globals.get_item(name) {
                Ok(Some(value)) => Some(from_py(&value, 0, self.rules.depth)),
                _ => None,
            }
        })
    }

    /// Put `dir` first on `sys.path` and make it the working directory, so
    /// a standalone file can import its neighbours
    pub fn enter_script_dir(&self, dir: &Path) -> PyResult<()> {
        Python::with_gil(|py| {
            let dir_str = dir.to_string_lossy().to_string();
            let sys_path = py.import("sys")?.getattr("path")?;
            if !sys_path.contains(&dir_str)? {
                sys_path.call_method1("insert", (0, &dir_str))?;
            }
            Ok::<_, PyErr>(())
        })?;
        std::env::set_current_dir(dir)?;
        Ok(())
    }

    fn run(&self, py: Python<'_>, snippet: &Snippet) -> PyResult<()> {
        let code = CString::new(snippet.body.as_str())
            .map_err(|e| PySyntaxError::new_err(format!("source contains a NUL byte: {}", e)))?;

        let sys = py.import("sys")?;
        let builtins = py.import("builtins")?;
        let old_stdout = sys.getattr("stdout")?;
        let old_stderr = sys.getattr("stderr")?;
        let old_input = builtins.getattr("input")?;

        let writer = Bound::new(py, ConsoleWriter { host: self.host.clone() })?;
        sys.setattr("stdout", &writer)?;
        sys.setattr("stderr", &writer)?;

        let h = self.host.clone();
        let input = PyCFunction::new_closure(
            py,
            Some(c"input"),
            None,
            move |args: &Bound<'_, PyTuple>, _kwargs: Option<&Bound<'_, PyDict>>| -> PyResult<String> {
                let prompt = match args.len() {
                    0 => String::new(),
                    _ => args.get_item(0)?.str()?.to_string(),
                };
                if !prompt.is_empty() {
                    h.write_console(&prompt);
                }
                let shown = if prompt.is_empty() { "Input:".to_string() } else { prompt };
                Ok(args.py().allow_threads(|| h.request_input(&shown)))
            },
        )?;
        builtins.setattr("input", input)?;

        let globals = self.globals.bind(py);
        let result = py.run(code.as_c_str(), Some(globals), Some(globals));

        sys.setattr("stdout", old_stdout)?;
        sys.setattr("stderr", old_stderr)?;
        builtins.setattr("input", old_input)?;

        result
    }

    fn report(&self, py: Python<'_>, err: PyErr, snippet: &Snippet) {
        let line = error_line(py, &err).map(|l| snippet.script_line(l));
        let trace = err
            .traceback(py)
            .and_then(|tb| tb.format().ok())
            .unwrap_or_default();
        self.host.diagnostic(
            Level::Error,
            format!("Python error: {}{}", trace, err),
            line,
            Origin::Python,
        );
    }
}

/// Snippet-relative line of a fault: `lineno` for syntax errors, otherwise
/// the innermost traceback frame that belongs to the snippet
fn error_line(py: Python<'_>, err: &PyErr) -> Option<usize> {
    if err.is_instance_of::<PySyntaxError>(py) {
        return err.value(py).getattr("lineno").ok()?.extract::<usize>().ok();
    }

    let mut line = None;
    let mut tb = err.traceback(py).map(|tb| tb.into_any());
    while let Some(frame) = tb {
        let filename = frame
            .getattr("tb_frame")
            .and_then(|f| f.getattr("f_code"))
            .and_then(|c| c.getattr("co_filename"))
            .and_then(|n| n.extract::<String>());
        if let Ok("<string>") = filename.as_deref() {
            line = frame.getattr("tb_lineno").ok().and_then(|l| l.extract::<usize>().ok());
        }
        tb = frame.getattr("tb_next").ok().filter(|next| !next.is_none());
    }
    line
}

impl ForeignEngine for PythonEngine {
    fn origin(&self) -> Origin {
        Origin::Python
    }

    fn execute(&mut self, snippet: &Snippet) -> bool {
        Python::with_gil(|py| match self.run(py, snippet) {
            Ok(()) => true,
            Err(err) => {
                self.report(py, err, snippet);
                false
            }
        })
    }

    fn inject(&mut self, vars: &VarStore) {
        Python::with_gil(|py| {
            let globals = self.globals.bind(py);
            for (name, value) in vars {
                if !self.rules.injectable(name) {
                    continue;
                }
                let result = to_py(py, value, 0, self.rules.depth)
                    .and_then(|object| globals.set_item(name, object));
                if let Err(err) = result {
                    debug!(name = %name, error = %err, "python inject skipped");
                }
            }
        });
    }

    fn pull(&mut self, vars: &mut VarStore) {
        Python::with_gil(|py| {
            let globals = self.globals.bind(py);
            let visible: Vec<String> = globals
                .keys()
                .iter()
                .filter_map(|key| key.extract::<String>().ok())
                .collect();

            let names = self
                .rules
                .names_to_pull(vars, visible.iter().map(String::as_str));
            for name in names {
                match globals.get_item(&name) {
                    Ok(Some(value)) => {
                        vars.insert(name, from_py(&value, 0, self.rules.depth));
                    }
                    Ok(None) => {}
                    Err(err) => debug!(name = %name, error = %err, "python pull skipped"),
                }
            }
        });
    }
}

fn to_py<'py>(py: Python<'py>, value: &Value, depth: usize, limit: usize) -> PyResult<Bound<'py, PyAny>> {
    if depth > limit {
        return value.to_string().into_bound_py_any(py);
    }
    match value {
        Value::Nil => Ok(py.None().into_bound(py)),
        Value::Bool(b) => b.into_bound_py_any(py),
        Value::Int(n) => n.into_bound_py_any(py),
        Value::Float(f) => f.into_bound_py_any(py),
        Value::Str(s) => s.into_bound_py_any(py),
        Value::List(items) => {
            let items = items
                .iter()
                .map(|item| to_py(py, item, depth + 1, limit))
                .collect::<PyResult<Vec<_>>>()?;
            Ok(PyList::new(py, items)?.into_any())
        }
        Value::Map(entries) => {
            let dict = PyDict::new(py);
            for (key, item) in entries {
                let item = to_py(py, item, depth + 1, limit)?;
                match key {
                    Key::Int(n) => dict.set_item(n, item)?,
                    Key::Str(s) => dict.set_item(s, item)?,
                }
            }
            Ok(dict.into_any())
        }
    }
}

fn display(object: &Bound<'_, PyAny>) -> String {
    object.str().map(|s| s.to_string()).unwrap_or_default()
}

fn from_py(object: &Bound<'_, PyAny>, depth: usize, limit: usize) -> Value {
    if depth > limit {
        return Value::Str(display(object));
    }
    if object.is_none() {
        return Value::Nil;
    }
    // bool is a subclass of int
    if let Ok(b) = object.downcast::<PyBool>() {
        return Value::Bool(b.is_true());
    }
    if object.downcast::<PyInt>().is_ok() {
        return match object.extract::<i64>() {
            Ok(n) => Value::Int(n),
            Err(_) => Value::Str(display(object)),
        };
    }
    if let Ok(f) = object.downcast::<PyFloat>() {
        return Value::Float(f.value());
    }
    if let Ok(s) = object.downcast::<PyString>() {
        return Value::Str(s.to_string());
    }
    if object.downcast::<PyList>().is_ok() || object.downcast::<PyTuple>().is_ok() {
        let items = match object.try_iter() {
            Ok(iter) => iter
                .filter_map(|item| item.ok())
                .map(|item| from_py(&item, depth + 1, limit))
                .collect(),
            Err(_) => return Value::Str(display(object)),
        };
        return Value::List(items);
    }
    if let Ok(dict) = object.downcast::<PyDict>() {
        let entries = dict
            .iter()
            .map(|(key, item)| {
                let key = match key.extract::<i64>() {
                    Ok(n) if !key.is_instance_of::<PyBool>() => Key::Int(n),
                    _ => Key::Str(display(&key)),
                };
                (key, from_py(&item, depth + 1, limit))
            })
            .collect();
        return marshal::table_to_value(entries);
    }
    Value::Str(display(object))
}
