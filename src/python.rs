//! Python bindings for the registry operations using PyO3.
//!
//! Wraps [`Registry`], [`RegKey`] and [`RegValue`] as the `Registry`, `HKEY`
//! and `Value` classes. Every native call runs with the GIL released and
//! behind a panic guard.

use pyo3::create_exception;
use pyo3::exceptions::{PyOSError, PyRuntimeError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyBytes, PyCapsule};
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::codec::{decode_raw_handle, HandleArg};
use crate::flags::{Access, CreateKeyOptions, GetValueFlags, Hkey, OpenKeyOptions};
use crate::native::RawHkey;
use crate::value::ParsedValue;
use crate::{RegKey, RegValue, Registry, RegistryError, ValueType};

create_exception!(native_reg, Win32Error, PyOSError, "A native registry call failed.");
create_exception!(native_reg, InvalidHandleError, PyValueError, "The HKEY has already been closed.");

/// Convert Rust RegistryError to Python exception
fn registry_error_to_py(err: RegistryError) -> PyErr {
    match err {
        RegistryError::Win32(e) => Python::with_gil(|py| {
            let build = || -> PyResult<PyErr> {
                let py_err = Win32Error::new_err((e.errno(), e.message().to_string()));
                let value = py_err.value(py);
                value.setattr("message", e.message())?;
                value.setattr("winerror", e.errno())?;
                value.setattr("syscall", e.syscall())?;
                Ok(py_err)
            };
            build().unwrap_or_else(|setattr_err| setattr_err)
        }),
        RegistryError::InvalidHandle => InvalidHandleError::new_err(err.to_string()),
        RegistryError::InvalidHandleValue(_)
        | RegistryError::InteriorNul { .. }
        | RegistryError::InvalidUtf16
        | RegistryError::UnsupportedValueType(_)
        | RegistryError::TruncatedData { .. } => PyValueError::new_err(err.to_string()),
    }
}

fn panic_to_py(panic_err: Box<dyn std::any::Any + Send>) -> PyErr {
    let panic_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
        format!("Rust panic: {}", s)
    } else if let Some(s) = panic_err.downcast_ref::<String>() {
        format!("Rust panic: {}", s)
    } else {
        "Rust panic: unknown error".to_string()
    };
    PyRuntimeError::new_err(panic_msg)
}

/// Runs `f` with the GIL released, converting errors and panics.
fn run<T, F>(py: Python<'_>, f: F) -> PyResult<T>
where
    F: FnOnce() -> crate::Result<T> + Send,
    T: Send,
{
    py.allow_threads(move || catch_unwind(AssertUnwindSafe(f)))
        .map_err(panic_to_py)?
        .map_err(registry_error_to_py)
}

/// A key handle as accepted from Python.
enum HandleInput<'py> {
    Wrapped(PyRef<'py, PyHkey>),
    External(RawHkey),
    Raw(u32),
}

impl HandleInput<'_> {
    fn as_arg(&self) -> HandleArg<'_> {
        match self {
            HandleInput::Wrapped(key) => HandleArg::Wrapped(&key.inner),
            HandleInput::External(raw) => HandleArg::External(*raw),
            HandleInput::Raw(value) => HandleArg::Raw(*value),
        }
    }
}

impl<'py> FromPyObject<'py> for HandleInput<'py> {
    fn extract(ob: &'py PyAny) -> PyResult<Self> {
        if let Ok(key) = ob.extract::<PyRef<'py, PyHkey>>() {
            return Ok(HandleInput::Wrapped(key));
        }
        if let Ok(capsule) = ob.downcast::<PyCapsule>() {
            return Ok(HandleInput::External(RawHkey(capsule.pointer() as usize)));
        }
        if ob.is_instance_of::<PyBool>() {
            return Err(PyTypeError::new_err("bool is not a valid HKEY"));
        }
        if let Ok(value) = ob.extract::<i128>() {
            return decode_raw_handle(value)
                .map(HandleInput::Raw)
                .map_err(registry_error_to_py);
        }
        Err(PyTypeError::new_err(format!(
            "expected HKEY, capsule or int, got {}",
            ob.get_type().name()?
        )))
    }
}

/// Python wrapper for an open registry key
#[pyclass(name = "HKEY", module = "native_reg")]
pub struct PyHkey {
    inner: RegKey,
}

#[pymethods]
impl PyHkey {
    /// The native handle value
    #[getter]
    fn native(&self) -> PyResult<usize> {
        self.inner.native().map(|raw| raw.0).map_err(registry_error_to_py)
    }

    /// True once the key has been closed
    #[getter]
    fn closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Close the key (idempotent)
    fn close(&self, py: Python) -> PyResult<()> {
        run(py, || self.inner.close())
    }

    fn __enter__(slf: PyRef<'_, Self>) -> PyRef<'_, Self> {
        slf
    }

    fn __exit__(&self, py: Python, _exc_type: &PyAny, _exc: &PyAny, _tb: &PyAny) -> PyResult<bool> {
        self.close(py)?;
        Ok(false)
    }

    fn __repr__(&self) -> String {
        match self.inner.native() {
            Ok(raw) => format!("HKEY({:#x})", raw.0),
            Err(_) => "HKEY(closed)".to_string(),
        }
    }
}

/// Python wrapper for value bytes plus their type tag
#[pyclass(name = "Value", module = "native_reg")]
#[derive(Clone)]
pub struct PyValue {
    inner: RegValue,
}

#[pymethods]
impl PyValue {
    /// Native `REG_*` type tag
    #[getter]
    fn r#type(&self) -> u32 {
        self.inner.value_type().to_u32()
    }

    /// Name of the type tag
    #[getter]
    fn type_name(&self) -> String {
        self.inner.value_type().name()
    }

    /// Raw data
    #[getter]
    fn data<'py>(&self, py: Python<'py>) -> &'py PyBytes {
        PyBytes::new(py, self.inner.data())
    }

    /// Decode the data according to its type
    fn parse(&self, py: Python) -> PyResult<PyObject> {
        let parsed = self.inner.parse().map_err(registry_error_to_py)?;
        Ok(parsed_to_py(py, parsed))
    }

    fn __bytes__<'py>(&self, py: Python<'py>) -> &'py PyBytes {
        self.data(py)
    }

    fn __len__(&self) -> usize {
        self.inner.data().len()
    }

    fn __repr__(&self) -> String {
        format!("Value(type={}, len={})", self.inner.value_type().name(), self.inner.data().len())
    }
}

fn parsed_to_py(py: Python, value: ParsedValue) -> PyObject {
    match value {
        ParsedValue::Dword(v) => v.into_py(py),
        ParsedValue::Qword(v) => v.into_py(py),
        ParsedValue::String(s) => s.into_py(py),
        ParsedValue::MultiString(v) => v.into_py(py),
        ParsedValue::Binary(b) => PyBytes::new(py, &b).into_py(py),
    }
}

fn wrap_key(key: RegKey) -> PyHkey {
    PyHkey { inner: key }
}

fn wrap_value(value: RegValue) -> PyValue {
    PyValue { inner: value }
}

/// Python wrapper for the registry operations
#[pyclass(name = "Registry", module = "native_reg")]
pub struct PyRegistry {
    inner: Registry,
}

#[pymethods]
impl PyRegistry {
    /// The system registry
    #[new]
    fn new() -> PyResult<Self> {
        #[cfg(windows)]
        {
            Ok(Self {
                inner: Registry::native(),
            })
        }
        #[cfg(not(windows))]
        {
            Err(pyo3::exceptions::PyNotImplementedError::new_err(
                "the system registry is only available on Windows",
            ))
        }
    }

    #[pyo3(signature = (key, sub_key=None, options=0, access=Access::READ))]
    fn open_key(
        &self,
        py: Python,
        key: HandleInput<'_>,
        sub_key: Option<&str>,
        options: u32,
        access: u32,
    ) -> PyResult<Option<PyHkey>> {
        let arg = key.as_arg();
        let opened = run(py, || self.inner.open_key(arg, sub_key, options, access))?;
        Ok(opened.map(wrap_key))
    }

    #[pyo3(signature = (key, sub_key, options=0, access=Access::ALL_ACCESS))]
    fn create_key(&self, py: Python, key: HandleInput<'_>, sub_key: &str, options: u32, access: u32) -> PyResult<PyHkey> {
        let arg = key.as_arg();
        run(py, || self.inner.create_key(arg, sub_key, options, access)).map(wrap_key)
    }

    #[pyo3(signature = (access=Access::READ))]
    fn open_current_user(&self, py: Python, access: u32) -> PyResult<PyHkey> {
        run(py, || self.inner.open_current_user(access)).map(wrap_key)
    }

    #[pyo3(signature = (file, access=Access::ALL_ACCESS))]
    fn load_app_key(&self, py: Python, file: &str, access: u32) -> PyResult<PyHkey> {
        run(py, || self.inner.load_app_key(file, access)).map(wrap_key)
    }

    fn enum_key_names(&self, py: Python, key: HandleInput<'_>) -> PyResult<Vec<String>> {
        let arg = key.as_arg();
        run(py, || self.inner.enum_key_names(arg))
    }

    fn enum_value_names(&self, py: Python, key: HandleInput<'_>) -> PyResult<Vec<String>> {
        let arg = key.as_arg();
        run(py, || self.inner.enum_value_names(arg))
    }

    #[pyo3(signature = (key, name=None))]
    fn query_value(&self, py: Python, key: HandleInput<'_>, name: Option<&str>) -> PyResult<Option<PyValue>> {
        let arg = key.as_arg();
        Ok(run(py, || self.inner.query_value(arg, name))?.map(wrap_value))
    }

    #[pyo3(signature = (key, sub_key=None, name=None, flags=0))]
    fn get_value(
        &self,
        py: Python,
        key: HandleInput<'_>,
        sub_key: Option<&str>,
        name: Option<&str>,
        flags: u32,
    ) -> PyResult<Option<PyValue>> {
        let arg = key.as_arg();
        Ok(run(py, || self.inner.get_value(arg, sub_key, name, flags))?.map(wrap_value))
    }

    #[pyo3(signature = (key, name, value_type, data))]
    fn set_value(
        &self,
        py: Python,
        key: HandleInput<'_>,
        name: Option<&str>,
        value_type: u32,
        data: &[u8],
    ) -> PyResult<()> {
        let arg = key.as_arg();
        run(py, || self.inner.set_value(arg, name, value_type, data))
    }

    #[pyo3(signature = (key, sub_key, new_name))]
    fn rename_key(&self, py: Python, key: HandleInput<'_>, sub_key: Option<&str>, new_name: &str) -> PyResult<()> {
        let arg = key.as_arg();
        run(py, || self.inner.rename_key(arg, sub_key, new_name))
    }

    #[pyo3(signature = (source, sub_key, dest))]
    fn copy_tree(&self, py: Python, source: HandleInput<'_>, sub_key: Option<&str>, dest: HandleInput<'_>) -> PyResult<()> {
        let source = source.as_arg();
        let dest = dest.as_arg();
        run(py, || self.inner.copy_tree(source, sub_key, dest))
    }

    #[pyo3(signature = (key, sub_key=None))]
    fn delete_tree(&self, py: Python, key: HandleInput<'_>, sub_key: Option<&str>) -> PyResult<bool> {
        let arg = key.as_arg();
        run(py, || self.inner.delete_tree(arg, sub_key))
    }

    fn delete_key(&self, py: Python, key: HandleInput<'_>, sub_key: &str) -> PyResult<bool> {
        let arg = key.as_arg();
        run(py, || self.inner.delete_key(arg, sub_key))
    }

    #[pyo3(signature = (key, sub_key, name))]
    fn delete_key_value(&self, py: Python, key: HandleInput<'_>, sub_key: Option<&str>, name: Option<&str>) -> PyResult<bool> {
        let arg = key.as_arg();
        run(py, || self.inner.delete_key_value(arg, sub_key, name))
    }

    #[pyo3(signature = (key, name))]
    fn delete_value(&self, py: Python, key: HandleInput<'_>, name: Option<&str>) -> PyResult<bool> {
        let arg = key.as_arg();
        run(py, || self.inner.delete_value(arg, name))
    }

    /// Close a key. `None` is accepted and ignored.
    fn close_key(&self, py: Python, key: Option<HandleInput<'_>>) -> PyResult<()> {
        let Some(key) = key else {
            return Ok(());
        };
        let arg = key.as_arg();
        run(py, || self.inner.close_key(arg))
    }

    #[pyo3(signature = (key, name, value))]
    fn set_value_sz(&self, py: Python, key: HandleInput<'_>, name: Option<&str>, value: &str) -> PyResult<()> {
        let arg = key.as_arg();
        run(py, || self.inner.set_value_sz(arg, name, value))
    }

    #[pyo3(signature = (key, name, value))]
    fn set_value_expand_sz(&self, py: Python, key: HandleInput<'_>, name: Option<&str>, value: &str) -> PyResult<()> {
        let arg = key.as_arg();
        run(py, || self.inner.set_value_expand_sz(arg, name, value))
    }

    #[pyo3(signature = (key, name, values))]
    fn set_value_multi_sz(&self, py: Python, key: HandleInput<'_>, name: Option<&str>, values: Vec<String>) -> PyResult<()> {
        let arg = key.as_arg();
        run(py, || self.inner.set_value_multi_sz(arg, name, &values))
    }

    #[pyo3(signature = (key, name, value))]
    fn set_value_dword(&self, py: Python, key: HandleInput<'_>, name: Option<&str>, value: u32) -> PyResult<()> {
        let arg = key.as_arg();
        run(py, || self.inner.set_value_dword(arg, name, value))
    }

    #[pyo3(signature = (key, name, value))]
    fn set_value_qword(&self, py: Python, key: HandleInput<'_>, name: Option<&str>, value: u64) -> PyResult<()> {
        let arg = key.as_arg();
        run(py, || self.inner.set_value_qword(arg, name, value))
    }

    #[pyo3(signature = (key, name=None))]
    fn query_value_parsed(&self, py: Python, key: HandleInput<'_>, name: Option<&str>) -> PyResult<Option<PyObject>> {
        let arg = key.as_arg();
        let parsed = run(py, || self.inner.query_value_parsed(arg, name))?;
        Ok(parsed.map(|value| parsed_to_py(py, value)))
    }

    #[pyo3(signature = (key, sub_key=None, name=None, flags=0))]
    fn get_value_parsed(
        &self,
        py: Python,
        key: HandleInput<'_>,
        sub_key: Option<&str>,
        name: Option<&str>,
        flags: u32,
    ) -> PyResult<Option<PyObject>> {
        let arg = key.as_arg();
        let parsed = run(py, || self.inner.get_value_parsed(arg, sub_key, name, flags))?;
        Ok(parsed.map(|value| parsed_to_py(py, value)))
    }

    fn __repr__(&self) -> String {
        "Registry()".to_string()
    }
}

/// True for values accepted as a key handle
#[pyfunction]
fn is_hkey(value: &PyAny) -> bool {
    if value.extract::<PyRef<PyHkey>>().is_ok() || value.downcast::<PyCapsule>().is_ok() {
        return true;
    }
    if value.is_instance_of::<PyBool>() {
        return false;
    }
    value
        .extract::<i128>()
        .map(|v| decode_raw_handle(v).is_ok())
        .unwrap_or(false)
}

/// Decode value bytes of the given type
#[pyfunction]
fn parse_value(py: Python, value_type: u32, data: Vec<u8>) -> PyResult<PyObject> {
    let value = RegValue::new(ValueType::from_u32(value_type), data);
    let parsed = value.parse().map_err(registry_error_to_py)?;
    Ok(parsed_to_py(py, parsed))
}

#[pyfunction]
fn parse_string(data: &[u8]) -> PyResult<String> {
    crate::parse_string(data).map_err(registry_error_to_py)
}

#[pyfunction]
fn parse_multi_string(data: &[u8]) -> PyResult<Vec<String>> {
    crate::parse_multi_string(data).map_err(registry_error_to_py)
}

#[pyfunction]
fn format_string<'py>(py: Python<'py>, value: &str) -> &'py PyBytes {
    PyBytes::new(py, &crate::format_string(value))
}

#[pyfunction]
fn format_multi_string<'py>(py: Python<'py>, values: Vec<String>) -> &'py PyBytes {
    PyBytes::new(py, &crate::format_multi_string(&values))
}

#[pyfunction]
fn format_dword<'py>(py: Python<'py>, value: u32) -> &'py PyBytes {
    PyBytes::new(py, &crate::format_dword(value))
}

#[pyfunction]
fn format_qword<'py>(py: Python<'py>, value: u64) -> &'py PyBytes {
    PyBytes::new(py, &crate::format_qword(value))
}

fn add_constants(m: &PyModule) -> PyResult<()> {
    for (name, value) in Hkey::ALL {
        m.add(name, value)?;
    }
    m.add("HKCR", Hkey::CLASSES_ROOT)?;
    m.add("HKCU", Hkey::CURRENT_USER)?;
    m.add("HKLM", Hkey::LOCAL_MACHINE)?;
    m.add("HKU", Hkey::USERS)?;

    m.add("KEY_QUERY_VALUE", Access::QUERY_VALUE)?;
    m.add("KEY_SET_VALUE", Access::SET_VALUE)?;
    m.add("KEY_CREATE_SUB_KEY", Access::CREATE_SUB_KEY)?;
    m.add("KEY_ENUMERATE_SUB_KEYS", Access::ENUMERATE_SUB_KEYS)?;
    m.add("KEY_NOTIFY", Access::NOTIFY)?;
    m.add("KEY_CREATE_LINK", Access::CREATE_LINK)?;
    m.add("KEY_WOW64_64KEY", Access::WOW64_64KEY)?;
    m.add("KEY_WOW64_32KEY", Access::WOW64_32KEY)?;
    m.add("KEY_READ", Access::READ)?;
    m.add("KEY_WRITE", Access::WRITE)?;
    m.add("KEY_EXECUTE", Access::EXECUTE)?;
    m.add("KEY_ALL_ACCESS", Access::ALL_ACCESS)?;
    m.add("DELETE", Access::DELETE)?;

    m.add("REG_OPTION_NON_VOLATILE", CreateKeyOptions::NON_VOLATILE)?;
    m.add("REG_OPTION_VOLATILE", CreateKeyOptions::VOLATILE)?;
    m.add("REG_OPTION_CREATE_LINK", CreateKeyOptions::CREATE_LINK)?;
    m.add("REG_OPTION_BACKUP_RESTORE", CreateKeyOptions::BACKUP_RESTORE)?;
    m.add("REG_OPTION_OPEN_LINK", OpenKeyOptions::OPEN_LINK)?;

    for value_type in 0..=ValueType::REG_QWORD {
        m.add(ValueType::from_u32(value_type).name().as_str(), value_type)?;
    }

    m.add("RRF_RT_ANY", GetValueFlags::RT_ANY)?;
    m.add("RRF_RT_REG_NONE", GetValueFlags::RT_REG_NONE)?;
    m.add("RRF_RT_REG_SZ", GetValueFlags::RT_REG_SZ)?;
    m.add("RRF_RT_REG_EXPAND_SZ", GetValueFlags::RT_REG_EXPAND_SZ)?;
    m.add("RRF_RT_REG_BINARY", GetValueFlags::RT_REG_BINARY)?;
    m.add("RRF_RT_REG_DWORD", GetValueFlags::RT_REG_DWORD)?;
    m.add("RRF_RT_REG_MULTI_SZ", GetValueFlags::RT_REG_MULTI_SZ)?;
    m.add("RRF_RT_REG_QWORD", GetValueFlags::RT_REG_QWORD)?;
    m.add("RRF_RT_DWORD", GetValueFlags::RT_DWORD)?;
    m.add("RRF_RT_QWORD", GetValueFlags::RT_QWORD)?;
    m.add("RRF_NOEXPAND", GetValueFlags::NO_EXPAND)?;
    m.add("RRF_SUBKEY_WOW6464KEY", GetValueFlags::SUBKEY_WOW6464KEY)?;
    m.add("RRF_SUBKEY_WOW6432KEY", GetValueFlags::SUBKEY_WOW6432KEY)?;
    Ok(())
}

/// Python module definition
#[pymodule]
fn native_reg(py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyRegistry>()?;
    m.add_class::<PyHkey>()?;
    m.add_class::<PyValue>()?;

    m.add("Win32Error", py.get_type::<Win32Error>())?;
    m.add("InvalidHandleError", py.get_type::<InvalidHandleError>())?;

    m.add_function(wrap_pyfunction!(is_hkey, m)?)?;
    m.add_function(wrap_pyfunction!(parse_value, m)?)?;
    m.add_function(wrap_pyfunction!(parse_string, m)?)?;
    m.add_function(wrap_pyfunction!(parse_multi_string, m)?)?;
    m.add_function(wrap_pyfunction!(format_string, m)?)?;
    m.add_function(wrap_pyfunction!(format_multi_string, m)?)?;
    m.add_function(wrap_pyfunction!(format_dword, m)?)?;
    m.add_function(wrap_pyfunction!(format_qword, m)?)?;

    add_constants(m)?;

    // Add version constant
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::Status;
    use crate::MemoryRegistry;

    #[test]
    fn test_win32_error_attributes() {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| {
            let err = RegistryError::win32(&MemoryRegistry::new(), Status::ACCESS_DENIED, "RegOpenKeyExW");
            let py_err = registry_error_to_py(err);
            assert!(py_err.is_instance_of::<Win32Error>(py));
            assert!(py_err.is_instance_of::<PyOSError>(py));

            let value = py_err.value(py);
            let message: String = value.getattr("message").unwrap().extract().unwrap();
            let errno: u32 = value.getattr("errno").unwrap().extract().unwrap();
            let winerror: u32 = value.getattr("winerror").unwrap().extract().unwrap();
            let syscall: String = value.getattr("syscall").unwrap().extract().unwrap();
            assert_eq!(message, "Access is denied.");
            assert_eq!(errno, 5);
            assert_eq!(winerror, 5);
            assert_eq!(syscall, "RegOpenKeyExW");
        });
    }

    #[test]
    fn test_invalid_handle_maps_to_its_own_exception() {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| {
            let py_err = registry_error_to_py(RegistryError::InvalidHandle);
            assert!(py_err.is_instance_of::<InvalidHandleError>(py));
            assert!(py_err.is_instance_of::<PyValueError>(py));
        });
    }
}
